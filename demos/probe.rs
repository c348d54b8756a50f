//! Load the Game Integration library and report which entry points resolved.
//!
//! Usage: cargo run --example probe
//! Set TOBII_GI_LIBRARY_PATH to point at a specific library file.

fn main() {
    env_logger::init();

    match tobii_gi::locate_library(&tobii_gi::LoaderConfig::from_env()) {
        Ok(location) => println!("Library:  {} ({:?})", location.path.display(), location.origin),
        Err(e) => println!("Library:  <unresolved> ({})", e),
    }

    let mut table = tobii_gi::ApiTable::default();
    if !tobii_gi::initialize(&mut table) {
        eprintln!("Eye tracking unavailable");
        std::process::exit(1);
    }

    for (name, valid) in table.entries() {
        println!("  {:<24} {}", name, if valid { "ok" } else { "MISSING" });
    }
    println!(
        "{} of {} entry points resolved",
        table.entries().filter(|(_, valid)| *valid).count(),
        tobii_gi::api::SYMBOLS.len()
    );
}
