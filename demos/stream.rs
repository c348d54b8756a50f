//! Stream gaze points and head poses to stdout.
//!
//! Usage: cargo run --example stream
//! Press Ctrl+C to stop.

use std::time::{Duration, Instant};
use tobii_gi::{Sample, Subscription, ThreadMode, TobiiApi, Tracker, UnitType};

fn main() {
    env_logger::init();

    let api = match TobiiApi::load() {
        Ok(api) => api,
        Err(e) => {
            eprintln!("Failed to load library: {}", e);
            std::process::exit(1);
        }
    };
    println!("Library: {}", api.library_path().display());

    let mut tracker = match Tracker::start(api, ThreadMode::Custom) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Failed to start tracker: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = tracker.subscribe(Subscription::STANDARD_GAZE | Subscription::HEAD_TRACKING) {
        eprintln!("Failed to subscribe: {}", e);
        std::process::exit(1);
    }

    match tracker.status() {
        Ok(status) => println!("Status:  {:?}", status),
        Err(e) => println!("Status:  unavailable ({})", e),
    }

    let stream = match tracker.into_stream(UnitType::Normalized, Duration::from_millis(8)) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to start polling: {}", e);
            std::process::exit(1);
        }
    };

    println!("Streaming (Ctrl+C to stop)...");

    let start = Instant::now();
    let mut count: u64 = 0;

    loop {
        match stream.recv_timeout(Duration::from_secs(5)) {
            Ok(sample) => {
                count += 1;
                // Print every ~30th sample to avoid flooding the terminal
                if count % 30 == 1 {
                    match sample {
                        Sample::Gaze(p) => {
                            let (ts, x, y) = (p.timestamp_us, p.x, p.y);
                            println!("ts={:<14} gaze=[{:+.3}, {:+.3}]", ts, x, y);
                        }
                        Sample::Head(p) => {
                            let (ts, rot, pos) = (p.timestamp_us, p.rotation, p.position);
                            let (yaw, pitch, roll) = (rot.yaw, rot.pitch, rot.roll);
                            let (x, y, z) = (pos.x, pos.y, pos.z);
                            println!(
                                "ts={:<14} head rot=[{:+.1}, {:+.1}, {:+.1}] pos=[{:+.1}, {:+.1}, {:+.1}]",
                                ts, yaw, pitch, roll, x, y, z
                            );
                        }
                    }
                }
            }
            Err(tobii_gi::TobiiError::Timeout) => {
                eprintln!("Timeout waiting for samples");
                break;
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                break;
            }
        }
    }

    let elapsed = start.elapsed().as_secs_f64();
    println!("\nTotal: {} samples in {:.1}s", count, elapsed);
}
