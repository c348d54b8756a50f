use std::path::PathBuf;

/// Explicit library path, bypassing module-directory discovery.
pub const ENV_LIBRARY_PATH: &str = "TOBII_GI_LIBRARY_PATH";
/// Treat an undeterminable module directory as an error instead of using the working directory.
pub const ENV_STRICT_MODULE_DIR: &str = "TOBII_GI_STRICT_MODULE_DIR";

/// Controls where the loader looks for the Game Integration library.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Full path to the library file. When set, the module directory is not consulted.
    pub library_path: Option<PathBuf>,
    /// Fail with `ModuleDirUnavailable` rather than falling back to the working directory.
    pub strict_module_dir: bool,
}

impl LoaderConfig {
    /// Read `TOBII_GI_LIBRARY_PATH` and `TOBII_GI_STRICT_MODULE_DIR`.
    pub fn from_env() -> Self {
        let config = Self {
            library_path: read_env_path(ENV_LIBRARY_PATH),
            strict_module_dir: read_env_bool(ENV_STRICT_MODULE_DIR, false),
        };
        log::debug!("Loader config from environment: {:?}", config);
        config
    }

    pub fn with_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.library_path = Some(path.into());
        self
    }

    pub fn strict_module_dir(mut self, strict: bool) -> Self {
        self.strict_module_dir = strict;
        self
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn read_env_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(v) => parse_bool(&v).unwrap_or_else(|| {
            log::warn!("Ignoring {}='{}' (expected true/false)", name, v);
            default
        }),
        Err(_) => default,
    }
}

fn read_env_path(name: &str) -> Option<PathBuf> {
    std::env::var_os(name)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}
