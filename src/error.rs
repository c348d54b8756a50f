use std::fmt;
use std::path::PathBuf;

/// Errors that can occur when loading or driving the Game Integration library.
#[derive(Debug, thiserror::Error)]
pub enum TobiiError {
    #[error("Failed to load {}: {source}", .path.display())]
    LibraryLoad {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("Could not determine the directory of the host module")]
    ModuleDirUnavailable,

    #[error("Working directory unavailable: {0}")]
    WorkingDir(#[source] std::io::Error),

    #[error("Failed to spawn poll thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Entry point `{0}` was not exported by the library")]
    SymbolUnavailable(&'static str),

    #[error("Library is missing entry points: {}", .0.join(", "))]
    SymbolsMissing(Vec<&'static str>),

    #[error("Tracker refused to start")]
    StartFailed,

    #[error("Timeout waiting for data")]
    Timeout,

    #[error("Sample stream stopped")]
    StreamStopped,
}

/// Thread-safe last-error storage for the C FFI layer.
pub(crate) struct LastError {
    message: std::sync::Mutex<String>,
}

impl LastError {
    pub const fn new() -> Self {
        Self {
            message: std::sync::Mutex::new(String::new()),
        }
    }

    pub fn set(&self, err: &TobiiError) {
        if let Ok(mut msg) = self.message.lock() {
            *msg = fmt::format(format_args!("{}\0", err));
        }
    }

    pub fn clear(&self) {
        if let Ok(mut msg) = self.message.lock() {
            msg.clear();
        }
    }

    pub fn as_ptr(&self) -> *const std::ffi::c_char {
        match self.message.lock() {
            Ok(msg) if !msg.is_empty() => msg.as_ptr() as *const std::ffi::c_char,
            _ => std::ptr::null(),
        }
    }
}
