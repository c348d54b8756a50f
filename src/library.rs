//! Native library loading behind a small trait, so symbol resolution can be
//! driven by `libloading` in production and by an in-memory table in tests.

use crate::{Result, TobiiError};
use std::ffi::{c_void, CStr};
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

/// File name of the Game Integration library for the current platform.
pub const fn library_file_name() -> &'static str {
    if cfg!(windows) {
        "Tobii.GameIntegration.dll"
    } else if cfg!(target_os = "macos") {
        "libTobii.GameIntegration.dylib"
    } else {
        "libTobii.GameIntegration.so"
    }
}

/// A loaded native library that can be queried for exported symbols.
pub trait NativeLibrary: Send + Sync {
    /// Path the library was loaded from.
    fn path(&self) -> &Path;

    /// Address of an exported symbol, or `None` when the library does not export it.
    fn symbol_address(&self, name: &CStr) -> Option<NonNull<c_void>>;
}

/// `libloading`-backed library handle.
pub struct DynamicLibrary {
    library: libloading::Library,
    path: PathBuf,
}

impl DynamicLibrary {
    /// Load the library at `path` into the process.
    pub fn open(path: impl AsRef<Path>) -> Result<DynamicLibrary> {
        let path = path.as_ref();
        // Safety: running the library's initializers is the point of loading it;
        // the file is the vendor runtime placed next to the host module.
        let library =
            unsafe { libloading::Library::new(path) }.map_err(|source| TobiiError::LibraryLoad {
                path: path.to_path_buf(),
                source,
            })?;
        log::debug!("Loaded {}", path.display());

        Ok(DynamicLibrary {
            library,
            path: path.to_path_buf(),
        })
    }

    /// Keep the library mapped for the rest of the process and return a
    /// handle that can still resolve symbols.
    pub fn leak(self) -> &'static DynamicLibrary {
        Box::leak(Box::new(self))
    }
}

impl NativeLibrary for DynamicLibrary {
    fn path(&self) -> &Path {
        &self.path
    }

    fn symbol_address(&self, name: &CStr) -> Option<NonNull<c_void>> {
        // Safety: the symbol is only read as an address here; callers cast it
        // to the signature documented for that export.
        let symbol: libloading::Symbol<'_, *mut c_void> =
            match unsafe { self.library.get(name.to_bytes_with_nul()) } {
                Ok(symbol) => symbol,
                Err(e) => {
                    log::debug!("{}: {}", name.to_string_lossy(), e);
                    return None;
                }
            };
        NonNull::new(*symbol)
    }
}

impl std::fmt::Debug for DynamicLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicLibrary")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(library_file_name());
        match DynamicLibrary::open(&path) {
            Err(TobiiError::LibraryLoad { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected LibraryLoad, got {:?}", other.map(|_| ())),
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_resolve_against_system_libc() {
        let lib = DynamicLibrary::open("libc.so.6").unwrap();
        assert!(lib.symbol_address(c"strlen").is_some());
        assert!(lib.symbol_address(c"GetNewGazePoints").is_none());
        assert_eq!(lib.path(), Path::new("libc.so.6"));
    }
}
