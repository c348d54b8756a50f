//! Locating the Game Integration library next to the module that hosts this crate.
//!
//! "Module" means the executable or shared library this code was linked into.
//! When the crate is built into a plugin, that is the plugin file, not the
//! host process's main executable.

use crate::config::LoaderConfig;
use crate::library::library_file_name;
use crate::{Result, TobiiError};
use std::ffi::c_void;
use std::path::{Path, PathBuf};

/// Where the library path came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathOrigin {
    /// `LoaderConfig::library_path` / `TOBII_GI_LIBRARY_PATH`.
    Override,
    /// Directory of the module containing this crate.
    ModuleDirectory,
    /// Module directory was unknown; the working directory was used instead.
    WorkingDirectory,
}

/// Resolved library path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryLocation {
    pub path: PathBuf,
    pub origin: PathOrigin,
}

/// Absolute path of the module (executable or shared library) containing this crate's code.
pub fn current_module_path() -> Option<PathBuf> {
    let anchor = current_module_path as fn() -> Option<PathBuf> as *const c_void;
    module_path_of(anchor)
}

/// Directory of `current_module_path()`.
pub fn current_module_dir() -> Option<PathBuf> {
    current_module_path()
        .as_deref()
        .and_then(Path::parent)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(Path::to_path_buf)
}

/// Work out which file the loader should open.
pub fn locate_library(config: &LoaderConfig) -> Result<LibraryLocation> {
    if let Some(path) = &config.library_path {
        return Ok(LibraryLocation {
            path: path.clone(),
            origin: PathOrigin::Override,
        });
    }
    locate_in(current_module_dir(), config.strict_module_dir)
}

/// Place the library inside `module_dir`, or the working directory when that is unknown.
fn locate_in(module_dir: Option<PathBuf>, strict: bool) -> Result<LibraryLocation> {
    let (dir, origin) = match module_dir {
        Some(dir) => (dir, PathOrigin::ModuleDirectory),
        None if strict => return Err(TobiiError::ModuleDirUnavailable),
        None => {
            let cwd = std::env::current_dir().map_err(TobiiError::WorkingDir)?;
            log::warn!(
                "Could not determine host module directory, looking for {} in working directory {}",
                library_file_name(),
                cwd.display()
            );
            (cwd, PathOrigin::WorkingDirectory)
        }
    };

    Ok(LibraryLocation {
        path: dir.join(library_file_name()),
        origin,
    })
}

#[cfg(unix)]
fn module_path_of(addr: *const c_void) -> Option<PathBuf> {
    use std::ffi::{CStr, OsStr};
    use std::os::unix::ffi::OsStrExt;

    let mut info: libc::Dl_info = unsafe { std::mem::zeroed() };
    // Safety: dladdr only inspects the loader's link map for `addr`.
    if unsafe { libc::dladdr(addr, &mut info) } == 0 || info.dli_fname.is_null() {
        return None;
    }
    let name = unsafe { CStr::from_ptr(info.dli_fname) };
    let path = PathBuf::from(OsStr::from_bytes(name.to_bytes()));
    if path.as_os_str().is_empty() {
        return None;
    }

    // The main executable is reported as argv[0], which may be relative.
    if path.is_relative() {
        if let Ok(abs) = std::fs::canonicalize(&path) {
            return Some(abs);
        }
        return std::env::current_exe()
            .ok()
            .filter(|exe| exe.file_name() == path.file_name())
            .or(Some(path));
    }
    Some(path)
}

#[cfg(windows)]
fn module_path_of(addr: *const c_void) -> Option<PathBuf> {
    use std::ffi::OsString;
    use std::os::windows::ffi::OsStringExt;
    use windows_sys::Win32::Foundation::HMODULE;
    use windows_sys::Win32::System::LibraryLoader::{
        GetModuleFileNameW, GetModuleHandleExW, GET_MODULE_HANDLE_EX_FLAG_FROM_ADDRESS,
        GET_MODULE_HANDLE_EX_FLAG_UNCHANGED_REFCOUNT,
    };

    let mut module: HMODULE = std::ptr::null_mut();
    let flags =
        GET_MODULE_HANDLE_EX_FLAG_FROM_ADDRESS | GET_MODULE_HANDLE_EX_FLAG_UNCHANGED_REFCOUNT;
    // Safety: with FROM_ADDRESS the name argument is an address inside the module.
    if unsafe { GetModuleHandleExW(flags, addr as *const u16, &mut module) } == 0 {
        return None;
    }

    let mut capacity = 260usize;
    while capacity <= 32_768 {
        let mut buf = vec![0u16; capacity];
        let len = unsafe { GetModuleFileNameW(module, buf.as_mut_ptr(), capacity as u32) } as usize;
        if len == 0 {
            return None;
        }
        // A full buffer means the name was truncated.
        if len < capacity {
            return Some(PathBuf::from(OsString::from_wide(&buf[..len])));
        }
        capacity *= 2;
    }
    None
}

#[cfg(not(any(unix, windows)))]
fn module_path_of(_addr: *const c_void) -> Option<PathBuf> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_wins() {
        let config = LoaderConfig::default()
            .with_library_path("/tmp/custom/Tobii.GameIntegration.dll")
            .strict_module_dir(true);
        let loc = locate_library(&config).unwrap();
        assert_eq!(loc.origin, PathOrigin::Override);
        assert_eq!(loc.path, PathBuf::from("/tmp/custom/Tobii.GameIntegration.dll"));
    }

    #[cfg(any(unix, windows))]
    #[test]
    fn test_module_dir_contains_test_binary() {
        let module = current_module_path().expect("module path");
        assert!(module.is_absolute(), "{}", module.display());
        assert!(module.exists(), "{}", module.display());

        // Unit tests are linked into the test executable itself.
        let exe = std::env::current_exe().unwrap();
        assert_eq!(
            std::fs::canonicalize(&module).unwrap(),
            std::fs::canonicalize(&exe).unwrap()
        );
    }

    #[cfg(any(unix, windows))]
    #[test]
    fn test_default_location_is_next_to_module() {
        let loc = locate_library(&LoaderConfig::default()).unwrap();
        assert_eq!(loc.origin, PathOrigin::ModuleDirectory);
        assert_eq!(loc.path.file_name().unwrap(), library_file_name());
        assert_eq!(loc.path.parent(), current_module_dir().as_deref());
    }

    #[test]
    fn test_unknown_module_dir_falls_back_to_working_dir() {
        let loc = locate_in(None, false).unwrap();
        assert_eq!(loc.origin, PathOrigin::WorkingDirectory);
        assert_eq!(
            loc.path,
            std::env::current_dir().unwrap().join(library_file_name())
        );
    }

    #[test]
    fn test_strict_mode_rejects_unknown_module_dir() {
        match locate_in(None, true) {
            Err(TobiiError::ModuleDirUnavailable) => {}
            other => panic!("expected ModuleDirUnavailable, got {:?}", other),
        }
    }

    #[test]
    fn test_known_module_dir_is_used_in_strict_mode() {
        let loc = locate_in(Some(PathBuf::from("/opt/game/bin")), true).unwrap();
        assert_eq!(loc.origin, PathOrigin::ModuleDirectory);
        assert_eq!(loc.path, Path::new("/opt/game/bin").join(library_file_name()));
    }
}
