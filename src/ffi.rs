//! C FFI layer for tobii-gi.
//!
//! Exposes the flat [`ApiTable`] to C/C++ hosts. The generated C header is
//! written to `include/tobii_gi.h` by cbindgen.

use crate::api::{load_table, ApiTable};
use crate::config::LoaderConfig;
use crate::error::LastError;
use std::ffi::{c_char, c_int};

static LAST_ERROR: LastError = LastError::new();

/// Load the Game Integration library next to the host module and fill `table`.
///
/// Returns false and leaves every entry NULL when the library cannot be
/// loaded (check `tgi_last_error()`). Returns true once the library is
/// loaded; individual entries may still be NULL if the library does not
/// export them.
///
/// # Safety
/// `table` must point to a writable `ApiTable`, or be null.
#[no_mangle]
pub unsafe extern "C" fn tgi_initialize(table: *mut ApiTable) -> bool {
    if table.is_null() {
        return false;
    }
    table.write(ApiTable::default());

    match load_table(&LoaderConfig::from_env()) {
        Ok(loaded) => {
            LAST_ERROR.clear();
            table.write(loaded);
            true
        }
        Err(e) => {
            log::warn!("Eye tracking unavailable: {}", e);
            LAST_ERROR.set(&e);
            false
        }
    }
}

/// True when every entry in `table` is non-NULL.
///
/// # Safety
/// `table` must point to a valid `ApiTable`, or be null.
#[no_mangle]
pub unsafe extern "C" fn tgi_table_is_complete(table: *const ApiTable) -> bool {
    match table.as_ref() {
        Some(table) => table.is_complete(),
        None => false,
    }
}

/// Number of NULL entries in `table`, or -1 if `table` is null.
///
/// # Safety
/// `table` must point to a valid `ApiTable`, or be null.
#[no_mangle]
pub unsafe extern "C" fn tgi_table_missing_count(table: *const ApiTable) -> c_int {
    match table.as_ref() {
        Some(table) => table.missing().len() as c_int,
        None => -1,
    }
}

/// Get the last error message. Returns NULL if no error.
/// The returned pointer is valid until the next tobii-gi API call.
#[no_mangle]
pub extern "C" fn tgi_last_error() -> *const c_char {
    LAST_ERROR.as_ptr()
}
