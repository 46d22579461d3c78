use duckdb::vtab::Value;
use libduckdb_sys::duckdb_free;
use libduckdb_sys::duckdb_get_uint32;
use libduckdb_sys::duckdb_get_varchar;
use libduckdb_sys::duckdb_value;
use std::ffi::CStr;
use std::os::raw::c_void;

/// Reads table function parameters through the raw `duckdb_value` behind a `Value`.
///
/// # Safety Warning
///
/// `duckdb::vtab::Value` does not expose its handle, so this relies on the struct
/// being a plain wrapper around a single `duckdb_value`. An update of duckdb-rs that
/// changes that layout turns every call here into undefined behavior.
pub(crate) trait ValueBridge {
    /// Extracts the raw `duckdb_value` pointer from the `Value` struct.
    ///
    /// # Safety
    ///
    /// Only valid while `Value` has the same size and layout as `duckdb_value`.
    unsafe fn get_value_ptr(&self) -> duckdb_value;

    /// Returns the value as an u32
    fn to_uint32(&self) -> u32 {
        unsafe { duckdb_get_uint32(self.get_value_ptr()) }
    }

    /// Returns the value as a String
    fn to_varchar(&self) -> String {
        unsafe {
            let varchar = duckdb_get_varchar(self.get_value_ptr());
            let c_str = CStr::from_ptr(varchar);
            let string = c_str.to_string_lossy().into_owned();
            duckdb_free(varchar as *mut c_void);
            string
        }
    }
}

impl ValueBridge for Value {
    /// # DANGER: memory layout hack
    ///
    /// Reinterprets the `Value` reference as the `duckdb_value` it wraps.
    unsafe fn get_value_ptr(&self) -> duckdb_value {
        *(self as *const Value as *const duckdb_value)
    }
}
