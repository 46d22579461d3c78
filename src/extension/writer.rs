//! Helpers writing Rust values into DuckDB output vectors.

use duckdb::core::FlatVector;
use duckdb::core::Inserter;

/// Writes a string, or NULL when absent.
pub(super) fn write_varchar(vector: &mut FlatVector, index: usize, value: Option<&str>) {
    match value {
        Some(value) => vector.insert(index, value),
        None => vector.set_null(index),
    }
}

/// Writes a count or position as BIGINT, or NULL when absent.
pub(super) fn write_bigint(vector: &mut FlatVector, index: usize, value: Option<usize>) {
    match value {
        Some(value) => unsafe { vector.as_mut_slice::<i64>()[index] = value as i64 },
        None => vector.set_null(index),
    }
}

/// Writes raw bytes into a BLOB vector.
pub(super) fn write_blob(vector: &mut FlatVector, index: usize, value: &[u8]) {
    vector.insert(index, value);
}
