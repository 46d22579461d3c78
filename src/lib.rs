//! # Table Scout DuckDB Extension
//!
//! Finds the tables hidden in loosely structured spreadsheets and searches them from SQL.
//! Sheets often hold several small tables separated by blank rows, introduced by a `table`
//! marker cell, or padded with notes. This extension locates those tables and attributes
//! every search hit to the table enclosing it.
//!
//! ## Features
//!
//! - **Formats**: Office Open XML workbooks (`.xlsx`, `.xlsm`, `.xltx`, `.xltm`) and
//!   OpenDocument spreadsheets (`.ods`), from local paths or remote URLs
//! - **Density segmentation**: tables are rows with enough populated cells, closed by two
//!   blank rows
//! - **Marker resolution**: a hit walks upward to the nearest `table` marker, the row below
//!   it being the header
//! - **Merged results**: tables sharing the first table's columns are concatenated, with the
//!   sheet name as leading column
//! - **Pictures**: drawing, in-cell and shape pictures, each distinct content once per sheet
//!
//! ## Table Functions
//!
//! - `sheet_tables`: table regions of every sheet
//! - `search_sheets`: merged table of every table holding a hit
//! - `search_matches`: position of every hit inside its table
//! - `sheet_images`: pictures of every sheet
//!
//! Logging goes to stderr and is filtered by the `TABLE_SCOUT_LOG` environment variable
//! (`warn` by default).
extern crate duckdb;
extern crate duckdb_loadable_macros;
extern crate libduckdb_sys;

mod bridge;
mod error;
mod extension;
mod helpers;
mod search;
mod spreadsheet;
mod table;

use crate::extension::search_matches::SearchMatchesTableFunction;
use crate::extension::search_sheets::SearchSheetsTableFunction;
use crate::extension::sheet_images::SheetImagesTableFunction;
use crate::extension::sheet_tables::SheetTablesTableFunction;
use anyhow::Context;
use anyhow::Result;
use duckdb::Connection;
use duckdb_loadable_macros::duckdb_entrypoint_c_api;
use libduckdb_sys as ffi;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter
const LOG_ENV: &str = "TABLE_SCOUT_LOG";

/// Installs the stderr logger unless the host process already has one.
fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Extension entry point for DuckDB.
///
/// Registers `sheet_tables`, `search_sheets`, `search_matches` and `sheet_images`.
///
/// # Errors
///
/// Returns an error if any table function fails to register with DuckDB.
#[duckdb_entrypoint_c_api()]
pub unsafe fn extension_entrypoint(connection: Connection) -> Result<()> {
    init_logging();
    connection
        .register_table_function::<SheetTablesTableFunction>("sheet_tables")
        .context("Failed to register sheet_tables table function")?;
    connection
        .register_table_function::<SearchSheetsTableFunction>("search_sheets")
        .context("Failed to register search_sheets table function")?;
    connection
        .register_table_function::<SearchMatchesTableFunction>("search_matches")
        .context("Failed to register search_matches table function")?;
    connection
        .register_table_function::<SheetImagesTableFunction>("sheet_images")
        .context("Failed to register sheet_images table function")?;
    Ok(())
}
