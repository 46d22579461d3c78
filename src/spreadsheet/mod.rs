//! Spreadsheet readers
//!
//! Opens Office Open XML (`.xlsx`, `.xlsm`, `.xltx`, `.xltm`) and OpenDocument (`.ods`)
//! workbooks from local paths, remote URLs or memory, and exposes each sheet as a [`grid::Grid`]
//! together with the pictures attached to it.

pub(crate) mod cell;
pub(crate) mod criteria;
mod excel;
pub(crate) mod grid;
pub(crate) mod image;
pub(crate) mod ods;
pub(crate) mod range;
pub(crate) mod reference;
pub(crate) mod xlsx;

use crate::error::PartialResult;
use crate::error::TableScoutError;
use crate::helpers::reader::UnifiedReader;
use crate::spreadsheet::grid::Grid;
use crate::spreadsheet::image::SheetImage;
use crate::spreadsheet::ods::OdsSpreadsheet;
use crate::spreadsheet::range::Range;
use crate::spreadsheet::xlsx::XlsxSpreadsheet;
use thiserror::Error;

/// Errors raised while opening or reading a workbook.
#[derive(Error, Debug)]
pub(crate) enum SpreadsheetError {
    #[error("Not a readable spreadsheet file: '{0}'")]
    FileFormatError(String),

    #[error("Legacy binary workbook '{0}' is not supported: table markers and pictures cannot be read from it, save it as .xlsx or .ods")]
    UnsupportedFormatError(String),

    #[error("Spreadsheet is password protected: '{0}'")]
    PasswordProtectedError(String),

    #[error("Sheet '{1}' not found in '{0}'")]
    SheetNotFoundError(String, String),

    #[error("Invalid cell value in '{0}', sheet '{1}', cell {2}: {3}")]
    CellValueError(String, String, String, String),

    #[error("Workbook part '{0}' is missing")]
    FileError(String),
}

/// A workbook that can list its sheets and load them as grids.
pub(crate) trait Spreadsheet {
    /// File name or URL the workbook was opened from
    fn name(&self) -> &str;

    /// Sheet names in workbook order
    fn sheet_names(&self) -> Vec<String>;

    /// Loads every cell of a sheet, restricted to `range` when given
    fn read_grid(&mut self, sheet_name: &str, range: Option<Range>) -> Result<Grid, TableScoutError>;

    /// Extracts the pictures of a sheet; single broken pictures become warnings
    fn read_images(&mut self, sheet_name: &str) -> Result<PartialResult<SheetImage>, TableScoutError>;
}

/// Opens a spreadsheet from a local path or a remote URL, picking the reader by extension.
pub(crate) fn open_spreadsheet(file_name: &str) -> Result<Box<dyn Spreadsheet>, TableScoutError> {
    let kind = WorkbookKind::detect(file_name)?;
    let reader = UnifiedReader::new(file_name)?;
    kind.open(file_name, reader)
}

/// Opens a spreadsheet held in memory; `file_name` only selects the reader.
#[cfg(test)]
pub(crate) fn open_spreadsheet_bytes(file_name: &str, bytes: Vec<u8>) -> Result<Box<dyn Spreadsheet>, TableScoutError> {
    let kind = WorkbookKind::detect(file_name)?;
    kind.open(file_name, UnifiedReader::from_bytes(bytes))
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum WorkbookKind {
    Xlsx,
    Ods,
}

impl WorkbookKind {
    fn detect(file_name: &str) -> Result<WorkbookKind, TableScoutError> {
        let path = file_name.split(['?', '#']).next().unwrap_or(file_name);
        let extension = path
            .rsplit_once('.')
            .map(|(_, extension)| extension.to_ascii_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "xlsx" | "xlsm" | "xltx" | "xltm" => Ok(WorkbookKind::Xlsx),
            "ods" => Ok(WorkbookKind::Ods),
            "xls" | "xla" | "xlsb" => {
                let error = SpreadsheetError::UnsupportedFormatError(file_name.to_owned());
                tracing::warn!("{error}");
                Err(error.into())
            }
            _ => Err(SpreadsheetError::FileFormatError(file_name.to_owned()).into()),
        }
    }

    fn open(self, file_name: &str, reader: UnifiedReader) -> Result<Box<dyn Spreadsheet>, TableScoutError> {
        tracing::debug!("opening {file_name} as {self:?}");
        Ok(match self {
            WorkbookKind::Xlsx => Box::new(XlsxSpreadsheet::open(file_name, reader)?),
            WorkbookKind::Ods => Box::new(OdsSpreadsheet::open(file_name, reader)?),
        })
    }
}
