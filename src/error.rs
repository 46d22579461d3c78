use thiserror::Error;

/// Main error type for the Table Scout extension.
/// Aggregates errors from various sources including standard library, dependencies, and internal modules.
#[derive(Error, Debug)]
pub(crate) enum TableScoutError {
    #[error("{0}")]
    WithContextError(String),

    // Standard library errors
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    ParseIntError(#[from] std::num::ParseIntError),

    #[error("{0}")]
    StringEncodingError(#[from] std::str::Utf8Error),

    // Third-party library errors
    #[error("{0}")]
    DuckDBError(#[from] duckdb::Error),

    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("{0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("{0}")]
    XmlEncodingError(#[from] quick_xml::encoding::EncodingError),

    #[error("{0}")]
    XmlAttributeError(#[from] quick_xml::events::attributes::AttrError),

    // Helper module errors
    #[error("{0}")]
    XmlHelperError(#[from] crate::helpers::xml::XmlValueError),

    #[error("{0}")]
    UnifiedReaderError(#[from] crate::helpers::reader::UnifiedReaderError),

    // Spreadsheet module errors
    #[error("{0}")]
    SpreadsheetError(#[from] crate::spreadsheet::SpreadsheetError),

    #[error("{0}")]
    OdsError(#[from] crate::spreadsheet::ods::OdsError),

    #[error("{0}")]
    ImageError(#[from] crate::spreadsheet::image::ImageError),

    #[error("{0}")]
    RangeError(#[from] crate::spreadsheet::range::RangeError),

    // Extension module errors
    #[error("{0}")]
    ExtensionError(#[from] crate::extension::ExtensionError),
}

/// Failures that are recovered locally: the affected sheet, match or image is
/// left out and the rest of the work carries on.
#[derive(Error, Clone, Debug, PartialEq)]
pub(crate) enum RecoveredError {
    /// A sheet could not be read or decoded and was skipped
    #[error("Sheet '{sheet}' skipped: {message}")]
    SheetProcessing { sheet: String, message: String },

    /// A search hit has no `table` marker above it
    #[error("No table marker above {reference} in sheet '{sheet}'")]
    MarkerNotFound { sheet: String, reference: String },

    /// A table's columns differ from the merged result's columns
    #[error("Table at row {header_row} of sheet '{sheet}' not merged: columns [{found}] differ from [{expected}]")]
    SchemaMismatch {
        sheet: String,
        header_row: usize,
        expected: String,
        found: String,
    },

    /// A single image could not be extracted
    #[error("Image '{path}' in sheet '{sheet}' skipped: {message}")]
    ImageExtraction {
        sheet: String,
        path: String,
        message: String,
    },
}

/// Items that were produced successfully, together with everything that was
/// skipped on the way.
#[derive(Clone, Debug)]
pub(crate) struct PartialResult<T> {
    pub(crate) items: Vec<T>,
    pub(crate) warnings: Vec<RecoveredError>,
}

impl<T> Default for PartialResult<T> {
    fn default() -> Self {
        PartialResult {
            items: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

impl<T> PartialResult<T> {
    /// Records a recovered failure and reports it through the log.
    pub(crate) fn warn(&mut self, warning: RecoveredError) {
        tracing::warn!("{warning}");
        self.warnings.push(warning);
    }

    /// Appends the items and warnings of another partial result.
    pub(crate) fn extend(&mut self, other: PartialResult<T>) {
        self.items.extend(other.items);
        self.warnings.extend(other.warnings);
    }
}

pub(crate) trait ResultMessage {
    fn with_prefix(self, message: &str) -> Self;
}

impl<T> ResultMessage for Result<T, TableScoutError> {
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|e| TableScoutError::WithContextError(format!("{}: {}", message, e)))
    }
}
