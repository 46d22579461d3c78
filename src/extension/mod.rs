//! # Extension Core Module
//!
//! Parameter handling shared by the table functions, and the functions themselves.
use crate::bridge::ValueBridge;
use crate::error::ResultMessage;
use crate::error::TableScoutError;
use crate::search::search;
use crate::search::SearchMode;
use crate::search::SearchOptions;
use crate::search::SearchOutcome;
use crate::spreadsheet::criteria::Criteria;
use crate::spreadsheet::open_spreadsheet;
use crate::spreadsheet::range::Range;
use crate::table::segment::SegmentOptions;
use duckdb::core::LogicalTypeHandle;
use duckdb::core::LogicalTypeId;
use duckdb::vtab::BindInfo;
use glob::Pattern;
use thiserror::Error;

pub(crate) mod search_matches;
pub(crate) mod search_sheets;
pub(crate) mod sheet_images;
pub(crate) mod sheet_tables;
mod writer;

/// Rows handed to DuckDB per `func` call
const CHUNK_SIZE: usize = 2048;

#[derive(Error, Debug)]
pub(crate) enum ExtensionError {
    /// Invalid parameter provided to a table function
    #[error("Invalid parameter '{0}': {1}")]
    InvalidParameterError(String, String),
}

/// Positional parameter of a table function.
pub(crate) trait Param<T> {
    fn kind() -> LogicalTypeHandle;

    /// Reads the parameter at `index`
    fn read(bind: &BindInfo, index: u64) -> Result<T, TableScoutError>;
}

/// Named parameter of a table function.
pub(crate) trait NamedParam<T> {
    /// Returns the parameter name as used in SQL
    fn name() -> &'static str;

    /// Returns the DuckDB logical type for this parameter
    fn kind() -> LogicalTypeHandle;

    /// Returns the complete parameter definition (name and type)
    fn definition() -> (String, LogicalTypeHandle) {
        (Self::name().to_string(), Self::kind())
    }

    /// Extracts the parameter value, `None` when it was not given
    fn read(bind: &BindInfo) -> Result<Option<T>, TableScoutError>;

    fn invalid(message: String) -> TableScoutError {
        ExtensionError::InvalidParameterError(Self::name().to_owned(), message).into()
    }
}

/// Workbook path or URL
pub(crate) struct FileParam;

/// Text searched for
pub(crate) struct TermParam;

/// Glob pattern selecting sheets by name
pub(crate) struct SheetParam;

/// Cell range loaded from every sheet
pub(crate) struct RangeParam;

/// How hits are attributed to tables
pub(crate) struct ModeParam;

/// Text of the cell announcing a table
pub(crate) struct MarkerParam;

/// Consecutive data rows needed to open a table
pub(crate) struct MinRowsParam;

/// Non-blank cells needed for a data row
pub(crate) struct MinColumnsParam;

impl Param<String> for FileParam {
    fn kind() -> LogicalTypeHandle {
        LogicalTypeHandle::from(LogicalTypeId::Varchar)
    }

    fn read(bind: &BindInfo, index: u64) -> Result<String, TableScoutError> {
        let file_name = bind.get_parameter(index).to_varchar();
        if file_name.trim().is_empty() {
            Err(ExtensionError::InvalidParameterError("file".to_owned(), "file name is empty".to_owned()))?;
        }
        Ok(file_name)
    }
}

impl Param<String> for TermParam {
    fn kind() -> LogicalTypeHandle {
        LogicalTypeHandle::from(LogicalTypeId::Varchar)
    }

    fn read(bind: &BindInfo, index: u64) -> Result<String, TableScoutError> {
        Ok(bind.get_parameter(index).to_varchar())
    }
}

impl NamedParam<Vec<Pattern>> for SheetParam {
    fn name() -> &'static str {
        "sheet"
    }

    fn kind() -> LogicalTypeHandle {
        LogicalTypeHandle::from(LogicalTypeId::Varchar)
    }

    fn read(bind: &BindInfo) -> Result<Option<Vec<Pattern>>, TableScoutError> {
        let Some(value) = bind.get_named_parameter(Self::name()) else {
            return Ok(None);
        };
        let pattern = value.to_varchar();
        let pattern = Pattern::new(&pattern).map_err(|error| Self::invalid(error.to_string()))?;
        Ok(Some(vec![pattern]))
    }
}

impl NamedParam<Range> for RangeParam {
    fn name() -> &'static str {
        "range"
    }

    fn kind() -> LogicalTypeHandle {
        LogicalTypeHandle::from(LogicalTypeId::Varchar)
    }

    fn read(bind: &BindInfo) -> Result<Option<Range>, TableScoutError> {
        bind.get_named_parameter(Self::name())
            .map(|value| Range::try_from(value.to_varchar().as_str()).with_prefix(Self::name()))
            .transpose()
    }
}

impl NamedParam<SearchMode> for ModeParam {
    fn name() -> &'static str {
        "mode"
    }

    fn kind() -> LogicalTypeHandle {
        LogicalTypeHandle::from(LogicalTypeId::Varchar)
    }

    fn read(bind: &BindInfo) -> Result<Option<SearchMode>, TableScoutError> {
        let Some(value) = bind.get_named_parameter(Self::name()) else {
            return Ok(None);
        };
        let name = value.to_varchar();
        SearchMode::parse(&name)
            .map(Some)
            .ok_or_else(|| Self::invalid(format!("'{name}' is not one of 'auto', 'marker', 'density'")))
    }
}

impl NamedParam<String> for MarkerParam {
    fn name() -> &'static str {
        "marker"
    }

    fn kind() -> LogicalTypeHandle {
        LogicalTypeHandle::from(LogicalTypeId::Varchar)
    }

    fn read(bind: &BindInfo) -> Result<Option<String>, TableScoutError> {
        let Some(value) = bind.get_named_parameter(Self::name()) else {
            return Ok(None);
        };
        let marker = value.to_varchar();
        if marker.trim().is_empty() {
            Err(Self::invalid("marker text is empty".to_owned()))?;
        }
        Ok(Some(marker))
    }
}

impl NamedParam<usize> for MinRowsParam {
    fn name() -> &'static str {
        "min_rows"
    }

    fn kind() -> LogicalTypeHandle {
        LogicalTypeHandle::from(LogicalTypeId::UInteger)
    }

    fn read(bind: &BindInfo) -> Result<Option<usize>, TableScoutError> {
        Ok(bind
            .get_named_parameter(Self::name())
            .map(|value| value.to_uint32() as usize))
    }
}

impl NamedParam<usize> for MinColumnsParam {
    fn name() -> &'static str {
        "min_columns"
    }

    fn kind() -> LogicalTypeHandle {
        LogicalTypeHandle::from(LogicalTypeId::UInteger)
    }

    fn read(bind: &BindInfo) -> Result<Option<usize>, TableScoutError> {
        Ok(bind
            .get_named_parameter(Self::name())
            .map(|value| value.to_uint32() as usize))
    }
}

/// Reads the segmentation thresholds, falling back to the defaults.
fn read_segment_options(bind: &BindInfo) -> Result<SegmentOptions, TableScoutError> {
    let defaults = SegmentOptions::default();
    Ok(SegmentOptions {
        min_consecutive_rows: MinRowsParam::read(bind)?.unwrap_or(defaults.min_consecutive_rows),
        min_populated_columns: MinColumnsParam::read(bind)?.unwrap_or(defaults.min_populated_columns),
    })
}

/// Reads the sheet pattern and range.
fn read_criteria(bind: &BindInfo) -> Result<Criteria, TableScoutError> {
    Ok(Criteria {
        sheet_name_patterns: SheetParam::read(bind)?,
        range: RangeParam::read(bind)?,
    })
}

/// Parameters shared by `search_sheets` and `search_matches`
pub(crate) struct SearchParameters {
    file: String,
    term: String,
    options: SearchOptions,
}

impl TryFrom<&BindInfo> for SearchParameters {
    type Error = TableScoutError;

    fn try_from(bind: &BindInfo) -> Result<Self, Self::Error> {
        let defaults = SearchOptions::default();
        Ok(SearchParameters {
            file: FileParam::read(bind, 0)?,
            term: TermParam::read(bind, 1)?,
            options: SearchOptions {
                mode: ModeParam::read(bind)?.unwrap_or(defaults.mode),
                marker: MarkerParam::read(bind)?.unwrap_or(defaults.marker),
                segment: read_segment_options(bind)?,
                criteria: read_criteria(bind)?,
            },
        })
    }
}

impl SearchParameters {
    /// Opens the workbook and runs the search.
    fn run(&self) -> Result<SearchOutcome, TableScoutError> {
        let mut spreadsheet = open_spreadsheet(&self.file).with_prefix(&self.file)?;
        let outcome = search(spreadsheet.as_mut(), &self.term, &self.options);
        tracing::debug!(
            "{}: {} matches in {} tables, {} warnings",
            self.file,
            outcome.matches.len(),
            outcome.tables.len(),
            outcome.warnings.len()
        );
        Ok(outcome)
    }

    fn positional() -> Vec<LogicalTypeHandle> {
        vec![FileParam::kind(), TermParam::kind()]
    }

    fn named() -> Vec<(String, LogicalTypeHandle)> {
        vec![
            SheetParam::definition(),
            RangeParam::definition(),
            ModeParam::definition(),
            MarkerParam::definition(),
            MinRowsParam::definition(),
            MinColumnsParam::definition(),
        ]
    }
}

/// Returns the `[lower, upper)` row window of the next chunk.
fn next_chunk(cursor: &std::sync::atomic::AtomicUsize, len: usize) -> (usize, usize) {
    let lower = cursor.fetch_add(CHUNK_SIZE, std::sync::atomic::Ordering::Relaxed);
    (lower, len.min(lower.saturating_add(CHUNK_SIZE)))
}
