use crate::error::TableScoutError;
use crate::spreadsheet::reference::col_to_index;
use crate::spreadsheet::reference::row_to_index;
use regex::Regex;
use thiserror::Error;

/// Errors related to Excel-style range parsing.
#[derive(Error, Debug)]
pub(crate) enum RangeError {
    #[error("Invalid range format '{0}'")]
    FormatError(String),
}

/// Represents an Excel-style cell range with optional boundaries.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) struct Range {
    /// Lower row bound (0-based index), None for unbounded
    pub(crate) row_lower_bound: Option<usize>,
    /// Upper row bound (0-based index), None for unbounded
    pub(crate) row_upper_bound: Option<usize>,
    /// Lower column bound (0-based index), None for unbounded
    pub(crate) col_lower_bound: Option<usize>,
    /// Upper column bound (0-based index), None for unbounded
    pub(crate) col_upper_bound: Option<usize>,
}

impl Range {
    /// Checks if a cell at (row, col) lies within every specified bound.
    pub(crate) fn contains(&self, row: usize, col: usize) -> bool {
        self.row_lower_bound.map(|bound| bound <= row).unwrap_or(true)
            && self.row_upper_bound.map(|bound| row <= bound).unwrap_or(true)
            && self.col_lower_bound.map(|bound| bound <= col).unwrap_or(true)
            && self.col_upper_bound.map(|bound| col <= bound).unwrap_or(true)
    }

    /// Checks if a row lies past the upper row bound, so reading can stop.
    pub(crate) fn after_row_upper_bound(&self, row: usize) -> bool {
        self.row_upper_bound.map(|bound| bound < row).unwrap_or(false)
    }
}

impl TryFrom<&str> for Range {
    type Error = TableScoutError;

    /// Parses an Excel-style range string (e.g., "A1", "B2:C5", "A", "1:10").
    /// Supports single cells, ranges, and partial ranges (columns or rows only).
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let pattern = Regex::new(r"^([A-Z]*)(\d*)(:([A-Z]*)(\d*))?$").expect("Hardcode regex pattern");
        let value = value.trim().to_ascii_uppercase();
        let captures = pattern
            .captures(value.as_str())
            .ok_or(RangeError::FormatError(value.to_owned()))?;
        Ok(Range {
            col_lower_bound: captures
                .get(1)
                .map(|matcher| matcher.as_str())
                .and_then(col_to_index),
            row_lower_bound: captures
                .get(2)
                .map(|matcher| matcher.as_str())
                .and_then(row_to_index),
            col_upper_bound: captures
                .get(4)
                .map(|matcher| matcher.as_str())
                .and_then(col_to_index),
            row_upper_bound: captures
                .get(5)
                .map(|matcher| matcher.as_str())
                .and_then(row_to_index),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ranges() -> Result<(), TableScoutError> {
        let range = Range::try_from("b2:d10")?;
        assert_eq!(range, Range {
            row_lower_bound: Some(1),
            row_upper_bound: Some(9),
            col_lower_bound: Some(1),
            col_upper_bound: Some(3),
        });
        assert!(range.contains(1, 1));
        assert!(range.contains(9, 3));
        assert!(!range.contains(0, 1));
        assert!(!range.contains(5, 4));
        assert!(range.after_row_upper_bound(10));

        let range = Range::try_from("C:")?;
        assert_eq!(range.col_lower_bound, Some(2));
        assert_eq!(range.row_upper_bound, None);
        assert!(range.contains(100_000, 2));

        assert!(Range::try_from("A1-B2").is_err());
        Ok(())
    }
}
