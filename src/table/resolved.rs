use crate::spreadsheet::grid::Grid;
use std::collections::HashSet;

/// Label of the column prepended to every materialized table.
pub(crate) const SHEET_NAME_LABEL: &str = "Sheet Name";

/// A table materialized under its header row.
///
/// The first label is always [`SHEET_NAME_LABEL`] and the first value of every
/// row the sheet name; the remaining columns follow the grid columns, starting
/// at the first column the grid was read from.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ResolvedTable {
    pub(crate) sheet: String,
    /// 0-based grid row of the header
    pub(crate) header_row: usize,
    pub(crate) labels: Vec<String>,
    pub(crate) rows: Vec<Vec<String>>,
}

#[cfg(test)]
impl ResolvedTable {
    /// Value at a body position, as addressed by match positions.
    pub(crate) fn cell(&self, row_offset: usize, col_offset: usize) -> Option<&str> {
        self.rows
            .get(row_offset)
            .and_then(|row| row.get(col_offset))
            .map(String::as_str)
    }
}

/// Materializes the table whose header is `header_row`.
///
/// The body runs to `end_row` (inclusive) or to the end of the grid. Values are
/// normalized text, so missing cells become empty strings.
pub(crate) fn materialize_table(grid: &Grid, header_row: usize, end_row: Option<usize>, sheet: &str) -> ResolvedTable {
    let last_row = end_row
        .unwrap_or(usize::MAX)
        .min(grid.height().saturating_sub(1));
    let rows = (header_row + 1..=last_row)
        .map(|row| {
            let mut values = Vec::with_capacity(grid.columns().len() + 1);
            values.push(sheet.to_owned());
            values.extend(grid.columns().map(|col| grid.text(row, col).into_owned()));
            values
        })
        .collect();

    ResolvedTable {
        sheet: sheet.to_owned(),
        header_row,
        labels: header_labels(grid, header_row),
        rows,
    }
}

/// Column labels of a header row, sheet name column first.
///
/// Blank header cells are named `column{n}` after their 1-based column position in
/// the table, the sheet name column not counted. Repeated labels get `_{n}` appended, `n` being the 1-based position in the
/// table, until they are unique.
pub(crate) fn header_labels(grid: &Grid, header_row: usize) -> Vec<String> {
    let mut labels = Vec::with_capacity(grid.columns().len() + 1);
    let mut seen = HashSet::new();
    let first_col = grid.first_col();
    let candidates = std::iter::once(SHEET_NAME_LABEL.to_owned()).chain(grid.columns().map(|col| {
        let text = grid.text(header_row, col);
        let text = text.trim();
        if text.is_empty() {
            format!("column{}", col - first_col + 1)
        } else {
            text.to_owned()
        }
    }));
    for (position, candidate) in candidates.enumerate() {
        let mut label = candidate;
        while seen.contains(&label) {
            label = format!("{label}_{}", position + 1);
        }
        seen.insert(label.clone());
        labels.push(label);
    }
    labels
}
