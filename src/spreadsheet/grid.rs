use crate::spreadsheet::cell::Value;
use std::borrow::Cow;
use std::ops::Range;

static MISSING: Value = Value::Missing;

/// Read-only snapshot of one sheet's cell values.
///
/// Coordinates are absolute: row 0 is spreadsheet row 1 and column 0 is
/// column `A`. Rows are sparse and only hold the cells that carry a value,
/// sorted by column.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Grid {
    rows: Vec<Vec<(usize, Value)>>,
    /// First column of the area the grid was read from
    first_col: usize,
    /// One past the last column holding a value
    width: usize,
}

impl Grid {
    pub(crate) fn height(&self) -> usize {
        self.rows.len()
    }

    #[cfg(test)]
    pub(crate) fn width(&self) -> usize {
        self.width
    }

    /// Columns spanned by tables of this grid, from the first read column to the
    /// last column holding a value.
    pub(crate) fn columns(&self) -> Range<usize> {
        self.first_col..self.width.max(self.first_col)
    }

    pub(crate) fn first_col(&self) -> usize {
        self.first_col
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the value at (row, col), `Missing` when the cell holds nothing.
    pub(crate) fn get(&self, row: usize, col: usize) -> &Value {
        let cells = self.row(row);
        cells
            .binary_search_by_key(&col, |(index, _)| *index)
            .map(|position| &cells[position].1)
            .unwrap_or(&MISSING)
    }

    /// Normalized text at (row, col).
    pub(crate) fn text(&self, row: usize, col: usize) -> Cow<'_, str> {
        self.get(row, col).text()
    }

    /// Stored cells of a row as `(column, value)` pairs.
    pub(crate) fn row(&self, row: usize) -> &[(usize, Value)] {
        self.rows.get(row).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn rows(&self) -> impl Iterator<Item = &[(usize, Value)]> {
        self.rows.iter().map(Vec::as_slice)
    }

    #[cfg(test)]
    fn stored_cells(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }
}

/// Collects cells in any order and produces a grid.
#[derive(Debug, Default)]
pub(crate) struct GridBuilder {
    rows: Vec<Vec<(usize, Value)>>,
    first_col: usize,
}

impl GridBuilder {
    /// Builder for an area starting at column `first_col`.
    pub(crate) fn new(first_col: usize) -> GridBuilder {
        GridBuilder {
            rows: Vec::new(),
            first_col,
        }
    }

    /// Stores a value; a later value for the same cell replaces the earlier one.
    pub(crate) fn push(&mut self, row: usize, col: usize, value: Value) {
        if value == Value::Missing {
            return;
        }
        if self.rows.len() <= row {
            self.rows.resize_with(row + 1, Vec::new);
        }
        self.first_col = self.first_col.min(col);
        let cells = &mut self.rows[row];
        match cells.binary_search_by_key(&col, |(index, _)| *index) {
            Ok(position) => cells[position].1 = value,
            Err(position) => cells.insert(position, (col, value)),
        }
    }

    pub(crate) fn finish(self) -> Grid {
        let width = self
            .rows
            .iter()
            .filter_map(|cells| cells.last().map(|(col, _)| col + 1))
            .max()
            .unwrap_or(0);
        Grid {
            rows: self.rows,
            first_col: self.first_col,
            width,
        }
    }
}

#[cfg(test)]
impl Grid {
    /// Test grid where `""` is a missing cell and anything else is text.
    pub(crate) fn from_texts(rows: &[&[&str]]) -> Grid {
        let mut builder = GridBuilder::new(0);
        for (row, texts) in rows.iter().enumerate() {
            for (col, text) in texts.iter().enumerate() {
                if !text.is_empty() {
                    builder.push(row, col, Value::Text((*text).to_owned()));
                }
            }
        }
        let mut grid = builder.finish();
        if grid.rows.len() < rows.len() {
            grid.rows.resize_with(rows.len(), Vec::new);
        }
        grid
    }
}
