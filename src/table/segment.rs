use crate::spreadsheet::cell::Value;
use crate::spreadsheet::grid::Grid;

/// Thresholds of the density heuristic.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) struct SegmentOptions {
    /// Consecutive data rows needed to open a table
    pub(crate) min_consecutive_rows: usize,
    /// Non-blank cells needed for a row to count as data
    pub(crate) min_populated_columns: usize,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        SegmentOptions {
            min_consecutive_rows: 3,
            min_populated_columns: 5,
        }
    }
}

/// Inclusive span of grid rows forming one table; the first row is its header.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct TableRegion {
    pub(crate) start_row: usize,
    pub(crate) end_row: usize,
}

impl TableRegion {
    pub(crate) fn contains(&self, row: usize) -> bool {
        self.start_row <= row && row <= self.end_row
    }
}

/// A row is data when enough of its cells are non-blank after trimming.
pub(crate) fn is_data_row(row: &[(usize, Value)], min_populated_columns: usize) -> bool {
    row.iter().filter(|(_, value)| !value.is_blank()).count() >= min_populated_columns
}

/// Splits a grid into table regions.
///
/// A table opens at a data row only when the following rows up to
/// `min_consecutive_rows` are data rows too, and closes at the second
/// consecutive non-data row. A single non-data row inside a table is kept.
pub(crate) fn segment(grid: &Grid, options: &SegmentOptions) -> Vec<TableRegion> {
    let min_rows = options.min_consecutive_rows.max(1);
    let data_rows: Vec<bool> = grid
        .rows()
        .map(|row| is_data_row(row, options.min_populated_columns))
        .collect();

    let mut regions = Vec::new();
    let mut start = None::<usize>;
    let mut blank_run = 0usize;
    for (index, is_data) in data_rows.iter().enumerate() {
        match start {
            None if *is_data && has_consecutive_rows(&data_rows, index, min_rows) => {
                start = Some(index);
                blank_run = 0;
            }
            None => (),
            Some(_) if *is_data => blank_run = 0,
            Some(start_row) => {
                blank_run += 1;
                if blank_run == 2 {
                    regions.push(TableRegion {
                        start_row,
                        end_row: index - blank_run,
                    });
                    start = None;
                    blank_run = 0;
                }
            }
        }
    }
    if let Some(start_row) = start {
        regions.push(TableRegion {
            start_row,
            end_row: data_rows.len() - 1,
        });
    }
    regions
}

fn has_consecutive_rows(data_rows: &[bool], start: usize, count: usize) -> bool {
    data_rows
        .get(start..start + count)
        .map(|window| window.iter().all(|is_data| *is_data))
        .unwrap_or(false)
}
