use crate::spreadsheet::cell::Value;
use crate::spreadsheet::grid::Grid;

/// Marker text announcing that a header row follows.
pub(crate) const DEFAULT_MARKER: &str = "table";

/// Normalizes marker text the way cells are compared against it.
pub(crate) fn normalize_marker(marker: &str) -> String {
    marker.trim().to_lowercase()
}

/// Checks a cell against an already normalized marker.
pub(crate) fn is_marker(value: &Value, marker: &str) -> bool {
    !value.is_blank() && value.text().trim().to_lowercase() == marker
}

/// True when any cell of the grid is a marker.
pub(crate) fn contains_marker(grid: &Grid, marker: &str) -> bool {
    grid.rows().any(|row| row.iter().any(|(_, value)| is_marker(value, marker)))
}

/// Finds the header row of the table enclosing (origin_row, origin_col).
///
/// Rows above the origin are scanned nearest first, looking at the origin column
/// only; when that finds nothing, the scan is repeated over every column. A marker
/// at row `i` gives header `i + 1`, which must stay above the origin row.
///
/// The same-column pass always runs to row 0 before any other column is looked at,
/// so a nearer marker in another column loses to a farther one in the origin column.
pub(crate) fn find_header_above(grid: &Grid, origin_row: usize, origin_col: usize, marker: &str) -> Option<usize> {
    let accept = |index: usize| (index + 1 < origin_row).then_some(index + 1);
    (0..origin_row)
        .rev()
        .filter(|&index| is_marker(grid.get(index, origin_col), marker))
        .find_map(accept)
        .or_else(|| {
            (0..origin_row)
                .rev()
                .filter(|&index| grid.row(index).iter().any(|(_, value)| is_marker(value, marker)))
                .find_map(accept)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&[&str]]) -> Grid {
        Grid::from_texts(rows)
    }

    #[test]
    fn find_header_in_same_column() {
        let grid = grid(&[
            &[],
            &[],
            &["", " Table "],
            &["ID", "Name"],
            &["1", "alpha"],
            &["2", "beta"],
            &["3", "gamma"],
        ]);
        assert_eq!(find_header_above(&grid, 5, 1, DEFAULT_MARKER), Some(3));
        assert_eq!(find_header_above(&grid, 5, 0, DEFAULT_MARKER), Some(3));
        // the header row itself has no table above it
        assert_eq!(find_header_above(&grid, 3, 1, DEFAULT_MARKER), None);
        assert_eq!(find_header_above(&grid, 0, 0, DEFAULT_MARKER), None);
    }

    #[test]
    fn same_column_wins_over_nearer_column() {
        let grid = grid(&[
            &["table", ""],
            &["A", "B"],
            &["", "table"],
            &["C", "D"],
            &["x", "y"],
        ]);
        assert_eq!(find_header_above(&grid, 4, 0, DEFAULT_MARKER), Some(1));
        assert_eq!(find_header_above(&grid, 4, 1, DEFAULT_MARKER), Some(3));
    }

    #[test]
    fn marker_right_above_origin_is_skipped() {
        let grid = grid(&[
            &["table"],
            &["Head"],
            &["table"],
            &["hit"],
        ]);
        assert_eq!(find_header_above(&grid, 3, 0, DEFAULT_MARKER), Some(1));

        let grid = self::grid(&[&["x"], &["table"], &["hit"]]);
        assert_eq!(find_header_above(&grid, 2, 0, DEFAULT_MARKER), None);
    }

    #[test]
    fn custom_marker() {
        let grid = grid(&[&["Start"], &["H"], &["v"]]);
        let marker = normalize_marker("  START ");
        assert_eq!(find_header_above(&grid, 2, 0, &marker), Some(1));
        assert!(contains_marker(&grid, &marker));
        assert!(!contains_marker(&grid, DEFAULT_MARKER));
        assert!(!is_marker(&Value::Missing, ""));
    }

    #[test]
    fn header_is_always_above_origin() {
        let grid = grid(&[
            &["table", "table"],
            &["table", ""],
            &["", "table"],
            &["table", "table"],
            &["", ""],
            &["table", ""],
        ]);
        for row in 0..grid.height() {
            for col in 0..grid.width() {
                if let Some(header) = find_header_above(&grid, row, col, DEFAULT_MARKER) {
                    assert!(header < row);
                    assert!(header >= 1);
                }
            }
        }
    }
}
