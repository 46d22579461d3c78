//! Term search across every sheet of a workbook.
//!
//! Each hit is attributed to the table enclosing it, found either through a marker
//! cell above the hit or through the density segmentation of the sheet. Tables are
//! materialized once per sheet and header, and the tables sharing the first table's
//! labels are merged into a single result.

use crate::error::PartialResult;
use crate::error::RecoveredError;
use crate::spreadsheet::criteria::Criteria;
use crate::spreadsheet::grid::Grid;
use crate::spreadsheet::image::dedup_images;
use crate::spreadsheet::image::SheetImage;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::Spreadsheet;
use crate::table::marker::contains_marker;
use crate::table::marker::find_header_above;
use crate::table::marker::normalize_marker;
use crate::table::marker::DEFAULT_MARKER;
use crate::table::resolved::header_labels;
use crate::table::resolved::materialize_table;
use crate::table::resolved::ResolvedTable;
use crate::table::segment::segment;
use crate::table::segment::SegmentOptions;
use crate::table::segment::TableRegion;
use std::collections::HashMap;

/// How hits are attributed to tables.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) enum SearchMode {
    /// Walk up from the hit to the nearest marker cell
    Marker,
    /// Use the table region containing the hit
    Density,
    /// Marker for sheets containing a marker cell, density otherwise
    #[default]
    Auto,
}

impl SearchMode {
    pub(crate) fn parse(name: &str) -> Option<SearchMode> {
        match name.trim().to_ascii_lowercase().as_str() {
            "marker" => Some(SearchMode::Marker),
            "density" => Some(SearchMode::Density),
            "auto" => Some(SearchMode::Auto),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct SearchOptions {
    pub(crate) mode: SearchMode,
    /// Text of the cell announcing a table
    pub(crate) marker: String,
    pub(crate) segment: SegmentOptions,
    pub(crate) criteria: Criteria,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            mode: SearchMode::default(),
            marker: DEFAULT_MARKER.to_owned(),
            segment: SegmentOptions::default(),
            criteria: Criteria::default(),
        }
    }
}

/// Where a hit sits inside the table it was attributed to.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct MatchPosition {
    pub(crate) sheet: String,
    /// Index into [`SearchOutcome::tables`]
    pub(crate) table: usize,
    /// Body row, 0 being the row right below the header
    pub(crate) row_offset: usize,
    /// Table column, 0 being the sheet name column
    pub(crate) col_offset: usize,
    /// Excel-style reference of the hit in its sheet
    pub(crate) cell: String,
    pub(crate) value: String,
}

/// Concatenation of every table sharing the first table's labels.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct MergedTable {
    pub(crate) labels: Vec<String>,
    pub(crate) rows: Vec<Vec<String>>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct SearchOutcome {
    /// Tables holding at least one hit, in discovery order
    pub(crate) tables: Vec<ResolvedTable>,
    pub(crate) merged: Option<MergedTable>,
    /// Indexes of the tables that went into `merged`, in merge order
    pub(crate) merged_tables: Vec<usize>,
    pub(crate) matches: Vec<MatchPosition>,
    pub(crate) warnings: Vec<RecoveredError>,
}

impl SearchOutcome {
    /// Row of a match inside the merged table, `None` when its table was not merged.
    pub(crate) fn merged_row(&self, position: &MatchPosition) -> Option<usize> {
        let mut offset = 0;
        for &index in &self.merged_tables {
            if index == position.table {
                return Some(offset + position.row_offset);
            }
            offset += self.tables[index].rows.len();
        }
        None
    }

    /// `(row, column)` of every merged match inside the merged table.
    pub(crate) fn merged_highlights(&self) -> Vec<(usize, usize)> {
        self.matches
            .iter()
            .filter_map(|position| self.merged_row(position).map(|row| (row, position.col_offset)))
            .collect()
    }

    fn merge(&mut self) {
        for (index, table) in self.tables.iter().enumerate() {
            match &mut self.merged {
                None => {
                    self.merged = Some(MergedTable {
                        labels: table.labels.to_owned(),
                        rows: table.rows.to_owned(),
                    });
                    self.merged_tables.push(index);
                }
                Some(merged) if merged.labels == table.labels => {
                    merged.rows.extend(table.rows.iter().cloned());
                    self.merged_tables.push(index);
                }
                Some(merged) => record(&mut self.warnings, RecoveredError::SchemaMismatch {
                    sheet: table.sheet.to_owned(),
                    header_row: table.header_row + 1,
                    expected: merged.labels.join(", "),
                    found: table.labels.join(", "),
                }),
            }
        }
    }
}

fn record(warnings: &mut Vec<RecoveredError>, warning: RecoveredError) {
    tracing::warn!("{warning}");
    warnings.push(warning);
}

/// Searches `term` in every sheet selected by the criteria.
///
/// Matching is case-insensitive containment against the normalized cell text.
/// Sheets that cannot be read are skipped with a warning; nothing here aborts the
/// search as a whole.
pub(crate) fn search(spreadsheet: &mut dyn Spreadsheet, term: &str, options: &SearchOptions) -> SearchOutcome {
    let mut outcome = SearchOutcome::default();
    if term.is_empty() {
        return outcome;
    }
    tracing::debug!("searching '{term}' in {}", spreadsheet.name());
    let needle = term.to_lowercase();
    let marker = normalize_marker(&options.marker);
    for sheet in options.criteria.select_sheets(spreadsheet.sheet_names()) {
        let grid = match spreadsheet.read_grid(&sheet, options.criteria.range) {
            Ok(grid) => grid,
            Err(error) => {
                record(&mut outcome.warnings, RecoveredError::SheetProcessing {
                    sheet,
                    message: error.to_string(),
                });
                continue;
            }
        };
        if grid.is_empty() {
            tracing::debug!("sheet '{sheet}': empty");
            continue;
        }
        let hits = find_hits(&grid, &needle);
        if hits.is_empty() {
            tracing::debug!("sheet '{sheet}': no hits");
            continue;
        }
        let mode = match options.mode {
            SearchMode::Auto if contains_marker(&grid, &marker) => SearchMode::Marker,
            SearchMode::Auto => SearchMode::Density,
            mode => mode,
        };
        tracing::debug!("sheet '{sheet}': {} hits, {mode:?} mode", hits.len());
        match mode {
            SearchMode::Marker => attribute_by_marker(&mut outcome, &grid, &sheet, &hits, &marker),
            _ => attribute_by_density(&mut outcome, &grid, &sheet, &hits, &options.segment),
        }
    }
    outcome.merge();
    outcome
}

/// Cells containing the lower-cased needle, row-major.
fn find_hits(grid: &Grid, needle: &str) -> Vec<(usize, usize)> {
    grid.rows()
        .enumerate()
        .flat_map(|(row, values)| {
            values
                .iter()
                .filter(|(_, value)| value.text().to_lowercase().contains(needle))
                .map(move |(col, _)| (row, *col))
        })
        .collect()
}

fn attribute_by_marker(outcome: &mut SearchOutcome, grid: &Grid, sheet: &str, hits: &[(usize, usize)], marker: &str) {
    let mut tables = HashMap::<usize, usize>::new();
    for &(row, col) in hits {
        let Some(header_row) = find_header_above(grid, row, col, marker) else {
            record(&mut outcome.warnings, RecoveredError::MarkerNotFound {
                sheet: sheet.to_owned(),
                reference: index_to_reference(row, col),
            });
            continue;
        };
        let table = *tables.entry(header_row).or_insert_with(|| {
            outcome.tables.push(materialize_table(grid, header_row, None, sheet));
            outcome.tables.len() - 1
        });
        push_match(outcome, grid, sheet, table, header_row, row, col);
    }
}

fn attribute_by_density(
    outcome: &mut SearchOutcome,
    grid: &Grid,
    sheet: &str,
    hits: &[(usize, usize)],
    options: &SegmentOptions,
) {
    let regions = segment(grid, options);
    let mut tables = HashMap::<usize, usize>::new();
    for &(row, col) in hits {
        let Some(region) = regions.iter().find(|region| region.contains(row)) else {
            continue;
        };
        if row == region.start_row {
            continue;
        }
        let table = *tables.entry(region.start_row).or_insert_with(|| {
            outcome.tables.push(materialize_table(grid, region.start_row, Some(region.end_row), sheet));
            outcome.tables.len() - 1
        });
        push_match(outcome, grid, sheet, table, region.start_row, row, col);
    }
}

fn push_match(outcome: &mut SearchOutcome, grid: &Grid, sheet: &str, table: usize, header_row: usize, row: usize, col: usize) {
    outcome.matches.push(MatchPosition {
        sheet: sheet.to_owned(),
        table,
        row_offset: row - (header_row + 1),
        col_offset: col - grid.first_col() + 1,
        cell: index_to_reference(row, col),
        value: grid.text(row, col).into_owned(),
    });
}

/// A table region found by segmentation, with its header labels.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct SheetTable {
    pub(crate) sheet: String,
    pub(crate) region: TableRegion,
    /// First and last grid columns, used to print the region as a range
    pub(crate) first_col: usize,
    pub(crate) last_col: usize,
    /// Labels of the header row, without the sheet name column
    pub(crate) labels: Vec<String>,
}

impl SheetTable {
    pub(crate) fn range(&self) -> String {
        format!(
            "{}:{}",
            index_to_reference(self.region.start_row, self.first_col),
            index_to_reference(self.region.end_row, self.last_col)
        )
    }
}

/// Segments every selected sheet.
pub(crate) fn list_tables(
    spreadsheet: &mut dyn Spreadsheet,
    criteria: &Criteria,
    options: &SegmentOptions,
) -> PartialResult<SheetTable> {
    let mut result = PartialResult::default();
    for sheet in criteria.select_sheets(spreadsheet.sheet_names()) {
        let grid = match spreadsheet.read_grid(&sheet, criteria.range) {
            Ok(grid) => grid,
            Err(error) => {
                result.warn(RecoveredError::SheetProcessing {
                    sheet,
                    message: error.to_string(),
                });
                continue;
            }
        };
        let regions = segment(&grid, options);
        tracing::debug!("sheet '{sheet}': {} tables", regions.len());
        for region in regions {
            let mut labels = header_labels(&grid, region.start_row);
            labels.remove(0);
            result.items.push(SheetTable {
                sheet: sheet.to_owned(),
                region,
                first_col: grid.first_col(),
                last_col: grid.columns().end.saturating_sub(1).max(grid.first_col()),
                labels,
            });
        }
    }
    result
}

/// Extracts the pictures of every selected sheet, each content once per sheet.
pub(crate) fn collect_images(spreadsheet: &mut dyn Spreadsheet, criteria: &Criteria) -> PartialResult<SheetImage> {
    let mut result = PartialResult::default();
    for sheet in criteria.select_sheets(spreadsheet.sheet_names()) {
        match spreadsheet.read_images(&sheet) {
            Ok(images) => result.extend(PartialResult {
                items: dedup_images(images.items),
                warnings: images.warnings,
            }),
            Err(error) => result.warn(RecoveredError::SheetProcessing {
                sheet,
                message: error.to_string(),
            }),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TableScoutError;
    use crate::spreadsheet::image::ImageFormat;
    use crate::spreadsheet::image::ImageSource;
    use crate::spreadsheet::open_spreadsheet_bytes;
    use crate::spreadsheet::range::Range;
    use crate::spreadsheet::xlsx::tests::build_workbook;
    use crate::spreadsheet::xlsx::tests::sheet_xml;
    use crate::spreadsheet::SpreadsheetError;
    use glob::Pattern;

    /// Workbook held as ready-made grids; a sheet given as `Err` fails to load.
    #[derive(Default)]
    struct MemorySpreadsheet {
        sheets: Vec<(String, Result<Grid, String>)>,
        images: Vec<SheetImage>,
    }

    impl MemorySpreadsheet {
        fn with_sheet(mut self, name: &str, rows: &[&[&str]]) -> Self {
            self.sheets.push((name.to_owned(), Ok(Grid::from_texts(rows))));
            self
        }

        fn with_broken_sheet(mut self, name: &str) -> Self {
            self.sheets.push((name.to_owned(), Err("corrupt sheet".to_owned())));
            self
        }
    }

    impl Spreadsheet for MemorySpreadsheet {
        fn name(&self) -> &str {
            "memory"
        }

        fn sheet_names(&self) -> Vec<String> {
            self.sheets.iter().map(|(name, _)| name.to_owned()).collect()
        }

        fn read_grid(&mut self, sheet_name: &str, _: Option<Range>) -> Result<Grid, TableScoutError> {
            match self.sheets.iter().find(|(name, _)| name == sheet_name) {
                Some((_, Ok(grid))) => Ok(grid.clone()),
                Some((_, Err(message))) => Err(TableScoutError::WithContextError(message.to_owned())),
                None => Err(SpreadsheetError::SheetNotFoundError("memory".to_owned(), sheet_name.to_owned()).into()),
            }
        }

        fn read_images(&mut self, sheet_name: &str) -> Result<PartialResult<SheetImage>, TableScoutError> {
            if !self.sheets.iter().any(|(name, grid)| name == sheet_name && grid.is_ok()) {
                return Err(TableScoutError::WithContextError("corrupt sheet".to_owned()));
            }
            Ok(PartialResult {
                items: self.images.iter().filter(|image| image.sheet == sheet_name).cloned().collect(),
                warnings: Vec::new(),
            })
        }
    }

    const MARKED: &[&[&str]] = &[
        &[],
        &[],
        &["", "table"],
        &["ID", "Name"],
        &["1", "alpha"],
        &["2", "beta"],
        &["3", "gamma"],
    ];

    fn options(mode: SearchMode) -> SearchOptions {
        SearchOptions {
            mode,
            ..SearchOptions::default()
        }
    }

    #[test]
    fn parse_search_mode() {
        assert_eq!(SearchMode::parse("Marker"), Some(SearchMode::Marker));
        assert_eq!(SearchMode::parse(" density "), Some(SearchMode::Density));
        assert_eq!(SearchMode::parse("auto"), Some(SearchMode::Auto));
        assert_eq!(SearchMode::parse("fuzzy"), None);
    }

    #[test]
    fn match_relative_to_marker_header() {
        let mut spreadsheet = MemorySpreadsheet::default().with_sheet("Sheet1", MARKED);
        let outcome = search(&mut spreadsheet, "BETA", &options(SearchMode::Marker));

        assert_eq!(outcome.tables.len(), 1);
        let table = &outcome.tables[0];
        assert_eq!(table.header_row, 3);
        assert_eq!(table.labels, vec!["Sheet Name", "ID", "Name"]);
        assert_eq!(table.rows.len(), 3);

        assert_eq!(outcome.matches, vec![MatchPosition {
            sheet: "Sheet1".to_owned(),
            table: 0,
            row_offset: 1,
            col_offset: 2,
            cell: "B6".to_owned(),
            value: "beta".to_owned(),
        }]);
        assert_eq!(table.cell(1, 2), Some("beta"));
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn hits_without_marker_are_reported() {
        let mut spreadsheet = MemorySpreadsheet::default().with_sheet("Sheet1", MARKED);
        let outcome = search(&mut spreadsheet, "a", &options(SearchMode::Marker));

        // "table" and "Name" have no marker above them, the data cells share one table
        assert_eq!(outcome.tables.len(), 1);
        let cells: Vec<&str> = outcome.matches.iter().map(|position| position.cell.as_str()).collect();
        assert_eq!(cells, vec!["B5", "B6", "B7"]);
        assert_eq!(outcome.warnings, vec![
            RecoveredError::MarkerNotFound {
                sheet: "Sheet1".to_owned(),
                reference: "B3".to_owned(),
            },
            RecoveredError::MarkerNotFound {
                sheet: "Sheet1".to_owned(),
                reference: "B4".to_owned(),
            },
        ]);
        for position in &outcome.matches {
            let table = &outcome.tables[position.table];
            assert_eq!(table.cell(position.row_offset, position.col_offset), Some(position.value.as_str()));
        }
    }

    #[test]
    fn empty_term_finds_nothing() {
        let mut spreadsheet = MemorySpreadsheet::default().with_sheet("Sheet1", MARKED);
        assert_eq!(search(&mut spreadsheet, "", &SearchOptions::default()), SearchOutcome::default());
    }

    #[test]
    fn merge_tables_with_same_labels() {
        let mut spreadsheet = MemorySpreadsheet::default()
            .with_sheet("North", &[&["table"], &["ID", "Name"], &["1", "box"], &["2", "crate"]])
            .with_sheet("South", &[&["table"], &["ID", "Name"], &["7", "boxes"]])
            .with_sheet("Stock", &[&["table"], &["ID", "Qty"], &["box", "4"]]);
        let outcome = search(&mut spreadsheet, "box", &options(SearchMode::Marker));

        assert_eq!(outcome.tables.len(), 3);
        assert_eq!(outcome.merged_tables, vec![0, 1]);
        let merged = outcome.merged.as_ref().unwrap();
        assert_eq!(merged.labels, vec!["Sheet Name", "ID", "Name"]);
        assert_eq!(merged.rows, vec![
            vec!["North", "1", "box"],
            vec!["North", "2", "crate"],
            vec!["South", "7", "boxes"],
        ]);
        assert_eq!(outcome.warnings, vec![RecoveredError::SchemaMismatch {
            sheet: "Stock".to_owned(),
            header_row: 2,
            expected: "Sheet Name, ID, Name".to_owned(),
            found: "Sheet Name, ID, Qty".to_owned(),
        }]);

        assert_eq!(outcome.merged_highlights(), vec![(0, 2), (2, 2)]);
        for (row, col) in outcome.merged_highlights() {
            assert!(merged.rows[row][col].contains("box"));
        }
        let unmerged = &outcome.matches[2];
        assert_eq!(unmerged.sheet, "Stock");
        assert_eq!(outcome.merged_row(unmerged), None);
    }

    #[test]
    fn density_mode_uses_regions() {
        let rows: &[&[&str]] = &[
            &["report x"],
            &[],
            &["a", "b", "c", "d", "e"],
            &["1", "x", "3", "4", "5"],
            &["6", "7", "8", "9", "x0"],
            &[],
            &[],
            &["x", "", "", "", ""],
        ];
        let mut spreadsheet = MemorySpreadsheet::default().with_sheet("Sheet1", rows);
        let outcome = search(&mut spreadsheet, "x", &options(SearchMode::Density));

        assert_eq!(outcome.tables.len(), 1);
        let table = &outcome.tables[0];
        assert_eq!(table.header_row, 2);
        assert_eq!(table.labels, vec!["Sheet Name", "a", "b", "c", "d", "e"]);
        assert_eq!(table.rows.len(), 2);
        let positions: Vec<(usize, usize)> = outcome
            .matches
            .iter()
            .map(|position| (position.row_offset, position.col_offset))
            .collect();
        assert_eq!(positions, vec![(0, 2), (1, 5)]);
        assert!(outcome.warnings.is_empty());

        let outcome = search(&mut spreadsheet, "c", &options(SearchMode::Density));
        assert!(outcome.matches.is_empty());
    }

    #[test]
    fn auto_mode_per_sheet() {
        let dense: &[&[&str]] = &[
            &["k", "l", "m", "n", "o"],
            &["beta", "2", "3", "4", "5"],
            &["6", "7", "8", "9", "10"],
        ];
        let mut spreadsheet = MemorySpreadsheet::default()
            .with_sheet("Marked", MARKED)
            .with_sheet("Dense", dense);
        let outcome = search(&mut spreadsheet, "beta", &SearchOptions::default());

        assert_eq!(outcome.tables.len(), 2);
        assert_eq!(outcome.tables[0].header_row, 3);
        assert_eq!(outcome.tables[1].header_row, 0);
        assert_eq!(outcome.tables[1].rows.len(), 2);
        assert_eq!(outcome.matches[1].row_offset, 0);
        assert_eq!(outcome.matches[1].col_offset, 1);
        assert_eq!(outcome.merged_tables, vec![0]);
        assert_eq!(outcome.warnings.len(), 1);
    }

    #[test]
    fn custom_marker_text() {
        let rows: &[&[&str]] = &[&["START"], &["Code"], &["x1"]];
        let mut spreadsheet = MemorySpreadsheet::default().with_sheet("Sheet1", rows);
        let options = SearchOptions {
            mode: SearchMode::Marker,
            marker: "start".to_owned(),
            ..SearchOptions::default()
        };
        let outcome = search(&mut spreadsheet, "x", &options);
        assert_eq!(outcome.matches.len(), 1);
        assert_eq!(outcome.tables[0].header_row, 1);
    }

    #[test]
    fn broken_sheet_is_skipped() {
        let mut spreadsheet = MemorySpreadsheet::default()
            .with_broken_sheet("Broken")
            .with_sheet("Sheet1", MARKED);
        let outcome = search(&mut spreadsheet, "gamma", &SearchOptions::default());

        assert_eq!(outcome.matches.len(), 1);
        assert_eq!(outcome.warnings, vec![RecoveredError::SheetProcessing {
            sheet: "Broken".to_owned(),
            message: "corrupt sheet".to_owned(),
        }]);
    }

    #[test]
    fn sheet_patterns_limit_search() -> Result<(), glob::PatternError> {
        let mut spreadsheet = MemorySpreadsheet::default()
            .with_sheet("Data 1", MARKED)
            .with_sheet("Archive", MARKED);
        let options = SearchOptions {
            criteria: Criteria {
                sheet_name_patterns: Some(vec![Pattern::new("Data*")?]),
                range: None,
            },
            ..SearchOptions::default()
        };
        let outcome = search(&mut spreadsheet, "alpha", &options);
        assert_eq!(outcome.matches.len(), 1);
        assert_eq!(outcome.matches[0].sheet, "Data 1");
        Ok(())
    }

    #[test]
    fn search_is_deterministic() {
        let mut spreadsheet = MemorySpreadsheet::default()
            .with_sheet("A", MARKED)
            .with_sheet("B", MARKED);
        let first = search(&mut spreadsheet, "a", &SearchOptions::default());
        let second = search(&mut spreadsheet, "a", &SearchOptions::default());
        assert_eq!(first, second);
    }

    #[test]
    fn search_xlsx_workbook() -> Result<(), TableScoutError> {
        let bytes = build_workbook(
            &[
                ("Orders", sheet_xml(&[&["Orders export"], &["table"], &["Order", "Item"], &["A-1", "Bolt"], &["A-2", "Nut"]])),
                ("Returns", sheet_xml(&[&["table"], &["Order", "Item"], &["R-9", "Bolt"]])),
            ],
            &[],
        );
        let mut spreadsheet = open_spreadsheet_bytes("book.xlsx", bytes)?;
        let outcome = search(spreadsheet.as_mut(), "bolt", &SearchOptions::default());

        let merged = outcome.merged.as_ref().unwrap();
        assert_eq!(merged.labels, vec!["Sheet Name", "Order", "Item"]);
        assert_eq!(merged.rows.len(), 3);
        assert_eq!(outcome.merged_highlights(), vec![(0, 2), (2, 2)]);
        assert_eq!(outcome.matches[1].cell, "B3");
        assert!(outcome.warnings.is_empty());
        Ok(())
    }

    #[test]
    fn unreadable_date_skips_sheet() -> Result<(), TableScoutError> {
        let styles = r#"<styleSheet><cellXfs count="2"><xf numFmtId="0"/><xf numFmtId="14"/></cellXfs></styleSheet>"#;
        let dated = r#"<worksheet><sheetData>
            <row r="1"><c r="A1" t="inlineStr"><is><t>table</t></is></c></row>
            <row r="2"><c r="A2" t="inlineStr"><is><t>Due</t></is></c></row>
            <row r="3"><c r="A3" s="1"><v>1e15</v></c></row>
        </sheetData></worksheet>"#;
        let bytes = build_workbook(
            &[
                ("Dated", dated.to_owned()),
                ("Plain", sheet_xml(&[&["table"], &["Due"], &["1e15"]])),
            ],
            &[("xl/styles.xml", styles.as_bytes().to_vec())],
        );
        let mut spreadsheet = open_spreadsheet_bytes("book.xlsx", bytes)?;
        let outcome = search(spreadsheet.as_mut(), "1e15", &SearchOptions::default());

        assert_eq!(outcome.matches.len(), 1);
        assert_eq!(outcome.matches[0].sheet, "Plain");
        assert_eq!(outcome.warnings.len(), 1);
        assert!(matches!(
            &outcome.warnings[0],
            RecoveredError::SheetProcessing { sheet, .. } if sheet == "Dated"
        ));
        Ok(())
    }

    #[test]
    fn range_columns_start_tables() -> Result<(), TableScoutError> {
        let bytes = build_workbook(
            &[(
                "Data",
                sheet_xml(&[
                    &["note"],
                    &[],
                    &["", "", "table"],
                    &["", "", "ID", "", "Name"],
                    &["", "", "1", "", "apple"],
                ]),
            )],
            &[],
        );
        let mut spreadsheet = open_spreadsheet_bytes("book.xlsx", bytes)?;
        let options = SearchOptions {
            criteria: Criteria {
                sheet_name_patterns: None,
                range: Some(Range::try_from("C3:H20")?),
            },
            ..SearchOptions::default()
        };
        let outcome = search(spreadsheet.as_mut(), "apple", &options);

        let merged = outcome.merged.as_ref().unwrap();
        assert_eq!(merged.labels, vec!["Sheet Name", "ID", "column2", "Name"]);
        assert_eq!(merged.rows, vec![vec!["Data", "1", "", "apple"]]);
        assert_eq!(outcome.matches[0].col_offset, 3);
        assert_eq!(outcome.matches[0].cell, "E5");
        assert_eq!(merged.rows[0][outcome.matches[0].col_offset], "apple");

        let tables = list_tables(spreadsheet.as_mut(), &options.criteria, &SegmentOptions {
            min_consecutive_rows: 2,
            min_populated_columns: 2,
        });
        assert_eq!(tables.items.len(), 1);
        assert_eq!(tables.items[0].range(), "C4:E5");
        assert_eq!(tables.items[0].labels, vec!["ID", "column2", "Name"]);
        Ok(())
    }

    #[test]
    fn list_density_tables() {
        let rows: &[&[&str]] = &[
            &["a", "b", "c", "d", "e"],
            &["1", "2", "3", "4", "5"],
            &["1", "2", "3", "4", "5"],
        ];
        let mut spreadsheet = MemorySpreadsheet::default()
            .with_sheet("Sheet1", rows)
            .with_broken_sheet("Broken");
        let result = list_tables(&mut spreadsheet, &Criteria::default(), &SegmentOptions::default());

        assert_eq!(result.items.len(), 1);
        let table = &result.items[0];
        assert_eq!(table.region, TableRegion { start_row: 0, end_row: 2 });
        assert_eq!(table.range(), "A1:E3");
        assert_eq!(table.labels, vec!["a", "b", "c", "d", "e"]);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn collect_images_once_per_sheet() {
        let image = |sheet: &str, part: &str, digest: &str| SheetImage {
            sheet: sheet.to_owned(),
            source: ImageSource::DrawingImage { part: part.to_owned() },
            format: ImageFormat::Png,
            digest: digest.to_owned(),
            bytes: Vec::new(),
        };
        let mut spreadsheet = MemorySpreadsheet {
            images: vec![
                image("One", "xl/media/image1.png", "d1"),
                image("One", "xl/media/image2.png", "d1"),
                image("Two", "xl/media/image1.png", "d1"),
            ],
            ..MemorySpreadsheet::default()
        }
        .with_sheet("One", &[])
        .with_sheet("Two", &[])
        .with_broken_sheet("Three");
        let result = collect_images(&mut spreadsheet, &Criteria::default());

        let parts: Vec<(&str, &str)> = result
            .items
            .iter()
            .map(|image| (image.sheet.as_str(), image.source.part()))
            .collect();
        assert_eq!(parts, vec![("One", "xl/media/image1.png"), ("Two", "xl/media/image1.png")]);
        assert_eq!(result.warnings.len(), 1);
    }
}
