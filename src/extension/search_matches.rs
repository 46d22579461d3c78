use crate::error::TableScoutError;
use crate::extension::next_chunk;
use crate::extension::writer::write_bigint;
use crate::extension::writer::write_varchar;
use crate::extension::SearchParameters;
use duckdb::core::DataChunkHandle;
use duckdb::core::LogicalTypeHandle;
use duckdb::core::LogicalTypeId;
use duckdb::vtab::BindInfo;
use duckdb::vtab::InitInfo;
use duckdb::vtab::TableFunctionInfo;
use duckdb::vtab::VTab;
use std::error::Error;
use std::sync::atomic::AtomicUsize;

/// One output row per hit
struct MatchRow {
    sheet: String,
    table: usize,
    /// 1-based spreadsheet row of the table header
    header_row: usize,
    row_offset: usize,
    col_offset: usize,
    merged_row: Option<usize>,
    cell: String,
    value: String,
}

#[repr(C)]
pub(crate) struct SearchMatchesBindData {
    rows: Vec<MatchRow>,
}

impl TryFrom<&SearchParameters> for SearchMatchesBindData {
    type Error = TableScoutError;

    fn try_from(parameters: &SearchParameters) -> Result<Self, Self::Error> {
        let outcome = parameters.run()?;
        let rows = outcome
            .matches
            .iter()
            .map(|position| MatchRow {
                sheet: position.sheet.to_owned(),
                table: position.table,
                header_row: outcome.tables[position.table].header_row + 1,
                row_offset: position.row_offset,
                col_offset: position.col_offset,
                merged_row: outcome.merged_row(position),
                cell: position.cell.to_owned(),
                value: position.value.to_owned(),
            })
            .collect();
        Ok(SearchMatchesBindData { rows })
    }
}

#[repr(C)]
pub(crate) struct SearchMatchesInitData {
    index: AtomicUsize,
}

/// `search_matches(file, term, ...)`: where every hit sits in its table
pub(crate) struct SearchMatchesTableFunction;

impl VTab for SearchMatchesTableFunction {
    type InitData = SearchMatchesInitData;
    type BindData = SearchMatchesBindData;

    fn bind(bind: &BindInfo) -> Result<Self::BindData, Box<dyn Error>> {
        let parameters = SearchParameters::try_from(bind)?;
        let data = SearchMatchesBindData::try_from(&parameters)?;
        let varchar = || LogicalTypeHandle::from(LogicalTypeId::Varchar);
        let bigint = || LogicalTypeHandle::from(LogicalTypeId::Bigint);
        bind.add_result_column("sheet_name", varchar());
        bind.add_result_column("table_index", bigint());
        bind.add_result_column("header_row", bigint());
        bind.add_result_column("row_offset", bigint());
        bind.add_result_column("col_offset", bigint());
        bind.add_result_column("merged_row", bigint());
        bind.add_result_column("cell", varchar());
        bind.add_result_column("value", varchar());
        Ok(data)
    }

    fn init(_: &InitInfo) -> Result<Self::InitData, Box<dyn Error>> {
        Ok(SearchMatchesInitData {
            index: AtomicUsize::new(0),
        })
    }

    fn func(func: &TableFunctionInfo<Self>, output: &mut DataChunkHandle) -> Result<(), Box<dyn Error>> {
        let init = func.get_init_data();
        let bind = func.get_bind_data();
        let (lower, upper) = next_chunk(&init.index, bind.rows.len());
        if lower < upper {
            let mut sheets = output.flat_vector(0);
            let mut tables = output.flat_vector(1);
            let mut header_rows = output.flat_vector(2);
            let mut row_offsets = output.flat_vector(3);
            let mut col_offsets = output.flat_vector(4);
            let mut merged_rows = output.flat_vector(5);
            let mut cells = output.flat_vector(6);
            let mut values = output.flat_vector(7);
            for index in lower..upper {
                let row = &bind.rows[index];
                let target = index - lower;
                write_varchar(&mut sheets, target, Some(row.sheet.as_str()));
                write_bigint(&mut tables, target, Some(row.table));
                write_bigint(&mut header_rows, target, Some(row.header_row));
                write_bigint(&mut row_offsets, target, Some(row.row_offset));
                write_bigint(&mut col_offsets, target, Some(row.col_offset));
                write_bigint(&mut merged_rows, target, row.merged_row);
                write_varchar(&mut cells, target, Some(row.cell.as_str()));
                write_varchar(&mut values, target, Some(row.value.as_str()));
            }
            output.set_len(upper - lower);
        } else {
            output.set_len(0);
        }
        Ok(())
    }

    fn parameters() -> Option<Vec<LogicalTypeHandle>> {
        Some(SearchParameters::positional())
    }

    fn named_parameters() -> Option<Vec<(String, LogicalTypeHandle)>> {
        Some(SearchParameters::named())
    }
}
