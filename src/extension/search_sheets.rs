use crate::error::TableScoutError;
use crate::extension::next_chunk;
use crate::extension::writer::write_varchar;
use crate::extension::SearchParameters;
use crate::search::MergedTable;
use crate::table::resolved::SHEET_NAME_LABEL;
use duckdb::core::DataChunkHandle;
use duckdb::core::LogicalTypeHandle;
use duckdb::core::LogicalTypeId;
use duckdb::vtab::BindInfo;
use duckdb::vtab::InitInfo;
use duckdb::vtab::TableFunctionInfo;
use duckdb::vtab::VTab;
use std::error::Error;
use std::sync::atomic::AtomicUsize;

#[repr(C)]
/// The merged table of every table holding a hit
pub(crate) struct SearchSheetsBindData {
    table: MergedTable,
}

impl TryFrom<&SearchParameters> for SearchSheetsBindData {
    type Error = TableScoutError;

    fn try_from(parameters: &SearchParameters) -> Result<Self, Self::Error> {
        let outcome = parameters.run()?;
        // Without hits the result keeps the sheet name column so it stays queryable
        let table = outcome.merged.unwrap_or_else(|| MergedTable {
            labels: vec![SHEET_NAME_LABEL.to_owned()],
            rows: Vec::new(),
        });
        Ok(SearchSheetsBindData { table })
    }
}

#[repr(C)]
pub(crate) struct SearchSheetsInitData {
    index: AtomicUsize,
}

/// `search_sheets(file, term, ...)`: the tables enclosing the hits, merged
pub(crate) struct SearchSheetsTableFunction;

impl VTab for SearchSheetsTableFunction {
    type InitData = SearchSheetsInitData;
    type BindData = SearchSheetsBindData;

    fn bind(bind: &BindInfo) -> Result<Self::BindData, Box<dyn Error>> {
        let parameters = SearchParameters::try_from(bind)?;
        let data = SearchSheetsBindData::try_from(&parameters)?;
        for label in &data.table.labels {
            bind.add_result_column(label, LogicalTypeHandle::from(LogicalTypeId::Varchar));
        }
        Ok(data)
    }

    fn init(_: &InitInfo) -> Result<Self::InitData, Box<dyn Error>> {
        Ok(SearchSheetsInitData {
            index: AtomicUsize::new(0),
        })
    }

    fn func(func: &TableFunctionInfo<Self>, output: &mut DataChunkHandle) -> Result<(), Box<dyn Error>> {
        let init = func.get_init_data();
        let bind = func.get_bind_data();
        let (lower, upper) = next_chunk(&init.index, bind.table.rows.len());
        if lower < upper {
            for col in 0..bind.table.labels.len() {
                let mut vector = output.flat_vector(col);
                for index in lower..upper {
                    let value = bind.table.rows[index].get(col).map(String::as_str);
                    write_varchar(&mut vector, index - lower, value);
                }
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
