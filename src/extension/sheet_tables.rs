use crate::error::ResultMessage;
use crate::error::TableScoutError;
use crate::extension::next_chunk;
use crate::extension::read_criteria;
use crate::extension::read_segment_options;
use crate::extension::writer::write_bigint;
use crate::extension::writer::write_varchar;
use crate::extension::FileParam;
use crate::extension::MinColumnsParam;
use crate::extension::MinRowsParam;
use crate::extension::NamedParam;
use crate::extension::Param;
use crate::extension::RangeParam;
use crate::extension::SheetParam;
use crate::search::list_tables;
use crate::search::SheetTable;
use crate::spreadsheet::criteria::Criteria;
use crate::spreadsheet::open_spreadsheet;
use crate::table::segment::SegmentOptions;
use duckdb::core::DataChunkHandle;
use duckdb::core::LogicalTypeHandle;
use duckdb::core::LogicalTypeId;
use duckdb::vtab::BindInfo;
use duckdb::vtab::InitInfo;
use duckdb::vtab::TableFunctionInfo;
use duckdb::vtab::VTab;
use std::error::Error;
use std::sync::atomic::AtomicUsize;

struct SheetTablesParameters {
    file: String,
    criteria: Criteria,
    segment: SegmentOptions,
}

impl TryFrom<&BindInfo> for SheetTablesParameters {
    type Error = TableScoutError;

    fn try_from(bind: &BindInfo) -> Result<Self, Self::Error> {
        Ok(SheetTablesParameters {
            file: FileParam::read(bind, 0)?,
            criteria: read_criteria(bind)?,
            segment: read_segment_options(bind)?,
        })
    }
}

#[repr(C)]
pub(crate) struct SheetTablesBindData {
    /// Regions with their 0-based index inside the sheet
    tables: Vec<(usize, SheetTable)>,
}

impl TryFrom<&SheetTablesParameters> for SheetTablesBindData {
    type Error = TableScoutError;

    fn try_from(parameters: &SheetTablesParameters) -> Result<Self, Self::Error> {
        let mut spreadsheet = open_spreadsheet(&parameters.file).with_prefix(&parameters.file)?;
        let result = list_tables(spreadsheet.as_mut(), &parameters.criteria, &parameters.segment);
        let mut tables = Vec::with_capacity(result.items.len());
        let mut previous_sheet = None::<String>;
        let mut index = 0;
        for table in result.items {
            if previous_sheet.as_deref() == Some(table.sheet.as_str()) {
                index += 1;
            } else {
                previous_sheet = Some(table.sheet.to_owned());
                index = 0;
            }
            tables.push((index, table));
        }
        Ok(SheetTablesBindData { tables })
    }
}

#[repr(C)]
pub(crate) struct SheetTablesInitData {
    index: AtomicUsize,
}

/// `sheet_tables(file, ...)`: table regions found by the density heuristic
pub(crate) struct SheetTablesTableFunction;

impl VTab for SheetTablesTableFunction {
    type InitData = SheetTablesInitData;
    type BindData = SheetTablesBindData;

    fn bind(bind: &BindInfo) -> Result<Self::BindData, Box<dyn Error>> {
        let parameters = SheetTablesParameters::try_from(bind)?;
        let data = SheetTablesBindData::try_from(&parameters)?;
        let varchar = || LogicalTypeHandle::from(LogicalTypeId::Varchar);
        let bigint = || LogicalTypeHandle::from(LogicalTypeId::Bigint);
        bind.add_result_column("sheet_name", varchar());
        bind.add_result_column("table_index", bigint());
        bind.add_result_column("range", varchar());
        bind.add_result_column("start_row", bigint());
        bind.add_result_column("end_row", bigint());
        bind.add_result_column("header", varchar());
        Ok(data)
    }

    fn init(_: &InitInfo) -> Result<Self::InitData, Box<dyn Error>> {
        Ok(SheetTablesInitData {
            index: AtomicUsize::new(0),
        })
    }

    fn func(func: &TableFunctionInfo<Self>, output: &mut DataChunkHandle) -> Result<(), Box<dyn Error>> {
        let init = func.get_init_data();
        let bind = func.get_bind_data();
        let (lower, upper) = next_chunk(&init.index, bind.tables.len());
        if lower < upper {
            let mut sheets = output.flat_vector(0);
            let mut indexes = output.flat_vector(1);
            let mut ranges = output.flat_vector(2);
            let mut start_rows = output.flat_vector(3);
            let mut end_rows = output.flat_vector(4);
            let mut headers = output.flat_vector(5);
            for index in lower..upper {
                let (table_index, table) = &bind.tables[index];
                let target = index - lower;
                write_varchar(&mut sheets, target, Some(table.sheet.as_str()));
                write_bigint(&mut indexes, target, Some(*table_index));
                write_varchar(&mut ranges, target, Some(table.range().as_str()));
                write_bigint(&mut start_rows, target, Some(table.region.start_row + 1));
                write_bigint(&mut end_rows, target, Some(table.region.end_row + 1));
                write_varchar(&mut headers, target, Some(table.labels.join(", ").as_str()));
            }
            output.set_len(upper - lower);
        } else {
            output.set_len(0);
        }
        Ok(())
    }

    fn parameters() -> Option<Vec<LogicalTypeHandle>> {
        Some(vec![FileParam::kind()])
    }

    fn named_parameters() -> Option<Vec<(String, LogicalTypeHandle)>> {
        Some(vec![
            SheetParam::definition(),
            RangeParam::definition(),
            MinRowsParam::definition(),
            MinColumnsParam::definition(),
        ])
    }
}
