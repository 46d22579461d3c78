use crate::error::ResultMessage;
use crate::error::TableScoutError;
use crate::extension::next_chunk;
use crate::extension::writer::write_bigint;
use crate::extension::writer::write_blob;
use crate::extension::writer::write_varchar;
use crate::extension::FileParam;
use crate::extension::NamedParam;
use crate::extension::Param;
use crate::extension::SheetParam;
use crate::search::collect_images;
use crate::spreadsheet::criteria::Criteria;
use crate::spreadsheet::image::ImageSource;
use crate::spreadsheet::image::SheetImage;
use crate::spreadsheet::open_spreadsheet;
use duckdb::core::DataChunkHandle;
use duckdb::core::LogicalTypeHandle;
use duckdb::core::LogicalTypeId;
use duckdb::vtab::BindInfo;
use duckdb::vtab::InitInfo;
use duckdb::vtab::TableFunctionInfo;
use duckdb::vtab::VTab;
use std::error::Error;
use std::sync::atomic::AtomicUsize;

struct SheetImagesParameters {
    file: String,
    criteria: Criteria,
}

impl TryFrom<&BindInfo> for SheetImagesParameters {
    type Error = TableScoutError;

    fn try_from(bind: &BindInfo) -> Result<Self, Self::Error> {
        Ok(SheetImagesParameters {
            file: FileParam::read(bind, 0)?,
            criteria: Criteria {
                sheet_name_patterns: SheetParam::read(bind)?,
                range: None,
            },
        })
    }
}

#[repr(C)]
pub(crate) struct SheetImagesBindData {
    images: Vec<SheetImage>,
}

impl TryFrom<&SheetImagesParameters> for SheetImagesBindData {
    type Error = TableScoutError;

    fn try_from(parameters: &SheetImagesParameters) -> Result<Self, Self::Error> {
        let mut spreadsheet = open_spreadsheet(&parameters.file).with_prefix(&parameters.file)?;
        let result = collect_images(spreadsheet.as_mut(), &parameters.criteria);
        tracing::debug!("{}: {} images, {} warnings", parameters.file, result.items.len(), result.warnings.len());
        Ok(SheetImagesBindData { images: result.items })
    }
}

#[repr(C)]
pub(crate) struct SheetImagesInitData {
    index: AtomicUsize,
}

/// `sheet_images(file, ...)`: every distinct picture of every sheet
pub(crate) struct SheetImagesTableFunction;

impl VTab for SheetImagesTableFunction {
    type InitData = SheetImagesInitData;
    type BindData = SheetImagesBindData;

    fn bind(bind: &BindInfo) -> Result<Self::BindData, Box<dyn Error>> {
        let parameters = SheetImagesParameters::try_from(bind)?;
        let data = SheetImagesBindData::try_from(&parameters)?;
        let varchar = || LogicalTypeHandle::from(LogicalTypeId::Varchar);
        bind.add_result_column("sheet_name", varchar());
        bind.add_result_column("image_index", LogicalTypeHandle::from(LogicalTypeId::Bigint));
        bind.add_result_column("source", varchar());
        bind.add_result_column("path", varchar());
        bind.add_result_column("cell", varchar());
        bind.add_result_column("format", varchar());
        bind.add_result_column("digest", varchar());
        bind.add_result_column("content", LogicalTypeHandle::from(LogicalTypeId::Blob));
        Ok(data)
    }

    fn init(_: &InitInfo) -> Result<Self::InitData, Box<dyn Error>> {
        Ok(SheetImagesInitData {
            index: AtomicUsize::new(0),
        })
    }

    fn func(func: &TableFunctionInfo<Self>, output: &mut DataChunkHandle) -> Result<(), Box<dyn Error>> {
        let init = func.get_init_data();
        let bind = func.get_bind_data();
        let (lower, upper) = next_chunk(&init.index, bind.images.len());
        if lower < upper {
            let mut sheets = output.flat_vector(0);
            let mut indexes = output.flat_vector(1);
            let mut sources = output.flat_vector(2);
            let mut paths = output.flat_vector(3);
            let mut cells = output.flat_vector(4);
            let mut formats = output.flat_vector(5);
            let mut digests = output.flat_vector(6);
            let mut contents = output.flat_vector(7);
            for index in lower..upper {
                let image = &bind.images[index];
                let target = index - lower;
                let cell = match &image.source {
                    ImageSource::EmbeddedImage { cell, .. } => Some(cell.as_str()),
                    _ => None,
                };
                write_varchar(&mut sheets, target, Some(image.sheet.as_str()));
                write_bigint(&mut indexes, target, Some(index));
                write_varchar(&mut sources, target, Some(image.source.kind()));
                write_varchar(&mut paths, target, Some(image.source.part()));
                write_varchar(&mut cells, target, cell);
                write_varchar(&mut formats, target, Some(image.format.extension()));
                write_varchar(&mut digests, target, Some(image.digest.as_str()));
                write_blob(&mut contents, target, &image.bytes);
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
        Some(vec![SheetParam::definition()])
    }
}
