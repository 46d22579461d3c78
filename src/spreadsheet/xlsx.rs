use crate::error::PartialResult;
use crate::error::TableScoutError;
use crate::helpers::reader::UnifiedReader;
use crate::helpers::xml::ElementAttributes;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlText;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::cell::DateSystem;
use crate::spreadsheet::cell::Value;
use crate::spreadsheet::excel;
use crate::spreadsheet::excel::load_relationships;
use crate::spreadsheet::grid::Grid;
use crate::spreadsheet::grid::GridBuilder;
use crate::spreadsheet::image::load_images;
use crate::spreadsheet::image::ImageSource;
use crate::spreadsheet::image::SheetImage;
use crate::spreadsheet::range::Range;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::borrow::Cow;
use std::collections::HashMap;
use std::io::BufReader;
use zip::read::ZipFile;
use zip::ZipArchive;

// XML tag names for parsing Excel XLSX format
const TAG_CUSTOM_FORMATS: QName = QName(b"numFmts"); // Custom number formats container
const TAG_CUSTOM_FORMAT: QName = QName(b"numFmt");   // Individual custom number format
const TAG_FORMAT_INDEXES: QName = QName(b"cellXfs");  // Cell format indexes container
const TAG_FORMAT_INDEX: QName = QName(b"xf");         // Individual cell format index
const TAG_SHARED_STRING_ITEM: QName = QName(b"si");   // Shared string table item
const TAG_PHONETIC_TEXT: QName = QName(b"rPh");       // Phonetic text for Asian languages
const TAG_TEXT: QName = QName(b"t");                  // Text content within strings
const TAG_WORKBOOK_PROPERTIES: QName = QName(b"workbookPr"); // Workbook properties
const TAG_SHEET: QName = QName(b"sheet");             // Worksheet definition
const TAG_ROW: QName = QName(b"row");                 // Row in worksheet
const TAG_CELL: QName = QName(b"c");                  // Cell in worksheet
const TAG_INLINE_STRING: QName = QName(b"is");        // Inline string value
const TAG_VALUE: QName = QName(b"v");                 // Cell value content
const TAG_RICH_VALUE: QName = QName(b"rv");           // Rich value record

// Local names inside DrawingML parts, whose prefixes vary between producers
const LOCAL_PICTURE: &[u8] = b"pic";
const LOCAL_SHAPE: &[u8] = b"sp";
const LOCAL_BLIP: &[u8] = b"blip";
const LOCAL_RICH_VALUE_RELATION: &[u8] = b"rel";

const WORKBOOK_PART: &str = "xl/workbook.xml";
const RICH_VALUE_PART: &str = "xl/richData/rdrichvalue.xml";
const RICH_VALUE_RELATIONS_PART: &str = "xl/richData/richValueRel.xml";

/// Represents an Excel XLSX spreadsheet file
pub(crate) struct XlsxSpreadsheet {
    /// File name of the spreadsheet
    name: String,
    /// ZIP archive containing the XLSX file contents
    zip: ZipArchive<UnifiedReader>,
    /// Parsed number formats for cell type detection
    number_formats: Vec<CellType>,
    /// Shared string table
    shared_strings: Vec<String>,
    /// List of worksheets with (name, zip_path) pairs
    sheets: Vec<(String, String)>,
}

impl XlsxSpreadsheet {
    /// Opens an XLSX workbook and loads its structure, styles and shared strings
    ///
    /// # Arguments
    /// * `file_name` - Path or URL the content was read from
    /// * `reader` - Workbook content
    pub(crate) fn open(file_name: &str, reader: UnifiedReader) -> Result<XlsxSpreadsheet, TableScoutError> {
        let mut zip = excel::open_package(file_name, reader)?;
        let (sheets, system) = load_workbook(&mut zip)
            .map_err(|_| SpreadsheetError::FileFormatError(file_name.to_owned()))?;
        let number_formats = load_number_formats(&mut zip, system)?;
        let shared_strings = load_shared_strings(&mut zip)?;
        tracing::debug!("{file_name}: {} sheets, {} shared strings", sheets.len(), shared_strings.len());
        Ok(XlsxSpreadsheet {
            name: file_name.to_owned(),
            zip,
            number_formats,
            shared_strings,
            sheets,
        })
    }

    fn sheet_path(&self, sheet_name: &str) -> Result<String, TableScoutError> {
        self.sheets
            .iter()
            .find(|(name, _)| name == sheet_name)
            .map(|(_, path)| path.to_owned())
            .ok_or_else(|| SpreadsheetError::SheetNotFoundError(self.name.to_owned(), sheet_name.to_owned()).into())
    }
}

impl Spreadsheet for XlsxSpreadsheet {
    fn name(&self) -> &str {
        &self.name
    }

    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(name, _)| name.to_owned()).collect()
    }

    /// Reads a worksheet into a grid
    ///
    /// Cells without a value element stay missing; string cells with an empty
    /// value become empty text.
    fn read_grid(&mut self, sheet_name: &str, range: Option<Range>) -> Result<Grid, TableScoutError> {
        let path = self.sheet_path(sheet_name)?;
        let mut reader = self.zip.xml_reader(&path)?
            .ok_or_else(|| SpreadsheetError::FileError(path.to_owned()))?;
        let range = range.unwrap_or_default();
        let mut builder = GridBuilder::new(range.col_lower_bound.unwrap_or(0));
        let mut row_count = 0usize;
        let mut col_count = 0usize;
        let mut row = 0usize;
        let mut col = 0usize;
        let mut kind = CellType::default();
        let mut value = None::<String>;
        match_xml_events!(reader => {
            Event::Start(event) if event.name() == TAG_ROW => {
                if let Some(number) = event.parse_attribute::<usize>("r")? {
                    row_count = number.saturating_sub(1);
                }
                col_count = 0;
            }
            Event::End(event) if event.name() == TAG_ROW => {
                row_count += 1;
            }
            Event::Start(event) if event.name() == TAG_CELL => {
                (row, col) = event.attribute("r")?
                    .and_then(|reference| reference_to_index(&reference))
                    .unwrap_or((row_count, col_count));
                col_count = col + 1;
                value = None;
                if range.after_row_upper_bound(row) {
                    break;
                } else if range.contains(row, col) {
                    kind = event.attribute("t")?.map(|t| {
                        match t.as_ref() {
                            "inlineStr" | "str" => CellType::InlineString,
                            "s" => CellType::SharedString,
                            "d" => CellType::IsoDateTime,
                            "b" => CellType::Boolean,
                            "e" => CellType::Error,
                            _ => CellType::Number,
                        }
                    }).unwrap_or(CellType::Number);
                    if let Some(format_id) = event.attribute("s")? {
                        if kind == CellType::Number && !format_id.is_empty() {
                            let index = format_id.parse::<usize>()?;
                            kind = self.number_formats.get(index).copied().unwrap_or(CellType::Number);
                        }
                    }
                } else {
                    kind = CellType::default();
                }
            }
            Event::Start(event) if kind != CellType::Empty && event.name() == TAG_INLINE_STRING => {
                value = Some(read_string_value(&mut reader, TAG_INLINE_STRING, false)?);
            }
            Event::Start(event) if kind != CellType::Empty && event.name() == TAG_VALUE => {
                value = Some(read_string_value(&mut reader, TAG_VALUE, true)?);
            }
            Event::End(event) if event.name() == TAG_CELL => {
                if let Some(raw) = value.take() {
                    let decoded = match kind {
                        CellType::Empty => None,
                        CellType::InlineString => Some(Value::Text(raw)),
                        _ if raw.trim().is_empty() => None,
                        CellType::SharedString => {
                            let index = raw.trim().parse::<usize>()?;
                            let text = self.shared_strings.get(index).ok_or_else(|| SpreadsheetError::CellValueError(
                                self.name.to_owned(),
                                sheet_name.to_owned(),
                                index_to_reference(row, col),
                                format!("shared string {index} does not exist"),
                            ))?;
                            Some(Value::Text(text.to_owned()))
                        }
                        kind => Some(Value::parse(kind, &raw).map_err(|message| SpreadsheetError::CellValueError(
                            self.name.to_owned(),
                            sheet_name.to_owned(),
                            index_to_reference(row, col),
                            message,
                        ))?),
                    };
                    if let Some(decoded) = decoded {
                        builder.push(row, col, decoded);
                    }
                }
                kind = CellType::default();
            }
        });
        Ok(builder.finish())
    }

    /// Collects drawing, shape and in-cell pictures of a worksheet
    fn read_images(&mut self, sheet_name: &str) -> Result<PartialResult<SheetImage>, TableScoutError> {
        let path = self.sheet_path(sheet_name)?;
        let mut drawings: Vec<String> = load_relationships(&mut self.zip, &path, "/drawing")?
            .into_values()
            .collect();
        drawings.sort();
        drawings.dedup();

        let mut sources = Vec::new();
        for drawing in &drawings {
            sources.extend(load_drawing_images(&mut self.zip, drawing)?);
        }
        sources.extend(load_embedded_images(&mut self.zip, &path)?);
        tracing::debug!("{}: {} image sources in sheet '{sheet_name}'", self.name, sources.len());
        Ok(load_images(sheet_name, sources, &mut self.zip))
    }
}

/// Loads workbook structure and worksheet information from XLSX file
///
/// Parses the workbook.xml file to extract worksheet names and their corresponding
/// XML file paths, and determines the date system (1900 vs 1904) used in the file.
fn load_workbook(zip: &mut ZipArchive<UnifiedReader>) -> Result<(Vec<(String, String)>, DateSystem), TableScoutError> {
    let relationships = load_relationships(zip, WORKBOOK_PART, "/worksheet")?;
    let mut reader = zip.xml_reader(WORKBOOK_PART)?
        .ok_or_else(|| SpreadsheetError::FileError(WORKBOOK_PART.to_string()))?;
    let mut sheets: Vec<(String, String)> = Vec::new();
    let mut is_1904 = false;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHEET => {
            let name = event.attribute("name")?;
            let id = event.local_attribute("id")?;
            if let Some((name, id)) = name.zip(id) {
                if let Some(path) = relationships.get(id.as_ref()) {
                    sheets.push((name.to_string(), path.to_owned()));
                }
            }
        }
        Event::Start(event) if event.name() == TAG_WORKBOOK_PROPERTIES => {
            is_1904 = event.attribute("date1904")?
                .map(|value| value.eq("1") || value.eq("true"))
                .unwrap_or(false);
        }
    });
    Ok((sheets, DateSystem::from_flag(is_1904)))
}

/// Loads number formats and cell styles from XLSX styles.xml file
///
/// Parses custom number formats and cell style indexes to determine
/// how numeric values should be interpreted (dates, times or plain numbers)
fn load_number_formats(zip: &mut ZipArchive<UnifiedReader>, system: DateSystem) -> Result<Vec<CellType>, TableScoutError> {
    let mut reader = match zip.xml_reader("xl/styles.xml")? {
        Some(reader) => reader,
        None => return Ok(Vec::new()),
    };

    let mut custom_formats_context = false;
    let mut custom_formats = HashMap::<String, CellType>::new();

    let mut format_indexes_context = false;
    let mut format_indexes = Vec::<String>::new();

    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_CUSTOM_FORMATS => custom_formats_context = true,
        Event::End(event) if event.name() == TAG_CUSTOM_FORMATS => custom_formats_context = false,
        Event::Start(event) if custom_formats_context && event.name() == TAG_CUSTOM_FORMAT => {
            let id = event.attribute("numFmtId")?;
            let format = event.attribute("formatCode")?;
            if let Some((id, format)) = id.zip(format) {
                let style = CellType::parse_custom_number_format(&format, system);
                custom_formats.insert(id.to_string(), style);
            }
        }

        Event::Start(event) if event.name() == TAG_FORMAT_INDEXES => format_indexes_context = true,
        Event::End(event) if event.name() == TAG_FORMAT_INDEXES => format_indexes_context = false,
        Event::Start(event) if format_indexes_context && event.name() == TAG_FORMAT_INDEX => {
            let id = event.attribute("numFmtId")?.unwrap_or(Cow::Borrowed("0"));
            format_indexes.push(id.to_string());
        }
    });

    Ok(excel::load_number_formats(format_indexes, custom_formats, system))
}

/// Loads the whole shared string table
fn load_shared_strings(zip: &mut ZipArchive<UnifiedReader>) -> Result<Vec<String>, TableScoutError> {
    let mut shared_strings = Vec::<String>::new();
    let mut reader = match zip.xml_reader("xl/sharedStrings.xml")? {
        Some(reader) => reader,
        None => return Ok(shared_strings),
    };
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHARED_STRING_ITEM => {
            shared_strings.push(read_string_value(&mut reader, TAG_SHARED_STRING_ITEM, false)?);
        }
    });
    Ok(shared_strings)
}

/// Reads string value from XML content, handling text and CDATA sections
///
/// Extracts string content from XML elements, skipping phonetic text annotations
/// and properly handling both text nodes and CDATA sections.
///
/// # Arguments
/// * `reader` - XML reader positioned at the start of the string content
/// * `end_tag` - XML tag that marks the end of the string content
/// * `is_text_content` - Whether to treat the content as text by default
fn read_string_value(
    reader: &mut XmlReader<BufReader<ZipFile<'_, UnifiedReader>>>,
    end_tag: QName,
    is_text_content: bool,
) -> Result<String, TableScoutError> {
    let mut is_phonetic_text = false;
    let mut is_text = is_text_content;
    let mut text = String::new();
    match_xml_events!(reader => {
        Event::End(event) if event.name() == end_tag => break,
        Event::Start(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = true,
        Event::End(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = false,
        Event::Start(event) if !is_phonetic_text && event.name() == TAG_TEXT => is_text = true,
        Event::End(event) if is_text && event.name() == TAG_TEXT => is_text = false,
        Event::Text(event) if is_text => text.push_str(&event.xml_content()?),
        Event::CData(event) if is_text => text.push_str(&event.xml_content()?),
        Event::GeneralRef(event) if is_text => text.push_reference(&event)?,
    });
    Ok(text)
}

/// Finds the pictures of one drawing part
///
/// A `blip` inside `pic` is a placed picture; inside `sp` it is the picture fill of a shape.
fn load_drawing_images(zip: &mut ZipArchive<UnifiedReader>, drawing: &str) -> Result<Vec<ImageSource>, TableScoutError> {
    let images = load_relationships(zip, drawing, "/image")?;
    let mut sources = Vec::new();
    let mut reader = match zip.xml_reader(drawing)? {
        Some(reader) => reader,
        None => return Ok(sources),
    };
    let mut picture_depth = 0usize;
    let mut shape_depth = 0usize;
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == LOCAL_PICTURE => picture_depth += 1,
        Event::End(event) if event.local_name().as_ref() == LOCAL_PICTURE => picture_depth = picture_depth.saturating_sub(1),
        Event::Start(event) if event.local_name().as_ref() == LOCAL_SHAPE => shape_depth += 1,
        Event::End(event) if event.local_name().as_ref() == LOCAL_SHAPE => shape_depth = shape_depth.saturating_sub(1),
        Event::Start(event) if event.local_name().as_ref() == LOCAL_BLIP => {
            let part = event.local_attribute("embed")?
                .and_then(|id| images.get(id.as_ref()))
                .map(|part| part.to_owned());
            if let Some(part) = part {
                if shape_depth > 0 && picture_depth == 0 {
                    sources.push(ImageSource::ShapeImage { part });
                } else {
                    sources.push(ImageSource::DrawingImage { part });
                }
            }
        }
    });
    Ok(sources)
}

/// Finds pictures placed in cells ("Place in Cell")
///
/// A cell's `vm` attribute points at a rich value (`vm - 1`), whose first value is an
/// index into the rich value relations, which resolve to the media part.
fn load_embedded_images(zip: &mut ZipArchive<UnifiedReader>, sheet_path: &str) -> Result<Vec<ImageSource>, TableScoutError> {
    let mut cells = Vec::<(String, usize)>::new();
    if let Some(mut reader) = zip.xml_reader(sheet_path)? {
        match_xml_events!(reader => {
            Event::Start(event) if event.name() == TAG_CELL => {
                if let Some(metadata) = event.parse_attribute::<usize>("vm")? {
                    let reference = event.attribute("r")?.unwrap_or_default();
                    cells.push((reference.to_string(), metadata));
                }
            }
        });
    }
    if cells.is_empty() {
        return Ok(Vec::new());
    }

    let rich_values = load_rich_value_relation_indexes(zip)?;
    let relation_ids = load_rich_value_relation_ids(zip)?;
    let targets = load_relationships(zip, RICH_VALUE_RELATIONS_PART, "/image")?;
    let sources = cells
        .into_iter()
        .filter_map(|(cell, metadata)| {
            let relation = (*rich_values.get(metadata.checked_sub(1)?)?)?;
            let part = targets.get(relation_ids.get(relation)?)?;
            Some(ImageSource::EmbeddedImage { cell, part: part.to_owned() })
        })
        .collect();
    Ok(sources)
}

/// First value of every rich value record, which holds the relation index of local images
fn load_rich_value_relation_indexes(zip: &mut ZipArchive<UnifiedReader>) -> Result<Vec<Option<usize>>, TableScoutError> {
    let mut indexes = Vec::new();
    let mut reader = match zip.xml_reader(RICH_VALUE_PART)? {
        Some(reader) => reader,
        None => return Ok(indexes),
    };
    let mut first = None::<usize>;
    let mut value_count = 0usize;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_RICH_VALUE => {
            first = None;
            value_count = 0;
        }
        Event::Start(event) if event.name() == TAG_VALUE => {
            let text = read_string_value(&mut reader, TAG_VALUE, true)?;
            if value_count == 0 {
                first = text.trim().parse().ok();
            }
            value_count += 1;
        }
        Event::End(event) if event.name() == TAG_RICH_VALUE => indexes.push(first),
    });
    Ok(indexes)
}

/// Relationship IDs of the rich value relations, in order
fn load_rich_value_relation_ids(zip: &mut ZipArchive<UnifiedReader>) -> Result<Vec<String>, TableScoutError> {
    let mut ids = Vec::new();
    let mut reader = match zip.xml_reader(RICH_VALUE_RELATIONS_PART)? {
        Some(reader) => reader,
        None => return Ok(ids),
    };
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == LOCAL_RICH_VALUE_RELATION => {
            ids.push(event.local_attribute("id")?.unwrap_or_default().to_string());
        }
    });
    Ok(ids)
}
