use crate::error::PartialResult;
use crate::error::TableScoutError;
use crate::helpers::reader::UnifiedReader;
use crate::helpers::xml::ElementAttributes;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlText;
use crate::helpers::zip::resolve_part_path;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::cell::Value;
use crate::spreadsheet::grid::Grid;
use crate::spreadsheet::grid::GridBuilder;
use crate::spreadsheet::image::load_images;
use crate::spreadsheet::image::ImageSource;
use crate::spreadsheet::image::SheetImage;
use crate::spreadsheet::range::Range;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::io::BufReader;
use thiserror::Error;
use zip::read::ZipFile;
use zip::ZipArchive;

/// ODS file MIME type identifier
const MIME_TYPE: &str = "application/vnd.oasis.opendocument.spreadsheet";
/// Part holding every sheet of the document
const CONTENT_PART: &str = "content.xml";
/// XML element name for spreadsheet root
const SPREADSHEET: QName = QName(b"office:spreadsheet");
/// XML element name for table (sheet)
const TABLE: QName = QName(b"table:table");
/// XML element name for table row
const TABLE_ROW: QName = QName(b"table:table-row");
/// XML element name for table cell
const TABLE_CELL: QName = QName(b"table:table-cell");
/// XML element name for covered table cell (merged cells)
const TABLE_COVERED_CELL: QName = QName(b"table:covered-table-cell");
/// XML element name for annotations (comments)
const ANNOTATION: QName = QName(b"office:annotation");
/// XML element name for paragraph text
const PARAGRAPH: QName = QName(b"text:p");
/// XML element name for string (space) text
const STRING: QName = QName(b"text:s");
/// XML element name for pictures inside frames
const IMAGE: QName = QName(b"draw:image");

/// Error types specific to ODS spreadsheet processing
#[derive(Error, Debug)]
pub(crate) enum OdsError {
    /// Invalid ODS MIME type detected in file
    #[error("Invalid ODS MIME type")]
    MimeTypeError,
}

type ContentReader<'a> = XmlReader<BufReader<ZipFile<'a, UnifiedReader>>>;

/// ODS spreadsheet handler for reading OpenDocument Spreadsheet files
pub(crate) struct OdsSpreadsheet {
    /// Name of the ODS file
    name: String,
    /// ZIP archive containing the ODS file contents
    zip: ZipArchive<UnifiedReader>,
    /// Table names in document order
    sheets: Vec<String>,
}

impl OdsSpreadsheet {
    /// Opens an ODS document, validates its format and lists its tables
    pub(crate) fn open(file_name: &str, reader: UnifiedReader) -> Result<Self, TableScoutError> {
        let mut zip = ZipArchive::new(reader)
            .map_err(|_| SpreadsheetError::FileFormatError(file_name.to_owned()))?;
        check_mime(&mut zip)?;
        if is_password_protected(&mut zip)? {
            Err(SpreadsheetError::PasswordProtectedError(file_name.to_owned()))?;
        }
        let sheets = load_sheet_names(&mut zip)?
            .ok_or_else(|| SpreadsheetError::FileFormatError(file_name.to_owned()))?;
        Ok(OdsSpreadsheet {
            name: file_name.to_owned(),
            zip,
            sheets,
        })
    }

    /// Opens content.xml positioned right after the start of the named table
    fn table_reader(&mut self, sheet_name: &str) -> Result<ContentReader<'_>, TableScoutError> {
        let mut reader = self.zip
            .xml_reader(CONTENT_PART)?
            .ok_or_else(|| SpreadsheetError::FileError(CONTENT_PART.to_owned()))?;
        let mut found = false;
        match_xml_events!(reader => {
            Event::End(event) if event.name() == SPREADSHEET => break,
            Event::Start(event) if event.name() == TABLE => {
                if event.attribute("table:name")?.map(|name| name == sheet_name).unwrap_or(false) {
                    found = true;
                    break;
                }
            }
        });
        if found {
            Ok(reader)
        } else {
            Err(SpreadsheetError::SheetNotFoundError(self.name.to_owned(), sheet_name.to_owned()).into())
        }
    }
}

impl Spreadsheet for OdsSpreadsheet {
    fn name(&self) -> &str {
        &self.name
    }

    fn sheet_names(&self) -> Vec<String> {
        self.sheets.to_owned()
    }

    /// Reads one table into a grid, expanding repeated rows and columns
    fn read_grid(&mut self, sheet_name: &str, range: Option<Range>) -> Result<Grid, TableScoutError> {
        let file_name = self.name.to_owned();
        let range = range.unwrap_or_default();
        let mut reader = self.table_reader(sheet_name)?;
        let mut builder = GridBuilder::new(range.col_lower_bound.unwrap_or(0));

        // Cell information
        let mut row = 0usize;
        let mut col = 0usize;
        let mut row_count = 0usize;
        let mut col_count = 0usize;
        let mut kind = CellType::default();
        let mut value = String::new();
        // Context information
        let mut element_context = false; // whether child text is read
        let mut comment_context = false; // whether inside an annotation
        match_xml_events!(reader => {
            Event::End(event) if event.name() == TABLE => break,
            Event::Start(event) if event.name() == TABLE_ROW => {
                row_count = event.parse_attribute("table:number-rows-repeated")?.unwrap_or(1);
                col = 0;
            }
            Event::End(event) if event.name() == TABLE_ROW => {
                row += row_count;
                if range.after_row_upper_bound(row) {
                    break;
                }
            }
            Event::Start(event) if event.name() == TABLE_CELL || event.name() == TABLE_COVERED_CELL => {
                value.clear();
                col_count = event.parse_attribute::<usize>("table:number-columns-repeated")?.unwrap_or(1);
                kind = match event.attribute("office:value-type")? {
                    Some(value_type) => match value_type.as_ref() {
                        "boolean" => CellType::Boolean,
                        "date" => CellType::IsoDateTime,
                        "time" => CellType::IsoDuration,
                        "string" => if event.attribute("calcext:value-type")?.map(|cow| cow == "error").unwrap_or(false) {
                            CellType::Error
                        } else {
                            CellType::InlineString
                        },
                        _ => CellType::Number,
                    },
                    None => CellType::Empty,
                };

                match kind {
                    CellType::InlineString | CellType::Error => element_context = true,
                    CellType::Boolean => if event.attribute("office:boolean-value")?.map(|cow| cow != "false" && cow != "0").unwrap_or(false) {
                        value.push('1');
                    } else {
                        value.push('0');
                    },
                    CellType::IsoDateTime => if let Some(data) = event.attribute("office:date-value")? {
                        value.push_str(&data);
                    },
                    CellType::IsoDuration => if let Some(data) = event.attribute("office:time-value")? {
                        value.push_str(&data);
                    },
                    CellType::Number => if let Some(data) = event.attribute("office:value")? {
                        value.push_str(&data);
                    },
                    _ => (),
                }
            }
            Event::End(event) if event.name() == TABLE_CELL || event.name() == TABLE_COVERED_CELL => {
                if kind != CellType::Empty {
                    let decoded = Value::parse(kind, &value).map_err(|message| SpreadsheetError::CellValueError(
                        file_name.to_owned(),
                        sheet_name.to_owned(),
                        index_to_reference(row, col),
                        message,
                    ))?;
                    for row_number in row..row + row_count {
                        if range.after_row_upper_bound(row_number) {
                            break;
                        }
                        for col_number in col..col + col_count {
                            if range.contains(row_number, col_number) {
                                builder.push(row_number, col_number, decoded.clone());
                            }
                        }
                    }
                }
                col += col_count;
                kind = CellType::default();
                element_context = false;
                comment_context = false;
            }
            // String content
            Event::Start(event) if element_context && event.name() == ANNOTATION => comment_context = true,
            Event::End(event) if element_context && comment_context && event.name() == ANNOTATION => comment_context = false,
            Event::Start(event) if element_context && !comment_context && event.name() == PARAGRAPH => {
                if !value.is_empty() {
                    value.push('\n');
                }
            }
            Event::Start(event) if element_context && !comment_context && event.name() == STRING => {
                let count = event.parse_attribute("text:c")?.unwrap_or(1);
                for _ in 0..count {
                    value.push(' ');
                }
            }
            Event::Text(event) if element_context && !comment_context => value.push_text(&event)?,
            Event::GeneralRef(event) if element_context && !comment_context => value.push_reference(&event)?,
        });
        Ok(builder.finish())
    }

    /// Collects the pictures framed inside one table
    fn read_images(&mut self, sheet_name: &str) -> Result<PartialResult<SheetImage>, TableScoutError> {
        let mut sources = Vec::new();
        let mut reader = self.table_reader(sheet_name)?;
        match_xml_events!(reader => {
            Event::End(event) if event.name() == TABLE => break,
            Event::Start(event) if event.name() == IMAGE => {
                if let Some(href) = event.attribute("xlink:href")? {
                    if !UnifiedReader::is_remote_url(&href) {
                        let part = resolve_part_path(CONTENT_PART, &href);
                        sources.push(ImageSource::DrawingImage { part });
                    }
                }
            }
        });
        drop(reader);
        tracing::debug!("{}: {} image sources in sheet '{sheet_name}'", self.name, sources.len());
        Ok(load_images(sheet_name, sources, &mut self.zip))
    }
}

/// Validates that the ZIP archive contains a valid ODS file by checking MIME type
fn check_mime(zip: &mut ZipArchive<UnifiedReader>) -> Result<(), TableScoutError> {
    if let Some(bytes) = zip.read_bytes("mimetype")? {
        if std::str::from_utf8(&bytes)?.trim() != MIME_TYPE {
            Err(OdsError::MimeTypeError)?;
        }
    }
    Ok(())
}

/// Checks if the ODS file is password protected by examining the manifest
fn is_password_protected(zip: &mut ZipArchive<UnifiedReader>) -> Result<bool, TableScoutError> {
    let mut reader = match zip.xml_reader("META-INF/manifest.xml")? {
        Some(reader) => reader,
        None => return Ok(false),
    };
    let mut in_file_entry = false;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == QName(b"manifest:file-entry") => in_file_entry = true,
        Event::End(event) if event.name() == QName(b"manifest:file-entry") => in_file_entry = false,
        Event::Start(event) if in_file_entry && event.name() == QName(b"manifest:encryption-data") => {
            return Ok(true);
        }
    });
    Ok(false)
}

/// Lists table names in document order, `None` when content.xml is missing
fn load_sheet_names(zip: &mut ZipArchive<UnifiedReader>) -> Result<Option<Vec<String>>, TableScoutError> {
    let mut reader = match zip.xml_reader(CONTENT_PART)? {
        Some(reader) => reader,
        None => return Ok(None),
    };
    let mut sheets = Vec::new();
    match_xml_events!(reader => {
        Event::End(event) if event.name() == SPREADSHEET => break,
        Event::Start(event) if event.name() == TABLE => {
            if let Some(name) = event.attribute("table:name")? {
                sheets.push(name.to_string());
            }
        }
    });
    Ok(Some(sheets))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::helpers::zip::tests::build_archive;
    use crate::spreadsheet::image::tests::PNG_BYTES;
    use crate::spreadsheet::open_spreadsheet_bytes;

    /// Builds an ods package from a `<office:spreadsheet>` body plus extra parts.
    pub(crate) fn build_document(body: &str, extra: &[(&str, &[u8])]) -> Vec<u8> {
        let content = format!(
            r#"<office:document-content xmlns:office="o" xmlns:table="t" xmlns:text="x" xmlns:draw="d" xmlns:xlink="l"><office:body><office:spreadsheet>{body}</office:spreadsheet></office:body></office:document-content>"#
        );
        let mut files: Vec<(&str, &[u8])> = vec![
            ("mimetype", MIME_TYPE.as_bytes()),
            ("content.xml", content.as_bytes()),
        ];
        files.extend_from_slice(extra);
        build_archive(&files)
    }

    #[test]
    fn read_typed_cells() -> Result<(), TableScoutError> {
        let body = r#"
            <table:table table:name="Empty"/>
            <table:table table:name="Data">
              <table:table-row table:number-rows-repeated="2"><table:table-cell table:number-columns-repeated="3"/></table:table-row>
              <table:table-row>
                <table:table-cell/>
                <table:table-cell office:value-type="string"><text:p>Fish<text:s text:c="2"/>&amp; Chips</text:p><text:p>Co</text:p></table:table-cell>
                <table:table-cell office:value-type="float" office:value="3.5" table:number-columns-repeated="2"/>
                <table:table-cell office:value-type="boolean" office:boolean-value="true"/>
                <table:table-cell office:value-type="date" office:date-value="2024-02-29"/>
                <table:table-cell office:value-type="time" office:time-value="PT08H15M00S"/>
                <table:table-cell office:value-type="string" calcext:value-type="error"><text:p>#N/A</text:p></table:table-cell>
                <table:table-cell office:value-type="string"><office:annotation><text:p>note</text:p></office:annotation></table:table-cell>
              </table:table-row>
              <table:table-row table:number-rows-repeated="2">
                <table:table-cell office:value-type="percentage" office:value="0.25"/>
              </table:table-row>
            </table:table>"#;
        let mut spreadsheet = open_spreadsheet_bytes("book.ods", build_document(body, &[]))?;
        assert_eq!(spreadsheet.sheet_names(), vec!["Empty".to_owned(), "Data".to_owned()]);

        let grid = spreadsheet.read_grid("Data", None)?;
        assert_eq!(grid.height(), 5);
        assert_eq!(grid.get(0, 0), &Value::Missing);
        assert_eq!(grid.get(2, 0), &Value::Missing);
        assert_eq!(grid.text(2, 1), "Fish  & Chips\nCo");
        assert_eq!(grid.get(2, 2), &Value::Number(3.5));
        assert_eq!(grid.get(2, 3), &Value::Number(3.5));
        assert_eq!(grid.get(2, 4), &Value::Boolean(true));
        assert_eq!(grid.text(2, 5), "2024-02-29");
        assert_eq!(grid.text(2, 6), "08:15:00");
        assert_eq!(grid.get(2, 7), &Value::Error("#N/A".to_owned()));
        assert_eq!(grid.get(2, 8), &Value::Text(String::new()));
        assert_eq!(grid.get(3, 0), &Value::Number(0.25));
        assert_eq!(grid.get(4, 0), &Value::Number(0.25));

        let grid = spreadsheet.read_grid("Data", Some(Range::try_from("C3:D3")?))?;
        assert_eq!(grid.height(), 3);
        assert_eq!(grid.get(2, 1), &Value::Missing);
        assert_eq!(grid.get(2, 3), &Value::Number(3.5));
        assert_eq!(grid.width(), 4);
        assert_eq!(grid.columns(), 2..4);

        assert!(spreadsheet.read_grid("Empty", None)?.is_empty());
        assert!(matches!(
            spreadsheet.read_grid("Missing", None),
            Err(TableScoutError::SpreadsheetError(SpreadsheetError::SheetNotFoundError(_, _)))
        ));
        Ok(())
    }

    #[test]
    fn reject_wrong_mime_type() {
        let bytes = build_archive(&[("mimetype", b"application/zip".as_slice())]);
        assert!(matches!(
            open_spreadsheet_bytes("book.ods", bytes),
            Err(TableScoutError::OdsError(OdsError::MimeTypeError))
        ));
    }

    #[test]
    fn detect_encrypted_document() {
        let manifest = r#"<manifest:manifest xmlns:manifest="m"><manifest:file-entry manifest:full-path="content.xml"><manifest:encryption-data/></manifest:file-entry></manifest:manifest>"#;
        let bytes = build_document("", &[("META-INF/manifest.xml", manifest.as_bytes())]);
        assert!(matches!(
            open_spreadsheet_bytes("book.ods", bytes),
            Err(TableScoutError::SpreadsheetError(SpreadsheetError::PasswordProtectedError(_)))
        ));
    }

    #[test]
    fn read_framed_images() -> Result<(), TableScoutError> {
        let body = r#"
            <table:table table:name="First">
              <table:table-row><table:table-cell>
                <draw:frame><draw:image xlink:href="Pictures/a.png"/></draw:frame>
                <draw:frame><draw:image xlink:href="https://example.com/remote.png"/></draw:frame>
              </table:table-cell></table:table-row>
            </table:table>
            <table:table table:name="Second">
              <table:shapes><draw:frame><draw:image xlink:href="./Pictures/b.png"/></draw:frame></table:shapes>
            </table:table>"#;
        let bytes = build_document(body, &[("Pictures/a.png", PNG_BYTES), ("Pictures/b.png", b"not a picture".as_slice())]);
        let mut spreadsheet = open_spreadsheet_bytes("book.ods", bytes)?;

        let first = spreadsheet.read_images("First")?;
        assert_eq!(first.items.len(), 1);
        assert_eq!(first.items[0].source, ImageSource::DrawingImage { part: "Pictures/a.png".to_owned() });
        assert!(first.warnings.is_empty());

        let second = spreadsheet.read_images("Second")?;
        assert!(second.items.is_empty());
        assert_eq!(second.warnings.len(), 1);
        Ok(())
    }
}
