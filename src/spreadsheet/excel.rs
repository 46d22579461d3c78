//! Microsoft Office Open XML package helpers
use crate::error::TableScoutError;
use crate::helpers::reader::UnifiedReader;
use crate::helpers::xml::ElementAttributes;
use crate::helpers::zip::resolve_part_path;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::cell::DateSystem;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use std::collections::HashMap;
use zip::ZipArchive;

/// XML tag name for relationship elements in Excel files
const TAG_RELATIONSHIP: &[u8] = b"Relationship";

/// Opens the zip container of an OOXML workbook
///
/// Encrypted workbooks are stored inside an OLE compound file rather than a zip
/// archive, so the container signature is checked first.
pub(super) fn open_package(file_name: &str, mut reader: UnifiedReader) -> Result<ZipArchive<UnifiedReader>, TableScoutError> {
    if reader.is_compound_file()? {
        Err(SpreadsheetError::PasswordProtectedError(file_name.to_owned()))?;
    }
    ZipArchive::new(reader).map_err(|_| SpreadsheetError::FileFormatError(file_name.to_owned()).into())
}

/// Path of the relationships part that belongs to `part`
///
/// `xl/worksheets/sheet1.xml` gives `xl/worksheets/_rels/sheet1.xml.rels`.
pub(super) fn relationships_path(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((directory, file_name)) => format!("{directory}/_rels/{file_name}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

/// Loads the relationships of `part` whose type ends with `kind`
///
/// # Arguments
/// * `zip` - Zip archive handle
/// * `part` - Path of the part owning the relationships
/// * `kind` - Relationship type suffix such as `/worksheet` or `/image`
///
/// # Returns
/// Mapping of relationship IDs to resolved part paths; external targets are skipped
pub(super) fn load_relationships(
    zip: &mut ZipArchive<UnifiedReader>,
    part: &str,
    kind: &str,
) -> Result<HashMap<String, String>, TableScoutError> {
    let mut relationships: HashMap<String, String> = HashMap::new();
    let mut reader = match zip.xml_reader(&relationships_path(part))? {
        Some(reader) => reader,
        None => return Ok(relationships),
    };
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_RELATIONSHIP => {
            let id = event.attribute("Id")?;
            let relationship_type = event.attribute("Type")?;
            let target = event.attribute("Target")?;
            let is_external = event.attribute("TargetMode")?
                .map(|mode| mode.eq_ignore_ascii_case("External"))
                .unwrap_or(false);
            if !is_external && relationship_type.map(|it| it.ends_with(kind)).unwrap_or(false) {
                if let Some((id, target)) = id.zip(target) {
                    relationships.insert(id.to_string(), resolve_part_path(part, &target));
                }
            }
        }
    });
    Ok(relationships)
}

/// Maps format indexes to cell types using custom and built-in formats
///
/// # Arguments
/// * `format_indexes` - List of format identifiers
/// * `custom_formats` - Custom format mappings defined in the workbook
/// * `system` - Date system of the workbook
///
/// # Returns
/// Vector of cell types corresponding to each format index
pub(super) fn load_number_formats(
    format_indexes: Vec<String>,
    custom_formats: HashMap<String, CellType>,
    system: DateSystem,
) -> Vec<CellType> {
    format_indexes
        .iter()
        .map(|id| {
            custom_formats
                .get(id)
                .copied()
                .or_else(|| CellType::parse_builtin_number_format_id(id, system))
                .unwrap_or(CellType::Number)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::zip::tests::build_archive;

    #[test]
    fn load_typed_relationships() -> Result<(), TableScoutError> {
        let rels = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/drawing" Target="../drawings/drawing1.xml"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com" TargetMode="External"/>
  <Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="/xl/media/image9.png"/>
</Relationships>"#;
        let bytes = build_archive(&[("xl/worksheets/_rels/sheet1.xml.rels", rels.as_bytes())]);
        let mut zip = ZipArchive::new(UnifiedReader::from_bytes(bytes))?;

        let drawings = load_relationships(&mut zip, "xl/worksheets/sheet1.xml", "/drawing")?;
        assert_eq!(drawings.len(), 1);
        assert_eq!(drawings["rId1"], "xl/drawings/drawing1.xml");

        let images = load_relationships(&mut zip, "xl/worksheets/sheet1.xml", "/image")?;
        assert_eq!(images["rId3"], "xl/media/image9.png");

        let none = load_relationships(&mut zip, "xl/worksheets/sheet2.xml", "/drawing")?;
        assert!(none.is_empty());
        Ok(())
    }

    #[test]
    fn relationship_paths() {
        assert_eq!(relationships_path("xl/workbook.xml"), "xl/_rels/workbook.xml.rels");
        assert_eq!(relationships_path("xl/drawings/drawing1.xml"), "xl/drawings/_rels/drawing1.xml.rels");
    }

    #[test]
    fn map_number_formats() {
        let mut custom = HashMap::new();
        custom.insert("164".to_owned(), CellType::NumberTime);
        let formats = load_number_formats(
            vec!["0".to_owned(), "14".to_owned(), "164".to_owned()],
            custom,
            DateSystem::V1904,
        );
        assert_eq!(formats, vec![CellType::Number, CellType::NumberDate(DateSystem::V1904), CellType::NumberTime]);
    }

    #[test]
    fn reject_non_zip_content() {
        let result = open_package("book.xlsx", UnifiedReader::from_bytes(b"just text".to_vec()));
        assert!(matches!(
            result,
            Err(TableScoutError::SpreadsheetError(SpreadsheetError::FileFormatError(_)))
        ));
    }
}
