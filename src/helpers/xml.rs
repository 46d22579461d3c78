//! Event-level access to the XML parts of a workbook package.
//!
//! Worksheets, shared strings, drawings and OpenDocument content are all read as
//! a stream of events through [`XmlReader`] and the [`match_xml_events!`] loop.

use crate::error::TableScoutError;
use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::BytesRef;
use quick_xml::events::BytesStart;
use quick_xml::events::BytesText;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::borrow::Cow;
use std::io::BufRead;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub(crate) enum XmlValueError {
    #[error("Unknown entity '&{0};' in cell text")]
    UnknownEntity(String),

    #[error("Attribute '{0}' has unexpected value '{1}'")]
    InvalidAttribute(String, String),
}

/// Streams the events of one package part.
///
/// Self-closing elements are reported as a start and an end event, so `<c r="A1"/>`
/// and `<c r="A1"></c>` read the same.
pub(crate) struct XmlReader<R: BufRead> {
    reader: Reader<R>,
    buffer: Vec<u8>,
}

impl<R: BufRead> XmlReader<R> {
    pub(crate) fn new(source: R) -> XmlReader<R> {
        let mut reader = Reader::from_reader(source);
        let config = reader.config_mut();
        config.check_comments = false;
        config.check_end_names = false;
        config.expand_empty_elements = true;
        config.trim_text(false);
        XmlReader {
            reader,
            buffer: Vec::with_capacity(1024),
        }
    }

    /// Next event, `None` at the end of the part.
    pub(crate) fn next(&'_ mut self) -> Result<Option<Event<'_>>, TableScoutError> {
        self.buffer.clear();
        match self.reader.read_event_into(&mut self.buffer)? {
            Event::Eof => Ok(None),
            event => Ok(Some(event)),
        }
    }
}

/// Attribute lookups on a start tag.
pub(crate) trait ElementAttributes<'a> {
    /// Unescaped value of the attribute with this qualified name
    fn attribute(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, TableScoutError>;

    /// Unescaped value of the attribute with this local name, whatever its prefix
    fn local_attribute(&'a self, local_name: &str) -> Result<Option<Cow<'a, str>>, TableScoutError>;

    fn parse_attribute<T: FromStr>(&'a self, name: &str) -> Result<Option<T>, TableScoutError>;
}

impl<'a> ElementAttributes<'a> for BytesStart<'a> {
    fn attribute(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, TableScoutError> {
        match self.try_get_attribute(name)? {
            Some(attribute) => Ok(Some(attribute.unescape_value()?)),
            None => Ok(None),
        }
    }

    fn local_attribute(&'a self, local_name: &str) -> Result<Option<Cow<'a, str>>, TableScoutError> {
        for result in self.attributes() {
            let attribute = result?;
            if attribute.key.local_name().as_ref() == local_name.as_bytes() {
                return Ok(Some(attribute.unescape_value()?));
            }
        }
        Ok(None)
    }

    fn parse_attribute<T: FromStr>(&'a self, name: &str) -> Result<Option<T>, TableScoutError> {
        let Some(value) = self.attribute(name)? else {
            return Ok(None);
        };
        value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| XmlValueError::InvalidAttribute(name.to_owned(), value.to_string()).into())
    }
}

/// Accumulates cell and string text across text and reference events.
pub(crate) trait XmlText {
    fn push_text(&mut self, text: &BytesText) -> Result<(), TableScoutError>;

    /// Appends a character reference (`&#x43;`) or a predefined entity (`&amp;`).
    fn push_reference(&mut self, reference: &BytesRef) -> Result<(), TableScoutError>;
}

impl XmlText for String {
    fn push_text(&mut self, text: &BytesText) -> Result<(), TableScoutError> {
        self.push_str(&text.xml_content()?);
        Ok(())
    }

    fn push_reference(&mut self, reference: &BytesRef) -> Result<(), TableScoutError> {
        let raw = reference.xml_content()?;
        match raw.strip_prefix('#') {
            Some(number) => {
                let code = match number.strip_prefix('x') {
                    Some(hex) => u32::from_str_radix(hex, 16)?,
                    None => number.parse::<u32>()?,
                };
                self.extend(char::from_u32(code));
            }
            None => {
                let entity = resolve_xml_entity(&raw).ok_or_else(|| XmlValueError::UnknownEntity(raw.to_string()))?;
                self.push_str(entity);
            }
        }
        Ok(())
    }
}

/// Runs the given match arms over every event of an [`XmlReader`]; unmatched
/// events are skipped and `break` leaves the loop early.
#[macro_export]
macro_rules! match_xml_events {
    ($reader:expr => { $($arms:tt)* }) => {
        while let Some(result) = $reader.next()? {
            match result {
                Event::Eof => break,
                $($arms)*
                _ => (),
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::match_xml_events;
    use quick_xml::name::QName;

    #[test]
    fn read_attributes_and_text() -> Result<(), TableScoutError> {
        let xml = r#"<root><a:blip xmlns:a="x" r:embed="rId7" count=" 3">Fish &amp; &#x43;hips</a:blip></root>"#;
        let mut reader = XmlReader::new(xml.as_bytes());
        let mut embed = None;
        let mut count = None;
        let mut text = String::new();
        match_xml_events!(reader => {
            Event::Start(event) if event.local_name().as_ref() == b"blip" => {
                embed = event.local_attribute("embed")?.map(|value| value.to_string());
                count = event.parse_attribute::<usize>("count")?;
            }
            Event::Text(event) => text.push_text(&event)?,
            Event::GeneralRef(event) => text.push_reference(&event)?,
            Event::End(event) if event.name() == QName(b"root") => break,
        });
        assert_eq!(embed.as_deref(), Some("rId7"));
        assert_eq!(count, Some(3));
        assert_eq!(text, "Fish & Chips");
        Ok(())
    }

    #[test]
    fn reject_bad_attribute_number() -> Result<(), TableScoutError> {
        let mut reader = XmlReader::new(r#"<c span="wide"/>"#.as_bytes());
        let mut parsed = None;
        match_xml_events!(reader => {
            Event::Start(event) => parsed = Some(event.parse_attribute::<usize>("span").map(|_| ())),
        });
        assert!(matches!(
            parsed,
            Some(Err(TableScoutError::XmlHelperError(XmlValueError::InvalidAttribute(_, _))))
        ));
        Ok(())
    }

    fn read_text(xml: &str) -> Result<String, TableScoutError> {
        let mut reader = XmlReader::new(xml.as_bytes());
        let mut text = String::new();
        match_xml_events!(reader => {
            Event::Text(event) => text.push_text(&event)?,
            Event::GeneralRef(event) => text.push_reference(&event)?,
        });
        Ok(text)
    }

    #[test]
    fn reject_unknown_entity() {
        assert_eq!(read_text("<root>&lt;ok&gt;</root>").unwrap(), "<ok>");
        assert!(read_text("<root>&nope;</root>").is_err());
    }
}
