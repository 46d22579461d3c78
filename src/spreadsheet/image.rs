//! Pictures found in workbook sheets.
//!
//! Each [`ImageSource`] variant describes one way a picture can be attached to a
//! sheet and knows how to pull its bytes out of the package.

use crate::error::PartialResult;
use crate::error::RecoveredError;
use crate::helpers::zip::ZipHelper;
use sha2::Digest;
use sha2::Sha256;
use std::collections::HashSet;
use std::fmt::Display;
use std::io::Read;
use std::io::Seek;
use thiserror::Error;
use zip::ZipArchive;

/// Errors raised while extracting a single image.
#[derive(Error, Debug, Clone, PartialEq)]
pub(crate) enum ImageError {
    #[error("Image part '{0}' not found")]
    MissingPartError(String),

    #[error("Read image part '{0}' failed: {1}")]
    ReadError(String, String),

    #[error("Unrecognized image data in '{0}'")]
    UnknownFormatError(String),
}

/// Where a picture comes from.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum ImageSource {
    /// Picture anchored in a drawing part
    DrawingImage { part: String },
    /// Picture placed inside a cell
    EmbeddedImage { cell: String, part: String },
    /// Picture used as the fill of a shape
    ShapeImage { part: String },
}

impl ImageSource {
    /// Path of the media part inside the package.
    pub(crate) fn part(&self) -> &str {
        match self {
            ImageSource::DrawingImage { part }
            | ImageSource::EmbeddedImage { part, .. }
            | ImageSource::ShapeImage { part } => part,
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            ImageSource::DrawingImage { .. } => "drawing",
            ImageSource::EmbeddedImage { .. } => "embedded",
            ImageSource::ShapeImage { .. } => "shape",
        }
    }

    /// Reads the raw image bytes from the package.
    pub(crate) fn extract<RS: Read + Seek>(&self, zip: &mut ZipArchive<RS>) -> Result<Vec<u8>, ImageError> {
        let part = self.part();
        match zip.read_bytes(part) {
            Ok(Some(bytes)) => Ok(bytes),
            Ok(None) => Err(ImageError::MissingPartError(part.to_owned())),
            Err(error) => Err(ImageError::ReadError(part.to_owned(), error.to_string())),
        }
    }
}

/// Image formats recognized from their leading bytes.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Bmp,
    Tiff,
    WebP,
    Emf,
    Wmf,
}

impl ImageFormat {
    /// Detects the format from magic bytes.
    pub(crate) fn detect(data: &[u8]) -> Option<ImageFormat> {
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            Some(ImageFormat::Png)
        } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageFormat::Jpeg)
        } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            Some(ImageFormat::Gif)
        } else if data.starts_with(b"BM") {
            Some(ImageFormat::Bmp)
        } else if data.starts_with(&[0x49, 0x49, 0x2A, 0x00]) || data.starts_with(&[0x4D, 0x4D, 0x00, 0x2A]) {
            Some(ImageFormat::Tiff)
        } else if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            Some(ImageFormat::WebP)
        } else if data.len() >= 44 && data.starts_with(&[0x01, 0x00, 0x00, 0x00]) && &data[40..44] == b" EMF" {
            Some(ImageFormat::Emf)
        } else if data.starts_with(&[0xD7, 0xCD, 0xC6, 0x9A])
            || data.starts_with(&[0x01, 0x00, 0x09, 0x00])
            || data.starts_with(&[0x02, 0x00, 0x09, 0x00])
        {
            Some(ImageFormat::Wmf)
        } else {
            None
        }
    }

    pub(crate) fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Gif => "gif",
            ImageFormat::Bmp => "bmp",
            ImageFormat::Tiff => "tiff",
            ImageFormat::WebP => "webp",
            ImageFormat::Emf => "emf",
            ImageFormat::Wmf => "wmf",
        }
    }
}

impl Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// An image extracted from one sheet.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct SheetImage {
    pub(crate) sheet: String,
    pub(crate) source: ImageSource,
    pub(crate) format: ImageFormat,
    /// Lower-case hex SHA-256 of the bytes
    pub(crate) digest: String,
    pub(crate) bytes: Vec<u8>,
}

impl SheetImage {
    /// Extracts the bytes of `source`, detects their format and fingerprints them.
    pub(crate) fn load<RS: Read + Seek>(
        sheet: &str,
        source: ImageSource,
        zip: &mut ZipArchive<RS>,
    ) -> Result<SheetImage, ImageError> {
        let bytes = source.extract(zip)?;
        let format = ImageFormat::detect(&bytes)
            .ok_or_else(|| ImageError::UnknownFormatError(source.part().to_owned()))?;
        let digest = format!("{:x}", Sha256::digest(&bytes));
        Ok(SheetImage {
            sheet: sheet.to_owned(),
            source,
            format,
            digest,
            bytes,
        })
    }
}

/// Loads every source of a sheet, turning each failure into a warning.
pub(crate) fn load_images<RS: Read + Seek>(
    sheet: &str,
    sources: Vec<ImageSource>,
    zip: &mut ZipArchive<RS>,
) -> PartialResult<SheetImage> {
    let mut result = PartialResult::default();
    for source in sources {
        let path = source.part().to_owned();
        match SheetImage::load(sheet, source, zip) {
            Ok(image) => result.items.push(image),
            Err(error) => result.warn(RecoveredError::ImageExtraction {
                sheet: sheet.to_owned(),
                path,
                message: error.to_string(),
            }),
        }
    }
    result
}

/// Drops images whose content already appeared earlier in the same sheet.
pub(crate) fn dedup_images(images: Vec<SheetImage>) -> Vec<SheetImage> {
    let mut seen = HashSet::<(String, String)>::new();
    images
        .into_iter()
        .filter(|image| seen.insert((image.sheet.to_owned(), image.digest.to_owned())))
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::helpers::zip::tests::build_archive;
    use std::io::Cursor;

    /// Smallest byte strings that pass format detection.
    pub(crate) const PNG_BYTES: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x01];
    pub(crate) const JPEG_BYTES: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];

    #[test]
    fn detect_formats() {
        assert_eq!(ImageFormat::detect(PNG_BYTES), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::detect(JPEG_BYTES), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::detect(b"GIF89a...."), Some(ImageFormat::Gif));
        assert_eq!(ImageFormat::detect(b"RIFF\x00\x00\x00\x00WEBPVP8 "), Some(ImageFormat::WebP));
        assert_eq!(ImageFormat::detect(&[0xD7, 0xCD, 0xC6, 0x9A, 0x00]), Some(ImageFormat::Wmf));
        let mut emf = vec![0x01, 0x00, 0x00, 0x00];
        emf.resize(40, 0);
        emf.extend_from_slice(b" EMF");
        assert_eq!(ImageFormat::detect(&emf), Some(ImageFormat::Emf));
        assert_eq!(ImageFormat::detect(b"plain text"), None);
        assert_eq!(ImageFormat::Jpeg.to_string(), "jpeg");
    }

    #[test]
    fn load_and_dedup_images() {
        let bytes = build_archive(&[
            ("xl/media/image1.png", PNG_BYTES),
            ("xl/media/image2.png", PNG_BYTES),
            ("xl/media/notes.txt", b"not an image".as_slice()),
        ]);
        let mut zip = ZipArchive::new(Cursor::new(bytes)).unwrap();

        let first = SheetImage::load(
            "Sheet1",
            ImageSource::DrawingImage { part: "xl/media/image1.png".to_owned() },
            &mut zip,
        )
        .unwrap();
        assert_eq!(first.format, ImageFormat::Png);
        assert_eq!(first.digest.len(), 64);

        let second = SheetImage::load(
            "Sheet1",
            ImageSource::ShapeImage { part: "xl/media/image2.png".to_owned() },
            &mut zip,
        )
        .unwrap();
        let mut other_sheet = second.clone();
        other_sheet.sheet = "Sheet2".to_owned();

        let images = dedup_images(vec![first.clone(), second, other_sheet]);
        assert_eq!(images.len(), 2);
        assert_eq!(images[0], first);
        assert_eq!(images[1].sheet, "Sheet2");

        let partial = load_images(
            "Sheet1",
            vec![
                ImageSource::DrawingImage { part: "xl/media/image1.png".to_owned() },
                ImageSource::DrawingImage { part: "xl/media/missing.png".to_owned() },
            ],
            &mut zip,
        );
        assert_eq!(partial.items.len(), 1);
        assert_eq!(partial.warnings.len(), 1);
        assert!(matches!(&partial.warnings[0], RecoveredError::ImageExtraction { path, .. } if path == "xl/media/missing.png"));

        let unknown = ImageSource::DrawingImage { part: "xl/media/notes.txt".to_owned() };
        assert_eq!(
            SheetImage::load("Sheet1", unknown, &mut zip),
            Err(ImageError::UnknownFormatError("xl/media/notes.txt".to_owned()))
        );
        let missing = ImageSource::EmbeddedImage { cell: "B2".to_owned(), part: "xl/media/gone.png".to_owned() };
        assert_eq!(missing.kind(), "embedded");
        assert_eq!(
            SheetImage::load("Sheet1", missing, &mut zip),
            Err(ImageError::MissingPartError("xl/media/gone.png".to_owned()))
        );
    }
}
