//! Request routing: derive the lines, pick the renderer, check the output

use std::path::Path;
use std::str::FromStr;

use tracing::{info, instrument, warn};

use crate::error::{Error, Result};
use crate::font::FontResource;
use crate::pdf::watermark_pdf;
use crate::raster::{watermark_image, ImageOutcome};
use crate::text::{split_lines, TextLines};

/// Extensions treated as raster images by [`FileType::from_path`]
const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "bmp", "tif", "tiff", "gif", "webp", "qoi", "tga",
];

/// Which renderer a document goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Image,
    Pdf,
}

impl FromStr for FileType {
    type Err = Error;

    /// Case-insensitive substring match, so MIME types like `image/png` and
    /// `application/pdf` are accepted as well as the bare words.
    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.to_lowercase();
        if lowered.contains("image") {
            Ok(FileType::Image)
        } else if lowered.contains("pdf") {
            Ok(FileType::Pdf)
        } else {
            Err(Error::UnsupportedFileType(s.to_string()))
        }
    }
}

impl FileType {
    /// Guess from a file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        if ext == "pdf" {
            Ok(FileType::Pdf)
        } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Ok(FileType::Image)
        } else {
            Err(Error::UnsupportedFileType(path.display().to_string()))
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Image => "image",
            FileType::Pdf => "pdf",
        }
    }
}

/// A document to watermark
#[derive(Debug, Clone)]
pub struct WatermarkRequest {
    pub document: Vec<u8>,
    pub file_type: FileType,
    /// Free-form identity text, split into two lines before rendering
    pub raw_text: String,
}

/// A watermarked document
#[derive(Debug, Clone)]
pub struct WatermarkResponse {
    pub document: Vec<u8>,
    pub lines: TextLines,
    /// False when an image could not be watermarked and came back unchanged
    pub watermark_applied: bool,
}

/// Routes requests to the image or PDF renderer with one shared font
#[derive(Debug, Clone)]
pub struct Watermarker {
    font: FontResource,
}

impl Watermarker {
    pub fn new(font: FontResource) -> Self {
        Self { font }
    }

    pub fn font(&self) -> &FontResource {
        &self.font
    }

    /// Watermark one document.
    ///
    /// Image failures are absorbed by the image renderer (the response then
    /// carries the original bytes with `watermark_applied == false`). PDF
    /// failures and empty output come back as errors.
    #[instrument(skip_all, fields(file_type = request.file_type.as_str(), input_len = request.document.len()))]
    pub fn apply(&self, request: &WatermarkRequest) -> Result<WatermarkResponse> {
        let lines = split_lines(&request.raw_text);

        let (document, watermark_applied) = match request.file_type {
            FileType::Image => {
                let output = watermark_image(&request.document, &lines, &self.font);
                (output.bytes, output.outcome == ImageOutcome::Watermarked)
            }
            FileType::Pdf => (watermark_pdf(&request.document, &lines, &self.font)?, true),
        };

        if document.is_empty() {
            return Err(Error::EmptyOutput);
        }

        if watermark_applied {
            info!(line1 = %lines.first, line2 = %lines.second, "watermark applied");
        } else {
            warn!(line1 = %lines.first, line2 = %lines.second, "document returned without watermark");
        }

        Ok(WatermarkResponse {
            document,
            lines,
            watermark_applied,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn watermarker() -> Watermarker {
        Watermarker::new(FontResource::bundled().unwrap())
    }

    #[test]
    fn test_file_type_parse() {
        assert_eq!("image".parse::<FileType>().unwrap(), FileType::Image);
        assert_eq!("IMAGE/PNG".parse::<FileType>().unwrap(), FileType::Image);
        assert_eq!("application/pdf".parse::<FileType>().unwrap(), FileType::Pdf);
        assert_eq!("PDF".parse::<FileType>().unwrap(), FileType::Pdf);
        assert!(matches!(
            "text/plain".parse::<FileType>(),
            Err(Error::UnsupportedFileType(t)) if t == "text/plain"
        ));
    }

    #[test]
    fn test_file_type_from_path() {
        assert_eq!(FileType::from_path(&PathBuf::from("scan.PDF")).unwrap(), FileType::Pdf);
        assert_eq!(FileType::from_path(&PathBuf::from("photo.jpeg")).unwrap(), FileType::Image);
        assert!(FileType::from_path(&PathBuf::from("notes.txt")).is_err());
        assert!(FileType::from_path(&PathBuf::from("no_extension")).is_err());
    }

    #[test]
    fn test_unreadable_image_comes_back_unchanged() {
        let request = WatermarkRequest {
            document: b"not an image".to_vec(),
            file_type: FileType::Image,
            raw_text: "Jane Doe, 555-123-4567".to_string(),
        };

        let response = watermarker().apply(&request).unwrap();
        assert_eq!(response.document, request.document);
        assert!(!response.watermark_applied);
        assert_eq!(response.lines.as_array(), ["Jane Doe", "555-123-4567"]);
    }

    #[test]
    fn test_unreadable_pdf_is_an_error() {
        let request = WatermarkRequest {
            document: b"not a pdf".to_vec(),
            file_type: FileType::Pdf,
            raw_text: "Jane Doe".to_string(),
        };

        let err = watermarker().apply(&request).unwrap_err();
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_empty_image_is_empty_output() {
        let request = WatermarkRequest {
            document: Vec::new(),
            file_type: FileType::Image,
            raw_text: "Jane Doe".to_string(),
        };

        assert!(matches!(watermarker().apply(&request), Err(Error::EmptyOutput)));
    }
}
