//! Error types for the watermarking library

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the watermarking library
#[derive(Error, Debug)]
pub enum Error {
    /// Request is missing fields or its payload cannot be decoded
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// File type discriminator matches neither images nor PDFs
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// PDF processing error
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// PDF structure we cannot place a watermark on
    #[error("Invalid PDF: {0}")]
    InvalidPdf(String),

    /// Invalid PDF (no pages)
    #[error("PDF has no pages")]
    EmptyPdf,

    /// Raster decode/encode error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// A renderer finished but produced nothing
    #[error("Processing failed: output is empty")]
    EmptyOutput,

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// File not found
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Font error
    #[error("Font error: {0}")]
    Font(String),
}

/// What a renderer does when watermarking fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log the failure and hand back the untouched input
    RecoverWithOriginal,
    /// Return the error to the caller; no document is produced
    Propagate,
}

impl Error {
    /// Whether the failure is the caller's fault (bad request) rather than ours
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::MalformedRequest(_) | Error::UnsupportedFileType(_)
        )
    }
}
