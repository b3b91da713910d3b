//! Document watermarking library
//!
//! Burns a two-line identity watermark ("name" over "phone number", or
//! whatever the caller's text splits into) into documents:
//! - Derive the two lines from free-form text ([`text`])
//! - Resolve the watermark font once at startup ([`font`])
//! - Watermark raster images, falling back to the original bytes on failure ([`raster`])
//! - Watermark every page of a PDF, reporting failures to the caller ([`pdf`])
//! - Route requests and speak the JSON wire format ([`dispatch`], [`wire`])
//!
//! # Example
//!
//! ```no_run
//! use doc_watermark::{FileType, FontResource, WatermarkRequest, Watermarker};
//!
//! let font = FontResource::bundled().expect("bundled font");
//! let watermarker = Watermarker::new(font);
//!
//! let request = WatermarkRequest {
//!     document: std::fs::read("contract.pdf").expect("read input"),
//!     file_type: FileType::Pdf,
//!     raw_text: "Jane Doe, 555-123-4567".to_string(),
//! };
//!
//! let response = watermarker.apply(&request).expect("watermark");
//! std::fs::write("contract-marked.pdf", response.document).expect("write output");
//! ```

pub mod dispatch;
pub mod error;
pub mod font;
pub mod pdf;
pub mod raster;
pub mod style;
pub mod text;
pub mod wire;

// Re-export commonly used items
pub use dispatch::{FileType, WatermarkRequest, WatermarkResponse, Watermarker};
pub use error::{Error, FailurePolicy, Result};
pub use font::FontResource;
pub use text::{split_lines, TextLines};
