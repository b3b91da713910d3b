//! JSON request/response bodies
//!
//! The document travels base64-encoded. Errors are reported as
//! `{"error": "..."}` together with an HTTP-style status code: 400 when the
//! request itself is at fault, 500 for everything else.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::dispatch::{FileType, WatermarkRequest, WatermarkResponse, Watermarker};
use crate::error::{Error, Result};

/// Incoming body. Every field is optional here so that a missing field is
/// reported as a malformed request rather than a parse error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireRequest {
    pub document_base64: Option<String>,
    pub file_type: Option<String>,
    pub watermark_text: Option<String>,
}

/// Success body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireResponse {
    pub watermarked_base64: String,
    pub watermark_lines: [String; 2],
    pub watermark_applied: bool,
}

/// Failure body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl WireRequest {
    /// Parse a JSON body
    pub fn from_json(body: &str) -> Result<Self> {
        serde_json::from_str(body).map_err(|e| {
            Error::MalformedRequest(format!("Malformed or missing JSON payload in request body: {}", e))
        })
    }

    /// Validate fields and decode the document
    pub fn into_request(self) -> Result<WatermarkRequest> {
        let (Some(document_base64), Some(file_type), Some(watermark_text)) =
            (self.document_base64, self.file_type, self.watermark_text)
        else {
            return Err(Error::MalformedRequest(
                "Missing document_base64, file_type, or watermark_text fields".to_string(),
            ));
        };

        let file_type: FileType = file_type.parse()?;
        let document = STANDARD
            .decode(document_base64.trim())
            .map_err(|e| Error::MalformedRequest(format!("document_base64 is not valid base64: {}", e)))?;

        Ok(WatermarkRequest {
            document,
            file_type,
            raw_text: watermark_text,
        })
    }
}

impl From<WatermarkResponse> for WireResponse {
    fn from(response: WatermarkResponse) -> Self {
        let WatermarkResponse {
            document,
            lines,
            watermark_applied,
        } = response;

        Self {
            watermarked_base64: STANDARD.encode(document),
            watermark_lines: [lines.first, lines.second],
            watermark_applied,
        }
    }
}

/// HTTP-style status for an error
pub fn status_code(err: &Error) -> u16 {
    if err.is_client_error() {
        400
    } else {
        500
    }
}

/// Message shown to the caller for an error
fn error_message(err: &Error) -> String {
    match err {
        e if e.is_client_error() => e.to_string(),
        Error::EmptyOutput => err.to_string(),
        e => format!("Server failed to process the file: {}", e),
    }
}

/// Handle one JSON request end to end, returning the status and JSON body
pub fn handle_json(watermarker: &Watermarker, body: &str) -> (u16, String) {
    let result = WireRequest::from_json(body)
        .and_then(WireRequest::into_request)
        .and_then(|request| watermarker.apply(&request))
        .and_then(|response| serde_json::to_string(&WireResponse::from(response)).map_err(Error::from));

    match result {
        Ok(json) => (200, json),
        Err(err) => {
            let status = status_code(&err);
            error!(status, error = %err, "request failed");
            let body = ErrorBody {
                error: error_message(&err),
            };
            // A struct holding one String always serializes
            let json = serde_json::to_string(&body)
                .unwrap_or_else(|_| r#"{"error":"internal error"}"#.to_string());
            (status, json)
        }
    }
}
