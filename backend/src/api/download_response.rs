//! Download response helper for generated files.
//!
//! Exports are returned as attachments so browsers save them instead of
//! rendering them. CSV bodies get a UTF-8 byte order mark so spreadsheet
//! tools pick the right encoding for Cyrillic labels.

use axum::body::Body;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;

use crate::error::AppError;

pub const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// File body with its content type and attachment name
pub struct DownloadResponse {
    data: Bytes,
    content_type: &'static str,
    filename: String,
}

impl DownloadResponse {
    /// CSV attachment, prefixed with a byte order mark
    pub fn csv(body: String, filename: impl Into<String>) -> Self {
        let mut data = Vec::with_capacity(UTF8_BOM.len() + body.len());
        data.extend_from_slice(UTF8_BOM);
        data.extend_from_slice(body.as_bytes());
        Self {
            data: Bytes::from(data),
            content_type: CSV_CONTENT_TYPE,
            filename: filename.into(),
        }
    }

    /// Filename with everything but `[A-Za-z0-9._-]` replaced by `_`
    fn safe_filename(&self) -> String {
        self.filename
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }
}

impl IntoResponse for DownloadResponse {
    fn into_response(self) -> Response {
        let disposition = format!("attachment; filename=\"{}\"", self.safe_filename());
        Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, self.content_type)
            .header(CONTENT_LENGTH, self.data.len())
            .header(CONTENT_DISPOSITION, disposition)
            .body(Body::from(self.data))
            .unwrap_or_else(|e| {
                AppError::Internal(format!("Failed to build download: {}", e)).into_response()
            })
    }
}
