//! Utility functions for REST API handlers.

use axum::extract::multipart::{Field, MultipartError};
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;

use crate::api::error::{missing_field, ApiError, ErrorCode};

/// Turn a JSON extractor rejection into the structured error body.
pub fn bad_json(rejection: JsonRejection) -> ApiError {
    ApiError::new(ErrorCode::InvalidRequestBody, rejection.body_text())
}

/// Map a multipart read failure, reporting oversized bodies as 413.
pub fn bad_multipart(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::new(ErrorCode::PayloadTooLarge, "Uploaded file is too large")
    } else {
        ApiError::new(ErrorCode::InvalidRequestBody, err.body_text())
    }
}

/// Trimmed, non-empty value of a required field.
pub fn required(field: &str, value: Option<String>) -> Result<String, ApiError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| missing_field(field))
}

/// An uploaded file read from a multipart form.
#[derive(Debug, Clone, Default)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Read a multipart field as a file.
pub async fn read_file(field: Field<'_>) -> Result<UploadedFile, ApiError> {
    let filename = field.file_name().unwrap_or_default().to_string();
    let bytes = field.bytes().await.map_err(bad_multipart)?;
    Ok(UploadedFile {
        filename,
        bytes: bytes.to_vec(),
    })
}

/// Read a multipart field as text.
pub async fn read_text(field: Field<'_>) -> Result<String, ApiError> {
    field.text().await.map_err(bad_multipart)
}
