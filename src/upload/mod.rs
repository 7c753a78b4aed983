//! Upload module
//!
//! Turns an inbound `multipart/form-data` upload into a Telegram document.

use crate::config::BYTES_PER_MB;
use crate::telegram::TelegramError;
use hyper::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod form;
pub mod handler;

pub use form::{FilePart, UploadForm};
pub use handler::UploadHandler;

/// Confirmation message returned with every successful relay
pub const SUCCESS_MESSAGE: &str = "File uploaded successfully";

/// Upload errors
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("No file provided: {0}")]
    NoFile(String),

    #[error("File size ({size_mb:.2} MB) exceeds the limit of {limit_mb} MB")]
    FileTooLarge { size_mb: f64, limit_mb: u64 },

    #[error("Failed to read file: {0}")]
    ReadFailure(String),

    #[error("Chat ID is required. Provide it in the request or set DEFAULT_CHAT_ID in .env")]
    DestinationRequired,

    #[error("Failed to upload to Telegram: {0}")]
    Relay(#[from] TelegramError),

    /// Telegram (or the client's own checks) refused the document
    #[error("{0}")]
    RelayFailed(String),
}

impl UploadError {
    pub fn file_too_large(size_bytes: u64, limit_mb: u64) -> Self {
        UploadError::FileTooLarge {
            size_mb: size_bytes as f64 / BYTES_PER_MB as f64,
            limit_mb,
        }
    }

    /// HTTP status for this error: 400 for bad input, 500 for everything
    /// that went wrong on our side or upstream
    pub fn status_code(&self) -> StatusCode {
        match self {
            UploadError::NoFile(_)
            | UploadError::FileTooLarge { .. }
            | UploadError::DestinationRequired => StatusCode::BAD_REQUEST,
            UploadError::ReadFailure(_) | UploadError::Relay(_) | UploadError::RelayFailed(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Short label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            UploadError::NoFile(_) => "no_file",
            UploadError::FileTooLarge { .. } => "file_too_large",
            UploadError::ReadFailure(_) => "read_failure",
            UploadError::DestinationRequired => "destination_required",
            UploadError::Relay(_) => "relay_error",
            UploadError::RelayFailed(_) => "relay_failed",
        }
    }
}

/// Upload size limits, fixed at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_file_size_mb: u64,
    pub max_file_size_bytes: u64,
}

impl UploadLimits {
    pub fn from_megabytes(max_file_size_mb: u64) -> Self {
        Self {
            max_file_size_mb,
            max_file_size_bytes: max_file_size_mb.saturating_mul(BYTES_PER_MB),
        }
    }
}

/// JSON body of `POST /api/upload`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<i64>,
}

impl UploadResponse {
    pub fn delivered(file_id: String, message_id: i64) -> Self {
        Self {
            success: true,
            message: Some(SUCCESS_MESSAGE.to_string()),
            file_id: Some(file_id),
            message_id: Some(message_id),
            ..Default::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            ..Default::default()
        }
    }
}

impl From<&UploadError> for UploadResponse {
    fn from(err: &UploadError) -> Self {
        UploadResponse::error(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_too_large_message() {
        let err = UploadError::file_too_large(25 * 1024 * 1024 + 1000, 20);
        assert_eq!(
            err.to_string(),
            "File size (25.00 MB) exceeds the limit of 20 MB"
        );
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            UploadError::NoFile("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            UploadError::DestinationRequired.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            UploadError::ReadFailure("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            UploadError::RelayFailed("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            UploadError::Relay(TelegramError::RequestError("boom".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_relay_error_is_wrapped() {
        let err = UploadError::from(TelegramError::RequestError("boom".into()));
        assert_eq!(
            err.to_string(),
            "Failed to upload to Telegram: failed to send request: boom"
        );
    }

    #[test]
    fn test_limits_from_megabytes() {
        let limits = UploadLimits::from_megabytes(20);
        assert_eq!(limits.max_file_size_bytes, 20_971_520);

        let limits = UploadLimits::from_megabytes(17_592_186_044_416);
        assert_eq!(limits.max_file_size_bytes, u64::MAX);
    }

    #[test]
    fn test_response_json_shape() {
        let json = serde_json::to_value(UploadResponse::delivered("ABC".into(), 42)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "success": true,
                "message": "File uploaded successfully",
                "fileId": "ABC",
                "messageId": 42
            })
        );

        let json = serde_json::to_value(UploadResponse::error("nope")).unwrap();
        assert_eq!(json, serde_json::json!({"success": false, "error": "nope"}));
    }
}
