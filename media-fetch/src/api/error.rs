//! API error handling.
//!
//! Maps pipeline failures onto one HTTP status each and renders them as a
//! small JSON body.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::error::Error;

/// API error response body.
#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
}

/// API error type that can be converted to HTTP responses.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
}

impl ApiError {
    /// Create a new API error.
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Create a 400 Bad Request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    /// Create a 500 Internal Server Error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "DOWNLOAD_FAILED", message)
    }

    /// Create a 503 Service Unavailable error.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", message)
    }

    /// Create a 507 Insufficient Storage error.
    pub fn insufficient_storage(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INSUFFICIENT_STORAGE, "INSUFFICIENT_STORAGE", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorResponse {
            code: self.code,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidRequest(msg) => ApiError::bad_request(msg),
            Error::AdmissionTimeout => ApiError::service_unavailable(err.to_string()),
            Error::InsufficientSpace { .. } => {
                ApiError::insufficient_storage(format!("Server storage full: {}", err))
            }
            other => ApiError::internal(format!("Download failed: {}", other)),
        }
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StreamSide;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (Error::invalid_request("missing url"), StatusCode::BAD_REQUEST),
            (Error::AdmissionTimeout, StatusCode::SERVICE_UNAVAILABLE),
            (
                Error::InsufficientSpace {
                    required: 2,
                    available: 1,
                },
                StatusCode::INSUFFICIENT_STORAGE,
            ),
            (Error::no_eligible_format("none"), StatusCode::INTERNAL_SERVER_ERROR),
            (Error::fetch(StreamSide::Video, "reset"), StatusCode::INTERNAL_SERVER_ERROR),
            (Error::merge("exit 1"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn test_messages() {
        let busy = ApiError::from(Error::AdmissionTimeout);
        assert_eq!(busy.message, "Server too busy, try again later");

        let failed = ApiError::from(Error::merge("muxer exited with 1"));
        assert_eq!(failed.message, "Download failed: Merge failed: muxer exited with 1");

        let full = ApiError::from(Error::InsufficientSpace {
            required: 0,
            available: 0,
        });
        assert!(full.message.starts_with("Server storage full: Insufficient disk space"));
    }
}
