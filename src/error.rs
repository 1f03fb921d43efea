//! # Error Handling and Response Types
//!
//! Standardized error types for the repository adapter. Every failure the
//! core can observe — malformed multipart requests, unreadable archives,
//! name/filename grammar violations, storage and upstream trouble — is a
//! variant of [`AppError`], classified by [`ErrorCode`] and rendered as a
//! consistent JSON [`ApiErrorResponse`].
//!
//! ## Error Response Format
//!
//! ```json
//! {
//!   "error": "Human-readable error message",
//!   "code": "machine_readable_error_code",
//!   "timestamp": "2024-01-01T12:00:00Z"
//! }
//! ```
//!
//! Nothing here is retried: errors are reported at the boundary of the
//! component that first observes them, and retries belong to the caller.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Serialize;

/// Standardized error response structure for consistent API error handling
#[derive(Serialize, Debug)]
pub struct ApiErrorResponse {
    pub error: String,     // Human-readable error message
    pub code: String,      // Machine-readable error code
    pub timestamp: String, // ISO 8601 timestamp
}

/// Error code classification for machine-readable error types
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorCode {
    ValidationError, // For malformed requests and bad upload contents
    NotFound,        // For missing resources
    UpstreamError,   // For unreachable origin registries
    InternalError,   // For server-side errors
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "validation_error",
            ErrorCode::NotFound => "not_found",
            ErrorCode::UpstreamError => "upstream_error",
            ErrorCode::InternalError => "internal_error",
        }
    }

    pub fn http_status(&self) -> StatusCode {
        match self {
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::UpstreamError => StatusCode::BAD_GATEWAY,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Application-specific error types with error codes
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Content-Type header carries no multipart boundary")]
    MissingBoundary,

    #[error("multipart body has no file part")]
    NoFileData,

    #[error("unsupported archive type: {0}")]
    UnsupportedArchiveType(String),

    #[error("failed to parse package archive: {0}")]
    ArchiveParseFailed(String),

    #[error("package metadata file not found in archive")]
    MetadataNotFound,

    #[error("invalid metadata file, header {0} not found")]
    MetadataFieldNotFound(&'static str),

    #[error("invalid project name: {0}")]
    InvalidName(String),

    #[error("invalid artifact filename: {0}")]
    InvalidFilename(String),

    #[error("filename does not match metadata")]
    FilenameMetadataMismatch,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl AppError {
    /// Get the appropriate error code for this error type
    pub fn error_code(&self) -> ErrorCode {
        match self {
            AppError::MissingBoundary
            | AppError::NoFileData
            | AppError::UnsupportedArchiveType(_)
            | AppError::ArchiveParseFailed(_)
            | AppError::MetadataNotFound
            | AppError::MetadataFieldNotFound(_)
            | AppError::InvalidName(_)
            | AppError::InvalidFilename(_)
            | AppError::FilenameMetadataMismatch
            | AppError::Json(_)
            | AppError::BadRequest(_) => ErrorCode::ValidationError,
            AppError::NotFound(_) => ErrorCode::NotFound,
            AppError::UpstreamUnavailable(_) => ErrorCode::UpstreamError,
            AppError::Io(_) | AppError::InternalError(_) | AppError::Anyhow(_) => {
                ErrorCode::InternalError
            }
        }
    }

    /// Create a standardized error response
    pub fn to_error_response(&self) -> ApiErrorResponse {
        let code = self.error_code();
        ApiErrorResponse {
            error: self.to_string(),
            code: code.as_str().to_string(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the error before moving values out
        tracing::error!(error = %self, "Request failed");

        let error_response = self.to_error_response();
        let status = self.error_code().http_status();

        tracing::debug!(status = %status, code = %error_response.code, "Returning standardized error response");

        (status, axum::Json(error_response)).into_response()
    }
}

/// Convenient result type for application operations.
///
/// This type alias provides a standard Result type using [`AppError`] for all
/// application-level operations, reducing boilerplate in function signatures.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_taxonomy_maps_to_bad_request() {
        for err in [
            AppError::MissingBoundary,
            AppError::NoFileData,
            AppError::UnsupportedArchiveType(".tar.br".into()),
            AppError::ArchiveParseFailed("truncated gzip".into()),
            AppError::MetadataNotFound,
            AppError::MetadataFieldNotFound("Name"),
            AppError::InvalidName("bad name!".into()),
            AppError::InvalidFilename("nodash.tar.gz".into()),
            AppError::FilenameMetadataMismatch,
        ] {
            assert_eq!(err.error_code().http_status(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn storage_failures_are_internal() {
        let err = AppError::Io(std::io::Error::other("disk gone"));
        assert_eq!(
            err.error_code().http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
