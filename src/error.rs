//! Error types for dirindex
//!
//! This module provides:
//! - The crate-wide [`Error`] type and [`Result`] alias
//! - HTTP status code mapping for API integration ([`ToHttpStatus`])
//! - Structured error responses with machine-readable codes ([`ApiError`])

use crate::types::QuotaKind;
use crate::utils::human_size;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for dirindex operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for dirindex
#[derive(Debug, Error)]
pub enum Error {
    /// The selection resolved to nothing archivable
    #[error("invalid selection: {0}")]
    InvalidSelection(String),

    /// The resolved selection is larger than a configured or physical limit
    #[error("{}", quota_message(.kind, .required, .limit))]
    QuotaExceeded {
        /// Which limit was hit
        kind: QuotaKind,
        /// Aggregate size of the resolved selection in bytes
        required: u64,
        /// The limit that was exceeded in bytes
        limit: u64,
    },

    /// The compressor could not be started (missing binary, spawn failure)
    #[error("failed to launch compressor: {0}")]
    LaunchFailed(String),

    /// The compressor exited unsuccessfully
    #[error("compression failed for job {job} (exit code {exit_code:?})")]
    CompressionFailed {
        /// Job token
        job: String,
        /// Exit code of the compressor, if it exited normally
        exit_code: Option<i32>,
    },

    /// The safety timeout expired before the job reported completion
    #[error("archive job {job} did not finish within {waited_secs}s")]
    TimedOut {
        /// Job token
        job: String,
        /// How long the monitor waited
        waited_secs: u64,
    },

    /// Requested resource does not exist (or no longer exists)
    #[error("not found: {0}")]
    NotFound(String),

    /// A client-supplied path or token was rejected
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// The directory to scan is missing or unreadable
    #[error("directory is not accessible: {0}")]
    DirectoryNotAccessible(String),

    /// Failed to probe free space on the scratch volume
    #[error("failed to check disk space: {0}")]
    DiskSpaceCheckFailed(String),

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "archive.compressor.level")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),
}

fn quota_message(kind: &QuotaKind, required: &u64, limit: &u64) -> String {
    let (required, limit) = (*required, *limit);
    match kind {
        QuotaKind::SizeLimit => format!(
            "selected payload ({}) exceeds the {} limit",
            human_size(required),
            human_size(limit)
        ),
        QuotaKind::DiskSpace => format!(
            "not enough disk space to create the archive: required {}, available {}",
            human_size(required),
            human_size(limit)
        ),
    }
}

/// API error response format
///
/// Returned by every API endpoint when a request fails.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "quota_exceeded",
///     "message": "selected payload (25 GB) exceeds the 20 GB limit",
///     "details": { "kind": "size_limit", "required_bytes": 26843545600, "limit_bytes": 21474836480 }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found", "invalid_selection")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create an "unauthorized" error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("unauthorized", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - user-correctable input
            Error::InvalidSelection(_) => 400,
            Error::InvalidPath(_) => 400,
            Error::Config { .. } => 400,

            // 404 Not Found
            Error::NotFound(_) => 404,
            Error::DirectoryNotAccessible(_) => 404,

            // 413 Payload Too Large / 507 Insufficient Storage
            Error::QuotaExceeded {
                kind: QuotaKind::SizeLimit,
                ..
            } => 413,
            Error::QuotaExceeded {
                kind: QuotaKind::DiskSpace,
                ..
            } => 507,

            // 503 Service Unavailable - compressor missing or unspawnable
            Error::LaunchFailed(_) => 503,

            // 504 Gateway Timeout - safety net expired
            Error::TimedOut { .. } => 504,

            // 500 Internal Server Error
            Error::CompressionFailed { .. } => 500,
            Error::DiskSpaceCheckFailed(_) => 500,
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::InvalidSelection(_) => "invalid_selection",
            Error::QuotaExceeded { .. } => "quota_exceeded",
            Error::LaunchFailed(_) => "launch_failed",
            Error::CompressionFailed { .. } => "compression_failed",
            Error::TimedOut { .. } => "timed_out",
            Error::NotFound(_) => "not_found",
            Error::InvalidPath(_) => "invalid_path",
            Error::DirectoryNotAccessible(_) => "directory_not_accessible",
            Error::DiskSpaceCheckFailed(_) => "disk_space_check_failed",
            Error::Config { .. } => "config_error",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();

        // Operator-facing failures keep their detail in the server log only
        let message = match &error {
            Error::LaunchFailed(_) => "the archive could not be started".to_string(),
            Error::CompressionFailed { .. } => "the archive could not be created".to_string(),
            _ => error.to_string(),
        };

        let details = match &error {
            Error::QuotaExceeded {
                kind,
                required,
                limit,
            } => Some(serde_json::json!({
                "kind": kind,
                "required_bytes": required,
                "limit_bytes": limit,
            })),
            Error::TimedOut { job, waited_secs } => Some(serde_json::json!({
                "job": job,
                "waited_secs": waited_secs,
            })),
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({
                "key": key,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
