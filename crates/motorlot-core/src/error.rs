//! Error types module
//!
//! This module provides the core error types used throughout motorlot.
//! Intake validation failures, remote transfer failures and batch failures
//! are all unified under the `AppError` enum so that the HTTP layer renders
//! them the same way.

use std::io;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
/// This trait allows errors to self-describe their HTTP response characteristics
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "REMOTE_CONNECT_ERROR")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden in production
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("File too large: {0}")]
    PayloadTooLarge(String),

    #[error("Too many files: at most {limit} allowed")]
    TooManyFiles { limit: usize },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Remote connection failed: {0}")]
    RemoteConnect(String),

    #[error("Remote directory error: {0}")]
    RemoteDirectory(String),

    #[error("Remote write failed: {0}")]
    RemoteWrite(String),

    #[error("Integrity mismatch: {0}")]
    IntegrityMismatch(String),

    #[error("Upload batch failed: {failed} of {total} transfers failed: {cause}")]
    BatchFailed {
        failed: usize,
        total: usize,
        cause: String,
    },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::InvalidInput(_) => (
            400,
            "INVALID_INPUT",
            false,
            Some("Check request parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::UnsupportedMediaType(_) => (
            415,
            "UNSUPPORTED_MEDIA_TYPE",
            false,
            Some("Upload image files only"),
            false,
            LogLevel::Debug,
        ),
        AppError::PayloadTooLarge(_) => (
            413,
            "PAYLOAD_TOO_LARGE",
            false,
            Some("Reduce file size and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::TooManyFiles { .. } => (
            400,
            "TOO_MANY_FILES",
            false,
            Some("Send fewer files in one request"),
            false,
            LogLevel::Debug,
        ),
        AppError::NotFound(_) => (
            404,
            "NOT_FOUND",
            false,
            Some("Verify the key exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::RemoteConnect(_) => (
            503,
            "REMOTE_CONNECT_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::RemoteDirectory(_) => (
            500,
            "REMOTE_DIRECTORY_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::RemoteWrite(_) => (
            500,
            "REMOTE_WRITE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::IntegrityMismatch(_) => (
            500,
            "INTEGRITY_MISMATCH",
            true,
            Some("Retry the upload"),
            true,
            LogLevel::Error,
        ),
        AppError::BatchFailed { .. } => (
            500,
            "UPLOAD_BATCH_FAILED",
            true,
            Some("Retry the whole batch"),
            true,
            LogLevel::Error,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::UnsupportedMediaType(_) => "UnsupportedMediaType",
            AppError::PayloadTooLarge(_) => "PayloadTooLarge",
            AppError::TooManyFiles { .. } => "TooManyFiles",
            AppError::NotFound(_) => "NotFound",
            AppError::RemoteConnect(_) => "RemoteConnect",
            AppError::RemoteDirectory(_) => "RemoteDirectory",
            AppError::RemoteWrite(_) => "RemoteWrite",
            AppError::IntegrityMismatch(_) => "IntegrityMismatch",
            AppError::BatchFailed { .. } => "BatchFailed",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::InvalidInput(ref msg) => msg.clone(),
            AppError::UnsupportedMediaType(ref msg) => msg.clone(),
            AppError::PayloadTooLarge(ref msg) => msg.clone(),
            AppError::TooManyFiles { limit } => {
                format!("Too many files: at most {} allowed", limit)
            }
            AppError::NotFound(ref msg) => msg.clone(),
            AppError::RemoteConnect(_) => "File storage is temporarily unavailable".to_string(),
            AppError::RemoteDirectory(_) | AppError::RemoteWrite(_) => {
                "Failed to store file".to_string()
            }
            AppError::IntegrityMismatch(_) => "Stored file failed verification".to_string(),
            AppError::BatchFailed { failed, total, .. } => {
                format!("Upload failed: {} of {} files could not be stored", failed, total)
            }
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
        }
    }
}
