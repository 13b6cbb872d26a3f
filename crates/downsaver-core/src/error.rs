//! Error types module
//!
//! Every failure in the upload/convert flow is expressed as an [`AppError`]. Each variant
//! self-describes how it is presented (HTTP status, machine code, log level) through the
//! [`ErrorMetadata`] trait, so the relay and the CLI render errors the same way.

use std::io;

use serde::Serialize;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for upstream failures outside our control
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "PRESIGN_ERROR")
    fn error_code(&self) -> &'static str;

    /// Whether a new job with the same input may succeed
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

/// Classification of a terminal job outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    ValidationError,
    MissingField,
    TooLarge,
    PresignError,
    StagingUploadError,
    ConversionError,
    GatewayError,
    Misconfigured,
    Cancelled,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Missing field: {0}")]
    MissingField(String),

    #[error("File too large: {size} bytes exceeds the limit of {limit} bytes")]
    TooLarge { size: u64, limit: u64 },

    #[error("Presign error: {0}")]
    Presign(String),

    #[error("Staging upload error: {0}")]
    StagingUpload(String),

    #[error("Conversion error: {message}")]
    Conversion {
        status: Option<u16>,
        message: String,
    },

    #[error("Gateway error: {message}")]
    Gateway {
        status: Option<u16>,
        message: String,
    },

    #[error("Server not configured: {0}")]
    Misconfigured(String),

    #[error("Job cancelled")]
    Cancelled,

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

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Validation(format!("JSON parsing error: {}", err))
    }
}

/// Static metadata for each variant:
/// (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
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
        AppError::Validation(_) => (
            400,
            "VALIDATION_ERROR",
            false,
            Some("Check the selected file and target version"),
            false,
            LogLevel::Debug,
        ),
        AppError::MissingField(_) => (
            400,
            "MISSING_FIELD",
            false,
            Some("Include every required form field"),
            false,
            LogLevel::Debug,
        ),
        AppError::TooLarge { .. } => (
            413,
            "PAYLOAD_TOO_LARGE",
            false,
            Some("Reduce file size"),
            false,
            LogLevel::Debug,
        ),
        AppError::Presign(_) => (
            502,
            "PRESIGN_ERROR",
            true,
            Some("Retry with a new job"),
            false,
            LogLevel::Warn,
        ),
        AppError::StagingUpload(_) => (
            502,
            "STAGING_UPLOAD_ERROR",
            true,
            Some("Retry with a new job"),
            false,
            LogLevel::Warn,
        ),
        AppError::Conversion { .. } => (
            502,
            "CONVERSION_ERROR",
            false,
            Some("Check that the file is a valid model for the selected version"),
            false,
            LogLevel::Warn,
        ),
        AppError::Gateway { .. } => (
            502,
            "GATEWAY_ERROR",
            true,
            Some("Retry after a short delay"),
            false,
            LogLevel::Warn,
        ),
        AppError::Misconfigured(_) => (
            500,
            "MISCONFIGURED",
            false,
            Some("Contact the operator of this deployment"),
            false,
            LogLevel::Error,
        ),
        AppError::Cancelled => (499, "CANCELLED", true, None, false, LogLevel::Debug),
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
    /// Get error kind for job outcomes and logging
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_) => ErrorKind::ValidationError,
            AppError::MissingField(_) => ErrorKind::MissingField,
            AppError::TooLarge { .. } => ErrorKind::TooLarge,
            AppError::Presign(_) => ErrorKind::PresignError,
            AppError::StagingUpload(_) => ErrorKind::StagingUploadError,
            AppError::Conversion { .. } => ErrorKind::ConversionError,
            AppError::Gateway { .. } => ErrorKind::GatewayError,
            AppError::Misconfigured(_) => ErrorKind::Misconfigured,
            AppError::Cancelled => ErrorKind::Cancelled,
            AppError::Internal(_) | AppError::InternalWithSource { .. } => ErrorKind::Internal,
        }
    }

    /// Get error type name for logging
    pub fn error_type(&self) -> &'static str {
        match self.kind() {
            ErrorKind::ValidationError => "ValidationError",
            ErrorKind::MissingField => "MissingField",
            ErrorKind::TooLarge => "TooLarge",
            ErrorKind::PresignError => "PresignError",
            ErrorKind::StagingUploadError => "StagingUploadError",
            ErrorKind::ConversionError => "ConversionError",
            ErrorKind::GatewayError => "GatewayError",
            ErrorKind::Misconfigured => "Misconfigured",
            ErrorKind::Cancelled => "Cancelled",
            ErrorKind::Internal => "Internal",
        }
    }

    /// Upstream HTTP status carried by the error, if any
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            AppError::Conversion { status, .. } | AppError::Gateway { status, .. } => *status,
            _ => None,
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
            AppError::Validation(ref msg) => msg.clone(),
            AppError::MissingField(ref msg) => msg.clone(),
            AppError::TooLarge { size, limit } => format!(
                "File is {} bytes, which exceeds the maximum of {} bytes",
                size, limit
            ),
            AppError::Presign(ref msg) => format!("Failed to get presigned URL: {}", msg),
            AppError::StagingUpload(ref msg) => format!("Upload to storage failed: {}", msg),
            AppError::Conversion { ref message, .. } => message.clone(),
            AppError::Gateway { ref message, .. } => message.clone(),
            AppError::Misconfigured(ref msg) => format!("Server not configured: {}", msg),
            AppError::Cancelled => "Conversion cancelled".to_string(),
            AppError::Internal(_) => "Internal error".to_string(),
            AppError::InternalWithSource { .. } => "Internal error".to_string(),
        }
    }
}
