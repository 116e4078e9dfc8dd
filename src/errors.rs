//! # Error Handling Module
//!
//! ## Purpose
//! Centralized error handling for the labeling console, providing the error
//! taxonomy shared by the HTTP server, the console data layer, and the
//! ingestion pipeline.
//!
//! ## Input/Output Specification
//! - **Input**: Error conditions from all system components
//! - **Output**: Structured error types with context, HTTP status mapping,
//!   and `{"detail": ...}` JSON bodies
//! - **Error Categories**: Validation, NotFound, Precondition, Transport,
//!   Server, Configuration, Parsing, Internal
//!
//! ## Usage
//! ```rust
//! use sentiment_console::errors::{ConsoleError, Result};
//!
//! fn check_confidence(value: f64) -> Result<()> {
//!     if !(0.0..=1.0).contains(&value) {
//!         return Err(ConsoleError::Validation {
//!             field: "min_confidence".to_string(),
//!             reason: format!("{} is outside [0, 1]", value),
//!         });
//!     }
//!     Ok(())
//! }
//! ```

use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use thiserror::Error;

/// Result type used throughout the application
pub type Result<T> = std::result::Result<T, ConsoleError>;

/// Error types for the labeling console
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// Malformed filter or correction input, caught before dispatch
    #[error("Validation failed for field '{field}': {reason}")]
    Validation { field: String, reason: String },

    /// Unknown record or resource
    #[error("{resource} not found ({id})")]
    NotFound { resource: String, id: String },

    /// Operation requested before its prerequisite state exists
    #[error("{message}")]
    Precondition { message: String },

    /// Network failure or a non-2xx response carrying no usable body
    #[error("Transport error: {details}")]
    Transport { details: String },

    /// Non-2xx response from the backend with a detail message
    #[error("{detail}")]
    Server { status: u16, detail: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Malformed data from an upload or a response body
    #[error("Failed to parse data from {origin}: {details}")]
    DataParsing { origin: String, details: String },

    /// CSV read/write errors
    #[error("CSV error: {details}")]
    Csv { details: String },

    /// JSON serialization/deserialization errors
    #[error("Serialization failed: {message}")]
    SerializationFailed { message: String },

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal system errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ConsoleError {
    /// Check if the error is recoverable (the same action can be retried)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ConsoleError::Transport { .. } | ConsoleError::Server { status: 500..=599, .. }
        )
    }

    /// Get error category for metrics and logging
    pub fn category(&self) -> &'static str {
        match self {
            ConsoleError::Validation { .. } => "validation",
            ConsoleError::NotFound { .. } => "not_found",
            ConsoleError::Precondition { .. } => "precondition",
            ConsoleError::Transport { .. } | ConsoleError::Server { .. } => "backend",
            ConsoleError::Config { .. } => "configuration",
            ConsoleError::DataParsing { .. }
            | ConsoleError::Csv { .. }
            | ConsoleError::SerializationFailed { .. } => "parsing",
            ConsoleError::Io(_) | ConsoleError::Internal { .. } => "internal",
        }
    }
}

// Conversion from common error types
impl From<serde_json::Error> for ConsoleError {
    fn from(err: serde_json::Error) -> Self {
        ConsoleError::SerializationFailed {
            message: format!("JSON serialization error: {}", err),
        }
    }
}

impl From<reqwest::Error> for ConsoleError {
    fn from(err: reqwest::Error) -> Self {
        ConsoleError::Transport {
            details: err.to_string(),
        }
    }
}

impl From<csv::Error> for ConsoleError {
    fn from(err: csv::Error) -> Self {
        ConsoleError::Csv {
            details: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for ConsoleError {
    fn from(err: toml::de::Error) -> Self {
        ConsoleError::Config {
            message: format!("TOML parse error: {}", err),
        }
    }
}

/// Every non-2xx response carries a JSON body with a `detail` message, which
/// is the shape the console client parses back out.
impl actix_web::ResponseError for ConsoleError {
    fn status_code(&self) -> StatusCode {
        match self {
            ConsoleError::Validation { .. }
            | ConsoleError::Precondition { .. }
            | ConsoleError::DataParsing { .. }
            | ConsoleError::Csv { .. } => StatusCode::BAD_REQUEST,
            ConsoleError::NotFound { .. } => StatusCode::NOT_FOUND,
            ConsoleError::Server { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "detail": self.to_string(),
        }))
    }
}

// Helper macros for common error patterns
#[macro_export]
macro_rules! internal_error {
    ($msg:expr) => {
        $crate::errors::ConsoleError::Internal {
            message: $msg.to_string(),
        }
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::errors::ConsoleError::Internal {
            message: format!($fmt, $($arg)*),
        }
    };
}

#[macro_export]
macro_rules! validation_error {
    ($field:expr, $reason:expr) => {
        $crate::errors::ConsoleError::Validation {
            field: $field.to_string(),
            reason: $reason.to_string(),
        }
    };
    ($field:expr, $fmt:expr, $($arg:tt)*) => {
        $crate::errors::ConsoleError::Validation {
            field: $field.to_string(),
            reason: format!($fmt, $($arg)*),
        }
    };
}
