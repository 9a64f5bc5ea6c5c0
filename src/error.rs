//! Error handling for qplay
//!
//! This module defines the error types used throughout the crate,
//! grouped into validation, evaluation, storage and network failures.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for qplay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for qplay operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO operation failed
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization failed
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// History store transaction failed
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// History store can no longer serve requests
    #[error("History store unavailable: {reason}")]
    StoreUnavailable { reason: String },

    /// History entry exceeds the configured size
    #[error("History entry too large: {size} characters (max {max})")]
    EntryTooLarge { size: usize, max: usize },

    /// Share payload exceeds the configured size
    #[error("Share payload too large: {size} characters (max {max})")]
    SharePayloadTooLarge { size: usize, max: usize },

    /// Evaluator reported a failure; the message is shown verbatim
    #[error("{message}")]
    Evaluation { message: String },

    /// Evaluator did not answer within the deadline
    #[error("Evaluation timed out after {}ms", .after.as_millis())]
    EvaluationTimeout { after: Duration },

    /// Caller stopped waiting and the evaluator gave up
    #[error("Evaluation cancelled")]
    EvaluationCancelled,

    /// Evaluator worker is gone
    #[error("Evaluator unavailable")]
    EvaluatorUnavailable,

    /// Share service could not be reached
    #[error("Cannot reach share server: {reason}")]
    ShareUnreachable { reason: String },

    /// Share service answered with an error status
    #[error("Share server error ({status}): {message}")]
    ShareRejected { status: u16, message: String },

    /// Document kind string not recognized
    #[error("Unknown document kind: {kind}")]
    UnknownDocumentKind { kind: String },

    /// Home directory could not be determined
    #[error("Home directory not found")]
    HomeDirectoryNotFound,

    /// Invalid command line arguments
    #[error("Invalid arguments: {message}")]
    InvalidArguments { message: String },

    /// Configuration validation failed
    #[error("Configuration validation failed: {field} - {reason}")]
    ConfigValidation { field: String, reason: String },

    /// Generic error with custom message
    #[error("{message}")]
    Custom { message: String },
}

impl Error {
    /// Create a custom error with a message
    pub fn custom<S: Into<String>>(message: S) -> Self {
        Error::Custom {
            message: message.into(),
        }
    }

    /// Create an evaluation error with the evaluator's message
    pub fn evaluation<S: Into<String>>(message: S) -> Self {
        Error::Evaluation {
            message: message.into(),
        }
    }

    /// Create an invalid arguments error
    pub fn invalid_arguments<S: Into<String>>(message: S) -> Self {
        Error::InvalidArguments {
            message: message.into(),
        }
    }

    /// Create a config validation error
    pub fn config_validation<S: Into<String>>(field: S, reason: S) -> Self {
        Error::ConfigValidation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a store unavailable error
    pub fn store_unavailable<S: Into<String>>(reason: S) -> Self {
        Error::StoreUnavailable {
            reason: reason.into(),
        }
    }

    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::StoreUnavailable { .. } => false,
            Error::EvaluatorUnavailable => false,
            Error::InvalidArguments { .. } => false,
            Error::HomeDirectoryNotFound => false,
            _ => true,
        }
    }

    /// Get the error category for logging purposes
    pub fn category(&self) -> &'static str {
        match self {
            Error::EntryTooLarge { .. }
            | Error::SharePayloadTooLarge { .. }
            | Error::UnknownDocumentKind { .. } => "validation",
            Error::Evaluation { .. }
            | Error::EvaluationTimeout { .. }
            | Error::EvaluationCancelled
            | Error::EvaluatorUnavailable => "evaluation",
            Error::Storage(_) | Error::StoreUnavailable { .. } => "storage",
            Error::ShareUnreachable { .. } | Error::ShareRejected { .. } => "network",
            Error::Io(_) => "io",
            Error::Json(_) | Error::Yaml(_) => "serialization",
            Error::ConfigValidation { .. } => "config",
            Error::HomeDirectoryNotFound => "system",
            Error::InvalidArguments { .. } => "arguments",
            Error::Custom { .. } => "custom",
        }
    }
}
