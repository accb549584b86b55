//! Error types for Recall.
//!
//! This module defines a unified error enum that covers all error categories
//! in the workspace: configuration, I/O, completion calls, retrieval backends,
//! transport-level failures, and serialization.

use thiserror::Error;

/// Unified error type for Recall.
///
/// All fallible functions in the workspace return `Result<T, AppError>`.
/// Backend failures keep their HTTP status so callers can decide whether a
/// failure is transient.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Completion provider errors that carry no status
    #[error("LLM error: {0}")]
    Llm(String),

    /// Retrieval pipeline errors
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// A backend answered with a non-success HTTP status
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Connection, DNS, or body-transfer failure before a status was seen
    #[error("Network error: {0}")]
    Network(String),

    /// Prompt template errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// An operation ran past its deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// HTTP status attached to this error, if the failure came from a response.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            AppError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The bare message without the category prefix.
    ///
    /// Used at tool boundaries where the caller shows the message verbatim.
    pub fn message(&self) -> String {
        match self {
            AppError::Config(msg)
            | AppError::Llm(msg)
            | AppError::Retrieval(msg)
            | AppError::Network(msg)
            | AppError::Prompt(msg)
            | AppError::Timeout(msg)
            | AppError::Serialization(msg)
            | AppError::Other(msg) => msg.clone(),
            AppError::Http { message, .. } => message.clone(),
            AppError::Io(err) => err.to_string(),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
