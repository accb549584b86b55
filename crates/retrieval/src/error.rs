//! Failure classification for backend calls.

use recall_core::AppError;
use serde::Serialize;
use thiserror::Error;

/// A failure reduced to what the retry loop and tool boundary need.
///
/// Status `>= 500` or no status at all (connection reset, timeout, DNS) is
/// retryable. Any other status, 4xx in particular, is permanent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{message}")]
pub struct ClassifiedError {
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,

    pub retryable: bool,
}

impl ClassifiedError {
    pub fn classify(err: &AppError) -> Self {
        let status_code = err.status_code();
        Self {
            message: err.message(),
            status_code,
            retryable: is_retryable_status(status_code),
        }
    }
}

impl From<&AppError> for ClassifiedError {
    fn from(err: &AppError) -> Self {
        Self::classify(err)
    }
}

/// Retry policy for an optional HTTP status.
pub fn is_retryable_status(status: Option<u16>) -> bool {
    match status {
        None => true,
        Some(code) => code >= 500,
    }
}
