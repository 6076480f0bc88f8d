//! Record service errors
//!
//! The engine returns these as values and never panics on expected
//! conditions. Only the HTTP layer decides what they look like on the wire.

use thiserror::Error;

use crate::storage::StorageError;

/// Result type for record service operations
pub type RecordResult<T> = Result<T, RecordError>;

#[derive(Debug, Error)]
pub enum RecordError {
    /// `id` or `version` was not a positive integer. Holds the field name.
    #[error("invalid {0}; {0} must be a positive number")]
    InvalidId(&'static str),

    /// No version exists for the record.
    #[error("record {0} does not exist")]
    RecordNotFound(i64),

    /// The record exists but this version number was never assigned.
    #[error("record {id} has no version {version}")]
    VersionNotFound { id: i64, version: i64 },

    /// Create on an id that already has a version.
    #[error("record {0} already exists")]
    RecordAlreadyExists(i64),

    /// The caller cancelled or its deadline passed.
    #[error("request cancelled")]
    Cancelled,

    /// Storage or encoding failure unrelated to the input.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RecordError {
    /// True for outcomes caused by the request itself.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            RecordError::InvalidId(_)
                | RecordError::RecordNotFound(_)
                | RecordError::VersionNotFound { .. }
                | RecordError::RecordAlreadyExists(_)
        )
    }
}

impl From<StorageError> for RecordError {
    fn from(err: StorageError) -> Self {
        RecordError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for RecordError {
    fn from(err: serde_json::Error) -> Self {
        RecordError::Internal(format!("snapshot encoding: {}", err))
    }
}

impl From<tokio::task::JoinError> for RecordError {
    fn from(err: tokio::task::JoinError) -> Self {
        RecordError::Internal(format!("storage task failed: {}", err))
    }
}
