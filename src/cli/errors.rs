//! CLI-specific error types
//!
//! Every CLI error ends the process with a non-zero exit code.

use std::io;

use thiserror::Error;

use crate::service::RecordError;
use crate::storage::StorageError;

/// CLI error
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration file unreadable or invalid
    #[error("TT_CLI_CONFIG_ERROR: {0}")]
    Config(String),

    /// I/O error (stdout, runtime)
    #[error("TT_CLI_IO_ERROR: {0}")]
    Io(String),

    /// `init` on a directory that already has a version log
    #[error("TT_CLI_ALREADY_INITIALIZED: data directory {0} is already initialized")]
    AlreadyInitialized(String),

    /// Store could not be opened, recovered or migrated
    #[error("TT_CLI_BOOT_FAILED: {0}")]
    BootFailed(String),

    /// A record operation failed
    #[error("TT_CLI_REQUEST_FAILED: {0}")]
    Request(#[from] RecordError),
}

impl CliError {
    /// Config error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Boot failed
    pub fn boot_failed(msg: impl Into<String>) -> Self {
        Self::BootFailed(msg.into())
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        match self {
            Self::Config(_) => "TT_CLI_CONFIG_ERROR",
            Self::Io(_) => "TT_CLI_IO_ERROR",
            Self::AlreadyInitialized(_) => "TT_CLI_ALREADY_INITIALIZED",
            Self::BootFailed(_) => "TT_CLI_BOOT_FAILED",
            Self::Request(_) => "TT_CLI_REQUEST_FAILED",
        }
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::Io(format!("JSON error: {}", e))
    }
}

impl From<StorageError> for CliError {
    fn from(e: StorageError) -> Self {
        Self::BootFailed(e.to_string())
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
