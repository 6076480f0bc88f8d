//! Storage error types
//!
//! Error codes:
//! - TT_STORAGE_IO_ERROR (ERROR severity)
//! - TT_STORAGE_WRITE_FAILED (ERROR severity)
//! - TT_STORAGE_READ_FAILED (ERROR severity)
//! - TT_STORAGE_CONSTRAINT_VIOLATION (ERROR severity)
//! - TT_DATA_CORRUPTION (FATAL severity)

use std::fmt;
use std::io;

/// Severity levels for storage errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation fails, server continues
    Error,
    /// The store cannot be trusted and must not be served
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Storage-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorCode {
    /// Disk I/O failure
    IoError,
    /// Version append or fsync failed
    WriteFailed,
    /// Version read failed
    ReadFailed,
    /// `(record_id, version)` uniqueness or density violated
    ConstraintViolation,
    /// Frame checksum failure or impossible log contents
    DataCorruption,
}

impl StorageErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            StorageErrorCode::IoError => "TT_STORAGE_IO_ERROR",
            StorageErrorCode::WriteFailed => "TT_STORAGE_WRITE_FAILED",
            StorageErrorCode::ReadFailed => "TT_STORAGE_READ_FAILED",
            StorageErrorCode::ConstraintViolation => "TT_STORAGE_CONSTRAINT_VIOLATION",
            StorageErrorCode::DataCorruption => "TT_DATA_CORRUPTION",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            StorageErrorCode::DataCorruption => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for StorageErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Storage error type with code, message and optional context
#[derive(Debug)]
pub struct StorageError {
    code: StorageErrorCode,
    message: String,
    details: Option<String>,
    source: Option<io::Error>,
}

impl StorageError {
    fn new(code: StorageErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    /// Create a new storage I/O error
    pub fn io_error(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            source: Some(source),
            ..Self::new(StorageErrorCode::IoError, message)
        }
    }

    /// Create a new write failed error
    pub fn write_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            source: Some(source),
            ..Self::new(StorageErrorCode::WriteFailed, message)
        }
    }

    /// Create a write failed error without an I/O source
    pub fn write_failed_no_source(message: impl Into<String>) -> Self {
        Self::new(StorageErrorCode::WriteFailed, message)
    }

    /// Create a new read failed error
    pub fn read_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            source: Some(source),
            ..Self::new(StorageErrorCode::ReadFailed, message)
        }
    }

    /// A row with this `(record_id, version)` already exists.
    pub fn duplicate_version(record_id: i64, version: i64) -> Self {
        Self {
            details: Some(format!("record_id: {}, version: {}", record_id, version)),
            ..Self::new(
                StorageErrorCode::ConstraintViolation,
                "duplicate (record_id, version)",
            )
        }
    }

    /// The inserted version would leave a gap in the record's sequence.
    pub fn version_gap(record_id: i64, expected: i64, got: i64) -> Self {
        Self {
            details: Some(format!(
                "record_id: {}, expected version: {}, got: {}",
                record_id, expected, got
            )),
            ..Self::new(StorageErrorCode::ConstraintViolation, "non-dense version")
        }
    }

    /// Create a new data corruption error (FATAL)
    pub fn data_corruption(message: impl Into<String>) -> Self {
        Self::new(StorageErrorCode::DataCorruption, message)
    }

    /// Create a data corruption error with byte offset context
    pub fn corruption_at_offset(offset: u64, reason: impl Into<String>) -> Self {
        Self {
            details: Some(format!("byte_offset: {}", offset)),
            ..Self::new(StorageErrorCode::DataCorruption, reason)
        }
    }

    /// A lock guarding storage state was poisoned by a panicking thread.
    pub fn lock_poisoned(what: &str) -> Self {
        Self::new(
            StorageErrorCode::IoError,
            format!("{} lock poisoned", what),
        )
    }

    /// Returns the error code
    pub fn code(&self) -> StorageErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns whether this error is fatal
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    /// Returns whether this is a uniqueness or density violation
    pub fn is_constraint_violation(&self) -> bool {
        self.code == StorageErrorCode::ConstraintViolation
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
