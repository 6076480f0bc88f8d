//! Append-only log writer with fsync enforcement
//!
//! - Frames are only ever appended, never rewritten in place
//! - An append is durable once `sync_data` returns
//! - A failed append is rolled back by truncating to the previous length
//! - If that rollback fails too, the writer refuses every later append

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use tracing::error;

use super::errors::{StorageError, StorageResult};

/// Append-only writer over a single log file.
pub struct LogWriter {
    file: File,
    len: u64,
    /// Set when the file may hold bytes past `len`.
    failed: bool,
}

impl LogWriter {
    /// Opens or creates the log file at `path`.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                StorageError::write_failed(format!("Failed to open log: {}", path.display()), e)
            })?;

        let len = file
            .metadata()
            .map_err(|e| StorageError::write_failed("Failed to read log metadata", e))?
            .len();

        Ok(Self {
            file,
            len,
            failed: false,
        })
    }

    /// Returns the current length of the log in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Returns true if nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Appends `bytes` and fsyncs.
    ///
    /// Returns the offset the bytes were written at. On failure the log is
    /// truncated back to its previous length so no partial frame survives.
    /// If the truncate fails as well, the writer is marked failed and must
    /// be reopened.
    pub fn append(&mut self, bytes: &[u8]) -> StorageResult<u64> {
        if self.failed {
            return Err(StorageError::write_failed_no_source(
                "Log writer failed an earlier rollback; reopen the store",
            ));
        }

        let offset = self.len;

        let result = self
            .file
            .write_all(bytes)
            .and_then(|_| self.file.sync_data());

        if let Err(e) = result {
            if let Err(rollback) = self.file.set_len(offset) {
                error!(
                    offset,
                    error = %rollback,
                    "failed to roll back partial append; refusing further writes"
                );
                self.failed = true;
            }
            return Err(StorageError::write_failed(
                format!("Failed to append {} bytes at offset {}", bytes.len(), offset),
                e,
            ));
        }

        self.len += bytes.len() as u64;
        Ok(offset)
    }

    /// Truncates the log to `len` bytes and fsyncs.
    ///
    /// Used by recovery to discard a torn tail.
    pub fn truncate_to(&mut self, len: u64) -> StorageResult<()> {
        self.file
            .set_len(len)
            .and_then(|_| self.file.sync_all())
            .map_err(|e| {
                StorageError::write_failed(format!("Failed to truncate log to {} bytes", len), e)
            })?;
        self.len = len;
        Ok(())
    }
}
