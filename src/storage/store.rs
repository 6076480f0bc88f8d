//! Durable, transactional version store
//!
//! Layout under the data directory:
//!
//! ```text
//! <data_dir>/data/record_versions.dat   append-only version log
//! <data_dir>/data/records.dat           legacy single-row store (optional)
//! ```
//!
//! Writers are serialized by one exclusive writer lock held for the whole
//! transaction, so read-latest → insert-next is linearized for every
//! record. Readers only touch the in-memory table and never wait on the
//! writer lock.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard};

use tracing::{info, warn};

use super::clock::{Clock, SystemClock};
use super::errors::{StorageError, StorageResult};
use super::reader::{BlockRead, CommitLogReader};
use super::record::{encode_commit_block, VersionRow};
use super::table::{check_next_version, VersionTable};
use super::writer::LogWriter;
use crate::observability::Event;

pub const DATA_SUBDIR: &str = "data";
pub const VERSIONS_FILE: &str = "record_versions.dat";
pub const LEGACY_FILE: &str = "records.dat";

/// Returns `<data_dir>/data/record_versions.dat`.
pub fn versions_path(data_dir: &Path) -> PathBuf {
    data_dir.join(DATA_SUBDIR).join(VERSIONS_FILE)
}

/// Returns `<data_dir>/data/records.dat`.
pub fn legacy_path(data_dir: &Path) -> PathBuf {
    data_dir.join(DATA_SUBDIR).join(LEGACY_FILE)
}

/// The record-version table.
pub struct VersionStore {
    data_dir: PathBuf,
    writer: Mutex<LogWriter>,
    table: RwLock<VersionTable>,
    clock: Arc<dyn Clock>,
}

impl VersionStore {
    /// Opens (or creates) the store under `data_dir` using the wall clock.
    pub fn open(data_dir: &Path) -> StorageResult<Self> {
        Self::open_with_clock(data_dir, Arc::new(SystemClock))
    }

    /// Opens (or creates) the store, replaying the version log.
    ///
    /// An incomplete final commit block is truncated away. Any other
    /// malformed content, including duplicate or non-dense versions, fails
    /// the open and leaves the log untouched.
    pub fn open_with_clock(data_dir: &Path, clock: Arc<dyn Clock>) -> StorageResult<Self> {
        let data_subdir = data_dir.join(DATA_SUBDIR);
        fs::create_dir_all(&data_subdir).map_err(|e| {
            StorageError::io_error(
                format!("Failed to create data directory: {}", data_subdir.display()),
                e,
            )
        })?;

        let path = versions_path(data_dir);
        let mut writer = LogWriter::open(&path)?;
        let (table, torn_at) = Self::replay(&path)?;

        if let Some(offset) = torn_at {
            warn!(
                event = %Event::RecoveryTruncatedTail,
                offset,
                discarded_bytes = writer.len() - offset,
                "discarding incomplete trailing commit"
            );
            writer.truncate_to(offset)?;
        }

        info!(
            event = %Event::RecoveryComplete,
            records = table.record_count(),
            versions = table.row_count(),
            path = %path.display(),
            "version log replayed"
        );

        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            writer: Mutex::new(writer),
            table: RwLock::new(table),
            clock,
        })
    }

    fn replay(path: &Path) -> StorageResult<(VersionTable, Option<u64>)> {
        let mut table = VersionTable::new();
        let mut reader = CommitLogReader::<VersionRow>::open(path)?;

        loop {
            let offset = reader.current_offset();
            match reader.read_next()? {
                BlockRead::Block(rows) => {
                    for row in rows {
                        table.insert(row).map_err(|e| {
                            StorageError::corruption_at_offset(
                                offset,
                                format!("invalid version sequence in log: {}", e),
                            )
                        })?;
                    }
                }
                BlockRead::End => return Ok((table, None)),
                BlockRead::TornTail { offset } => return Ok((table, Some(offset))),
            }
        }
    }

    /// Returns the data directory the store was opened on.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Begins a write transaction, waiting for any other writer to finish.
    pub fn begin_write(&self) -> StorageResult<WriteTxn<'_>> {
        let log = self
            .writer
            .lock()
            .map_err(|_| StorageError::lock_poisoned("writer"))?;
        Ok(WriteTxn {
            store: self,
            log,
            staged: Vec::new(),
        })
    }

    fn read_table(&self) -> StorageResult<RwLockReadGuard<'_, VersionTable>> {
        self.table
            .read()
            .map_err(|_| StorageError::lock_poisoned("version table"))
    }

    /// Latest committed version of a record.
    pub fn latest(&self, record_id: i64) -> StorageResult<Option<VersionRow>> {
        Ok(self.read_table()?.latest(record_id).cloned())
    }

    /// Exact `(record_id, version)` row.
    pub fn get(&self, record_id: i64, version: i64) -> StorageResult<Option<VersionRow>> {
        Ok(self.read_table()?.get(record_id, version).cloned())
    }

    /// The version in effect at `timestamp_ms`.
    pub fn at_or_before(
        &self,
        record_id: i64,
        timestamp_ms: i64,
    ) -> StorageResult<Option<VersionRow>> {
        Ok(self
            .read_table()?
            .at_or_before(record_id, timestamp_ms)
            .cloned())
    }

    /// All versions of a record, ascending. Empty if the record is unknown.
    pub fn history(&self, record_id: i64) -> StorageResult<Vec<VersionRow>> {
        Ok(self
            .read_table()?
            .history(record_id)
            .map(<[VersionRow]>::to_vec)
            .unwrap_or_default())
    }

    pub fn contains_record(&self, record_id: i64) -> StorageResult<bool> {
        Ok(self.read_table()?.contains_record(record_id))
    }

    /// `(records, versions)` currently committed.
    pub fn counts(&self) -> StorageResult<(usize, usize)> {
        let table = self.read_table()?;
        Ok((table.record_count(), table.row_count()))
    }
}

/// An exclusive write transaction.
///
/// Rows inserted here are invisible to readers until `commit`. Dropping the
/// transaction without committing discards them.
pub struct WriteTxn<'a> {
    store: &'a VersionStore,
    log: MutexGuard<'a, LogWriter>,
    staged: Vec<VersionRow>,
}

impl<'a> WriteTxn<'a> {
    /// Latest version of a record as seen by this transaction, including
    /// its own staged rows.
    pub fn latest(&self, record_id: i64) -> StorageResult<Option<VersionRow>> {
        if let Some(row) = self.staged.iter().rev().find(|r| r.record_id == record_id) {
            return Ok(Some(row.clone()));
        }
        self.store.latest(record_id)
    }

    /// Stages `(record_id, version)` with a backend-assigned timestamp.
    ///
    /// Fails with a constraint violation if that version already exists or
    /// is not the next one in the record's sequence.
    pub fn insert(
        &mut self,
        record_id: i64,
        version: i64,
        data_json: String,
    ) -> StorageResult<&VersionRow> {
        let previous = self.latest(record_id)?;
        check_next_version(record_id, previous.as_ref().map(|r| r.version), version)?;

        // created_at never goes backwards within a record, even if the wall
        // clock does.
        let now = self.store.clock.now_ms();
        let created_at_ms = previous.map_or(now, |p| now.max(p.created_at_ms));

        self.staged.push(VersionRow {
            record_id,
            version,
            created_at_ms,
            data_json,
        });
        Ok(&self.staged[self.staged.len() - 1])
    }

    /// Appends all staged rows as one commit block, fsyncs, then publishes
    /// them.
    pub fn commit(mut self) -> StorageResult<Vec<VersionRow>> {
        if self.staged.is_empty() {
            return Ok(Vec::new());
        }

        let block = encode_commit_block(&self.staged)
            .map_err(|e| StorageError::write_failed_no_source(e.to_string()))?;
        self.log.append(&block)?;

        let staged = std::mem::take(&mut self.staged);
        let mut table = self
            .store
            .table
            .write()
            .map_err(|_| StorageError::lock_poisoned("version table"))?;
        for row in &staged {
            table.insert(row.clone()).map_err(|e| {
                StorageError::data_corruption(format!(
                    "committed row rejected by version table: {}",
                    e
                ))
            })?;
        }

        Ok(staged)
    }
}
