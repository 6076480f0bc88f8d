//! Version storage backend
//!
//! Holds one immutable row per `(record_id, version)` in an append-only,
//! checksummed log, with in-memory indexes for the lookups the engine needs.
//!
//! # Design Principles
//!
//! - Append-only (no in-place updates, no deletes)
//! - Checksum-verified on every read
//! - One exclusive writer; readers never take the writer lock
//! - A commit is one checksummed block, written with one append + fsync
//! - Only an incomplete final block is discarded on open; any other damage
//!   fails the open

mod checksum;
mod clock;
mod errors;
mod migration;
mod reader;
mod record;
mod store;
mod table;
mod writer;

pub use checksum::compute_checksum;
pub use clock::{Clock, ManualClock, SystemClock};
pub use errors::{Severity, StorageError, StorageErrorCode, StorageResult};
pub use migration::{migrate_legacy, MigrationReport};
pub use reader::{BlockRead, CommitLogReader, LogReader};
pub use record::{encode_commit_block, Frame, LegacyRow, VersionRow};
pub use store::{legacy_path, versions_path, VersionStore, WriteTxn};
pub use table::VersionTable;
pub use writer::LogWriter;
