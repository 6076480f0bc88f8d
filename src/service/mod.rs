//! Record service
//!
//! The facades the HTTP layer talks to, and the engine that implements them.
//!
//! - `RecordService`: current-state view (get, create, partial update)
//! - `VersionedRecordService`: adds version history and time travel
//!
//! Every call takes a [`RequestContext`]; a cancelled context makes the call
//! fail with [`RecordError::Cancelled`] without committing anything.

mod context;
mod engine;
mod errors;
mod merge;
mod types;

use std::future::Future;

pub use context::{CancelOnDrop, RequestContext};
pub use engine::RecordEngine;
pub use errors::{RecordError, RecordResult};
pub use merge::{apply_updates, initial_snapshot};
pub use types::{Record, RecordVersion, RecordVersions, Snapshot, Updates, VersionInfo};

/// Current-state access to records.
pub trait RecordService: Send + Sync {
    /// Latest state of a record.
    fn get_record(
        &self,
        ctx: &RequestContext,
        id: i64,
    ) -> impl Future<Output = RecordResult<Record>> + Send;

    /// Creates version 1. Fails with `RecordAlreadyExists` if any version
    /// exists for `id`.
    fn create_record(
        &self,
        ctx: &RequestContext,
        id: i64,
        data: Snapshot,
    ) -> impl Future<Output = RecordResult<()>> + Send;

    /// Applies `updates` to the latest version and stores the result as the
    /// next version.
    fn update_record(
        &self,
        ctx: &RequestContext,
        id: i64,
        updates: Updates,
    ) -> impl Future<Output = RecordResult<Record>> + Send;
}

/// Versioned access: history, exact versions and time travel.
pub trait VersionedRecordService: RecordService {
    fn get_latest_record_version(
        &self,
        ctx: &RequestContext,
        id: i64,
    ) -> impl Future<Output = RecordResult<RecordVersion>> + Send;

    fn get_record_version(
        &self,
        ctx: &RequestContext,
        id: i64,
        version: i64,
    ) -> impl Future<Output = RecordResult<RecordVersion>> + Send;

    /// The version in effect at `timestamp_ms` (ms since the Unix epoch).
    /// On equal timestamps the highest version wins.
    fn get_record_version_at(
        &self,
        ctx: &RequestContext,
        id: i64,
        timestamp_ms: i64,
    ) -> impl Future<Output = RecordResult<RecordVersion>> + Send;

    /// Every version, ascending.
    fn list_versions(
        &self,
        ctx: &RequestContext,
        id: i64,
    ) -> impl Future<Output = RecordResult<RecordVersions>> + Send;

    /// Creates the record from the non-null entries of `updates` if it does
    /// not exist yet, otherwise applies them as a partial update.
    fn create_or_update_record(
        &self,
        ctx: &RequestContext,
        id: i64,
        updates: Updates,
    ) -> impl Future<Output = RecordResult<RecordVersion>> + Send;
}
