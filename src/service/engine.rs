//! Versioned record engine
//!
//! Implements the record facades over a [`VersionStore`]. Writes run on the
//! blocking pool inside one write transaction each, so the read-latest,
//! merge and insert steps are linearized by the store's writer lock.
//! Reads go straight to the in-memory indexes.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use super::context::RequestContext;
use super::errors::{RecordError, RecordResult};
use super::merge::{apply_updates, initial_snapshot};
use super::types::{
    decode_snapshot, encode_snapshot, Record, RecordVersion, RecordVersions, Snapshot, Updates,
};
use super::{RecordService, VersionedRecordService};
use crate::observability::{Event, MetricsRegistry};
use crate::storage::{
    migrate_legacy, Clock, MigrationReport, StorageResult, VersionRow, VersionStore, WriteTxn,
};

/// The record engine. Cheap to share behind an `Arc`.
pub struct RecordEngine {
    store: Arc<VersionStore>,
    metrics: Arc<MetricsRegistry>,
}

impl RecordEngine {
    /// Opens (or initializes) the store under `data_dir` and migrates any
    /// legacy records.
    pub fn open(data_dir: &Path) -> StorageResult<(Self, MigrationReport)> {
        Self::bootstrap(VersionStore::open(data_dir)?)
    }

    /// As [`open`](Self::open) with an explicit timestamp source.
    pub fn open_with_clock(
        data_dir: &Path,
        clock: Arc<dyn Clock>,
    ) -> StorageResult<(Self, MigrationReport)> {
        Self::bootstrap(VersionStore::open_with_clock(data_dir, clock)?)
    }

    fn bootstrap(store: VersionStore) -> StorageResult<(Self, MigrationReport)> {
        let report = migrate_legacy(&store)?;
        Ok((Self::from_store(Arc::new(store)), report))
    }

    /// Wraps an already opened store. No migration is run.
    pub fn from_store(store: Arc<VersionStore>) -> Self {
        Self {
            store,
            metrics: Arc::new(MetricsRegistry::new()),
        }
    }

    pub fn store(&self) -> &Arc<VersionStore> {
        &self.store
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    /// Counts the outcome of a call.
    fn observe<T>(&self, result: RecordResult<T>) -> RecordResult<T> {
        match &result {
            Err(err) if err.is_client_error() => self.metrics.increment_client_errors(),
            Err(RecordError::Cancelled) => self.metrics.increment_cancelled(),
            Err(_) => self.metrics.increment_internal_errors(),
            Ok(_) => {}
        }
        result
    }

    /// Runs a write transaction on the blocking pool.
    ///
    /// The context is checked before the task is spawned, again once the
    /// writer lock is held, and once more right before commit. If the
    /// deadline passes while waiting, the context is cancelled so the task
    /// abandons its transaction instead of committing.
    async fn write<F>(&self, ctx: &RequestContext, op: F) -> RecordResult<VersionRow>
    where
        F: FnOnce(&mut WriteTxn<'_>) -> RecordResult<()> + Send + 'static,
    {
        ctx.check()?;

        let store = Arc::clone(&self.store);
        let task_ctx = ctx.clone();
        let handle = tokio::task::spawn_blocking(move || -> RecordResult<VersionRow> {
            let mut txn = store.begin_write()?;
            task_ctx.check()?;
            op(&mut txn)?;
            task_ctx.check()?;
            txn.commit()?
                .pop()
                .ok_or_else(|| RecordError::Internal("commit produced no version".to_string()))
        });

        let result = match ctx.deadline() {
            Some(deadline) => {
                let deadline = tokio::time::Instant::from_std(deadline);
                match tokio::time::timeout_at(deadline, handle).await {
                    Ok(joined) => joined?,
                    Err(_) => {
                        ctx.cancel();
                        Err(RecordError::Cancelled)
                    }
                }
            }
            None => handle.await?,
        };

        if matches!(result, Err(RecordError::Cancelled)) {
            info!(
                event = %Event::WriteCancelled,
                request_id = %ctx.request_id,
                elapsed_ms = ctx.elapsed_ms() as u64,
                "write abandoned before commit"
            );
        }
        result
    }

    fn read_version(&self, ctx: &RequestContext, id: i64) -> RecordResult<RecordVersion> {
        ctx.check()?;
        validate_id(id)?;
        let row = self
            .store
            .latest(id)?
            .ok_or(RecordError::RecordNotFound(id))?;
        self.metrics.increment_reads();
        RecordVersion::from_row(row)
    }

    fn read_exact(
        &self,
        ctx: &RequestContext,
        id: i64,
        version: i64,
    ) -> RecordResult<RecordVersion> {
        ctx.check()?;
        validate_id(id)?;
        if version <= 0 {
            return Err(RecordError::InvalidId("version"));
        }
        let row = match self.store.get(id, version)? {
            Some(row) => row,
            // Versions are never removed, so a record seen here still
            // exists.
            None if self.store.contains_record(id)? => {
                return Err(RecordError::VersionNotFound { id, version })
            }
            None => return Err(RecordError::RecordNotFound(id)),
        };
        self.metrics.increment_reads();
        RecordVersion::from_row(row)
    }

    fn read_at(
        &self,
        ctx: &RequestContext,
        id: i64,
        timestamp_ms: i64,
    ) -> RecordResult<RecordVersion> {
        ctx.check()?;
        validate_id(id)?;
        let row = self
            .store
            .at_or_before(id, timestamp_ms)?
            .ok_or(RecordError::RecordNotFound(id))?;
        self.metrics.increment_time_travel_reads();
        RecordVersion::from_row(row)
    }

    fn read_history(&self, ctx: &RequestContext, id: i64) -> RecordResult<RecordVersions> {
        ctx.check()?;
        validate_id(id)?;
        let rows = self.store.history(id)?;
        if rows.is_empty() {
            return Err(RecordError::RecordNotFound(id));
        }
        let versions = rows
            .into_iter()
            .map(|row| RecordVersion::from_row(row).map(RecordVersion::into_info))
            .collect::<RecordResult<Vec<_>>>()?;
        self.metrics.increment_history_reads();
        Ok(RecordVersions { id, versions })
    }

    async fn create_version(
        &self,
        ctx: &RequestContext,
        id: i64,
        data: Snapshot,
    ) -> RecordResult<RecordVersion> {
        validate_id(id)?;
        let data_json = encode_snapshot(&data)?;

        let row = self
            .write(ctx, move |txn| {
                txn.insert(id, 1, data_json).map_err(|e| {
                    if e.is_constraint_violation() {
                        RecordError::RecordAlreadyExists(id)
                    } else {
                        e.into()
                    }
                })?;
                Ok(())
            })
            .await?;

        self.metrics.increment_records_created();
        debug!(event = %Event::RecordCreated, request_id = %ctx.request_id, record_id = id);
        RecordVersion::from_row(row)
    }

    async fn update_version(
        &self,
        ctx: &RequestContext,
        id: i64,
        updates: Updates,
        create_if_missing: bool,
    ) -> RecordResult<RecordVersion> {
        validate_id(id)?;

        let row = self
            .write(ctx, move |txn| {
                let (version, data) = match txn.latest(id)? {
                    Some(current) => {
                        let mut data = decode_snapshot(&current.data_json)?;
                        apply_updates(&mut data, &updates);
                        (current.version + 1, data)
                    }
                    None if create_if_missing => (1, initial_snapshot(&updates)),
                    None => return Err(RecordError::RecordNotFound(id)),
                };
                txn.insert(id, version, encode_snapshot(&data)?)?;
                Ok(())
            })
            .await?;

        if row.version == 1 {
            self.metrics.increment_records_created();
            debug!(event = %Event::RecordCreated, request_id = %ctx.request_id, record_id = id);
        } else {
            self.metrics.increment_versions_committed();
            debug!(
                event = %Event::VersionCommitted,
                request_id = %ctx.request_id,
                record_id = id,
                version = row.version
            );
        }
        RecordVersion::from_row(row)
    }
}

fn validate_id(id: i64) -> RecordResult<()> {
    if id > 0 {
        Ok(())
    } else {
        Err(RecordError::InvalidId("id"))
    }
}

impl RecordService for RecordEngine {
    async fn get_record(&self, ctx: &RequestContext, id: i64) -> RecordResult<Record> {
        self.observe(self.read_version(ctx, id).map(RecordVersion::into_record))
    }

    async fn create_record(
        &self,
        ctx: &RequestContext,
        id: i64,
        data: Snapshot,
    ) -> RecordResult<()> {
        let result = self.create_version(ctx, id, data).await;
        self.observe(result.map(|_| ()))
    }

    async fn update_record(
        &self,
        ctx: &RequestContext,
        id: i64,
        updates: Updates,
    ) -> RecordResult<Record> {
        let result = self.update_version(ctx, id, updates, false).await;
        self.observe(result.map(RecordVersion::into_record))
    }
}

impl VersionedRecordService for RecordEngine {
    async fn get_latest_record_version(
        &self,
        ctx: &RequestContext,
        id: i64,
    ) -> RecordResult<RecordVersion> {
        self.observe(self.read_version(ctx, id))
    }

    async fn get_record_version(
        &self,
        ctx: &RequestContext,
        id: i64,
        version: i64,
    ) -> RecordResult<RecordVersion> {
        self.observe(self.read_exact(ctx, id, version))
    }

    async fn get_record_version_at(
        &self,
        ctx: &RequestContext,
        id: i64,
        timestamp_ms: i64,
    ) -> RecordResult<RecordVersion> {
        self.observe(self.read_at(ctx, id, timestamp_ms))
    }

    async fn list_versions(&self, ctx: &RequestContext, id: i64) -> RecordResult<RecordVersions> {
        self.observe(self.read_history(ctx, id))
    }

    async fn create_or_update_record(
        &self,
        ctx: &RequestContext,
        id: i64,
        updates: Updates,
    ) -> RecordResult<RecordVersion> {
        let result = self.update_version(ctx, id, updates, true).await;
        self.observe(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ManualClock;
    use std::time::Duration;
    use tempfile::TempDir;

    fn engine(dir: &TempDir, clock: &Arc<ManualClock>) -> RecordEngine {
        RecordEngine::open_with_clock(dir.path(), clock.clone())
            .unwrap()
            .0
    }

    fn data(pairs: &[(&str, &str)]) -> Snapshot {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn set(key: &str, value: Option<&str>) -> Updates {
        let mut updates = Updates::new();
        updates.insert(key.to_string(), value.map(str::to_string));
        updates
    }

    #[tokio::test]
    async fn test_invalid_ids_rejected() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir, &Arc::new(ManualClock::new(1)));
        let ctx = RequestContext::new();

        assert!(matches!(
            engine.get_record(&ctx, 0).await,
            Err(RecordError::InvalidId("id"))
        ));
        assert!(matches!(
            engine.create_record(&ctx, -1, Snapshot::new()).await,
            Err(RecordError::InvalidId("id"))
        ));
        assert!(matches!(
            engine.get_record_version(&ctx, 1, 0).await,
            Err(RecordError::InvalidId("version"))
        ));
    }

    #[tokio::test]
    async fn test_update_missing_record() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir, &Arc::new(ManualClock::new(1)));

        let result = engine
            .update_record(&RequestContext::new(), 5, set("a", Some("1")))
            .await;
        assert!(matches!(result, Err(RecordError::RecordNotFound(5))));
        assert!(engine.store().history(5).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_version_not_found_vs_record_not_found() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir, &Arc::new(ManualClock::new(1)));
        let ctx = RequestContext::new();
        engine.create_record(&ctx, 1, data(&[("a", "1")])).await.unwrap();

        assert!(matches!(
            engine.get_record_version(&ctx, 1, 2).await,
            Err(RecordError::VersionNotFound { id: 1, version: 2 })
        ));
        assert!(matches!(
            engine.get_record_version(&ctx, 2, 1).await,
            Err(RecordError::RecordNotFound(2))
        ));
    }

    #[tokio::test]
    async fn test_create_or_update_creates_then_updates() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(100));
        let engine = engine(&dir, &clock);
        let ctx = RequestContext::new();

        let mut updates = set("hello", Some("world"));
        updates.insert("ignored".to_string(), None);
        let first = engine.create_or_update_record(&ctx, 1, updates).await.unwrap();
        assert_eq!(first.version, 1);
        assert_eq!(first.data, data(&[("hello", "world")]));

        clock.advance(10);
        let second = engine
            .create_or_update_record(&ctx, 1, set("hello", None))
            .await
            .unwrap();
        assert_eq!(second.version, 2);
        assert_eq!(second.created_at_ms, 110);
        assert!(second.data.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_context_commits_nothing() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir, &Arc::new(ManualClock::new(1)));
        let ctx = RequestContext::new();
        ctx.cancel();

        let result = engine.create_record(&ctx, 1, data(&[("a", "1")])).await;
        assert!(matches!(result, Err(RecordError::Cancelled)));
        assert!(!engine.store().contains_record(1).unwrap());
        assert_eq!(engine.metrics().snapshot().cancelled, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancel_while_waiting_for_writer() {
        let dir = TempDir::new().unwrap();
        let engine = Arc::new(engine(&dir, &Arc::new(ManualClock::new(1))));
        let ctx = RequestContext::new();

        let blocker = engine.store().begin_write().unwrap();
        let task = {
            let engine = Arc::clone(&engine);
            let ctx = ctx.clone();
            tokio::spawn(async move { engine.create_record(&ctx, 1, Snapshot::new()).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        ctx.cancel();
        drop(blocker);

        assert!(matches!(task.await.unwrap(), Err(RecordError::Cancelled)));
        assert!(!engine.store().contains_record(1).unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_deadline_expires_while_waiting_for_writer() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir, &Arc::new(ManualClock::new(1)));
        let ctx = RequestContext::with_timeout(Duration::from_millis(20));

        let blocker = engine.store().begin_write().unwrap();
        let result = engine.create_record(&ctx, 1, data(&[("a", "1")])).await;
        assert!(matches!(result, Err(RecordError::Cancelled)));
        assert!(ctx.is_cancelled());

        // The abandoned task gets the writer lock now and must not commit.
        drop(blocker);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!engine.store().contains_record(1).unwrap());

        let fresh = RequestContext::new();
        engine.create_record(&fresh, 1, Snapshot::new()).await.unwrap();
        assert_eq!(engine.store().history(1).unwrap().len(), 1);
        assert_eq!(engine.metrics().snapshot().cancelled, 1);
    }

    #[tokio::test]
    async fn test_expired_deadline_is_cancelled() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir, &Arc::new(ManualClock::new(1)));
        let ctx = RequestContext::with_timeout(Duration::ZERO);

        assert!(matches!(
            engine.get_record(&ctx, 1).await,
            Err(RecordError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn test_metrics_track_outcomes() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir, &Arc::new(ManualClock::new(1)));
        let ctx = RequestContext::new();

        engine.create_record(&ctx, 1, Snapshot::new()).await.unwrap();
        engine.update_record(&ctx, 1, set("a", Some("1"))).await.unwrap();
        engine.get_record(&ctx, 1).await.unwrap();
        engine.get_record_version_at(&ctx, 1, 1).await.unwrap();
        engine.list_versions(&ctx, 1).await.unwrap();
        let _ = engine.get_record(&ctx, 2).await;

        let snapshot = engine.metrics().snapshot();
        assert_eq!(snapshot.records_created, 1);
        assert_eq!(snapshot.versions_committed, 2);
        assert_eq!(snapshot.reads, 1);
        assert_eq!(snapshot.time_travel_reads, 1);
        assert_eq!(snapshot.history_reads, 1);
        assert_eq!(snapshot.client_errors, 1);
    }
}
