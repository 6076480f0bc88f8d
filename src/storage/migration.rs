//! Legacy store migration
//!
//! Before versioning, each record was a single mutable row in
//! `<data_dir>/data/records.dat` (latest frame per id wins). On every start
//! the legacy rows are folded into the version log as version 1, skipping
//! any record that already has versions. Re-running is a no-op. The legacy
//! file is read strictly: a damaged or truncated frame fails the migration.
//! All migrated rows are committed as one block, so a crash never leaves a
//! partial import.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{info, warn};

use super::errors::{StorageError, StorageResult};
use super::reader::LogReader;
use super::record::LegacyRow;
use super::store::{legacy_path, VersionStore};
use crate::observability::Event;

/// What a migration run did.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Legacy frames read, including superseded ones.
    pub legacy_rows_scanned: usize,
    /// Records inserted as version 1.
    pub records_migrated: usize,
    /// Records left alone because versions already exist.
    pub records_skipped: usize,
}

/// Normalizes a legacy snapshot to a JSON string map. `null` becomes `{}`.
fn normalize_snapshot(record_id: i64, data_json: &str) -> StorageResult<String> {
    let data: Option<BTreeMap<String, String>> =
        serde_json::from_str(data_json).map_err(|e| {
            StorageError::data_corruption(format!(
                "legacy record {} is not a string map: {}",
                record_id, e
            ))
        })?;

    serde_json::to_string(&data.unwrap_or_default()).map_err(|e| {
        StorageError::data_corruption(format!("failed to re-encode record {}: {}", record_id, e))
    })
}

/// Imports legacy single-row records into the version log.
pub fn migrate_legacy(store: &VersionStore) -> StorageResult<MigrationReport> {
    let path = legacy_path(store.data_dir());
    let mut report = MigrationReport::default();

    if !path.exists() {
        return Ok(report);
    }

    info!(event = %Event::MigrationStart, path = %path.display(), "migrating legacy records");

    let rows = LogReader::<LegacyRow>::open(&path)?.read_all()?;
    report.legacy_rows_scanned = rows.len();

    let mut latest: BTreeMap<i64, String> = BTreeMap::new();
    for row in rows {
        latest.insert(row.record_id, row.data_json);
    }

    let mut txn = store.begin_write()?;
    for (record_id, data_json) in latest {
        if record_id <= 0 {
            warn!(record_id, "skipping legacy record with non-positive id");
            report.records_skipped += 1;
            continue;
        }
        if txn.latest(record_id)?.is_some() {
            report.records_skipped += 1;
            continue;
        }
        let snapshot = normalize_snapshot(record_id, &data_json)?;
        txn.insert(record_id, 1, snapshot)?;
        report.records_migrated += 1;
    }
    txn.commit()?;

    info!(
        event = %Event::MigrationComplete,
        scanned = report.legacy_rows_scanned,
        migrated = report.records_migrated,
        skipped = report.records_skipped,
        "legacy migration finished"
    );

    Ok(report)
}
