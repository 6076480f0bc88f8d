//! In-memory indexes over the version log
//!
//! The log is the source of truth; this table is rebuilt from it on open and
//! kept current by committed write transactions. Per record it keeps:
//!
//! - the dense version sequence, where `versions[i].version == i + 1`
//! - a `(created_at_ms, version)` ordered set for point-in-time lookups

use std::collections::{BTreeSet, HashMap};

use super::errors::{StorageError, StorageResult};
use super::record::VersionRow;

#[derive(Debug, Default)]
struct RecordHistory {
    versions: Vec<VersionRow>,
    by_time: BTreeSet<(i64, i64)>,
}

impl RecordHistory {
    fn latest(&self) -> Option<&VersionRow> {
        self.versions.last()
    }
}

/// Checks that `version` is the next dense version after `latest`.
pub(crate) fn check_next_version(
    record_id: i64,
    latest: Option<i64>,
    version: i64,
) -> StorageResult<()> {
    let current = latest.unwrap_or(0);
    if version >= 1 && version <= current {
        return Err(StorageError::duplicate_version(record_id, version));
    }
    if version != current + 1 {
        return Err(StorageError::version_gap(record_id, current + 1, version));
    }
    Ok(())
}

/// All committed version rows, indexed by record.
#[derive(Debug, Default)]
pub struct VersionTable {
    records: HashMap<i64, RecordHistory>,
    row_count: usize,
}

impl VersionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a row, enforcing `(record_id, version)` uniqueness and density.
    pub fn insert(&mut self, row: VersionRow) -> StorageResult<()> {
        check_next_version(
            row.record_id,
            self.latest(row.record_id).map(|r| r.version),
            row.version,
        )?;

        let history = self.records.entry(row.record_id).or_default();
        history.by_time.insert((row.created_at_ms, row.version));
        history.versions.push(row);
        self.row_count += 1;
        Ok(())
    }

    /// Latest version of a record.
    pub fn latest(&self, record_id: i64) -> Option<&VersionRow> {
        self.records.get(&record_id).and_then(RecordHistory::latest)
    }

    /// Exact `(record_id, version)` lookup.
    pub fn get(&self, record_id: i64, version: i64) -> Option<&VersionRow> {
        if version < 1 {
            return None;
        }
        self.records
            .get(&record_id)?
            .versions
            .get((version - 1) as usize)
    }

    /// The version in effect at `timestamp_ms`: greatest `created_at_ms`
    /// not after the timestamp, highest version among equal timestamps.
    pub fn at_or_before(&self, record_id: i64, timestamp_ms: i64) -> Option<&VersionRow> {
        let history = self.records.get(&record_id)?;
        let (_, version) = history
            .by_time
            .range(..=(timestamp_ms, i64::MAX))
            .next_back()?;
        history.versions.get((*version - 1) as usize)
    }

    /// Every version of a record in ascending version order.
    pub fn history(&self, record_id: i64) -> Option<&[VersionRow]> {
        self.records.get(&record_id).map(|h| h.versions.as_slice())
    }

    pub fn contains_record(&self, record_id: i64) -> bool {
        self.latest(record_id).is_some()
    }

    /// Number of distinct records.
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Number of version rows across all records.
    pub fn row_count(&self) -> usize {
        self.row_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::errors::StorageErrorCode;

    fn row(record_id: i64, version: i64, created_at_ms: i64) -> VersionRow {
        VersionRow {
            record_id,
            version,
            created_at_ms,
            data_json: format!(r#"{{"v":"{}"}}"#, version),
        }
    }

    fn table_with(rows: &[(i64, i64, i64)]) -> VersionTable {
        let mut table = VersionTable::new();
        for &(id, v, ts) in rows {
            table.insert(row(id, v, ts)).unwrap();
        }
        table
    }

    #[test]
    fn test_latest_is_max_version() {
        let table = table_with(&[(1, 1, 10), (1, 2, 20), (1, 3, 30)]);
        assert_eq!(table.latest(1).unwrap().version, 3);
        assert!(table.latest(2).is_none());
    }

    #[test]
    fn test_exact_lookup() {
        let table = table_with(&[(1, 1, 10), (1, 2, 20)]);
        assert_eq!(table.get(1, 2).unwrap().created_at_ms, 20);
        assert!(table.get(1, 3).is_none());
        assert!(table.get(1, 0).is_none());
        assert!(table.get(1, -4).is_none());
    }

    #[test]
    fn test_duplicate_version_rejected() {
        let mut table = table_with(&[(1, 1, 10)]);
        let err = table.insert(row(1, 1, 11)).unwrap_err();
        assert_eq!(err.code(), StorageErrorCode::ConstraintViolation);
        assert_eq!(table.row_count(), 1);
    }

    #[test]
    fn test_version_gap_rejected() {
        let mut table = VersionTable::new();
        assert!(table.insert(row(1, 2, 10)).is_err());
        table.insert(row(1, 1, 10)).unwrap();
        assert!(table.insert(row(1, 3, 10)).is_err());
        assert!(table.insert(row(1, 0, 10)).is_err());
    }

    #[test]
    fn test_at_or_before() {
        let table = table_with(&[(1, 1, 100), (1, 2, 200), (1, 3, 300)]);

        assert!(table.at_or_before(1, 99).is_none());
        assert_eq!(table.at_or_before(1, 100).unwrap().version, 1);
        assert_eq!(table.at_or_before(1, 250).unwrap().version, 2);
        assert_eq!(table.at_or_before(1, 300).unwrap().version, 3);
        assert_eq!(table.at_or_before(1, i64::MAX).unwrap().version, 3);
        assert!(table.at_or_before(2, i64::MAX).is_none());
    }

    #[test]
    fn test_equal_timestamps_prefer_highest_version() {
        let table = table_with(&[(1, 1, 100), (1, 2, 200), (1, 3, 200), (1, 4, 200), (1, 5, 300)]);
        assert_eq!(table.at_or_before(1, 200).unwrap().version, 4);
        assert_eq!(table.at_or_before(1, 299).unwrap().version, 4);
    }

    #[test]
    fn test_records_are_independent() {
        let table = table_with(&[(1, 1, 10), (2, 1, 5), (1, 2, 20)]);
        assert_eq!(table.record_count(), 2);
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.history(1).unwrap().len(), 2);
        assert_eq!(table.history(2).unwrap().len(), 1);
        assert!(table.history(3).is_none());
    }
}
