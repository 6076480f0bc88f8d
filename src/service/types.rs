//! Record types returned by the engine.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::errors::RecordResult;
use crate::storage::VersionRow;

/// A record's data at one version. Ordered so JSON output is stable.
pub type Snapshot = BTreeMap<String, String>;

/// Partial update: `Some` sets a key, `None` deletes it.
pub type Updates = BTreeMap<String, Option<String>>;

/// The current state of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: i64,
    pub data: Snapshot,
}

/// One immutable version of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordVersion {
    pub id: i64,
    pub version: i64,
    pub created_at_ms: i64,
    pub data: Snapshot,
}

/// A version entry inside [`RecordVersions`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: i64,
    pub created_at_ms: i64,
    pub data: Snapshot,
}

/// Full history of a record, ascending by version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordVersions {
    pub id: i64,
    pub versions: Vec<VersionInfo>,
}

/// Decodes a stored snapshot. `null` reads as an empty map.
pub(crate) fn decode_snapshot(data_json: &str) -> RecordResult<Snapshot> {
    let data: Option<Snapshot> = serde_json::from_str(data_json)?;
    Ok(data.unwrap_or_default())
}

pub(crate) fn encode_snapshot(snapshot: &Snapshot) -> RecordResult<String> {
    Ok(serde_json::to_string(snapshot)?)
}

impl RecordVersion {
    pub(crate) fn from_row(row: VersionRow) -> RecordResult<Self> {
        Ok(Self {
            data: decode_snapshot(&row.data_json)?,
            id: row.record_id,
            version: row.version,
            created_at_ms: row.created_at_ms,
        })
    }

    /// Drops the version metadata.
    pub fn into_record(self) -> Record {
        Record {
            id: self.id,
            data: self.data,
        }
    }

    pub fn into_info(self) -> VersionInfo {
        VersionInfo {
            version: self.version,
            created_at_ms: self.created_at_ms,
            data: self.data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(data_json: &str) -> VersionRow {
        VersionRow {
            record_id: 7,
            version: 3,
            created_at_ms: 1_700_000_000_000,
            data_json: data_json.to_string(),
        }
    }

    #[test]
    fn test_null_snapshot_reads_as_empty() {
        let version = RecordVersion::from_row(row("null")).unwrap();
        assert!(version.data.is_empty());
    }

    #[test]
    fn test_non_string_values_are_rejected() {
        assert!(RecordVersion::from_row(row(r#"{"a":1}"#)).is_err());
    }

    #[test]
    fn test_record_version_json_shape() {
        let version = RecordVersion::from_row(row(r#"{"hello":"world"}"#)).unwrap();
        let json = serde_json::to_value(&version).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": 7,
                "version": 3,
                "created_at_ms": 1_700_000_000_000i64,
                "data": {"hello": "world"}
            })
        );

        let record = serde_json::to_value(version.into_record()).unwrap();
        assert_eq!(record, serde_json::json!({"id": 7, "data": {"hello": "world"}}));
    }
}
