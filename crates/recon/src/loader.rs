//! Snapshot loading: raw registry JSON → typed records.
//!
//! Row-level defects never fail a load. A record without its owner or name
//! is dropped. Any other field that is missing or of the wrong type becomes
//! `None` (or 0 for counts) and the row is kept. Each case is logged with
//! whatever identity the record carries.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

use crate::config::FileConfig;
use crate::error::ReconError;
use crate::license::LicenseMap;
use crate::model::{PrimaryRecord, SecondaryRecord};

// ---------------------------------------------------------------------------
// Source trait
// ---------------------------------------------------------------------------

/// Where the reconciliation inputs come from.
pub trait SnapshotSource {
    fn primary_records(&self) -> Result<Vec<PrimaryRecord>, ReconError>;
    fn secondary_records(&self) -> Result<Vec<SecondaryRecord>, ReconError>;
    fn license_map(&self) -> Result<LicenseMap, ReconError>;
}

/// Snapshot files on local disk, named by [`FileConfig`].
pub struct JsonSnapshotStore {
    base_dir: PathBuf,
    files: FileConfig,
}

impl JsonSnapshotStore {
    pub fn new(base_dir: impl Into<PathBuf>, files: FileConfig) -> Self {
        Self {
            base_dir: base_dir.into(),
            files,
        }
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.base_dir.join(file)
    }
}

impl SnapshotSource for JsonSnapshotStore {
    fn primary_records(&self) -> Result<Vec<PrimaryRecord>, ReconError> {
        let path = self.path(&self.files.primary_snapshot);
        let items = read_snapshot_array(&path)?;
        let records = parse_primary_items(items);
        if records.is_empty() {
            return Err(ReconError::empty(format!(
                "VS Code Marketplace records in {}",
                path.display()
            )));
        }
        Ok(records)
    }

    fn secondary_records(&self) -> Result<Vec<SecondaryRecord>, ReconError> {
        let path = self.path(&self.files.secondary_snapshot);
        let items = read_snapshot_array(&path)?;
        let records = parse_secondary_items(items);
        if records.is_empty() {
            return Err(ReconError::empty(format!(
                "Open VSX records in {}",
                path.display()
            )));
        }
        Ok(records)
    }

    fn license_map(&self) -> Result<LicenseMap, ReconError> {
        let path = self.path(&self.files.license_map);
        let map = LicenseMap::load(&path)?;
        if map.is_empty() {
            return Err(ReconError::empty(format!(
                "license entries in {}",
                path.display()
            )));
        }
        Ok(map)
    }
}

/// Read a snapshot file as a JSON array of raw items.
///
/// An empty document (`[]`, or the `{}` older tooling wrote on failure)
/// yields an empty list; any other non-array value is a parse error.
pub fn read_snapshot_array(path: &Path) -> Result<Vec<serde_json::Value>, ReconError> {
    if !path.exists() {
        return Err(ReconError::MissingInput {
            path: path.display().to_string(),
        });
    }
    let data = std::fs::read_to_string(path)
        .map_err(|e| ReconError::Io(format!("cannot read {}: {e}", path.display())))?;
    parse_snapshot_array(&data, &path.display().to_string())
}

pub fn parse_snapshot_array(data: &str, origin: &str) -> Result<Vec<serde_json::Value>, ReconError> {
    let value: serde_json::Value =
        serde_json::from_str(data).map_err(|e| ReconError::SnapshotParse {
            path: origin.into(),
            message: e.to_string(),
        })?;
    match value {
        serde_json::Value::Array(items) => Ok(items),
        serde_json::Value::Object(map) if map.is_empty() => Ok(Vec::new()),
        _ => Err(ReconError::SnapshotParse {
            path: origin.into(),
            message: "expected a JSON array of extensions".into(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// Parse an ISO-8601 timestamp. Offsets are converted to UTC; a timestamp
/// without an offset is taken as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

// ---------------------------------------------------------------------------
// Field readers
// ---------------------------------------------------------------------------
//
// Each optional field is read on its own. A missing or null field is `None`;
// a field of the wrong type is `None` too, with a warning naming the record.
// Only owner and name decide whether a row survives.

/// Non-empty string at `pointer`, used for the identity fields.
fn identity_part(item: &Value, pointer: &str) -> Option<String> {
    item.pointer(pointer)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn string_field(value: Option<&Value>, field: &str, id: &str, registry: &str) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => {
            tracing::warn!("{registry} {id}: {field} is not a string ({other}), left empty");
            None
        }
    }
}

fn bool_field(value: Option<&Value>, field: &str, id: &str, registry: &str) -> Option<bool> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::Bool(b)) => Some(*b),
        Some(other) => {
            tracing::warn!("{registry} {id}: {field} is not a boolean ({other}), left empty");
            None
        }
    }
}

fn count_field(value: Option<&Value>, field: &str, id: &str, registry: &str) -> u64 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Number(n)) => match n.as_f64() {
            Some(v) if v.is_finite() && v > 0.0 => v as u64,
            _ => 0,
        },
        Some(other) => {
            tracing::warn!("{registry} {id}: {field} is not a number ({other}), counted as 0");
            0
        }
    }
}

fn timestamp_or_warn(
    value: Option<&Value>,
    field: &str,
    id: &str,
    registry: &str,
) -> Option<DateTime<Utc>> {
    let parsed = match value {
        None | Some(Value::Null) => {
            tracing::warn!("{registry} {id}: no {field}, date fields left empty");
            return None;
        }
        Some(Value::String(raw)) => parse_timestamp(raw),
        Some(_) => None,
    };
    if parsed.is_none() {
        if let Some(raw) = value {
            tracing::warn!("{registry} {id}: malformed {field} {raw}, date fields left empty");
        }
    }
    parsed
}

// ---------------------------------------------------------------------------
// Marketplace
// ---------------------------------------------------------------------------

const VS_CODE: &str = "VS Code";

/// Convert raw Marketplace items, dropping rows without publisher or name.
pub fn parse_primary_items(items: Vec<Value>) -> Vec<PrimaryRecord> {
    let mut records = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let publisher = identity_part(item, "/publisher/publisherName");
        let name = identity_part(item, "/extensionName");
        let (publisher, name) = match (publisher, name) {
            (Some(p), Some(n)) => (p, n),
            (p, n) => {
                tracing::warn!(
                    "{VS_CODE} record #{index} ({}.{}): missing publisher or name, dropped",
                    p.as_deref().unwrap_or("?"),
                    n.as_deref().unwrap_or("?"),
                );
                continue;
            }
        };

        let id = format!("{publisher}.{name}");
        let installs = item
            .get("statistics")
            .and_then(Value::as_array)
            .and_then(|stats| {
                stats
                    .iter()
                    .find(|s| s.get("statisticName").and_then(Value::as_str) == Some("install"))
            })
            .and_then(|s| s.get("value"));

        records.push(PrimaryRecord {
            last_updated: timestamp_or_warn(item.get("lastUpdated"), "lastUpdated", &id, VS_CODE),
            version: string_field(item.pointer("/versions/0/version"), "version", &id, VS_CODE),
            installs: count_field(installs, "install count", &id, VS_CODE),
            publisher,
            name,
        });
    }
    records
}

// ---------------------------------------------------------------------------
// Open VSX
// ---------------------------------------------------------------------------

const OPEN_VSX: &str = "Open VSX";

/// Convert raw Open VSX items, dropping rows without namespace or name.
pub fn parse_secondary_items(items: Vec<Value>) -> Vec<SecondaryRecord> {
    let mut records = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let namespace = identity_part(item, "/namespace");
        let name = identity_part(item, "/name");
        let (namespace, name) = match (namespace, name) {
            (Some(ns), Some(n)) => (ns, n),
            (ns, n) => {
                tracing::warn!(
                    "{OPEN_VSX} record #{index} ({}.{}): missing namespace or name, dropped",
                    ns.as_deref().unwrap_or("?"),
                    n.as_deref().unwrap_or("?"),
                );
                continue;
            }
        };

        let id = format!("{namespace}.{name}");
        records.push(SecondaryRecord {
            last_updated: timestamp_or_warn(item.get("timestamp"), "timestamp", &id, OPEN_VSX),
            publisher: string_field(
                item.pointer("/publishedBy/loginName"),
                "publisher",
                &id,
                OPEN_VSX,
            ),
            version: string_field(item.get("version"), "version", &id, OPEN_VSX),
            downloads: count_field(item.get("downloadCount"), "downloadCount", &id, OPEN_VSX),
            verified: bool_field(item.get("verified"), "verified", &id, OPEN_VSX),
            license: string_field(item.get("license"), "license", &id, OPEN_VSX),
            namespace,
            name,
        });
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use serde_json::json;

    #[test]
    fn parse_primary_full_record() {
        let items = vec![json!({
            "publisher": { "publisherName": "ms-python" },
            "extensionName": "python",
            "versions": [{ "version": "2024.2.1" }, { "version": "2024.2.0" }],
            "lastUpdated": "2024-03-05T17:03:26.567Z",
            "statistics": [
                { "statisticName": "averagerating", "value": 4.2 },
                { "statisticName": "install", "value": 123456.0 }
            ]
        })];
        let records = parse_primary_items(items);
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.identity(), "ms-python.python");
        assert_eq!(r.version.as_deref(), Some("2024.2.1"));
        assert_eq!(r.installs, 123456);
        let ts = r.last_updated.unwrap();
        assert_eq!((ts.year(), ts.month(), ts.day(), ts.hour()), (2024, 3, 5, 17));
    }

    #[test]
    fn primary_without_install_statistic_counts_zero() {
        let items = vec![json!({
            "publisher": { "publisherName": "acme" },
            "extensionName": "linter",
            "lastUpdated": "2024-01-10T00:00:00Z"
        })];
        let records = parse_primary_items(items);
        assert_eq!(records[0].installs, 0);
        assert!(records[0].version.is_none());
    }

    #[test]
    fn primary_missing_publisher_is_dropped() {
        let items = vec![
            json!({ "extensionName": "orphan", "lastUpdated": "2024-01-10T00:00:00Z" }),
            json!({ "publisher": { "publisherName": "" }, "extensionName": "blank" }),
            json!({ "publisher": { "publisherName": "acme" }, "extensionName": "kept" }),
        ];
        let records = parse_primary_items(items);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "kept");
    }

    #[test]
    fn primary_wrong_shape_is_dropped() {
        let items = vec![
            json!("not an object"),
            json!({ "publisher": { "publisherName": "acme" }, "extensionName": "ok" }),
        ];
        assert_eq!(parse_primary_items(items).len(), 1);
    }

    #[test]
    fn malformed_timestamp_becomes_none() {
        let items = vec![json!({
            "publisher": { "publisherName": "acme" },
            "extensionName": "linter",
            "lastUpdated": "last tuesday"
        })];
        let records = parse_primary_items(items);
        assert_eq!(records.len(), 1);
        assert!(records[0].last_updated.is_none());
    }

    #[test]
    fn parse_secondary_full_record() {
        let items = vec![json!({
            "namespace": "redhat",
            "name": "java",
            "publishedBy": { "loginName": "redhat-bot" },
            "version": "1.30.0",
            "timestamp": "2024-05-01T10:00:00.123456Z",
            "downloadCount": 4200,
            "verified": true,
            "license": "EPL-2.0"
        })];
        let records = parse_secondary_items(items);
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.identity(), "redhat.java");
        assert_eq!(r.publisher.as_deref(), Some("redhat-bot"));
        assert_eq!(r.downloads, 4200);
        assert_eq!(r.verified, Some(true));
        assert_eq!(r.license.as_deref(), Some("EPL-2.0"));
    }

    #[test]
    fn secondary_missing_name_is_dropped() {
        let items = vec![
            json!({ "namespace": "acme" }),
            json!({ "namespace": "acme", "name": "linter" }),
        ];
        let records = parse_secondary_items(items);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].downloads, 0);
        assert!(records[0].publisher.is_none());
    }

    #[test]
    fn numeric_timestamps_keep_the_row() {
        let primary = parse_primary_items(vec![json!({
            "publisher": { "publisherName": "acme" },
            "extensionName": "linter",
            "lastUpdated": 1704844800
        })]);
        assert_eq!(primary.len(), 1);
        assert!(primary[0].last_updated.is_none());

        let secondary = parse_secondary_items(vec![json!({
            "namespace": "acme",
            "name": "linter",
            "timestamp": 1704412800,
            "downloadCount": 12
        })]);
        assert_eq!(secondary.len(), 1);
        assert!(secondary[0].last_updated.is_none());
        assert_eq!(secondary[0].downloads, 12);
    }

    #[test]
    fn wrongly_typed_fields_are_nulled_not_dropped() {
        let records = parse_secondary_items(vec![json!({
            "namespace": "acme",
            "name": "linter",
            "publishedBy": { "loginName": 7 },
            "version": 2,
            "timestamp": "2024-01-05T00:00:00Z",
            "downloadCount": "lots",
            "verified": "yes",
            "license": ["MIT"]
        })]);
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.identity(), "acme.linter");
        assert!(r.verified.is_none());
        assert!(r.publisher.is_none());
        assert!(r.version.is_none());
        assert!(r.license.is_none());
        assert_eq!(r.downloads, 0);
        assert!(r.last_updated.is_some());
    }

    #[test]
    fn primary_wrongly_typed_version_and_installs_keep_the_row() {
        let records = parse_primary_items(vec![json!({
            "publisher": { "publisherName": "acme" },
            "extensionName": "linter",
            "versions": [{ "version": 1.5 }],
            "lastUpdated": "2024-01-10T00:00:00Z",
            "statistics": [{ "statisticName": "install", "value": "many" }]
        })]);
        assert_eq!(records.len(), 1);
        assert!(records[0].version.is_none());
        assert_eq!(records[0].installs, 0);
        assert!(records[0].last_updated.is_some());
    }

    #[test]
    fn absent_timestamp_keeps_the_row() {
        let records = parse_secondary_items(vec![json!({ "namespace": "acme", "name": "quiet" })]);
        assert_eq!(records.len(), 1);
        assert!(records[0].last_updated.is_none());
    }

    #[test]
    fn timestamp_offsets_convert_to_utc() {
        let ts = parse_timestamp("2024-01-10T23:30:00-02:00").unwrap();
        assert_eq!(ts.date_naive().to_string(), "2024-01-11");
        let naive = parse_timestamp("2024-01-10T08:00:00").unwrap();
        assert_eq!(naive.date_naive().to_string(), "2024-01-10");
        assert!(parse_timestamp("2024-01-10").is_none());
    }

    #[test]
    fn snapshot_array_shapes() {
        assert_eq!(parse_snapshot_array("[]", "t").unwrap().len(), 0);
        assert_eq!(parse_snapshot_array("{}", "t").unwrap().len(), 0);
        assert!(parse_snapshot_array(r#"{"a": 1}"#, "t").is_err());
        assert!(parse_snapshot_array("nope", "t").is_err());
    }

    #[test]
    fn store_reports_missing_and_empty_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonSnapshotStore::new(dir.path(), FileConfig::default());

        let err = store.primary_records().unwrap_err();
        assert!(matches!(err, ReconError::MissingInput { .. }));

        std::fs::write(dir.path().join("open_vsx_extensions.json"), "[]").unwrap();
        let err = store.secondary_records().unwrap_err();
        assert!(matches!(err, ReconError::EmptyInput { .. }));

        std::fs::write(dir.path().join("vs_code_licenses.json"), "{}").unwrap();
        let err = store.license_map().unwrap_err();
        assert!(matches!(err, ReconError::EmptyInput { .. }));
    }
}
