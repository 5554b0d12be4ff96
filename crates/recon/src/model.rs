use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::allow_list::AutoPublishSet;
use crate::identity;
use crate::license::LicenseMap;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One extension from the VS Code Marketplace snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimaryRecord {
    pub publisher: String,
    pub name: String,
    pub version: Option<String>,
    /// `None` when the snapshot timestamp was missing or malformed.
    pub last_updated: Option<DateTime<Utc>>,
    pub installs: u64,
}

impl PrimaryRecord {
    pub fn identity(&self) -> String {
        identity::identity(&self.publisher, &self.name)
    }
}

/// One extension from the Open VSX snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct SecondaryRecord {
    pub namespace: String,
    pub name: String,
    /// Login name of the account that published the current version.
    pub publisher: Option<String>,
    pub version: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
    pub downloads: u64,
    pub verified: Option<bool>,
    pub license: Option<String>,
}

impl SecondaryRecord {
    pub fn identity(&self) -> String {
        identity::identity(&self.namespace, &self.name)
    }
}

/// Pre-loaded inputs for one reconciliation run.
pub struct ReconInput {
    pub primary: Vec<PrimaryRecord>,
    pub secondary: Vec<SecondaryRecord>,
    pub licenses: LicenseMap,
    pub auto_publish: AutoPublishSet,
}

// ---------------------------------------------------------------------------
// Join
// ---------------------------------------------------------------------------

/// Records sharing one normalized identity. At least one side is present.
#[derive(Debug, Clone)]
pub struct JoinedPair<'a> {
    pub identity: String,
    pub primary: Option<&'a PrimaryRecord>,
    pub secondary: Option<&'a SecondaryRecord>,
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// One report row: the outer-join of a Marketplace and an Open VSX record.
///
/// Columns of an absent side are `None`. Dates keep only the calendar day
/// (UTC) of the source timestamp; the time of day is dropped for every row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciledRow {
    pub identity: String,
    pub primary_publisher: Option<String>,
    pub primary_name: Option<String>,
    pub primary_installs: Option<u64>,
    pub primary_version: Option<String>,
    pub primary_last_updated: Option<NaiveDate>,
    pub secondary_namespace: Option<String>,
    pub secondary_name: Option<String>,
    pub ms_owned_namespace: bool,
    pub secondary_publisher: Option<String>,
    pub secondary_version: Option<String>,
    pub secondary_last_updated: Option<NaiveDate>,
    pub secondary_downloads: Option<u64>,
    pub auto_publish: bool,
    pub publish_lag_days: Option<i64>,
    pub secondary_verified: Option<bool>,
    pub secondary_license: Option<String>,
    pub primary_license: Option<String>,
}

impl ReconciledRow {
    pub fn has_primary(&self) -> bool {
        self.primary_publisher.is_some()
    }

    pub fn has_secondary(&self) -> bool {
        self.secondary_namespace.is_some()
    }
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconSummary {
    pub total_rows: usize,
    pub in_both: usize,
    pub primary_only: usize,
    pub secondary_only: usize,
    pub auto_published: usize,
    pub ms_owned: usize,
    /// Rows present on both sides whose Open VSX copy trails by a day or more.
    pub lagging: usize,
    pub max_lag_days: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconResult {
    pub meta: ReconMeta,
    pub summary: ReconSummary,
    pub rows: Vec<ReconciledRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconMeta {
    pub engine_version: String,
    pub primary_records: usize,
    pub secondary_records: usize,
    pub auto_publish_entries: usize,
    pub license_entries: usize,
}
