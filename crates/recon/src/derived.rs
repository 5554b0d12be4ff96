//! Derived columns computed per joined pair.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::allow_list::AutoPublishSet;
use crate::identity;
use crate::license::LicenseMap;
use crate::model::{JoinedPair, ReconciledRow};

/// Whole days the Open VSX copy trails the Marketplace one.
///
/// Partial days are truncated, and an Open VSX copy that is newer than the
/// Marketplace one counts as zero lag rather than a negative value.
pub fn publish_lag_days(primary: DateTime<Utc>, secondary: DateTime<Utc>) -> i64 {
    (primary - secondary).num_days().max(0)
}

pub fn is_ms_owned(namespace: &str, ms_owned: &HashSet<String>) -> bool {
    ms_owned.contains(&identity::normalize(namespace))
}

/// Flatten a joined pair into a report row.
pub fn build_row(
    pair: &JoinedPair<'_>,
    licenses: &LicenseMap,
    auto_publish: &AutoPublishSet,
    ms_owned: &HashSet<String>,
) -> ReconciledRow {
    let p = pair.primary;
    let s = pair.secondary;

    let lag = match (
        p.and_then(|p| p.last_updated),
        s.and_then(|s| s.last_updated),
    ) {
        (Some(pt), Some(st)) => Some(publish_lag_days(pt, st)),
        _ => None,
    };

    ReconciledRow {
        identity: pair.identity.clone(),
        primary_publisher: p.map(|p| p.publisher.clone()),
        primary_name: p.map(|p| p.name.clone()),
        primary_installs: p.map(|p| p.installs),
        primary_version: p.and_then(|p| p.version.clone()),
        primary_last_updated: p.and_then(|p| p.last_updated).map(|t| t.date_naive()),
        secondary_namespace: s.map(|s| s.namespace.clone()),
        secondary_name: s.map(|s| s.name.clone()),
        ms_owned_namespace: s.is_some_and(|s| is_ms_owned(&s.namespace, ms_owned)),
        secondary_publisher: s.and_then(|s| s.publisher.clone()),
        secondary_version: s.and_then(|s| s.version.clone()),
        secondary_last_updated: s.and_then(|s| s.last_updated).map(|t| t.date_naive()),
        secondary_downloads: s.map(|s| s.downloads),
        auto_publish: auto_publish.contains(&pair.identity),
        publish_lag_days: lag,
        secondary_verified: s.and_then(|s| s.verified),
        secondary_license: s.and_then(|s| s.license.clone()),
        primary_license: p.and_then(|_| licenses.license_for(&pair.identity).map(String::from)),
    }
}
