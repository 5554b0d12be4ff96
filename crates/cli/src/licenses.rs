//! `vsxreport licenses`: resolve Marketplace license labels into the
//! persisted license map.

use std::path::PathBuf;

use vsxreport_recon::license::LicenseEntry;
use vsxreport_recon::loader::{parse_primary_items, read_snapshot_array};
use vsxreport_recon::{LicenseMap, PrimaryRecord, ReconConfig, ReconError};

use crate::fetch::common::FetchFailure;
use crate::fetch::license_asset::LicenseAssetClient;
use crate::CliError;

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct EnrichStats {
    pub seen: usize,
    pub resolved: usize,
    pub unresolved: usize,
}

/// Resolve every record whose license is absent or null. Records that
/// already hold a label are not requested again.
///
/// Stops at the first fatal fetch failure; everything resolved up to that
/// point is already in `licenses`.
pub(crate) fn enrich(
    client: &LicenseAssetClient,
    records: &[PrimaryRecord],
    licenses: &mut LicenseMap,
) -> Result<EnrichStats, FetchFailure> {
    let mut stats = EnrichStats::default();

    for record in records {
        stats.seen += 1;
        let id = record.identity();
        if !licenses.needs_resolution(&id) {
            continue;
        }

        let license = client.resolve(&record.publisher, &record.name)?;
        match &license {
            Some(label) => {
                stats.resolved += 1;
                tracing::info!("{id}: {label} ({} resolved, {} seen)", stats.resolved, stats.seen);
            }
            None => stats.unresolved += 1,
        }

        licenses.record(
            &id,
            LicenseEntry {
                license,
                version: record.version.clone(),
            },
        );
    }

    Ok(stats)
}

/// Entries stored with a null license; the next run requests them again.
pub(crate) fn pending_entries(licenses: &LicenseMap) -> usize {
    licenses
        .iter()
        .filter(|(_, entry)| entry.license.is_none())
        .count()
}

pub fn cmd_licenses(config: &ReconConfig) -> Result<(), CliError> {
    let snapshot = PathBuf::from(&config.files.primary_snapshot);
    let records = parse_primary_items(read_snapshot_array(&snapshot)?);
    if records.is_empty() {
        return Err(ReconError::empty(format!(
            "VS Code Marketplace records in {}",
            snapshot.display()
        ))
        .into());
    }

    let map_path = PathBuf::from(&config.files.license_map);
    let mut licenses = LicenseMap::load_or_default(&map_path);
    let known = licenses.len();

    let client = LicenseAssetClient::new(config)?;
    let outcome = enrich(&client, &records, &mut licenses);

    // Persist whatever was resolved, also when the loop stopped early.
    let saved = licenses.save(&map_path);
    if let (Err(fetch), Err(save)) = (&outcome, &saved) {
        tracing::error!("{save} (after: {fetch})");
    }
    let stats = outcome?;
    saved?;

    println!(
        "{} extensions checked, {} newly resolved, {} unresolved; {} entries in {} (was {known})",
        stats.seen,
        stats.resolved,
        stats.unresolved,
        licenses.len(),
        map_path.display(),
    );
    let pending = pending_entries(&licenses);
    if pending > 0 {
        println!("{pending} entries still pending; rerun `vsxreport licenses` to retry them");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use vsxreport_recon::RetryPolicy;

    fn record(publisher: &str, name: &str) -> PrimaryRecord {
        PrimaryRecord {
            publisher: publisher.into(),
            name: name.into(),
            version: Some("1.0.0".into()),
            last_updated: None,
            installs: 0,
        }
    }

    fn asset_path(publisher: &str, name: &str) -> String {
        format!(
            "/_apis/public/gallery/publisher/{publisher}/extension/{name}/latest/assetbyname/Microsoft.VisualStudio.Services.Content.License"
        )
    }

    fn client(server: &MockServer) -> LicenseAssetClient {
        let mut config = ReconConfig::default();
        config.fetch.license_asset = RetryPolicy::new(0, 0, 5);
        LicenseAssetClient::with_root(&config, server.base_url()).unwrap()
    }

    #[test]
    fn test_only_unresolved_entries_are_requested() {
        let server = MockServer::start();
        let known = server.mock(|when, then| {
            when.method(GET).path(asset_path("Acme", "linter"));
            then.status(200).body("MIT License\n");
        });
        let retried = server.mock(|when, then| {
            when.method(GET).path(asset_path("acme", "pending"));
            then.status(200).body("Apache License, Version 2.0");
        });
        let fresh = server.mock(|when, then| {
            when.method(GET).path(asset_path("acme", "fresh"));
            then.status(404);
        });

        let mut licenses = LicenseMap::from_json_str(
            r#"{
                "acme.linter": {"license": "MIT", "version": "0.9.0"},
                "acme.pending": {"license": null, "version": "1.0.0"}
            }"#,
            "test",
        )
        .unwrap();

        let records = vec![
            record("Acme", "linter"),
            record("acme", "pending"),
            record("acme", "fresh"),
        ];
        let stats = enrich(&client(&server), &records, &mut licenses).unwrap();

        known.assert_calls(0);
        retried.assert_calls(1);
        fresh.assert_calls(1);
        assert_eq!(stats, EnrichStats { seen: 3, resolved: 2, unresolved: 0 });
        assert_eq!(licenses.get("acme.linter").unwrap().version.as_deref(), Some("0.9.0"));
        assert_eq!(licenses.license_for("acme.pending"), Some("Apache"));
        assert_eq!(licenses.license_for("acme.fresh"), Some("None"));
        assert_eq!(pending_entries(&licenses), 0);
    }

    #[test]
    fn test_transport_failure_records_null() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path(asset_path("acme", "down"));
            then.status(500);
        });

        let mut licenses = LicenseMap::new();
        let stats = enrich(&client(&server), &[record("acme", "down")], &mut licenses).unwrap();

        assert_eq!(stats.unresolved, 1);
        let entry = licenses.get("acme.down").unwrap();
        assert!(entry.license.is_none());
        assert!(licenses.needs_resolution("acme.down"));
        assert_eq!(pending_entries(&licenses), 1);
    }

    #[test]
    fn test_rate_limit_stops_but_keeps_progress() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path(asset_path("acme", "first"));
            then.status(200).body("ISC License\n");
        });
        server.mock(|when, then| {
            when.method(GET).path(asset_path("acme", "second"));
            then.status(429);
        });
        let never = server.mock(|when, then| {
            when.method(GET).path(asset_path("acme", "third"));
            then.status(200).body("MIT ");
        });

        let mut licenses = LicenseMap::new();
        let records = vec![record("acme", "first"), record("acme", "second"), record("acme", "third")];
        let err = enrich(&client(&server), &records, &mut licenses).unwrap_err();

        assert!(matches!(err, FetchFailure::RateLimited { .. }));
        never.assert_calls(0);
        assert_eq!(licenses.license_for("acme.first"), Some("ISC"));
        assert_eq!(licenses.len(), 1);
    }
}
