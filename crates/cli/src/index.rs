//! `vsxreport index`: namespace / extension-name indexes over the Open VSX
//! snapshot, with live verification lookups.

use std::path::PathBuf;

use vsxreport_recon::{build_indexes, JsonSnapshotStore, ReconConfig, SnapshotSource};

use crate::fetch::openvsx::OpenVsxClient;
use crate::CliError;

pub fn cmd_index(config: &ReconConfig, out: Option<PathBuf>) -> Result<(), CliError> {
    let store = JsonSnapshotStore::new(".", config.files.clone());
    let records = store.secondary_records()?;

    // Namespace lookups are public; no token is sent.
    let client = OpenVsxClient::new(config, None)?;
    tracing::info!("indexing {} Open VSX extensions", records.len());
    let index = build_indexes(&records, &client);

    let out = out.unwrap_or_else(|| PathBuf::from(&config.files.namespace_index));
    index.write_json(&out)?;

    println!(
        "{} namespaces, {} extension names written to {}",
        index.namespaces.len(),
        index.names.len(),
        out.display(),
    );
    println!(
        "{} names shared across namespaces, {} unverified namespaces, {} failed lookups",
        index.collisions().count(),
        index.unverified().count(),
        index.lookup_failures().count(),
    );
    Ok(())
}
