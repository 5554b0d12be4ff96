//! `vsxreport reconcile`: join the two registry snapshots into the
//! all-extensions metadata report.

use std::path::PathBuf;

use vsxreport_recon::report::{render_top_rows, write_csv_file, write_json_file};
use vsxreport_recon::{JsonSnapshotStore, ReconConfig, ReconInput, SnapshotSource};

use crate::fetch::allow_list::{fetch_auto_publish_set, read_auto_publish_file};
use crate::CliError;

pub struct ReconcileArgs {
    pub allow_list: Option<PathBuf>,
    pub out: Option<PathBuf>,
    pub json: Option<PathBuf>,
    pub top: usize,
}

pub fn cmd_reconcile(config: &ReconConfig, args: ReconcileArgs) -> Result<(), CliError> {
    let out = args
        .out
        .unwrap_or_else(|| PathBuf::from(&config.files.report_csv));
    let json = args
        .json
        .or_else(|| config.files.report_json.as_ref().map(PathBuf::from));
    if json.as_ref() == Some(&out) {
        return Err(CliError::args(format!(
            "CSV and JSON reports would both be written to {}",
            out.display()
        )));
    }

    // All inputs load before anything is written.
    let store = JsonSnapshotStore::new(".", config.files.clone());
    let primary = store.primary_records()?;
    let secondary = store.secondary_records()?;
    let licenses = store.license_map()?;

    let auto_publish = match &args.allow_list {
        Some(path) => read_auto_publish_file(path)?,
        None => fetch_auto_publish_set(config),
    };

    let input = ReconInput {
        primary,
        secondary,
        licenses,
        auto_publish,
    };

    let result = vsxreport_recon::run(config, &input).map_err(|e| {
        let err = CliError::from(e);
        if input.auto_publish.is_empty() {
            err.with_hint("check endpoints.auto_publish_list, or pass --allow-list <file>")
        } else {
            err
        }
    })?;

    write_csv_file(&result.rows, &out)?;

    if let Some(path) = &json {
        write_json_file(&result, path)?;
        tracing::info!("wrote {}", path.display());
    }

    let s = &result.summary;
    println!("{} extensions written to {}", s.total_rows, out.display());
    println!(
        "{} in both registries, {} Marketplace only, {} Open VSX only",
        s.in_both, s.primary_only, s.secondary_only,
    );
    println!("{} auto-published, {} in MS-owned namespaces", s.auto_published, s.ms_owned);
    if let Some(max) = s.max_lag_days {
        println!("{} lagging on Open VSX (max {max} days)", s.lagging);
    }

    if args.top > 0 {
        println!();
        println!("Top {} by installs:", args.top.min(result.rows.len()));
        println!("{}", render_top_rows(&result.rows, args.top));
    }

    Ok(())
}
