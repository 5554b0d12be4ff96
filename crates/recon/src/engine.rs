use std::cmp::Reverse;
use std::collections::HashSet;

use crate::config::ReconConfig;
use crate::derived::build_row;
use crate::error::ReconError;
use crate::evidence::compute_summary;
use crate::matcher::outer_join;
use crate::model::{ReconInput, ReconMeta, ReconResult, ReconciledRow};

/// Cross-registry reconciliation with a fixed configuration.
pub struct Reconciler {
    ms_owned: HashSet<String>,
}

impl Reconciler {
    pub fn new(config: &ReconConfig) -> Self {
        Self {
            ms_owned: config.ms_owned_set(),
        }
    }

    /// Join, derive, order. Fails only when an input collection is empty.
    pub fn reconcile(&self, input: &ReconInput) -> Result<Vec<ReconciledRow>, ReconError> {
        if input.primary.is_empty() {
            return Err(ReconError::empty("VS Code Marketplace records"));
        }
        if input.secondary.is_empty() {
            return Err(ReconError::empty("Open VSX records"));
        }
        if input.auto_publish.is_empty() {
            return Err(ReconError::empty("auto-publish entries"));
        }

        let mut rows: Vec<ReconciledRow> = outer_join(&input.primary, &input.secondary)
            .iter()
            .map(|pair| build_row(pair, &input.licenses, &input.auto_publish, &self.ms_owned))
            .collect();

        sort_rows(&mut rows);
        Ok(rows)
    }
}

/// Installs descending, then downloads descending; a missing side counts
/// as zero. Identity ascending breaks the remaining ties so the order is
/// total.
pub fn sort_rows(rows: &mut [ReconciledRow]) {
    rows.sort_by(|a, b| {
        let key = |r: &ReconciledRow| {
            (
                Reverse(r.primary_installs.unwrap_or(0)),
                Reverse(r.secondary_downloads.unwrap_or(0)),
            )
        };
        key(a).cmp(&key(b)).then_with(|| a.identity.cmp(&b.identity))
    });
}

/// Run reconciliation per config. Returns rows + summary.
pub fn run(config: &ReconConfig, input: &ReconInput) -> Result<ReconResult, ReconError> {
    let rows = Reconciler::new(config).reconcile(input)?;
    let summary = compute_summary(&rows);

    Ok(ReconResult {
        meta: ReconMeta {
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            primary_records: input.primary.len(),
            secondary_records: input.secondary.len(),
            auto_publish_entries: input.auto_publish.len(),
            license_entries: input.licenses.len(),
        },
        summary,
        rows,
    })
}
