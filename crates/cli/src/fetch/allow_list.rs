//! Auto-publish allow-list (EclipseFdn `publish-extensions/extensions.json`).

use std::path::Path;

use vsxreport_recon::{AutoPublishSet, ReconConfig, ReconError, RetryPolicy};

use super::common::FetchClient;

/// Download the allow-list. Any failure is logged and yields an empty set,
/// which the reconciliation precondition then rejects.
pub fn fetch_auto_publish_set(config: &ReconConfig) -> AutoPublishSet {
    fetch_from(&config.endpoints.auto_publish_list, config.fetch.allow_list)
}

fn fetch_from(url: &str, policy: RetryPolicy) -> AutoPublishSet {
    let client = match FetchClient::new("auto-publish list", policy) {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!("{}", e.message);
            return AutoPublishSet::default();
        }
    };

    let set = client
        .get_json(|http| http.get(url))
        .map_err(|e| e.to_string())
        .and_then(|body| AutoPublishSet::from_json_value(&body).map_err(|e| e.to_string()));

    match set {
        Ok(set) => {
            tracing::info!("{} auto-publish entries from {url}", set.len());
            set
        }
        Err(e) => {
            tracing::warn!("could not load auto-publish list: {e}");
            AutoPublishSet::default()
        }
    }
}

/// Read a local copy of the allow-list (offline runs).
pub fn read_auto_publish_file(path: &Path) -> Result<AutoPublishSet, ReconError> {
    if !path.exists() {
        return Err(ReconError::MissingInput {
            path: path.display().to_string(),
        });
    }
    let data = std::fs::read_to_string(path)
        .map_err(|e| ReconError::Io(format!("cannot read {}: {e}", path.display())))?;
    AutoPublishSet::from_json_str(&data).map_err(|e| match e {
        ReconError::SnapshotParse { message, .. } => ReconError::SnapshotParse {
            path: path.display().to_string(),
            message,
        },
        other => other,
    })
}
