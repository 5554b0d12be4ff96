//! Auto-publish allow-list (EclipseFdn `publish-extensions/extensions.json`).

use std::collections::HashSet;

use crate::error::ReconError;
use crate::identity;

/// Schema marker carried as the first array element; never an extension id.
const SCHEMA_ENTRY: &str = "$schema";

/// Normalized identities allowed to auto-publish from the Marketplace to
/// Open VSX. Rebuilt from the remote list on every run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AutoPublishSet {
    ids: HashSet<String>,
}

impl AutoPublishSet {
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ids = entries
            .into_iter()
            .filter(|e| e.as_ref() != SCHEMA_ENTRY)
            .map(|e| identity::normalize(e.as_ref()))
            .collect();
        Self { ids }
    }

    /// Build from the decoded JSON document. Non-string items are ignored.
    pub fn from_json_value(value: &serde_json::Value) -> Result<Self, ReconError> {
        let items = value.as_array().ok_or_else(|| ReconError::SnapshotParse {
            path: "auto-publish list".into(),
            message: "expected a JSON array of strings".into(),
        })?;
        Ok(Self::from_entries(items.iter().filter_map(|v| v.as_str())))
    }

    pub fn from_json_str(input: &str) -> Result<Self, ReconError> {
        let value: serde_json::Value =
            serde_json::from_str(input).map_err(|e| ReconError::SnapshotParse {
                path: "auto-publish list".into(),
                message: e.to_string(),
            })?;
        Self::from_json_value(&value)
    }

    /// `identity` must already be normalized.
    pub fn contains(&self, identity: &str) -> bool {
        self.ids.contains(identity)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
