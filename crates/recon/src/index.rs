//! Namespace ↔ extension-name indexes over the Open VSX snapshot.
//!
//! Two maps are built: namespace → names published under it, and name →
//! namespaces that publish an extension with that short name. The second
//! one exists to surface collisions (possible impersonation), so it keeps
//! every namespace rather than deduplicating across them. Unverified
//! namespaces additionally carry the extension list the registry reports
//! for them, for manual review.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use crate::error::ReconError;
use crate::identity;
use crate::model::SecondaryRecord;

// ---------------------------------------------------------------------------
// Lookup seam
// ---------------------------------------------------------------------------

/// Live namespace details as reported by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceInfo {
    pub verified: bool,
    pub extensions: Vec<String>,
}

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("unexpected response: {0}")]
    Parse(String),
}

/// Namespace verification lookup (the Open VSX `/api/{namespace}` call in
/// production, a fixture map in tests).
pub trait NamespaceLookup {
    fn lookup(&self, namespace: &str) -> Result<NamespaceInfo, LookupError>;
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NamespaceReview {
    Verified,
    /// Needs a manual look; `reported_extensions` is what the registry
    /// lists for the namespace right now.
    Unverified { reported_extensions: Vec<String> },
    /// The live lookup failed. Distinct from a verified namespace with no
    /// extensions.
    LookupFailed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamespaceEntry {
    /// Namespace spelling as first seen in the snapshot.
    pub namespace: String,
    /// Extension names from the snapshot, in first-seen order, no repeats.
    pub extensions: Vec<String>,
    pub review: NamespaceReview,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NamespaceIndex {
    /// Keyed by normalized namespace.
    pub namespaces: BTreeMap<String, NamespaceEntry>,
    /// Keyed by normalized extension name; namespaces in first-seen order.
    pub names: BTreeMap<String, Vec<String>>,
}

impl NamespaceIndex {
    /// Extension names published by more than one namespace.
    pub fn collisions(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.names.iter().filter(|(_, namespaces)| namespaces.len() > 1)
    }

    pub fn unverified(&self) -> impl Iterator<Item = &NamespaceEntry> {
        self.namespaces
            .values()
            .filter(|e| matches!(e.review, NamespaceReview::Unverified { .. }))
    }

    pub fn lookup_failures(&self) -> impl Iterator<Item = &NamespaceEntry> {
        self.namespaces
            .values()
            .filter(|e| matches!(e.review, NamespaceReview::LookupFailed { .. }))
    }

    pub fn write_json(&self, path: &Path) -> Result<(), ReconError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ReconError::ReportWrite(e.to_string()))?;
        std::fs::write(path, json)
            .map_err(|e| ReconError::ReportWrite(format!("cannot write {}: {e}", path.display())))
    }
}

// ---------------------------------------------------------------------------
// Build
// ---------------------------------------------------------------------------

fn push_unique(list: &mut Vec<String>, value: &str) {
    let key = identity::normalize(value);
    if !list.iter().any(|v| identity::normalize(v) == key) {
        list.push(value.to_string());
    }
}

/// Build both indexes, looking each distinct namespace up exactly once.
pub fn build_indexes(records: &[SecondaryRecord], lookup: &dyn NamespaceLookup) -> NamespaceIndex {
    let mut namespaces: BTreeMap<String, (String, Vec<String>)> = BTreeMap::new();
    let mut names: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for record in records {
        let (_, extensions) = namespaces
            .entry(identity::normalize(&record.namespace))
            .or_insert_with(|| (record.namespace.clone(), Vec::new()));
        push_unique(extensions, &record.name);

        let publishers = names.entry(identity::normalize(&record.name)).or_default();
        push_unique(publishers, &record.namespace);
    }

    let total = namespaces.len();
    let mut index = NamespaceIndex {
        namespaces: BTreeMap::new(),
        names,
    };

    for (count, (key, (namespace, extensions))) in namespaces.into_iter().enumerate() {
        let review = match lookup.lookup(&namespace) {
            Ok(info) if info.verified => NamespaceReview::Verified,
            Ok(info) => NamespaceReview::Unverified {
                reported_extensions: info.extensions,
            },
            Err(e) => {
                tracing::warn!("namespace {namespace}: lookup failed ({e})");
                NamespaceReview::LookupFailed {
                    reason: e.to_string(),
                }
            }
        };
        if (count + 1) % 100 == 0 {
            tracing::info!("looked up {} of {total} namespaces", count + 1);
        }
        index.namespaces.insert(
            key,
            NamespaceEntry {
                namespace,
                extensions,
                review,
            },
        );
    }

    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    struct FixtureLookup {
        answers: HashMap<String, Result<NamespaceInfo, String>>,
        calls: RefCell<Vec<String>>,
    }

    impl FixtureLookup {
        fn new(answers: Vec<(&str, Result<NamespaceInfo, String>)>) -> Self {
            Self {
                answers: answers.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl NamespaceLookup for FixtureLookup {
        fn lookup(&self, namespace: &str) -> Result<NamespaceInfo, LookupError> {
            self.calls.borrow_mut().push(namespace.to_string());
            match self.answers.get(namespace) {
                Some(Ok(info)) => Ok(info.clone()),
                Some(Err(msg)) => Err(LookupError::Transport(msg.clone())),
                None => Err(LookupError::Parse("no fixture".into())),
            }
        }
    }

    fn rec(namespace: &str, name: &str) -> SecondaryRecord {
        SecondaryRecord {
            namespace: namespace.into(),
            name: name.into(),
            publisher: None,
            version: None,
            last_updated: None,
            downloads: 0,
            verified: None,
            license: None,
        }
    }

    fn verified() -> Result<NamespaceInfo, String> {
        Ok(NamespaceInfo {
            verified: true,
            extensions: vec![],
        })
    }

    #[test]
    fn namespace_lists_accumulate_without_repeats() {
        let records = vec![rec("acme", "linter"), rec("acme", "formatter"), rec("acme", "linter")];
        let lookup = FixtureLookup::new(vec![("acme", verified())]);
        let index = build_indexes(&records, &lookup);

        let entry = &index.namespaces["acme"];
        assert_eq!(entry.extensions, vec!["linter", "formatter"]);
        assert_eq!(entry.review, NamespaceReview::Verified);
    }

    #[test]
    fn name_collisions_are_preserved() {
        let records = vec![rec("acme", "linter"), rec("evil", "linter"), rec("acme", "other")];
        let lookup = FixtureLookup::new(vec![("acme", verified()), ("evil", verified())]);
        let index = build_indexes(&records, &lookup);

        assert_eq!(index.names["linter"], vec!["acme", "evil"]);
        let collisions: Vec<_> = index.collisions().map(|(n, _)| n.as_str()).collect();
        assert_eq!(collisions, vec!["linter"]);
    }

    #[test]
    fn unverified_namespace_carries_reported_extensions() {
        let records = vec![rec("squatter", "python")];
        let lookup = FixtureLookup::new(vec![(
            "squatter",
            Ok(NamespaceInfo {
                verified: false,
                extensions: vec!["python".into(), "pylance".into()],
            }),
        )]);
        let index = build_indexes(&records, &lookup);
        assert_eq!(
            index.namespaces["squatter"].review,
            NamespaceReview::Unverified {
                reported_extensions: vec!["python".into(), "pylance".into()]
            }
        );
        assert_eq!(index.unverified().count(), 1);
    }

    #[test]
    fn failed_lookup_is_marked_not_conflated() {
        let records = vec![rec("flaky", "ext"), rec("empty", "ext2")];
        let lookup = FixtureLookup::new(vec![
            ("flaky", Err("timed out".into())),
            ("empty", verified()),
        ]);
        let index = build_indexes(&records, &lookup);

        match &index.namespaces["flaky"].review {
            NamespaceReview::LookupFailed { reason } => assert!(reason.contains("timed out")),
            other => panic!("expected lookup failure, got {other:?}"),
        }
        assert_eq!(index.namespaces["empty"].review, NamespaceReview::Verified);
        assert_eq!(index.lookup_failures().count(), 1);
    }

    #[test]
    fn each_namespace_is_looked_up_once() {
        let records = vec![rec("Acme", "a"), rec("acme", "b"), rec("ACME", "c")];
        let lookup = FixtureLookup::new(vec![("Acme", verified())]);
        let index = build_indexes(&records, &lookup);

        assert_eq!(*lookup.calls.borrow(), vec!["Acme"]);
        assert_eq!(index.namespaces.len(), 1);
        assert_eq!(index.namespaces["acme"].namespace, "Acme");
        assert_eq!(index.namespaces["acme"].extensions, vec!["a", "b", "c"]);
    }

    #[test]
    fn serializes_namespaces_and_names() {
        let records = vec![rec("acme", "linter")];
        let lookup = FixtureLookup::new(vec![("acme", Err("down".into()))]);
        let index = build_indexes(&records, &lookup);
        let json = serde_json::to_value(&index).unwrap();
        assert_eq!(json["names"]["linter"][0], "acme");
        assert_eq!(json["namespaces"]["acme"]["review"]["status"], "lookup_failed");
    }
}
