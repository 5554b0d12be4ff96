//! License classification and the persisted identity → license map.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ReconError;
use crate::identity;

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

/// Label used when a license asset is missing or empty.
pub const NO_LICENSE: &str = "None";

const OTHER_TEXT_LIMIT: usize = 80;

/// Known license signatures, checked in order. The first label whose
/// needles appear anywhere in the text wins, so the more specific
/// families (LGPL, AGPL) must stay ahead of the bare `GPL` probe.
const SIGNATURES: &[(&[&str], &str)] = &[
    (&["MICROSOFT SOFTWARE LICENSE TERMS"], "Microsoft Commercial"),
    (&["MIT ", "MIT\n"], "MIT"),
    (&["Apache"], "Apache"),
    (&["Eclipse Public License"], "EPL"),
    (&["BSD ", "BSD\n"], "BSD"),
    (&["MPL ", "Mozilla"], "MPL"),
    (&["GNU LESSER", "GNU Lesser"], "LGPL"),
    (&["GNU GENERAL", "GNU General"], "GPL"),
    (&["GNU AFFERO", "GNU Affero"], "AGPL"),
    (&["GPL ", "GPL\n"], "GPL"),
    (&["ISC ", "ISC\n"], "ISC"),
    (&["Creative Commons", "creativecommons.org"], "Creative Commons"),
];

fn whitespace() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("static regex"))
}

/// Classify license text against [`SIGNATURES`].
///
/// Unrecognized text falls back to `Other - <first 80 chars>` with runs of
/// whitespace collapsed to single spaces.
pub fn classify_license_text(text: &str) -> String {
    for (needles, label) in SIGNATURES {
        if needles.iter().any(|n| text.contains(n)) {
            return (*label).to_string();
        }
    }

    let clean = whitespace().replace_all(text, " ");
    if clean.is_empty() {
        return NO_LICENSE.to_string();
    }
    let excerpt: String = clean.chars().take(OTHER_TEXT_LIMIT).collect();
    format!("Other - {excerpt}")
}

// ---------------------------------------------------------------------------
// License map
// ---------------------------------------------------------------------------

/// Resolved license for one Marketplace extension, with the version the
/// asset was read at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseEntry {
    pub license: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

/// Identity → license map persisted across runs.
///
/// Entries are append-only: once an identity resolves to a non-null
/// license it is never recomputed or replaced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LicenseMap {
    entries: BTreeMap<String, LicenseEntry>,
}

impl LicenseMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a license map document. Keys written by older runs with
    /// mixed-case ids are normalized; when two spellings collide the
    /// resolved one is kept.
    pub fn from_json_str(input: &str, origin: &str) -> Result<Self, ReconError> {
        let raw: BTreeMap<String, LicenseEntry> =
            serde_json::from_str(input).map_err(|e| ReconError::SnapshotParse {
                path: origin.into(),
                message: e.to_string(),
            })?;
        let mut map = Self::new();
        for (key, entry) in raw {
            map.record(&key, entry);
        }
        Ok(map)
    }

    /// Load from disk. A missing file is [`ReconError::MissingInput`].
    pub fn load(path: &Path) -> Result<Self, ReconError> {
        if !path.exists() {
            return Err(ReconError::MissingInput {
                path: path.display().to_string(),
            });
        }
        let data = std::fs::read_to_string(path)
            .map_err(|e| ReconError::Io(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json_str(&data, &path.display().to_string())
    }

    /// Load from disk, starting empty when the file is absent or unreadable.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(map) => map,
            Err(ReconError::MissingInput { .. }) => Self::new(),
            Err(e) => {
                tracing::warn!("{e}; starting with an empty license map");
                Self::new()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ReconError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ReconError::ReportWrite(e.to_string()))?;
        std::fs::write(path, json)
            .map_err(|e| ReconError::ReportWrite(format!("cannot write {}: {e}", path.display())))
    }

    pub fn get(&self, id: &str) -> Option<&LicenseEntry> {
        self.entries.get(&identity::normalize(id))
    }

    /// Resolved license label for `id`, if any.
    pub fn license_for(&self, id: &str) -> Option<&str> {
        self.get(id).and_then(|e| e.license.as_deref())
    }

    /// True when `id` is absent or still has a null license.
    pub fn needs_resolution(&self, id: &str) -> bool {
        self.license_for(id).is_none()
    }

    /// Store `entry` unless `id` already holds a non-null license.
    /// Returns whether the map changed.
    pub fn record(&mut self, id: &str, entry: LicenseEntry) -> bool {
        let key = identity::normalize(id);
        if let Some(existing) = self.entries.get(&key) {
            if existing.license.is_some() {
                return false;
            }
        }
        self.entries.insert(key, entry);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &LicenseEntry)> {
        self.entries.iter()
    }
}
