use std::collections::HashSet;

use serde::Deserialize;

use crate::error::ReconError;
use crate::identity;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Run configuration shared by every `vsxreport` command.
///
/// Every field has a default, so an empty TOML document (or no file at all)
/// yields the stock setup: snapshot files in the working directory, the
/// public Marketplace / Open VSX endpoints and the EclipseFdn allow-list.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReconConfig {
    pub files: FileConfig,
    pub endpoints: EndpointConfig,
    pub fetch: FetchConfig,
    /// Open VSX namespaces known to belong to Microsoft.
    pub ms_owned_namespaces: Vec<String>,
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            files: FileConfig::default(),
            endpoints: EndpointConfig::default(),
            fetch: FetchConfig::default(),
            ms_owned_namespaces: default_ms_owned_namespaces(),
        }
    }
}

pub const DEFAULT_MS_OWNED_NAMESPACES: &[&str] = &[
    "ms-python",
    "ms-toolsai",
    "ms-vscode",
    "ms-azuretools",
    "dbaeumer",
    "MS-CEINTL",
    "vscjava",
    "GitHub",
    "ms-kubernetes-tools",
    "ms-edgedevtools",
    "ms-playwright",
    "MS-SarifVSCode",
    "msjsdiag",
];

fn default_ms_owned_namespaces() -> Vec<String> {
    DEFAULT_MS_OWNED_NAMESPACES.iter().map(|s| s.to_string()).collect()
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

/// Local file names, resolved relative to the working directory.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub primary_snapshot: String,
    pub primary_csv: String,
    pub secondary_snapshot: String,
    pub secondary_tsv: String,
    pub license_map: String,
    pub report_csv: String,
    pub report_json: Option<String>,
    pub namespace_index: String,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            primary_snapshot: "vs_code_extensions.json".into(),
            primary_csv: "vs_code_extensions.csv".into(),
            secondary_snapshot: "open_vsx_extensions.json".into(),
            secondary_tsv: "open_vsx_extensions.tsv".into(),
            license_map: "vs_code_licenses.json".into(),
            report_csv: "all_extensions_metadata.csv".into(),
            report_json: None,
            namespace_index: "namespaces_and_extension_names.json".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Endpoints
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Gallery `extensionquery` endpoint.
    pub marketplace_query: String,
    /// Host suffix for per-publisher asset URLs (`{publisher}.{host}`).
    pub marketplace_asset_host: String,
    /// Open VSX REST API root (no trailing slash).
    pub openvsx_api: String,
    /// JSON array of extension ids allowed to auto-publish.
    pub auto_publish_list: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            marketplace_query:
                "https://marketplace.visualstudio.com/_apis/public/gallery/extensionquery".into(),
            marketplace_asset_host: "gallery.vsassets.io".into(),
            openvsx_api: "https://open-vsx.org/api".into(),
            auto_publish_list: "https://raw.githubusercontent.com/EclipseFdn/publish-extensions/refs/heads/master/extensions.json".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Fetch
// ---------------------------------------------------------------------------

/// Bounded retry with a fixed (non-growing) delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    #[serde(default)]
    pub delay_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl RetryPolicy {
    pub const fn new(max_retries: u32, delay_secs: u64, timeout_secs: u64) -> Self {
        Self {
            max_retries,
            delay_secs,
            timeout_secs,
        }
    }

    /// Total attempts including the first one.
    pub fn attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

pub const MARKETPLACE_CATEGORIES: &[&str] = &[
    "Azure",
    "Data Science",
    "Debuggers",
    "Education",
    "Extension Packs",
    "Formatters",
    "Keymaps",
    "Language Packs",
    "Linters",
    "Machine Learning",
    "Notebooks",
    "Programming Languages",
    "SCM Providers",
    "Snippets",
    "Testing",
    "Themes",
    "Visualization",
    // Catch-all, usually the largest; keep it last.
    "Other",
];

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub listing: RetryPolicy,
    pub namespace_lookup: RetryPolicy,
    pub allow_list: RetryPolicy,
    pub license_asset: RetryPolicy,
    pub marketplace_page_size: u32,
    pub marketplace_page_delay_secs: u64,
    pub marketplace_categories: Vec<String>,
    pub openvsx_page_size: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            listing: RetryPolicy::new(5, 2, 30),
            namespace_lookup: RetryPolicy::new(5, 5, 10),
            allow_list: RetryPolicy::new(0, 0, 10),
            license_asset: RetryPolicy::new(2, 1, 30),
            marketplace_page_size: 1000,
            marketplace_page_delay_secs: 5,
            marketplace_categories: MARKETPLACE_CATEGORIES.iter().map(|s| s.to_string()).collect(),
            openvsx_page_size: 100,
        }
    }
}

const MAX_RETRY_DELAY_SECS: u64 = 300;

/// Largest page the gallery `extensionquery` endpoint returns. The
/// Marketplace walk ends a category on a page shorter than the request.
pub const MAX_MARKETPLACE_PAGE_SIZE: u32 = 1000;

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        let files = [
            ("primary_snapshot", &self.files.primary_snapshot),
            ("primary_csv", &self.files.primary_csv),
            ("secondary_snapshot", &self.files.secondary_snapshot),
            ("secondary_tsv", &self.files.secondary_tsv),
            ("license_map", &self.files.license_map),
            ("report_csv", &self.files.report_csv),
            ("namespace_index", &self.files.namespace_index),
        ];
        for (field, value) in files {
            if value.trim().is_empty() {
                return Err(ReconError::ConfigValidation(format!(
                    "files.{field} must not be empty"
                )));
            }
        }

        if self.fetch.marketplace_page_size == 0 || self.fetch.openvsx_page_size == 0 {
            return Err(ReconError::ConfigValidation(
                "page sizes must be greater than zero".into(),
            ));
        }

        if self.fetch.marketplace_page_size > MAX_MARKETPLACE_PAGE_SIZE {
            return Err(ReconError::ConfigValidation(format!(
                "fetch.marketplace_page_size must be at most {MAX_MARKETPLACE_PAGE_SIZE}, got {}",
                self.fetch.marketplace_page_size
            )));
        }

        if self.fetch.marketplace_categories.is_empty() {
            return Err(ReconError::ConfigValidation(
                "fetch.marketplace_categories must list at least one category".into(),
            ));
        }

        let policies = [
            ("listing", &self.fetch.listing),
            ("namespace_lookup", &self.fetch.namespace_lookup),
            ("allow_list", &self.fetch.allow_list),
            ("license_asset", &self.fetch.license_asset),
        ];
        for (name, policy) in policies {
            if policy.delay_secs > MAX_RETRY_DELAY_SECS {
                return Err(ReconError::ConfigValidation(format!(
                    "fetch.{name}.delay_secs must be at most {MAX_RETRY_DELAY_SECS}, got {}",
                    policy.delay_secs
                )));
            }
        }

        Ok(())
    }

    /// Normalized lookup set for the MS-owned namespace check.
    pub fn ms_owned_set(&self) -> HashSet<String> {
        self.ms_owned_namespaces
            .iter()
            .map(|ns| identity::normalize(ns))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
