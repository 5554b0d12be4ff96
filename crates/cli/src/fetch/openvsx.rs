//! `vsxreport fetch openvsx`: list every Open VSX extension, then pull
//! each extension's detail document into a JSON snapshot plus a TSV.
//!
//! The same client answers live namespace lookups for `vsxreport index`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;
use url::Url;

use vsxreport_recon::index::{LookupError, NamespaceInfo, NamespaceLookup};
use vsxreport_recon::license::NO_LICENSE;
use vsxreport_recon::ReconConfig;

use crate::exit_codes;
use crate::CliError;

use super::common::{self, FetchClient, FetchFailure};

const TSV_COLUMNS: [&str; 19] = [
    "Name",
    "Namespace",
    "Versions",
    "Login Name",
    "Full Name",
    "License",
    "Timestamp",
    "Downloads",
    "Reviews",
    "Files",
    "PreRelease",
    "Verified",
    "Unrelated Publisher",
    "Namespace Access",
    "Preview",
    "Homepage",
    "Repo",
    "Bugs",
    "Bundled Extensions",
];

const PROGRESS_EVERY: usize = 100;

// ── Open VSX client ─────────────────────────────────────────────────

pub struct OpenVsxClient {
    listing: FetchClient,
    lookup: FetchClient,
    api: Url,
    token: Option<String>,
    page_size: u32,
}

impl OpenVsxClient {
    pub fn new(config: &ReconConfig, token: Option<String>) -> Result<Self, CliError> {
        Self::with_api(config, token, &config.endpoints.openvsx_api)
    }

    pub fn with_api(
        config: &ReconConfig,
        token: Option<String>,
        api: &str,
    ) -> Result<Self, CliError> {
        let api = Url::parse(api)
            .ok()
            .filter(|u| !u.cannot_be_a_base())
            .ok_or_else(|| CliError::config(format!("endpoints.openvsx_api is not a base URL: {api}")))?;

        Ok(Self {
            listing: FetchClient::new("Open VSX", config.fetch.listing)?,
            lookup: FetchClient::new("Open VSX namespace", config.fetch.namespace_lookup)?,
            api,
            token,
            page_size: config.fetch.openvsx_page_size,
        })
    }

    /// API root joined with percent-encoded path segments.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.api.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn with_token(
        &self,
        req: reqwest::blocking::RequestBuilder,
    ) -> reqwest::blocking::RequestBuilder {
        match &self.token {
            Some(token) => req.query(&[("token", token)]),
            None => req,
        }
    }

    /// Page through `/-/search` until `totalSize` entries are listed or a
    /// page comes back empty. A page that fails after retries ends the
    /// listing with what was gathered so far.
    pub fn list_extensions(&self) -> Vec<Value> {
        let url = self.endpoint(&["-", "search"]);
        let mut listed: Vec<Value> = Vec::new();

        loop {
            let offset = listed.len();
            let page = self.listing.get_json(|http| {
                self.with_token(
                    http.get(url.clone())
                        .query(&[("size", self.page_size as usize), ("offset", offset)]),
                )
            });

            let mut page = match page {
                Ok(page) => page,
                Err(e) => {
                    tracing::warn!("search page at offset {offset}: {e}; keeping {offset} listed");
                    break;
                }
            };

            let total = page["totalSize"].as_u64();
            let batch = match page.get_mut("extensions").map(Value::take) {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            };
            if batch.is_empty() {
                break;
            }

            listed.extend(batch);
            tracing::info!("listed {} extensions", listed.len());

            if total.is_some_and(|t| listed.len() as u64 >= t) {
                break;
            }
        }

        listed
    }

    pub fn extension_detail(&self, namespace: &str, name: &str) -> Result<Value, FetchFailure> {
        let url = self.endpoint(&[namespace, name]);
        self.listing
            .get_json(|http| self.with_token(http.get(url.clone())))
    }

    /// Fetch the detail document of every listed extension. Entries that
    /// still fail after retries are skipped.
    pub fn fetch_details(&self, listed: &[Value]) -> Vec<Value> {
        let total = listed.len();
        let mut details = Vec::with_capacity(total);

        for (i, item) in listed.iter().enumerate() {
            match (item["namespace"].as_str(), item["name"].as_str()) {
                (Some(namespace), Some(name)) => match self.extension_detail(namespace, name) {
                    Ok(detail) => details.push(detail),
                    Err(e) => tracing::warn!("skipping {namespace}.{name}: {e}"),
                },
                _ => tracing::warn!("listing entry {i} has no namespace/name, skipped"),
            }

            if (i + 1) % PROGRESS_EVERY == 0 {
                tracing::info!("processed {} of {total}", i + 1);
            }
        }

        details
    }
}

impl NamespaceLookup for OpenVsxClient {
    fn lookup(&self, namespace: &str) -> Result<NamespaceInfo, LookupError> {
        let url = self.endpoint(&[namespace]);
        let body = self
            .lookup
            .get_json(|http| http.get(url.clone()))
            .map_err(|e| match e {
                FetchFailure::Body { .. } => LookupError::Parse(e.to_string()),
                other => LookupError::Transport(other.to_string()),
            })?;

        let verified = body["verified"]
            .as_bool()
            .ok_or_else(|| LookupError::Parse(format!("{namespace}: no 'verified' flag")))?;

        // The registry reports extensions as a name → URL map.
        let extensions = match &body["extensions"] {
            Value::Object(map) => map.keys().cloned().collect(),
            Value::Array(items) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        };

        Ok(NamespaceInfo {
            verified,
            extensions,
        })
    }
}

// ── TSV + license summary ───────────────────────────────────────────

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Size of an array or object field; 0 when absent.
fn size(value: &Value) -> String {
    value
        .as_array()
        .map(Vec::len)
        .or_else(|| value.as_object().map(|m| m.len()))
        .unwrap_or(0)
        .to_string()
}

fn tsv_row(ext: &Value) -> [String; 19] {
    [
        cell(&ext["name"]),
        cell(&ext["namespace"]),
        size(&ext["allVersions"]),
        cell(&ext["publishedBy"]["loginName"]),
        cell(&ext["publishedBy"]["fullName"]),
        cell(&ext["license"]),
        cell(&ext["timestamp"]),
        cell(&ext["downloadCount"]),
        cell(&ext["reviewCount"]),
        size(&ext["files"]),
        cell(&ext["preRelease"]),
        cell(&ext["verified"]),
        cell(&ext["unrelatedPublisher"]),
        cell(&ext["namespaceAccess"]),
        cell(&ext["preview"]),
        cell(&ext["homepage"]),
        cell(&ext["repository"]),
        cell(&ext["bugs"]),
        size(&ext["dependencies"]),
    ]
}

fn write_tsv(details: &[Value], path: &Path) -> Result<(), CliError> {
    let mut writer = common::create_table_writer(path, b'\t')?;
    writer
        .write_record(TSV_COLUMNS)
        .map_err(|e| common::table_error(path, e))?;
    for ext in details {
        writer
            .write_record(tsv_row(ext))
            .map_err(|e| common::table_error(path, e))?;
    }
    writer.flush().map_err(|e| common::table_error(path, e))
}

/// Extension counts per declared license, sorted by license name.
pub(crate) fn license_counts(details: &[Value]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for ext in details {
        let license = ext["license"].as_str().unwrap_or(NO_LICENSE);
        *counts.entry(license.to_string()).or_insert(0) += 1;
    }
    counts
}

// ── Entry point ─────────────────────────────────────────────────────

pub fn cmd_fetch_openvsx(
    config: &ReconConfig,
    token: Option<String>,
    out: Option<PathBuf>,
    tsv: Option<PathBuf>,
    by_license: bool,
) -> Result<(), CliError> {
    let out = out.unwrap_or_else(|| PathBuf::from(&config.files.secondary_snapshot));
    let tsv = tsv.unwrap_or_else(|| PathBuf::from(&config.files.secondary_tsv));

    let token = common::resolve_token(token);
    if token.is_none() {
        tracing::info!("no {} set, querying Open VSX anonymously", common::TOKEN_ENV);
    }

    let client = OpenVsxClient::new(config, token)?;
    let listed = client.list_extensions();
    tracing::info!("fetching details for {} extensions", listed.len());
    let details = client.fetch_details(&listed);

    if details.is_empty() {
        return Err(CliError {
            code: exit_codes::EXIT_FETCH_EMPTY,
            message: "no Open VSX extensions fetched".into(),
            hint: Some(format!("{} was left untouched", out.display())),
        });
    }

    common::write_json_snapshot(&details, &out)?;
    write_tsv(&details, &tsv)?;

    println!(
        "{} of {} Open VSX extensions written to {} and {}",
        details.len(),
        listed.len(),
        out.display(),
        tsv.display(),
    );

    if by_license {
        for (license, count) in license_counts(&details) {
            println!("{count:>8}  {license}");
        }
    }

    Ok(())
}

// ── Tests ───────────────────────────────────────────────────────────
