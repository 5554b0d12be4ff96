//! `vsxreport fetch marketplace`: page the VS Code Marketplace gallery
//! into a JSON snapshot plus a CSV summary.
//!
//! The gallery caps result windows, so the catalog is walked one category
//! at a time (sorted by install count) and merged by `extensionId`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use serde_json::{json, Value};

use vsxreport_recon::loader::parse_timestamp;
use vsxreport_recon::ReconConfig;

use crate::exit_codes;
use crate::CliError;

use super::common::{self, FetchClient, FetchFailure};

// ── Constants ───────────────────────────────────────────────────────

const ACCEPT: &str = "application/json;api-version=3.0-preview.1";
const QUERY_FLAGS: u32 = 914;
const SORT_BY_INSTALLS: u32 = 4;
const DIRECTION_DESCENDING: u32 = 2;

const SOURCE_PROPERTY: &str = "Microsoft.VisualStudio.Services.Links.Source";
const PRICING_PROPERTY: &str = "Microsoft.VisualStudio.Services.Content.Pricing";

const SUMMARY_COLUMNS: [&str; 7] = [
    "MS Publisher (Namespace)",
    "MS Extension",
    "MS DisplayName",
    "MS Version",
    "MS Date",
    "Repo",
    "Pricing",
];

// ── Marketplace client ──────────────────────────────────────────────

pub struct MarketplaceClient {
    client: FetchClient,
    query_url: String,
    page_size: u32,
    page_delay: Duration,
}

impl MarketplaceClient {
    pub fn new(config: &ReconConfig) -> Result<Self, CliError> {
        Self::with_query_url(config, config.endpoints.marketplace_query.clone())
    }

    pub fn with_query_url(config: &ReconConfig, query_url: String) -> Result<Self, CliError> {
        Ok(Self {
            client: FetchClient::new("Marketplace", config.fetch.listing)?,
            query_url,
            page_size: config.fetch.marketplace_page_size,
            page_delay: Duration::from_secs(config.fetch.marketplace_page_delay_secs),
        })
    }

    fn query_page(&self, category: &str, page_number: u32) -> Result<Vec<Value>, FetchFailure> {
        let body = query_body(category, page_number, self.page_size).to_string();
        let mut response = self.client.get_json(|http| {
            http.post(&self.query_url)
                .header("content-type", "application/json")
                .header("accept", ACCEPT)
                .body(body.clone())
        })?;

        Ok(match response.pointer_mut("/results/0/extensions").map(Value::take) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        })
    }

    /// Walk every category, keeping the first copy of each `extensionId`.
    ///
    /// A category ends on an empty or short page, or on a request that
    /// fails after retries; the failure is logged and the next category
    /// still runs.
    pub fn fetch_all(&self, categories: &[String]) -> Vec<Value> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut all = Vec::new();

        for category in categories {
            tracing::info!("category: {category}");
            let mut page_number = 1u32;
            let mut previous_first: Option<String> = None;

            loop {
                let extensions = match self.query_page(category, page_number) {
                    Ok(extensions) => extensions,
                    Err(e) => {
                        tracing::warn!("{category} page {page_number}: {e}");
                        break;
                    }
                };
                if extensions.is_empty() {
                    break;
                }

                let first_id = extensions[0]
                    .get("extensionId")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                if first_id.is_some() && first_id == previous_first {
                    tracing::warn!("{category} page {page_number}: repeats the previous page, stopping");
                    break;
                }
                previous_first = first_id;

                let page_len = extensions.len();
                let mut fresh = 0usize;
                for ext in extensions {
                    let Some(id) = ext.get("extensionId").and_then(Value::as_str) else {
                        tracing::debug!("{category} page {page_number}: record without extensionId skipped");
                        continue;
                    };
                    if seen.insert(id.to_string()) {
                        all.push(ext);
                        fresh += 1;
                    }
                }

                tracing::info!(
                    "  page {page_number}: {page_len} extensions ({fresh} new), {} unique total",
                    all.len(),
                );

                if page_len < self.page_size as usize {
                    break;
                }
                page_number += 1;
                thread::sleep(self.page_delay);
            }
        }

        all
    }
}

fn query_body(category: &str, page_number: u32, page_size: u32) -> Value {
    json!({
        "assetTypes": [
            "Microsoft.VisualStudio.Services.Icons.Default",
            "Microsoft.VisualStudio.Services.Icons.Branding",
            "Microsoft.VisualStudio.Services.Icons.Small"
        ],
        "filters": [{
            "criteria": [
                { "filterType": 8, "value": "Microsoft.VisualStudio.Code" },
                { "filterType": 10, "value": "target:\"Microsoft.VisualStudio.Code\" " },
                { "filterType": 12, "value": "37888" },
                { "filterType": 5, "value": category }
            ],
            "direction": DIRECTION_DESCENDING,
            "pageSize": page_size,
            "pageNumber": page_number,
            "sortBy": SORT_BY_INSTALLS,
            "sortOrder": 0,
            "pagingToken": null
        }],
        "flags": QUERY_FLAGS
    })
}

// ── Summary rows ────────────────────────────────────────────────────

fn str_at<'a>(value: &'a Value, pointer: &str) -> &'a str {
    value.pointer(pointer).and_then(Value::as_str).unwrap_or("")
}

fn version_property(ext: &Value, key: &str) -> Option<String> {
    ext.pointer("/versions/0/properties")?
        .as_array()?
        .iter()
        .find(|p| p["key"].as_str() == Some(key))
        .and_then(|p| p["value"].as_str())
        .map(str::to_string)
}

/// `2024-01-10T08:15:00Z` → `1/10/2024`. Empty when unparseable.
fn short_date(raw: &str) -> String {
    parse_timestamp(raw)
        .map(|t| t.format("%-m/%-d/%Y").to_string())
        .unwrap_or_default()
}

fn summary_row(ext: &Value) -> [String; 7] {
    [
        str_at(ext, "/publisher/publisherName").to_string(),
        str_at(ext, "/extensionName").to_string(),
        str_at(ext, "/displayName").to_string(),
        str_at(ext, "/versions/0/version").to_string(),
        short_date(str_at(ext, "/versions/0/lastUpdated")),
        version_property(ext, SOURCE_PROPERTY).unwrap_or_default(),
        version_property(ext, PRICING_PROPERTY).unwrap_or_default(),
    ]
}

fn write_summary_csv(extensions: &[Value], path: &Path) -> Result<(), CliError> {
    let mut writer = common::create_table_writer(path, b',')?;
    writer
        .write_record(SUMMARY_COLUMNS)
        .map_err(|e| common::table_error(path, e))?;
    for ext in extensions {
        writer
            .write_record(summary_row(ext))
            .map_err(|e| common::table_error(path, e))?;
    }
    writer.flush().map_err(|e| common::table_error(path, e))
}

// ── Entry point ─────────────────────────────────────────────────────

pub fn cmd_fetch_marketplace(
    config: &ReconConfig,
    out: Option<PathBuf>,
    csv: Option<PathBuf>,
) -> Result<(), CliError> {
    let out = out.unwrap_or_else(|| PathBuf::from(&config.files.primary_snapshot));
    let csv = csv.unwrap_or_else(|| PathBuf::from(&config.files.primary_csv));

    tracing::info!(
        "fetching VS Code Marketplace extensions ({} categories)",
        config.fetch.marketplace_categories.len(),
    );

    let client = MarketplaceClient::new(config)?;
    let extensions = client.fetch_all(&config.fetch.marketplace_categories);

    if extensions.is_empty() {
        return Err(CliError {
            code: exit_codes::EXIT_FETCH_EMPTY,
            message: "no Marketplace extensions fetched".into(),
            hint: Some(format!("{} was left untouched", out.display())),
        });
    }

    common::write_json_snapshot(&extensions, &out)?;
    write_summary_csv(&extensions, &csv)?;

    println!(
        "{} Marketplace extensions written to {} and {}",
        extensions.len(),
        out.display(),
        csv.display(),
    );
    Ok(())
}

// ── Tests ───────────────────────────────────────────────────────────
