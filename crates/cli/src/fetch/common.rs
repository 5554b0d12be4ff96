//! Shared infrastructure for the registry adapters.
//!
//! Each adapter (marketplace, openvsx, license assets, allow-list) reuses:
//! - `FetchClient`: blocking HTTP client with bounded fixed-delay retry
//!   and status classification
//! - `FetchFailure`: what went wrong once retries are spent
//! - `resolve_token`: flag > env > anonymous
//! - `write_json_snapshot` / `create_table_writer`: output files
//!
//! # Retry contract
//!
//! | Outcome             | Retried | Result after the last attempt        |
//! |---------------------|---------|--------------------------------------|
//! | 2xx                 | -       | response returned                    |
//! | 401 / 403           | no      | `FetchFailure::Auth`                 |
//! | other 4xx (not 429) | no      | `FetchFailure::Rejected`             |
//! | 429                 | yes     | `FetchFailure::RateLimited`          |
//! | 5xx                 | yes     | `FetchFailure::Upstream`             |
//! | transport error     | yes     | `FetchFailure::Transport`            |
//!
//! The delay between attempts is fixed (`RetryPolicy::delay_secs`); it does
//! not grow. Adapters decide whether a failure is fatal for the run or only
//! for the one entity being fetched.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::thread;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use vsxreport_recon::RetryPolicy;

use crate::exit_codes;
use crate::CliError;

// ── Constants ───────────────────────────────────────────────────────

pub(crate) const USER_AGENT: &str = concat!("vsxreport/", env!("CARGO_PKG_VERSION"));

/// Environment variable holding the optional Open VSX access token.
pub(crate) const TOKEN_ENV: &str = "ACCESS_TOKEN";

// ── Failure classification ──────────────────────────────────────────

#[derive(Debug, Error)]
pub(crate) enum FetchFailure {
    #[error("{service} auth failed (HTTP {status})")]
    Auth { service: String, status: u16 },

    #[error("{service} request rejected (HTTP {status})")]
    Rejected { service: String, status: u16 },

    #[error("{service} rate limited after {attempts} attempts")]
    RateLimited { service: String, attempts: u32 },

    #[error("{service} upstream error (HTTP {status}) after {attempts} attempts")]
    Upstream {
        service: String,
        status: u16,
        attempts: u32,
    },

    #[error("{service} unreachable after {attempts} attempts: {detail}")]
    Transport {
        service: String,
        attempts: u32,
        detail: String,
    },

    #[error("{service} sent an unreadable response: {detail}")]
    Body { service: String, detail: String },
}

impl FetchFailure {
    /// HTTP status of the final response, when there was one.
    pub(crate) fn status(&self) -> Option<u16> {
        match self {
            Self::Auth { status, .. }
            | Self::Rejected { status, .. }
            | Self::Upstream { status, .. } => Some(*status),
            Self::RateLimited { .. } => Some(429),
            Self::Transport { .. } | Self::Body { .. } => None,
        }
    }

    pub(crate) fn exit_code(&self) -> u8 {
        match self {
            Self::Auth { .. } => exit_codes::EXIT_FETCH_AUTH,
            Self::Rejected { .. } => exit_codes::EXIT_FETCH_REJECTED,
            Self::RateLimited { .. } => exit_codes::EXIT_FETCH_RATE_LIMIT,
            Self::Upstream { .. } | Self::Transport { .. } | Self::Body { .. } => {
                exit_codes::EXIT_FETCH_UPSTREAM
            }
        }
    }
}

impl From<FetchFailure> for CliError {
    fn from(err: FetchFailure) -> Self {
        CliError {
            code: err.exit_code(),
            message: err.to_string(),
            hint: None,
        }
    }
}

// ── FetchClient ─────────────────────────────────────────────────────

/// Shared HTTP client that handles retry and error classification.
///
/// Adapters own their URLs and query parameters. They pass a
/// request-building closure which is called once per attempt.
pub(crate) struct FetchClient {
    http: reqwest::blocking::Client,
    service: String,
    policy: RetryPolicy,
}

impl FetchClient {
    pub(crate) fn new(service: &str, policy: RetryPolicy) -> Result<Self, CliError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(policy.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| CliError {
                code: exit_codes::EXIT_ERROR,
                message: format!("cannot build HTTP client for {service}: {e}"),
                hint: None,
            })?;

        Ok(Self {
            http,
            service: service.to_string(),
            policy,
        })
    }

    /// Send with retry. Returns the first 2xx response.
    pub(crate) fn send(
        &self,
        build_request: impl Fn(&reqwest::blocking::Client) -> reqwest::blocking::RequestBuilder,
    ) -> Result<reqwest::blocking::Response, FetchFailure> {
        let attempts = self.policy.attempts();

        for attempt in 1..=attempts {
            let reason = match build_request(&self.http).send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if resp.status().is_success() {
                        return Ok(resp);
                    }

                    if status == 401 || status == 403 {
                        return Err(FetchFailure::Auth {
                            service: self.service.clone(),
                            status,
                        });
                    }

                    if status != 429 && status < 500 {
                        return Err(FetchFailure::Rejected {
                            service: self.service.clone(),
                            status,
                        });
                    }

                    if attempt == attempts {
                        return Err(if status == 429 {
                            FetchFailure::RateLimited {
                                service: self.service.clone(),
                                attempts,
                            }
                        } else {
                            FetchFailure::Upstream {
                                service: self.service.clone(),
                                status,
                                attempts,
                            }
                        });
                    }

                    format!("HTTP {status}")
                }
                Err(e) => {
                    if attempt == attempts {
                        return Err(FetchFailure::Transport {
                            service: self.service.clone(),
                            attempts,
                            detail: e.to_string(),
                        });
                    }
                    e.to_string()
                }
            };

            tracing::warn!(
                "{}: retry {}/{} in {}s ({})",
                self.service,
                attempt,
                self.policy.max_retries,
                self.policy.delay_secs,
                reason,
            );
            thread::sleep(Duration::from_secs(self.policy.delay_secs));
        }

        unreachable!("attempts() is always at least 1")
    }

    /// Send with retry and return the body as text.
    pub(crate) fn get_text(
        &self,
        build_request: impl Fn(&reqwest::blocking::Client) -> reqwest::blocking::RequestBuilder,
    ) -> Result<String, FetchFailure> {
        let resp = self.send(build_request)?;
        resp.text().map_err(|e| FetchFailure::Body {
            service: self.service.clone(),
            detail: e.to_string(),
        })
    }

    /// Send with retry and parse the body as JSON. A leading BOM is ignored.
    pub(crate) fn get_json(
        &self,
        build_request: impl Fn(&reqwest::blocking::Client) -> reqwest::blocking::RequestBuilder,
    ) -> Result<serde_json::Value, FetchFailure> {
        let text = self.get_text(build_request)?;
        let trimmed = text.trim_start_matches('\u{feff}');
        serde_json::from_str(trimmed).map_err(|e| FetchFailure::Body {
            service: self.service.clone(),
            detail: format!("{e} (body: {})", excerpt(trimmed)),
        })
    }
}

fn excerpt(text: &str) -> String {
    text.chars().take(200).collect()
}

// ── Shared helpers ──────────────────────────────────────────────────

/// Resolve the Open VSX token: flag value > `ACCESS_TOKEN` > anonymous.
pub(crate) fn resolve_token(flag: Option<String>) -> Option<String> {
    resolve_token_from(flag, TOKEN_ENV)
}

fn resolve_token_from(flag: Option<String>, env_var: &str) -> Option<String> {
    if let Some(token) = flag {
        let trimmed = token.trim();
        return (!trimmed.is_empty()).then(|| trimmed.to_string());
    }

    std::env::var(env_var)
        .ok()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Write records as a pretty-printed JSON array.
pub(crate) fn write_json_snapshot<T: Serialize + ?Sized>(
    items: &T,
    path: &Path,
) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(items)
        .map_err(|e| CliError::output(format!("JSON serialization error: {e}")))?;
    std::fs::write(path, json)
        .map_err(|e| CliError::output(format!("cannot write {}: {e}", path.display())))
}

/// Open a CSV (`b','`) or TSV (`b'\t'`) writer with `\n` line endings.
pub(crate) fn create_table_writer(
    path: &Path,
    delimiter: u8,
) -> Result<csv::Writer<BufWriter<File>>, CliError> {
    let file = File::create(path)
        .map_err(|e| CliError::output(format!("cannot create {}: {e}", path.display())))?;
    Ok(csv::WriterBuilder::new()
        .delimiter(delimiter)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(BufWriter::new(file)))
}

pub(crate) fn table_error(path: &Path, e: impl std::fmt::Display) -> CliError {
    CliError::output(format!("cannot write {}: {e}", path.display()))
}

// ── Tests ───────────────────────────────────────────────────────────
