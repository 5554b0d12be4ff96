// vsxreport - VS Code Marketplace / Open VSX extension reports

mod exit_codes;
mod fetch;
mod index;
mod licenses;
mod recon;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vsxreport_recon::{ReconConfig, ReconError};

use exit_codes::{
    EXIT_CONFIG_INVALID, EXIT_ERROR, EXIT_INPUT_MISSING, EXIT_INPUT_PARSE, EXIT_OUTPUT_WRITE,
    EXIT_SUCCESS, EXIT_USAGE,
};
use fetch::FetchCommands;

/// Config file picked up from the working directory when `--config` is
/// not given.
const DEFAULT_CONFIG_FILE: &str = "vsxreport.toml";

#[derive(Parser)]
#[command(name = "vsxreport")]
#[command(about = "Compare the VS Code Marketplace and Open VSX extension catalogs")]
#[command(long_version = long_version())]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    /// TOML config file (default: ./vsxreport.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Only log warnings and errors on stderr
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a registry catalog into a local snapshot
    Fetch {
        #[command(subcommand)]
        command: FetchCommands,
    },

    /// Resolve Marketplace license labels into the license map
    #[command(after_help = "\
Only extensions without a resolved license are requested; the map is
saved even when the run stops early.

Examples:
  vsxreport licenses
  vsxreport --config nightly.toml licenses")]
    Licenses,

    /// Join both snapshots into the all-extensions metadata report
    #[command(after_help = "\
Requires the Marketplace snapshot, the Open VSX snapshot and the license
map. Exits 3 without writing anything when one is missing or empty.

Examples:
  vsxreport reconcile
  vsxreport reconcile --allow-list extensions.json --json report.json
  vsxreport reconcile --out report.csv --top 25")]
    Reconcile {
        /// Read the auto-publish allow-list from a local file instead of
        /// downloading it
        #[arg(long)]
        allow_list: Option<PathBuf>,

        /// CSV report path (default: files.report_csv)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Also write the full result as JSON (default: files.report_json)
        #[arg(long)]
        json: Option<PathBuf>,

        /// Number of rows in the printed top table (0 to skip)
        #[arg(long, default_value_t = 10)]
        top: usize,
    },

    /// Index Open VSX namespaces and extension names, with verification
    #[command(after_help = "\
Examples:
  vsxreport index
  vsxreport index --out namespaces.json")]
    Index {
        /// Output JSON path (default: files.namespace_index)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nrecon:   vsxreport-recon ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("TARGET"),
    )
}

fn init_tracing(quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("warn")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("vsxreport=info,vsxreport_recon=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

/// `--config` > `./vsxreport.toml` > built-in defaults.
fn load_config(explicit: Option<&Path>) -> Result<ReconConfig, CliError> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !fallback.exists() {
                return Ok(ReconConfig::default());
            }
            fallback
        }
    };

    let text = std::fs::read_to_string(&path)
        .map_err(|e| CliError::config(format!("cannot read {}: {e}", path.display())))?;
    let config = ReconConfig::from_toml(&text)
        .map_err(|e| CliError::config(format!("{}: {e}", path.display())))?;
    tracing::debug!("config loaded from {}", path.display());
    Ok(config)
}

fn run(cli: Cli) -> Result<(), CliError> {
    let Some(command) = cli.command else {
        eprintln!("Usage: vsxreport <command> [options]");
        eprintln!("       vsxreport --help for more information");
        return Ok(());
    };

    let config = load_config(cli.config.as_deref())?;

    match command {
        Commands::Fetch { command } => fetch::cmd_fetch(&config, command),
        Commands::Licenses => licenses::cmd_licenses(&config),
        Commands::Reconcile {
            allow_list,
            out,
            json,
            top,
        } => recon::cmd_reconcile(
            &config,
            recon::ReconcileArgs {
                allow_list,
                out,
                json,
                top,
            },
        ),
        Commands::Index { out } => index::cmd_index(&config, out),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.quiet);

    match run(cli) {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self { code: EXIT_CONFIG_INVALID, message: msg.into(), hint: None }
    }

    pub fn output(msg: impl Into<String>) -> Self {
        Self { code: EXIT_OUTPUT_WRITE, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<ReconError> for CliError {
    fn from(err: ReconError) -> Self {
        let message = err.to_string();
        match err {
            ReconError::MissingInput { .. } | ReconError::EmptyInput { .. } => Self {
                code: EXIT_INPUT_MISSING,
                message,
                hint: Some("run the matching `vsxreport fetch` / `vsxreport licenses` step first".into()),
            },
            ReconError::SnapshotParse { .. } => Self { code: EXIT_INPUT_PARSE, message, hint: None },
            ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => Self::config(message),
            ReconError::ReportWrite(_) => Self::output(message),
            ReconError::Io(_) => Self { code: EXIT_ERROR, message, hint: None },
        }
    }
}
