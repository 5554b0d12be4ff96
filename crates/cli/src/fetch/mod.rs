//! `vsxreport fetch`: pull registry catalogs into local snapshots.

pub(crate) mod allow_list;
pub(crate) mod common;
pub(crate) mod license_asset;
pub(crate) mod marketplace;
pub(crate) mod openvsx;

use std::path::PathBuf;

use clap::Subcommand;

use vsxreport_recon::ReconConfig;

use crate::CliError;

#[derive(Subcommand)]
pub enum FetchCommands {
    /// Fetch every VS Code Marketplace extension, category by category
    #[command(after_help = "\
Examples:
  vsxreport fetch marketplace
  vsxreport fetch marketplace --out vs_code_extensions.json --csv vs_code_extensions.csv
  vsxreport --config nightly.toml fetch marketplace")]
    Marketplace {
        /// JSON snapshot path (default: files.primary_snapshot)
        #[arg(long)]
        out: Option<PathBuf>,

        /// CSV summary path (default: files.primary_csv)
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Fetch every Open VSX extension with its detail document
    #[command(name = "openvsx", after_help = "\
Examples:
  vsxreport fetch openvsx
  vsxreport fetch openvsx --by-license
  vsxreport fetch openvsx --token ovsx_... --out open_vsx_extensions.json
  ACCESS_TOKEN=ovsx_... vsxreport fetch openvsx")]
    OpenVsx {
        /// Open VSX access token (default: ACCESS_TOKEN env, else anonymous)
        #[arg(long)]
        token: Option<String>,

        /// JSON snapshot path (default: files.secondary_snapshot)
        #[arg(long)]
        out: Option<PathBuf>,

        /// TSV summary path (default: files.secondary_tsv)
        #[arg(long)]
        tsv: Option<PathBuf>,

        /// Also print extension counts grouped by license
        #[arg(long)]
        by_license: bool,
    },
}

pub fn cmd_fetch(config: &ReconConfig, command: FetchCommands) -> Result<(), CliError> {
    match command {
        FetchCommands::Marketplace { out, csv } => {
            marketplace::cmd_fetch_marketplace(config, out, csv)
        }
        FetchCommands::OpenVsx {
            token,
            out,
            tsv,
            by_license,
        } => openvsx::cmd_fetch_openvsx(config, token, out, tsv, by_license),
    }
}
