//! CLI for the fanget segmented downloader.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use fanget_core::config;
use std::path::PathBuf;

use commands::{run_checksum, run_get, run_probe};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "fanget")]
#[command(about = "fanget: segmented downloads fanned out over a proxy pool", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download a resource as concurrent byte-range segments.
    Get {
        /// Direct HTTP/HTTPS URL to download.
        url: String,

        /// Output path (defaults to a name derived from the URL).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Override the in-flight segment limit from the config.
        #[arg(long, value_name = "N")]
        connections: Option<usize>,
    },

    /// Probe a resource's length and range support without downloading.
    Probe {
        /// URL to probe.
        url: String,
    },

    /// Compute SHA-256 of a file (e.g. to re-verify a download).
    Checksum {
        /// Path to the file.
        path: PathBuf,
    },
}

impl CliCommand {
    pub fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Get {
                url,
                output,
                connections,
            } => run_get(&cfg, &url, output, connections),
            CliCommand::Probe { url } => run_probe(&cfg, &url),
            CliCommand::Checksum { path } => run_checksum(&path),
        }
    }
}
