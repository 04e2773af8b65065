//! ramfs - stage local files into a fixed-capacity in-memory store
//!
//! ## Usage
//!
//! ```bash
//! # Stage files and report what fit
//! ramfs stage map-0.out map-1.out
//!
//! # Use a config file (size_mb, bytes_per_checksum, uri)
//! ramfs --config ramfs.toml stage spill/*
//!
//! # Size of the checksum companion for a 1 MiB file
//! ramfs checksum-size 1048576 --bytes-per-checksum 512
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use ramfs_core::{StoreConfig, checksum_size};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod stage;

#[derive(Debug, Parser)]
#[command(name = "ramfs", version, about = "Fixed-capacity in-memory file store")]
struct Cli {
    /// TOML config file (defaults: 100 MB, 512 bytes per checksum)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load local files into a store, verify them, and print a summary
    Stage {
        /// Files to stage, keyed by file name
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Print the checksum companion size for a data size
    ChecksumSize {
        size: u64,
        #[arg(long)]
        bytes_per_checksum: Option<u32>,
    },
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => StoreConfig::load(path)?,
        None => StoreConfig::default(),
    };

    match cli.command {
        Command::Stage { files } => {
            let report = stage::stage_files(&config, &files)?;
            print!("{report}");
            Ok(())
        }
        Command::ChecksumSize {
            size,
            bytes_per_checksum,
        } => {
            let granularity = bytes_per_checksum.unwrap_or(config.bytes_per_checksum);
            anyhow::ensure!(granularity > 0, "bytes per checksum must be positive");
            println!("{}", checksum_size(size, granularity));
            Ok(())
        }
    }
}
