//! CLI entry point for the open-access harvester.

use anyhow::Result;
use clap::Parser;
use tracing::{debug, info};

mod cli;
mod commands;

use cli::{Args, Command};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");
    info!(version = env!("CARGO_PKG_VERSION"), "harvester starting");

    match &args.command {
        Command::Harvest(harvest) => commands::run_harvest_command(&args, harvest).await,
        Command::Download(download) => commands::run_download_command(&args, download).await,
        Command::Topics(topics) => commands::run_topics_command(&args, topics).await,
    }
}
