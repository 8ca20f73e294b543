//! CLI command handlers.

mod download;
mod harvest;
mod progress;
mod topics;

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use harvester_core::config::validate_max_retries;
use harvester_core::harvest::DEFAULT_MAX_RATE_LIMIT_WAITS;
use harvester_core::{Endpoints, RetryPolicy, RunConfig};

use crate::cli::Args;

pub use download::run_download_command;
pub use harvest::run_harvest_command;
pub use topics::run_topics_command;

/// Builds the validated run configuration shared by every subcommand.
///
/// Endpoints come from `HARVESTER_*_URL` variables when set.
fn run_config(args: &Args, output_dir: &Path, email: Option<&str>) -> Result<RunConfig> {
    let mut config = RunConfig::new(output_dir).with_contact_email(email)?;
    config.fetch.connect_timeout = Duration::from_secs(args.connect_timeout_secs);
    config.fetch.read_timeout = Duration::from_secs(args.read_timeout_secs);
    config.retry = RetryPolicy::new(
        validate_max_retries(args.max_retries)?,
        DEFAULT_MAX_RATE_LIMIT_WAITS,
    );
    config.endpoints = Endpoints::from_env();
    Ok(config)
}
