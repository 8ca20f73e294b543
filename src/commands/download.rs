//! Download command handler: every CSV row through the resolver pipeline.

use std::time::Duration;

use anyhow::Result;
use harvester_core::config::{prepare_output_dir, require_input_file};
use harvester_core::harvest::{DownloadJob, download_rows};
use harvester_core::output::{InputTable, ResultsWriter, results_path_for};
use harvester_core::{DownloadPipeline, Pacer, build_default_chain};
use tracing::info;

use super::progress;
use super::run_config;
use crate::cli::{Args, DownloadArgs};

pub async fn run_download_command(args: &Args, download: &DownloadArgs) -> Result<()> {
    require_input_file(&download.input)?;
    let mut config = run_config(args, &download.outdir, download.email.as_deref())?;
    let email = config.require_contact_email("download")?.to_string();
    config.pacing.between_items = Duration::from_millis(download.sleep_ms);
    prepare_output_dir(&download.outdir)?;

    let table = InputTable::read(&download.input)?;
    let max_rows = download.max_rows.map(usize::try_from).transpose()?;
    let total = max_rows.map_or(table.len(), |max| max.min(table.len()));
    info!(rows = table.len(), processing = total, input = %download.input.display(), "input loaded");

    let fetcher = config.fetcher()?;
    let pipeline = DownloadPipeline::new(build_default_chain(&fetcher, &config.endpoints), fetcher);
    let pacer = Pacer::new(config.pacing.clone());

    let results_path = results_path_for(&download.input);
    let mut writer = ResultsWriter::create(&results_path, table.headers())?;

    let bar = progress::item_bar(total as u64, args.quiet, "download");
    let mut saved = 0;
    let summary = download_rows(
        &table,
        DownloadJob {
            out_dir: &download.outdir,
            contact_email: Some(&email),
            max_rows,
        },
        &pipeline,
        &pacer,
        &mut writer,
        |outcome| progress::tick(&bar, &mut saved, outcome),
    )
    .await?;
    bar.finish_and_clear();

    let written = writer.finish()?;
    info!(
        processed = summary.processed,
        saved = summary.saved,
        rejected = summary.rejected,
        unresolved = summary.unresolved,
        results = %written.display(),
        "download finished"
    );
    Ok(())
}
