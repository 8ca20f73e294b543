//! Harvest command handler: sectors x sources into one corpus CSV.

use std::time::Duration;

use anyhow::Result;
use harvester_core::config::prepare_output_dir;
use harvester_core::output::write_corpus;
use harvester_core::sectors::load_sectors_file;
use harvester_core::{
    ArxivSource, CoreSource, CorpusHarvester, HarvestPlan, IdentityMerger, MetadataSource,
    OpenAlexSource, Pacer, default_sectors,
};
use tracing::{debug, info, warn};

use super::progress;
use super::run_config;
use crate::cli::{Args, HarvestArgs};

pub async fn run_harvest_command(args: &Args, harvest: &HarvestArgs) -> Result<()> {
    let out_dir = harvest
        .out
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| std::path::Path::new("."));
    let mut config = run_config(args, out_dir, harvest.email.as_deref())?;
    config.pacing.between_pages = Duration::from_millis(harvest.sleep_ms);

    let sectors = match &harvest.sectors_file {
        Some(path) => load_sectors_file(path)?,
        None => default_sectors(),
    };
    prepare_output_dir(out_dir)?;

    let plan = HarvestPlan {
        per_sector: usize::try_from(harvest.per_sector)?,
        arxiv_share: usize::try_from(harvest.arxiv_share)?,
    };
    debug!(?plan, sectors = sectors.len(), "harvest plan");

    let fetcher = config.fetcher()?;
    let contact = config.contact_email.clone();
    let openalex = OpenAlexSource::new(fetcher.clone(), &config.endpoints.openalex, contact.clone());
    let arxiv = ArxivSource::new(fetcher.clone(), &config.endpoints.arxiv, contact.clone());
    let core = harvest
        .core_key
        .as_deref()
        .map(|key| CoreSource::new(fetcher.clone(), &config.endpoints.core, key, contact.clone()));
    if core.is_none() {
        info!("no CORE key given, CORE is skipped");
    }

    let pacer = Pacer::new(config.pacing.clone());
    let harvester = CorpusHarvester::new(
        &openalex,
        &arxiv,
        core.as_ref().map(|c| c as &dyn MetadataSource),
        plan,
        &pacer,
        &config.retry,
    );

    let spinner = progress::spinner(args.quiet, &format!("harvesting {} sectors...", sectors.len()));
    let mut merger = IdentityMerger::new();
    let summary = harvester.harvest(&sectors, &mut merger).await;
    spinner.finish_and_clear();

    for failure in &summary.failures {
        warn!(sector = %failure.sector, source = failure.source, error = %failure.message, "source skipped");
    }
    let written = write_corpus(&harvest.out, merger.iter())?;
    info!(
        fetched = summary.fetched,
        unique = written,
        unkeyed = summary.unkeyed,
        failed_sources = summary.failures.len(),
        waited_secs = pacer.total_waited().as_secs(),
        path = %harvest.out.display(),
        "corpus written"
    );
    Ok(())
}
