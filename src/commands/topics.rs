//! Topics command handler: list `OpenAlex` topics and download their works.

use std::time::Duration;

use anyhow::Result;
use harvester_core::config::prepare_output_dir;
use harvester_core::harvest::RunSummary;
use harvester_core::{
    DownloadPipeline, OpenAlexSource, Pacer, TopicDownloader, TopicSummary, build_default_chain,
};
use tracing::{info, warn};

use super::progress;
use super::run_config;
use crate::cli::{Args, TopicsArgs};

pub async fn run_topics_command(args: &Args, topics: &TopicsArgs) -> Result<()> {
    let mut config = run_config(args, &topics.out, topics.email.as_deref())?;
    if !topics.list_only {
        config.require_contact_email("topics")?;
    }
    config.pacing.between_items = Duration::from_millis(topics.sleep_ms);
    config.pacing.between_pages = Duration::from_millis(topics.sleep_ms);

    let fetcher = config.fetcher()?;
    let openalex = OpenAlexSource::new(
        fetcher.clone(),
        &config.endpoints.openalex,
        config.contact_email.clone(),
    );
    let listed = openalex
        .search_topics(&topics.search_term, usize::try_from(topics.top_n)?)
        .await?;
    print_topics(&topics.search_term, &listed);

    if topics.list_only || listed.is_empty() {
        return Ok(());
    }
    prepare_output_dir(&topics.out)?;

    let per_page = usize::try_from(topics.per_page)?;
    let max_pages = topics.max_pages.map(usize::try_from).transpose()?;
    let max_topics = topics.max_topics.map(usize::try_from).transpose()?;
    let pipeline = DownloadPipeline::new(build_default_chain(&fetcher, &config.endpoints), fetcher);
    let pacer = Pacer::new(config.pacing.clone());
    let downloader = TopicDownloader::new(&openalex, &pipeline, &pacer, &config.retry, per_page, max_pages);

    let mut total = RunSummary::default();
    let mut failed_topics = 0;
    for topic in listed.iter().take(max_topics.unwrap_or(usize::MAX)) {
        let expected = max_pages.map_or(topic.works_count, |pages| {
            topic.works_count.min((pages * per_page) as u64)
        });
        let bar = progress::item_bar(expected, args.quiet, topic.label());
        let mut saved = 0;
        let result = downloader
            .download_topic(topic, &topics.out, |outcome| {
                progress::tick(&bar, &mut saved, outcome);
            })
            .await;
        bar.finish_and_clear();

        match result {
            Ok(report) => {
                total.absorb(report.summary);
                if report.source_error.is_some() {
                    failed_topics += 1;
                }
            }
            Err(error) => {
                warn!(topic = %topic.label(), error = %error, "topic failed");
                failed_topics += 1;
            }
        }
    }

    info!(
        processed = total.processed,
        saved = total.saved,
        rejected = total.rejected,
        unresolved = total.unresolved,
        failed_topics,
        strategy_errors = pipeline.chain().diagnostics().total_errors(),
        "topics run finished"
    );
    Ok(())
}

fn print_topics(term: &str, topics: &[TopicSummary]) {
    if topics.is_empty() {
        println!("No topics found for '{term}'.");
        return;
    }
    println!("Topics for '{term}':");
    for (index, topic) in topics.iter().enumerate() {
        println!(
            "{:>2}. {} ({}) - {} works",
            index + 1,
            topic.label(),
            topic.short_id(),
            topic.works_count
        );
        if !topic.keywords.is_empty() {
            println!("    keywords: {}", topic.keywords.join(", "));
        }
    }
}
