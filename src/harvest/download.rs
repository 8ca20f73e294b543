//! Download mode: run every row of an input table through the pipeline.

use std::path::Path;

use tracing::{debug, info};

use super::pacing::{Pacer, Pause};
use super::pipeline::{DownloadOutcome, DownloadPipeline, ItemFailure};
use crate::output::{InputTable, OutputError, ResultsWriter, pdf_file_name};

/// Counters over processed items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Items processed.
    pub processed: usize,
    /// Items with a saved file.
    pub saved: usize,
    /// Items whose URL was found but rejected.
    pub rejected: usize,
    /// Items no strategy could resolve.
    pub unresolved: usize,
}

impl RunSummary {
    /// Counts one outcome.
    pub fn record(&mut self, outcome: &DownloadOutcome) {
        self.processed += 1;
        match &outcome.failure {
            None => self.saved += 1,
            Some(ItemFailure::NoPdfFound) => self.unresolved += 1,
            Some(ItemFailure::Rejected { .. }) => self.rejected += 1,
        }
    }

    /// Adds another summary's counts.
    pub fn absorb(&mut self, other: RunSummary) {
        self.processed += other.processed;
        self.saved += other.saved;
        self.rejected += other.rejected;
        self.unresolved += other.unresolved;
    }
}

/// Inputs of a download run besides the table itself.
#[derive(Debug, Clone, Copy)]
pub struct DownloadJob<'a> {
    /// Root of the per-sector directories.
    pub out_dir: &'a Path,
    /// Contact email attached to every record.
    pub contact_email: Option<&'a str>,
    /// Process at most this many rows.
    pub max_rows: Option<usize>,
}

/// Processes rows in file order, writing one result row per item.
///
/// Files go to `<out_dir>/<sector dir>/<doi or title>.pdf`. `on_item` is
/// called after each item (progress reporting).
///
/// # Errors
///
/// Returns [`OutputError`] only when a result row cannot be written;
/// per-item download failures are recorded in the rows.
pub async fn download_rows(
    table: &InputTable,
    job: DownloadJob<'_>,
    pipeline: &DownloadPipeline,
    pacer: &Pacer,
    writer: &mut ResultsWriter,
    mut on_item: impl FnMut(&DownloadOutcome),
) -> Result<RunSummary, OutputError> {
    let mut summary = RunSummary::default();
    let limit = job.max_rows.unwrap_or(usize::MAX);

    for (index, row) in table.rows().take(limit).enumerate() {
        if index > 0 {
            pacer.pause(Pause::BetweenItems).await;
        }
        let record = row.to_record(job.contact_email);
        let destination = job.out_dir.join(row.sector_dir()).join(pdf_file_name(&record));
        debug!(row = index + 1, title = %record.title, "processing row");

        let outcome = pipeline.process(&record, &destination).await;
        writer.write_row(&row, &outcome)?;
        summary.record(&outcome);
        on_item(&outcome);
    }

    info!(
        processed = summary.processed,
        saved = summary.saved,
        rejected = summary.rejected,
        unresolved = summary.unresolved,
        strategy_errors = pipeline.chain().diagnostics().total_errors(),
        "download run complete"
    );
    Ok(summary)
}
