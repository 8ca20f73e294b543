//! Topics mode: download the works of `OpenAlex` topics into per-topic folders.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::download::RunSummary;
use super::pacing::{Pacer, Pause};
use super::paginate::{PageCaps, Paginator};
use super::pipeline::{DownloadOutcome, DownloadPipeline};
use super::retry::RetryPolicy;
use crate::output::{MetadataWriter, OutputError, pdf_file_name, safe_filename};
use crate::output::filename::MAX_FILENAME_LEN;
use crate::sources::{MetadataSource, SourceQuery, TopicSummary};

/// Name of the per-topic metadata file.
pub const METADATA_FILE_NAME: &str = "metadata.csv";

/// Default works page size for topic runs.
pub const DEFAULT_TOPIC_PAGE_SIZE: usize = 200;

/// Result of one topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicReport {
    /// Folder the topic's files went into.
    pub dir: PathBuf,
    /// Item counts.
    pub summary: RunSummary,
    /// Set when paging stopped on a source error.
    pub source_error: Option<String>,
}

/// Pages through topic-filtered works and downloads each one.
pub struct TopicDownloader<'a> {
    works: &'a dyn MetadataSource,
    pipeline: &'a DownloadPipeline,
    pacer: &'a Pacer,
    retry: &'a RetryPolicy,
    page_size: usize,
    max_pages: Option<usize>,
}

impl std::fmt::Debug for TopicDownloader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicDownloader")
            .field("source", &self.works.name())
            .field("page_size", &self.page_size)
            .field("max_pages", &self.max_pages)
            .finish_non_exhaustive()
    }
}

impl<'a> TopicDownloader<'a> {
    /// Creates a downloader reading works from `works` (an `OpenAlex` source).
    #[must_use]
    pub fn new(
        works: &'a dyn MetadataSource,
        pipeline: &'a DownloadPipeline,
        pacer: &'a Pacer,
        retry: &'a RetryPolicy,
        page_size: usize,
        max_pages: Option<usize>,
    ) -> Self {
        Self {
            works,
            pipeline,
            pacer,
            retry,
            page_size,
            max_pages,
        }
    }

    /// Downloads every work of `topic` into `<out_root>/<topic name>/` and
    /// writes its `metadata.csv`.
    ///
    /// A page failure ends the topic early; what was processed is kept.
    ///
    /// # Errors
    ///
    /// Returns [`OutputError`] when the folder or metadata file cannot be written.
    pub async fn download_topic(
        &self,
        topic: &TopicSummary,
        out_root: &Path,
        mut on_item: impl FnMut(&DownloadOutcome),
    ) -> Result<TopicReport, OutputError> {
        let dir = out_root.join(safe_filename(topic.label(), MAX_FILENAME_LEN));
        std::fs::create_dir_all(&dir).map_err(|e| OutputError::io(&dir, e))?;
        let mut metadata = MetadataWriter::create(&dir.join(METADATA_FILE_NAME))?;
        info!(topic = %topic.label(), id = %topic.short_id(), dir = %dir.display(), "topic started");

        let mut pages = Paginator::new(
            self.works,
            SourceQuery::Topic(topic.short_id().to_string()),
            self.page_size,
            PageCaps {
                max_items: None,
                max_pages: self.max_pages,
            },
            self.pacer,
            self.retry,
        );

        let mut summary = RunSummary::default();
        let mut source_error = None;
        loop {
            let records = match pages.next_page().await {
                Ok(Some(records)) => records,
                Ok(None) => break,
                Err(error) => {
                    warn!(topic = %topic.label(), error = %error, "topic paging stopped");
                    source_error = Some(error.to_string());
                    break;
                }
            };
            for record in records {
                if summary.processed > 0 {
                    self.pacer.pause(Pause::BetweenItems).await;
                }
                let destination = dir.join(pdf_file_name(&record));
                let outcome = self.pipeline.process(&record, &destination).await;
                metadata.write(&record, &outcome)?;
                summary.record(&outcome);
                on_item(&outcome);
            }
        }

        metadata.finish()?;
        info!(
            topic = %topic.label(),
            pages = pages.pages_fetched(),
            processed = summary.processed,
            saved = summary.saved,
            "topic done"
        );
        Ok(TopicReport {
            dir,
            summary,
            source_error,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::Endpoints;
    use crate::fetch::{FetchSettings, HttpFetcher};
    use crate::resolver::build_default_chain;
    use crate::sources::OpenAlexSource;
    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, ResponseTemplate};

    #[tokio::test]
    async fn test_download_topic_writes_files_and_metadata() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        let base = server.uri();
        Mock::given(method("GET"))
            .and(path("/works"))
            .and(query_param("filter", "topics.id:T55"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    {"id": "https://openalex.org/W1", "display_name": "Has PDF",
                     "doi": "https://doi.org/10.5/one",
                     "best_oa_location": {"pdf_url": format!("{base}/files/one.pdf")}},
                    {"id": "https://openalex.org/W2", "display_name": "No Links"}
                ],
                "meta": {"next_cursor": null}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/files/one.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.4 one".to_vec()))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&FetchSettings::default()).unwrap();
        let openalex = OpenAlexSource::new(fetcher.clone(), &base, None);
        let pipeline = DownloadPipeline::new(build_default_chain(&fetcher, &Endpoints::all_at(&base)), fetcher);
        let pacer = Pacer::disabled();
        let retry = RetryPolicy::default();
        let downloader = TopicDownloader::new(&openalex, &pipeline, &pacer, &retry, 200, None);

        let topic = TopicSummary {
            id: "https://openalex.org/T55".to_string(),
            display_name: "Edge AI / Sensors".to_string(),
            works_count: 2,
            keywords: Vec::new(),
        };
        let temp = TempDir::new().unwrap();
        let report = downloader.download_topic(&topic, temp.path(), |_| {}).await.unwrap();

        assert_eq!(report.dir, temp.path().join("Edge_AI_Sensors"));
        assert_eq!(report.summary.processed, 2);
        assert_eq!(report.summary.saved, 1);
        assert!(report.source_error.is_none());
        assert!(report.dir.join("10.5_one.pdf").exists());

        let metadata = std::fs::read_to_string(report.dir.join(METADATA_FILE_NAME)).unwrap();
        assert_eq!(metadata.lines().count(), 3);
        assert!(metadata.contains("csv_direct"));
        assert!(metadata.contains("No Links"));
    }

    #[tokio::test]
    async fn test_topic_page_failure_is_reported_not_raised() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/works"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&FetchSettings::default()).unwrap();
        let openalex = OpenAlexSource::new(fetcher.clone(), &server.uri(), None);
        let pipeline = DownloadPipeline::new(crate::resolver::ResolverChain::new(), fetcher);
        let pacer = Pacer::disabled();
        let retry = RetryPolicy::default();
        let downloader = TopicDownloader::new(&openalex, &pipeline, &pacer, &retry, 50, Some(1));

        let topic = TopicSummary {
            id: "T9".to_string(),
            display_name: "Broken".to_string(),
            works_count: 0,
            keywords: Vec::new(),
        };
        let temp = TempDir::new().unwrap();
        let report = downloader.download_topic(&topic, temp.path(), |_| {}).await.unwrap();
        assert!(report.source_error.is_some());
        assert_eq!(report.summary.processed, 0);
        assert!(report.dir.join(METADATA_FILE_NAME).exists());
    }
}
