//! Run drivers for the three modes plus the pacing and retry they share.
//!
//! - [`corpus`] - harvest mode: sectors x sources into an [`IdentityMerger`](crate::merge::IdentityMerger)
//! - [`download`] - download mode: input table rows through the [`DownloadPipeline`]
//! - [`topics`] - topics mode: topic-filtered works into per-topic folders
//!
//! Every mode is strictly sequential: one request in flight, fixed pauses
//! between items and pages.

pub mod corpus;
pub mod download;
pub mod pacing;
pub mod paginate;
pub mod pipeline;
pub mod retry;
pub mod topics;

pub use corpus::{
    CorpusHarvester, DEFAULT_ARXIV_SHARE, DEFAULT_PER_SECTOR, HarvestPlan, HarvestSummary,
    SourceFailure,
};
pub use download::{DownloadJob, RunSummary, download_rows};
pub use pacing::{
    DEFAULT_BETWEEN_ITEMS, DEFAULT_BETWEEN_PAGES, DEFAULT_RATE_LIMIT_WAIT,
    DEFAULT_TRANSIENT_RETRY_DELAY, MAX_RETRY_AFTER, Pacer, PacingPolicy, Pause,
};
pub use paginate::{PageCaps, Paginator};
pub use pipeline::{DownloadOutcome, DownloadPipeline, ItemFailure};
pub use retry::{
    DEFAULT_MAX_RATE_LIMIT_WAITS, DEFAULT_MAX_RETRIES, FailureType, RetryDecision, RetryPolicy,
    classify_error, parse_retry_after,
};
pub use topics::{DEFAULT_TOPIC_PAGE_SIZE, METADATA_FILE_NAME, TopicDownloader, TopicReport};
