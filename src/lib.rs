//! Open-access harvester core library
//!
//! Collects scholarly work metadata from open sources, merges duplicates
//! into one corpus, and turns each record into a validated local PDF.
//!
//! # Architecture
//!
//! - [`sources`] - paginated `OpenAlex`, arXiv, and CORE metadata clients
//! - [`merge`] - identity merging of records across sources and sectors
//! - [`resolver`] - ordered PDF URL resolution strategies
//! - [`validator`] - streaming download with PDF content check
//! - [`harvest`] - run drivers, pacing, and retry
//! - [`output`] - CSV files and on-disk layout
//! - [`config`] - validated run configuration

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod fetch;
pub mod harvest;
pub mod merge;
pub mod output;
pub mod record;
pub mod resolver;
pub mod sectors;
pub mod sources;
#[cfg(test)]
pub mod test_support;
pub(crate) mod user_agent;
pub mod validator;

// Re-export commonly used types
pub use config::{ConfigError, Endpoints, RunConfig};
pub use fetch::{FetchError, FetchSettings, HttpFetcher};
pub use harvest::{
    CorpusHarvester, DEFAULT_MAX_RETRIES, DownloadOutcome, DownloadPipeline, HarvestPlan,
    ItemFailure, Pacer, PacingPolicy, RetryPolicy, RunSummary, TopicDownloader,
};
pub use merge::{IdentityMerger, MergedRecord};
pub use record::{CanonicalKey, Record, RecordDetails};
pub use resolver::{ResolutionMethod, ResolutionResult, ResolverChain, build_default_chain};
pub use sectors::{Sector, default_sectors};
pub use sources::{ArxivSource, CoreSource, MetadataSource, OpenAlexSource, TopicSummary};
pub use validator::{ContentValidator, RejectReason, ValidationOutcome};
