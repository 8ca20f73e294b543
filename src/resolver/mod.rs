//! Ordered fallback resolution from a sparse record to a full-text URL.
//!
//! # Architecture
//!
//! - [`Strategy`] - Async trait that each resolution strategy implements
//! - [`ResolverChain`] - Fixed-order collection of strategies with the resolution loop
//! - [`StrategyOutcome`] - Result of one strategy attempt
//! - [`ResolutionResult`] - Final verdict for a record
//!
//! Strategies, in the order [`build_default_chain`] registers them:
//! [`CsvDirectStrategy`], [`SourceConstructStrategy`], [`ApiLookupStrategy`],
//! [`ContentNegotiationStrategy`], [`CandidateProbeStrategy`],
//! [`LandingScrapeStrategy`].
//!
//! # Example
//!
//! ```no_run
//! use harvester_core::config::Endpoints;
//! use harvester_core::fetch::{FetchSettings, HttpFetcher};
//! use harvester_core::record::Record;
//! use harvester_core::resolver::build_default_chain;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = HttpFetcher::new(&FetchSettings::default())?;
//! let chain = build_default_chain(&fetcher, &Endpoints::default());
//!
//! let record = Record::new("arxiv", "http://arxiv.org/abs/1234.5678", "A paper");
//! let result = chain.resolve(&record).await;
//! println!("{result:?}");
//! # Ok(())
//! # }
//! ```

mod arxiv;
mod chain;
mod direct;
mod landing;
mod negotiation;
mod probe;
mod unpaywall;
mod utils;

pub use arxiv::{SourceConstructStrategy, construct_arxiv_pdf_url};
pub use chain::{ChainDiagnostics, ChainReport, ResolverChain, StrategyAttempt};
pub use direct::CsvDirectStrategy;
pub use landing::{LandingScrapeStrategy, extract_pdf_link};
pub use negotiation::ContentNegotiationStrategy;
pub use probe::CandidateProbeStrategy;
pub use unpaywall::{ApiLookupStrategy, OaLocation, UnpaywallResponse};
pub use utils::{absolutize_url, compile_static_regex, is_doi_like, url_ends_with_pdf};

use std::fmt;

use async_trait::async_trait;

use crate::config::Endpoints;
use crate::fetch::HttpFetcher;
use crate::record::Record;

/// Failure reason recorded when every strategy came up empty.
pub const NO_PDF_FOUND: &str = "no_pdf_found";

/// The strategy that produced a resolved URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResolutionMethod {
    /// Direct URL carried by the record.
    CsvDirect,
    /// URL constructed from a source-native identifier (arXiv).
    SourceConstruct,
    /// Open-access lookup service keyed by DOI.
    ApiLookup,
    /// DOI resolver asked for `application/pdf`.
    ContentNegotiation,
    /// HEAD probe of candidate URLs.
    CandidateProbe,
    /// Link extracted from a landing page.
    LandingScrape,
}

impl ResolutionMethod {
    /// Stable name used in logs and output rows.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CsvDirect => "csv_direct",
            Self::SourceConstruct => "source_construct",
            Self::ApiLookup => "api_lookup",
            Self::ContentNegotiation => "content_negotiation",
            Self::CandidateProbe => "candidate_probe",
            Self::LandingScrape => "landing_scrape",
        }
    }

    /// Whether a failed validation of a URL found this way earns one
    /// landing-page repair attempt.
    #[must_use]
    pub fn is_repair_eligible(self) -> bool {
        matches!(
            self,
            Self::ApiLookup | Self::ContentNegotiation | Self::LandingScrape | Self::CsvDirect
        )
    }
}

impl fmt::Display for ResolutionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final verdict of the resolver chain for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionResult {
    /// A usable document URL.
    Resolved {
        /// The URL to download.
        url: String,
        /// The strategy that found it.
        method: ResolutionMethod,
    },
    /// Nothing usable was found.
    Failed {
        /// Why resolution failed (always [`NO_PDF_FOUND`] from the chain).
        reason: String,
    },
}

impl ResolutionResult {
    /// Returns the resolved URL, if any.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Resolved { url, .. } => Some(url),
            Self::Failed { .. } => None,
        }
    }

    /// Returns the resolving method, if any.
    #[must_use]
    pub fn method(&self) -> Option<ResolutionMethod> {
        match self {
            Self::Resolved { method, .. } => Some(*method),
            Self::Failed { .. } => None,
        }
    }
}

/// Result of a single strategy attempt.
///
/// Only [`Found`](Self::Found) stops the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyOutcome {
    /// A candidate document URL.
    Found(String),
    /// The strategy ran and found nothing.
    NotFound,
    /// The strategy hit a network or parse failure.
    Error(String),
}

/// One step of the resolver chain.
///
/// Uses `async_trait` so strategies can be stored as `Box<dyn Strategy>`.
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Which method this strategy reports on success.
    fn method(&self) -> ResolutionMethod;

    /// Returns true if the record carries what this strategy needs.
    fn applies_to(&self, record: &Record) -> bool;

    /// Attempts to find a document URL for the record.
    async fn attempt(&self, record: &Record) -> StrategyOutcome;
}

/// Builds the resolver chain in its fixed strategy order.
#[must_use]
pub fn build_default_chain(fetcher: &HttpFetcher, endpoints: &Endpoints) -> ResolverChain {
    let mut chain = ResolverChain::new();
    chain.register(Box::new(CsvDirectStrategy::new()));
    chain.register(Box::new(SourceConstructStrategy::new()));
    chain.register(Box::new(ApiLookupStrategy::new(
        fetcher.clone(),
        &endpoints.unpaywall,
    )));
    chain.register(Box::new(ContentNegotiationStrategy::new(
        fetcher.clone(),
        &endpoints.doi_resolver,
    )));
    chain.register(Box::new(CandidateProbeStrategy::new(fetcher.clone())));
    chain.register(Box::new(LandingScrapeStrategy::new(fetcher.clone())));
    chain
}
