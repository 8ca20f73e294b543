//! DOI content-negotiation strategy.
//!
//! Follows the DOI resolver's redirect with `Accept: application/pdf` and
//! checks whether the publisher answered with a PDF.

use async_trait::async_trait;

use super::utils::{is_doi_like, url_ends_with_pdf};
use super::{ResolutionMethod, Strategy, StrategyOutcome};
use crate::fetch::HttpFetcher;
use crate::record::Record;
use crate::validator::PDF_MAGIC;

const ACCEPT_PDF: &str = "application/pdf";

/// Asks the DOI resolver for the PDF representation of a work.
#[derive(Debug, Clone)]
pub struct ContentNegotiationStrategy {
    fetcher: HttpFetcher,
    resolver_base: String,
}

impl ContentNegotiationStrategy {
    /// Creates a strategy against the given DOI resolver (normally `https://doi.org`).
    #[must_use]
    pub fn new(fetcher: HttpFetcher, resolver_base: &str) -> Self {
        Self {
            fetcher,
            resolver_base: resolver_base.trim_end_matches('/').to_string(),
        }
    }

    /// URL to request for a DOI: the DOI itself when it is already an
    /// http(s) URL, otherwise the DOI appended to the resolver base.
    #[must_use]
    pub fn doi_url(&self, doi: &str) -> String {
        let doi = doi.trim();
        let lower = doi.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return doi.to_string();
        }
        let bare = lower
            .find("doi.org/")
            .map_or(doi, |idx| &doi[idx + "doi.org/".len()..]);
        format!("{}/{}", self.resolver_base, bare.trim_start_matches('/'))
    }
}

#[async_trait]
impl Strategy for ContentNegotiationStrategy {
    fn method(&self) -> ResolutionMethod {
        ResolutionMethod::ContentNegotiation
    }

    fn applies_to(&self, record: &Record) -> bool {
        record.doi.as_deref().is_some_and(is_doi_like)
    }

    #[tracing::instrument(skip(self, record), fields(strategy = "content_negotiation", doi = ?record.doi))]
    async fn attempt(&self, record: &Record) -> StrategyOutcome {
        let Some(doi) = record.doi.as_deref() else {
            return StrategyOutcome::NotFound;
        };
        let url = self.doi_url(doi);

        let mut stream = match self.fetcher.open_stream(&url, Some(ACCEPT_PDF)).await {
            Ok(stream) => stream,
            Err(error) => return StrategyOutcome::Error(error.to_string()),
        };
        let meta = stream.meta().clone();
        if meta.is_pdf_content_type() || url_ends_with_pdf(&meta.final_url) {
            return StrategyOutcome::Found(meta.final_url);
        }

        match stream.read_prefix(PDF_MAGIC.len()).await {
            Ok(prefix) if prefix.starts_with(PDF_MAGIC) => StrategyOutcome::Found(meta.final_url),
            Ok(_) => StrategyOutcome::NotFound,
            Err(error) => StrategyOutcome::Error(error.to_string()),
        }
    }
}
