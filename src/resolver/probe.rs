//! Candidate probe strategy: HEAD each candidate URL and look at the content type.

use async_trait::async_trait;
use tracing::debug;

use super::{ResolutionMethod, Strategy, StrategyOutcome};
use crate::fetch::HttpFetcher;
use crate::record::Record;

/// Accepts the first candidate whose HEAD response declares a PDF.
#[derive(Debug, Clone)]
pub struct CandidateProbeStrategy {
    fetcher: HttpFetcher,
}

impl CandidateProbeStrategy {
    /// Creates a new `CandidateProbeStrategy`.
    #[must_use]
    pub fn new(fetcher: HttpFetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl Strategy for CandidateProbeStrategy {
    fn method(&self) -> ResolutionMethod {
        ResolutionMethod::CandidateProbe
    }

    fn applies_to(&self, record: &Record) -> bool {
        !record.candidate_urls.is_empty()
    }

    #[tracing::instrument(skip(self, record), fields(strategy = "candidate_probe", candidates = record.candidate_urls.len()))]
    async fn attempt(&self, record: &Record) -> StrategyOutcome {
        let mut errors = Vec::new();
        for candidate in &record.candidate_urls {
            match self.fetcher.head(candidate).await {
                Ok(meta) if meta.is_pdf_content_type() => {
                    return StrategyOutcome::Found(meta.final_url);
                }
                Ok(meta) => debug!(url = %candidate, content_type = %meta.content_type, "not a pdf"),
                Err(error) => errors.push(error.to_string()),
            }
        }
        // Misses alongside errors still count as a miss; only all-errors is an error.
        if !errors.is_empty() && errors.len() == record.candidate_urls.len() {
            StrategyOutcome::Error(errors.join("; "))
        } else {
            StrategyOutcome::NotFound
        }
    }
}
