//! Open-access lookup strategy backed by the Unpaywall v2 API.
//!
//! Endpoint: `GET {base}/v2/{doi}?email={email}`. The service requires a
//! contact email rather than an API key.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::utils::url_ends_with_pdf;
use super::{ResolutionMethod, Strategy, StrategyOutcome};
use crate::fetch::{FetchError, HttpFetcher, url_with_query};
use crate::record::Record;

/// Subset of the Unpaywall response this strategy reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UnpaywallResponse {
    /// Preferred open-access copy.
    #[serde(default)]
    pub best_oa_location: Option<OaLocation>,
    /// Every known open-access copy.
    #[serde(default)]
    pub oa_locations: Option<Vec<OaLocation>>,
}

/// One open-access location.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OaLocation {
    /// Location URL (landing page or PDF).
    #[serde(default)]
    pub url: Option<String>,
    /// Direct PDF URL when known.
    #[serde(default)]
    pub url_for_pdf: Option<String>,
}

impl UnpaywallResponse {
    /// Picks the best PDF URL from the response.
    ///
    /// Order: best location's `url_for_pdf`, then its `url`, then the first
    /// other location with a `url_for_pdf` or a `url` ending in `.pdf`.
    #[must_use]
    pub fn pick_pdf_url(&self) -> Option<String> {
        if let Some(best) = &self.best_oa_location
            && let Some(url) = non_empty(&best.url_for_pdf).or_else(|| non_empty(&best.url))
        {
            return Some(url);
        }
        self.oa_locations.iter().flatten().find_map(|location| {
            non_empty(&location.url_for_pdf).or_else(|| {
                non_empty(&location.url).filter(|url| url_ends_with_pdf(url))
            })
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Looks up a DOI in Unpaywall. Needs both a DOI and a contact email.
#[derive(Debug, Clone)]
pub struct ApiLookupStrategy {
    fetcher: HttpFetcher,
    base_url: String,
}

impl ApiLookupStrategy {
    /// Creates a strategy against the given API base URL.
    #[must_use]
    pub fn new(fetcher: HttpFetcher, base_url: &str) -> Self {
        Self {
            fetcher,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn lookup(&self, doi: &str, email: &str) -> Result<UnpaywallResponse, FetchError> {
        let path = format!("/v2/{}", urlencoding::encode(doi));
        let url = url_with_query(&self.base_url, &path, &[("email", email)])?;
        self.fetcher.get_json(&url, &[]).await
    }
}

#[async_trait]
impl Strategy for ApiLookupStrategy {
    fn method(&self) -> ResolutionMethod {
        ResolutionMethod::ApiLookup
    }

    fn applies_to(&self, record: &Record) -> bool {
        record.bare_doi().is_some() && record.contact_email.is_some()
    }

    #[tracing::instrument(skip(self, record), fields(strategy = "api_lookup", doi = ?record.doi))]
    async fn attempt(&self, record: &Record) -> StrategyOutcome {
        let (Some(doi), Some(email)) = (record.bare_doi(), record.contact_email.as_deref()) else {
            return StrategyOutcome::NotFound;
        };

        match self.lookup(doi, email).await {
            Ok(response) => response
                .pick_pdf_url()
                .map_or(StrategyOutcome::NotFound, StrategyOutcome::Found),
            Err(FetchError::HttpStatus { status: 404, .. }) => {
                debug!("DOI unknown to lookup service");
                StrategyOutcome::NotFound
            }
            Err(error) => StrategyOutcome::Error(error.to_string()),
        }
    }
}
