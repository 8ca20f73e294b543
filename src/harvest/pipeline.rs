//! Per-item download pipeline: resolve, validate, and repair once.
//!
//! ```text
//! Record ─► ResolverChain ─► Failed ───────────────────────────► no_pdf_found
//!                │
//!                └─ Resolved(url, method) ─► ContentValidator ─► Saved
//!                                                 │
//!                                                 └─ Rejected ─► repair? ─► ContentValidator
//! ```
//!
//! The repair step runs at most once per item and only for methods whose
//! URL may be a landing page rather than the document itself.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use crate::fetch::HttpFetcher;
use crate::record::Record;
use crate::resolver::{NO_PDF_FOUND, ResolutionMethod, ResolutionResult, ResolverChain, extract_pdf_link};
use crate::validator::{ContentValidator, RejectReason, ValidationOutcome};

/// Why an item ended without a saved file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemFailure {
    /// No strategy produced a URL.
    NoPdfFound,
    /// A URL was found but its content was rejected.
    Rejected {
        /// Strategy that produced the URL.
        method: ResolutionMethod,
        /// Validator verdict.
        reason: RejectReason,
    },
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoPdfFound => f.write_str(NO_PDF_FOUND),
            Self::Rejected { method, reason } => write!(f, "{method}|{reason}"),
        }
    }
}

/// Everything recorded about one processed item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    /// URL that was downloaded last (the repair candidate if repair ran).
    pub pdf_url_used: Option<String>,
    /// Strategy that produced the original URL.
    pub method: Option<ResolutionMethod>,
    /// Where the file was saved.
    pub saved_path: Option<PathBuf>,
    /// Set when nothing was saved.
    pub failure: Option<ItemFailure>,
    /// True when the repair step was attempted.
    pub repaired: bool,
}

impl DownloadOutcome {
    /// Outcome for a record no strategy could resolve.
    #[must_use]
    pub fn unresolved() -> Self {
        Self {
            pdf_url_used: None,
            method: None,
            saved_path: None,
            failure: Some(ItemFailure::NoPdfFound),
            repaired: false,
        }
    }

    /// True when a file was written.
    #[must_use]
    pub fn is_saved(&self) -> bool {
        self.saved_path.is_some()
    }

    /// Error column text: empty on success.
    #[must_use]
    pub fn error_text(&self) -> String {
        self.failure.as_ref().map(ToString::to_string).unwrap_or_default()
    }
}

/// Resolver chain plus validator, shared across every item of a run.
#[derive(Debug)]
pub struct DownloadPipeline {
    chain: ResolverChain,
    validator: ContentValidator,
    fetcher: HttpFetcher,
}

impl DownloadPipeline {
    /// Wires a pipeline; `fetcher` is used by the validator and the repair step.
    #[must_use]
    pub fn new(chain: ResolverChain, fetcher: HttpFetcher) -> Self {
        Self {
            chain,
            validator: ContentValidator::new(fetcher.clone()),
            fetcher,
        }
    }

    /// The resolver chain (for diagnostics).
    #[must_use]
    pub fn chain(&self) -> &ResolverChain {
        &self.chain
    }

    /// Resolves `record` and, if a URL is found, saves it to `destination`.
    #[instrument(skip(self, record, destination), fields(id = %record.identifier))]
    pub async fn process(&self, record: &Record, destination: &Path) -> DownloadOutcome {
        let (url, method) = match self.chain.resolve(record).await {
            ResolutionResult::Resolved { url, method } => (url, method),
            ResolutionResult::Failed { reason } => {
                debug!(reason = %reason, "unresolved");
                return DownloadOutcome::unresolved();
            }
        };

        let reason = match self.validator.fetch_and_validate(&url, destination).await {
            ValidationOutcome::Saved { .. } => {
                return DownloadOutcome {
                    pdf_url_used: Some(url),
                    method: Some(method),
                    saved_path: Some(destination.to_path_buf()),
                    failure: None,
                    repaired: false,
                };
            }
            ValidationOutcome::Rejected(reason) => reason,
        };

        let first_failure = ItemFailure::Rejected { method, reason };
        if method.is_repair_eligible()
            && let Some(candidate) = self.repair_candidate(&url).await
        {
            info!(method = %method, from = %url, to = %candidate, "retrying via landing page");
            let saved = self
                .validator
                .fetch_and_validate(&candidate, destination)
                .await
                .is_saved();
            return DownloadOutcome {
                pdf_url_used: Some(candidate),
                method: Some(method),
                saved_path: saved.then(|| destination.to_path_buf()),
                failure: (!saved).then_some(first_failure),
                repaired: true,
            };
        }

        DownloadOutcome {
            pdf_url_used: Some(url),
            method: Some(method),
            saved_path: None,
            failure: Some(first_failure),
            repaired: false,
        }
    }

    /// Treats `url` as a landing page and extracts a different document link.
    async fn repair_candidate(&self, url: &str) -> Option<String> {
        let page = match self.fetcher.get_page(url).await {
            Ok(page) => page,
            Err(error) => {
                debug!(url = %url, error = %error, "repair fetch failed");
                return None;
            }
        };
        extract_pdf_link(&page.meta.final_url, &page.body).filter(|candidate| candidate != url)
    }
}
