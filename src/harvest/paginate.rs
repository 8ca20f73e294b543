//! Page-by-page iteration over a [`MetadataSource`] with caps and retries.
//!
//! ```text
//! first_page ──► fetch ──ok──► yield records ──► pause(BetweenPages) ──► next token
//!                  │
//!                  ├─ 429 ──► pause(RateLimited(Retry-After)) ──► same token
//!                  ├─ transient ──► pause(TransientRetry) ──► same token
//!                  └─ permanent / budget exhausted ──► Err
//! ```

use tracing::{debug, info, warn};

use super::pacing::{Pacer, Pause};
use super::retry::{FailureType, RetryDecision, RetryPolicy, parse_retry_after};
use crate::record::Record;
use crate::sources::{MetadataSource, PageToken, SourceError, SourcePage, SourceQuery};

/// Optional limits on one pagination run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageCaps {
    /// Stop after this many records.
    pub max_items: Option<usize>,
    /// Stop after this many pages.
    pub max_pages: Option<usize>,
}

impl PageCaps {
    /// Caps only the number of records.
    #[must_use]
    pub fn items(max_items: usize) -> Self {
        Self {
            max_items: Some(max_items),
            max_pages: None,
        }
    }
}

/// Walks the pages of one query.
///
/// Call [`next_page`](Self::next_page) until it returns `Ok(None)`. An `Err`
/// means the current page failed for good; records already yielded stay valid.
pub struct Paginator<'a> {
    source: &'a dyn MetadataSource,
    query: SourceQuery,
    page_size: usize,
    caps: PageCaps,
    pacer: &'a Pacer,
    retry: &'a RetryPolicy,
    token: Option<PageToken>,
    pages_fetched: usize,
    items_yielded: usize,
}

impl std::fmt::Debug for Paginator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Paginator")
            .field("source", &self.source.name())
            .field("query", &self.query)
            .field("token", &self.token)
            .field("pages_fetched", &self.pages_fetched)
            .field("items_yielded", &self.items_yielded)
            .finish_non_exhaustive()
    }
}

impl<'a> Paginator<'a> {
    /// Creates a paginator; `page_size` is clamped to the source's maximum.
    #[must_use]
    pub fn new(
        source: &'a dyn MetadataSource,
        query: SourceQuery,
        page_size: usize,
        caps: PageCaps,
        pacer: &'a Pacer,
        retry: &'a RetryPolicy,
    ) -> Self {
        Self {
            page_size: page_size.clamp(1, source.max_page_size()),
            token: Some(source.first_page()),
            source,
            query,
            caps,
            pacer,
            retry,
            pages_fetched: 0,
            items_yielded: 0,
        }
    }

    /// Pages fetched so far.
    #[must_use]
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// Records yielded so far.
    #[must_use]
    pub fn items_yielded(&self) -> usize {
        self.items_yielded
    }

    fn caps_reached(&self) -> bool {
        self.caps.max_items.is_some_and(|max| self.items_yielded >= max)
            || self.caps.max_pages.is_some_and(|max| self.pages_fetched >= max)
    }

    /// Fetches the next page.
    ///
    /// Returns `Ok(None)` when the source is exhausted or a cap is reached.
    ///
    /// # Errors
    ///
    /// Returns the last [`SourceError`] when the page fails permanently or
    /// its retry budget runs out. The paginator is exhausted afterwards.
    pub async fn next_page(&mut self) -> Result<Option<Vec<Record>>, SourceError> {
        if self.caps_reached() {
            debug!(source = self.source.name(), "pagination cap reached");
            return Ok(None);
        }
        let Some(token) = self.token.take() else {
            return Ok(None);
        };
        if self.pages_fetched > 0 {
            self.pacer.pause(Pause::BetweenPages).await;
        }

        let page = self.fetch_with_retry(&token).await?;
        self.pages_fetched += 1;
        self.token = page.next;

        let mut records = page.records;
        if let Some(max) = self.caps.max_items {
            records.truncate(max.saturating_sub(self.items_yielded));
        }
        self.items_yielded += records.len();
        debug!(
            source = self.source.name(),
            page = self.pages_fetched,
            records = records.len(),
            "page fetched"
        );

        if records.is_empty() {
            self.token = None;
            return Ok(None);
        }
        Ok(Some(records))
    }

    /// Drains every remaining page into one vector.
    ///
    /// # Errors
    ///
    /// Returns the first page failure; records from earlier pages are lost
    /// to the caller in that case, so use [`next_page`](Self::next_page)
    /// when partial results matter.
    pub async fn collect_all(&mut self) -> Result<Vec<Record>, SourceError> {
        let mut all = Vec::new();
        while let Some(records) = self.next_page().await? {
            all.extend(records);
        }
        Ok(all)
    }

    async fn fetch_with_retry(&self, token: &PageToken) -> Result<SourcePage, SourceError> {
        let mut transient_failures = 0u32;
        let mut rate_limit_failures = 0u32;

        loop {
            let error = match self
                .source
                .fetch_page(&self.query, token, self.page_size)
                .await
            {
                Ok(page) => return Ok(page),
                Err(error) => error,
            };

            let failure_type = error.failure_type();
            let failures_so_far = match failure_type {
                FailureType::Transient => {
                    transient_failures += 1;
                    transient_failures
                }
                FailureType::RateLimited => {
                    rate_limit_failures += 1;
                    rate_limit_failures
                }
                FailureType::Permanent => 1,
            };

            match self.retry.should_retry(failure_type, failures_so_far) {
                RetryDecision::Retry { attempt } => {
                    info!(
                        source = self.source.name(),
                        attempt,
                        error = %error,
                        "retrying page"
                    );
                    let pause = if failure_type == FailureType::RateLimited {
                        Pause::RateLimited(error.retry_after().and_then(parse_retry_after))
                    } else {
                        Pause::TransientRetry
                    };
                    self.pacer.pause(pause).await;
                }
                RetryDecision::DoNotRetry { reason } => {
                    warn!(
                        source = self.source.name(),
                        error = %error,
                        reason = %reason,
                        "page failed"
                    );
                    return Err(error);
                }
            }
        }
    }
}
