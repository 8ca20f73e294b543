//! Metadata source adapters.
//!
//! Each adapter turns one page of a remote search API into normalized
//! [`Record`]s plus a continuation token for the next page.
//!
//! - [`OpenAlexSource`] - cursor pagination; phrase search and topic filter
//! - [`ArxivSource`] - offset pagination over the Atom query API
//! - [`CoreSource`] - page-numbered search, API key required

mod arxiv;
mod core_api;
mod openalex;

pub use self::arxiv::{ArxivEntry, ArxivSource, parse_atom_feed};
pub use self::core_api::CoreSource;
pub use self::openalex::{OpenAlexSource, TopicSummary, reconstruct_abstract};

use async_trait::async_trait;
use thiserror::Error;

use crate::fetch::FetchError;
use crate::harvest::{FailureType, classify_error};
use crate::record::Record;

/// What to ask a source for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceQuery {
    /// Free-text phrase search.
    Search(String),
    /// Works tagged with a topic id (short form, e.g. `T10001`).
    Topic(String),
}

/// Continuation token for the next page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageToken {
    /// Opaque cursor (`*` for the first page).
    Cursor(String),
    /// Zero-based item offset.
    Offset(usize),
    /// One-based page number.
    Page(u32),
}

/// One page of normalized results.
#[derive(Debug, Clone, Default)]
pub struct SourcePage {
    /// Records on this page, in the order the source returned them.
    pub records: Vec<Record>,
    /// Token for the following page; `None` when exhausted.
    pub next: Option<PageToken>,
}

/// Errors raised by metadata sources.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The HTTP request failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The payload arrived but did not have the expected shape.
    #[error("{source_name} returned an unexpected payload: {message}")]
    Parse {
        /// Source tag.
        source_name: &'static str,
        /// Parser message.
        message: String,
    },

    /// The source cannot answer this kind of query.
    #[error("{source_name} does not support {query:?} queries")]
    UnsupportedQuery {
        /// Source tag.
        source_name: &'static str,
        /// The rejected query.
        query: SourceQuery,
    },
}

impl SourceError {
    /// Creates a parse error.
    pub fn parse(source_name: &'static str, message: impl Into<String>) -> Self {
        Self::Parse {
            source_name,
            message: message.into(),
        }
    }

    /// Retry classification of this error.
    #[must_use]
    pub fn failure_type(&self) -> FailureType {
        match self {
            Self::Fetch(error) => classify_error(error),
            Self::Parse { .. } | Self::UnsupportedQuery { .. } => FailureType::Permanent,
        }
    }

    /// Raw `Retry-After` value of an HTTP error, if any.
    #[must_use]
    pub fn retry_after(&self) -> Option<&str> {
        match self {
            Self::Fetch(error) => error.retry_after(),
            _ => None,
        }
    }
}

/// A paginated metadata search API.
///
/// Uses `async_trait` so sources can be stored as `Box<dyn MetadataSource>`.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Source tag written into records (`openalex`, `arxiv`, `core`).
    fn name(&self) -> &'static str;

    /// Token for the first page.
    fn first_page(&self) -> PageToken;

    /// Largest page size the API accepts.
    fn max_page_size(&self) -> usize;

    /// Fetches one page of results.
    async fn fetch_page(
        &self,
        query: &SourceQuery,
        token: &PageToken,
        page_size: usize,
    ) -> Result<SourcePage, SourceError>;
}

/// Collapses runs of whitespace into single spaces.
pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
