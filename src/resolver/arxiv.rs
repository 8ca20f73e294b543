//! arXiv strategy: builds the canonical PDF URL from the entry identifier.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use super::utils::compile_static_regex;
use super::{ResolutionMethod, Strategy, StrategyOutcome};
use crate::record::Record;

const ARXIV_BASE_URL: &str = "https://arxiv.org";
const ARXIV_SOURCE: &str = "arxiv";
const ARXIV_ID_PREFIX: &str = "arxiv:";

static ARXIV_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r"(?i)^(?:\d{4}\.\d{4,5}|[a-z\-]+(?:\.[a-z]{2})?/\d{7})(?:v\d+)?$")
});

/// Constructs a PDF URL for records whose source is arXiv.
#[derive(Debug, Default)]
pub struct SourceConstructStrategy;

impl SourceConstructStrategy {
    /// Creates a new `SourceConstructStrategy`.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Strategy for SourceConstructStrategy {
    fn method(&self) -> ResolutionMethod {
        ResolutionMethod::SourceConstruct
    }

    fn applies_to(&self, record: &Record) -> bool {
        record.source.eq_ignore_ascii_case(ARXIV_SOURCE) && record.pdf_url.is_none()
    }

    async fn attempt(&self, record: &Record) -> StrategyOutcome {
        construct_arxiv_pdf_url(&record.identifier)
            .map_or(StrategyOutcome::NotFound, StrategyOutcome::Found)
    }
}

/// Maps an arXiv identifier to its PDF URL.
///
/// Accepts abstract-page URLs (`http://arxiv.org/abs/1234.5678v2`),
/// `arXiv:`-prefixed ids, and bare ids. Abstract URLs get `/pdf/` in place of
/// `/abs/`, a `.pdf` suffix when missing, and an `https` scheme.
#[must_use]
pub fn construct_arxiv_pdf_url(identifier: &str) -> Option<String> {
    let trimmed = identifier.trim();
    let lower = trimmed.to_ascii_lowercase();

    if lower.contains("arxiv.org/abs/") {
        let bare = trimmed.split(['?', '#']).next().unwrap_or(trimmed);
        let mut url = bare.replacen("/abs/", "/pdf/", 1);
        if url.get(..7).is_some_and(|s| s.eq_ignore_ascii_case("http://")) {
            url = format!("https://{}", &url[7..]);
        }
        if !url.to_ascii_lowercase().ends_with(".pdf") {
            url.push_str(".pdf");
        }
        return Some(url);
    }

    let id = if lower.starts_with(ARXIV_ID_PREFIX) {
        trimmed[ARXIV_ID_PREFIX.len()..].trim()
    } else if ARXIV_ID_RE.is_match(trimmed) {
        trimmed
    } else {
        return None;
    };
    if id.is_empty() {
        return None;
    }
    let id = id.strip_suffix(".pdf").unwrap_or(id);
    Some(format!("{ARXIV_BASE_URL}/pdf/{id}.pdf"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_construct_from_http_abs_url_upgrades_scheme() {
        assert_eq!(
            construct_arxiv_pdf_url("http://arxiv.org/abs/1234.5678").as_deref(),
            Some("https://arxiv.org/pdf/1234.5678.pdf")
        );
    }

    #[test]
    fn test_construct_keeps_version_and_existing_suffix() {
        assert_eq!(
            construct_arxiv_pdf_url("https://arxiv.org/abs/2101.00001v3").as_deref(),
            Some("https://arxiv.org/pdf/2101.00001v3.pdf")
        );
        assert_eq!(
            construct_arxiv_pdf_url("https://arxiv.org/abs/2101.00001.pdf").as_deref(),
            Some("https://arxiv.org/pdf/2101.00001.pdf")
        );
    }

    #[test]
    fn test_construct_drops_query_and_fragment() {
        assert_eq!(
            construct_arxiv_pdf_url("https://arxiv.org/abs/1234.5678?context=cs").as_deref(),
            Some("https://arxiv.org/pdf/1234.5678.pdf")
        );
        assert_eq!(
            construct_arxiv_pdf_url("http://arxiv.org/abs/2101.00001v2#refs").as_deref(),
            Some("https://arxiv.org/pdf/2101.00001v2.pdf")
        );
    }

    #[test]
    fn test_construct_from_prefixed_and_bare_ids() {
        assert_eq!(
            construct_arxiv_pdf_url("arXiv:2101.00001").as_deref(),
            Some("https://arxiv.org/pdf/2101.00001.pdf")
        );
        assert_eq!(
            construct_arxiv_pdf_url("hep-th/9901001").as_deref(),
            Some("https://arxiv.org/pdf/hep-th/9901001.pdf")
        );
    }

    #[test]
    fn test_construct_rejects_unrelated_identifiers() {
        assert!(construct_arxiv_pdf_url("https://openalex.org/W123").is_none());
        assert!(construct_arxiv_pdf_url("arXiv:").is_none());
        assert!(construct_arxiv_pdf_url("").is_none());
    }

    #[tokio::test]
    async fn test_strategy_applies_only_to_arxiv_records_without_direct_url() {
        let strategy = SourceConstructStrategy::new();
        let arxiv = Record::new("arxiv", "http://arxiv.org/abs/1234.5678", "t");
        assert!(strategy.applies_to(&arxiv));
        assert_eq!(
            strategy.attempt(&arxiv).await,
            StrategyOutcome::Found("https://arxiv.org/pdf/1234.5678.pdf".to_string())
        );

        let with_direct = arxiv.clone().with_pdf_url("https://x/y.pdf");
        assert!(!strategy.applies_to(&with_direct));

        let other = Record::new("openalex", "http://arxiv.org/abs/1234.5678", "t");
        assert!(!strategy.applies_to(&other));
    }
}
