//! Landing-page strategy: fetch each candidate page and scrape a PDF link from it.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use super::utils::{absolutize_url, compile_static_regex, url_ends_with_pdf};
use super::{ResolutionMethod, Strategy, StrategyOutcome};
use crate::fetch::HttpFetcher;
use crate::record::Record;

/// Meta tag names that carry a PDF link, in preference order.
const PDF_META_NAMES: [&str; 2] = ["citation_pdf_url", "pdf_url"];

/// Absolute `.pdf` URL anywhere in the raw markup.
static ABSOLUTE_PDF_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r#"(?i)https?://[^\s'"<>]+\.pdf"#));

/// Extracts a PDF link from landing-page markup.
///
/// Checks, in order: `citation_pdf_url`/`pdf_url` meta tags (by `name` then
/// `property`), `<link>` elements whose `type` mentions pdf, anchors whose
/// href ends in `.pdf` or looks like a PDF download, and finally any absolute
/// `.pdf` URL in the raw text. Relative links resolve against `page_url`,
/// which should be the final URL after redirects.
#[must_use]
pub fn extract_pdf_link(page_url: &str, html: &str) -> Option<String> {
    let base = Url::parse(page_url).ok();
    let resolve = |value: &str| match &base {
        Some(base) => absolutize_url(value, base),
        None => Some(value.trim().to_string()).filter(|v| v.starts_with("http")),
    };

    let document = Html::parse_document(html);

    let from_markup = meta_pdf_link(&document)
        .or_else(|| typed_link_pdf(&document))
        .or_else(|| anchor_pdf_link(&document));
    if let Some(link) = from_markup.as_deref().and_then(resolve) {
        return Some(link);
    }

    ABSOLUTE_PDF_URL_RE
        .find(html)
        .map(|found| found.as_str().to_string())
}

fn select_all<'a>(document: &'a Html, pattern: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(pattern) {
        Ok(selector) => document.select(&selector).collect(),
        Err(error) => {
            debug!(pattern, error = %error, "unusable selector");
            Vec::new()
        }
    }
}

fn meta_pdf_link(document: &Html) -> Option<String> {
    for name in PDF_META_NAMES {
        for attribute in ["name", "property"] {
            let pattern = format!(r#"meta[{attribute}="{name}"]"#);
            let content = select_all(document, &pattern).into_iter().find_map(|element| {
                element
                    .value()
                    .attr("content")
                    .map(str::trim)
                    .filter(|content| !content.is_empty())
                    .map(str::to_string)
            });
            if content.is_some() {
                return content;
            }
        }
    }
    None
}

fn typed_link_pdf(document: &Html) -> Option<String> {
    select_all(document, "link[href]")
        .into_iter()
        .find(|element| {
            element
                .value()
                .attr("type")
                .is_some_and(|kind| kind.to_ascii_lowercase().contains("pdf"))
        })
        .and_then(|element| element.value().attr("href"))
        .map(|href| href.trim().to_string())
}

fn anchor_pdf_link(document: &Html) -> Option<String> {
    select_all(document, "a[href]").into_iter().find_map(|element| {
        let href = element.value().attr("href")?.trim();
        let lower = href.to_ascii_lowercase();
        let looks_like_pdf = lower.ends_with(".pdf")
            || (lower.contains("download") && (lower.contains("pdf") || lower.contains("fulltext")));
        looks_like_pdf.then(|| href.to_string())
    })
}

/// Fetches each candidate page and scrapes a PDF link from it.
#[derive(Debug, Clone)]
pub struct LandingScrapeStrategy {
    fetcher: HttpFetcher,
}

impl LandingScrapeStrategy {
    /// Creates a new `LandingScrapeStrategy`.
    #[must_use]
    pub fn new(fetcher: HttpFetcher) -> Self {
        Self { fetcher }
    }

    /// HEAD-verifies a scraped link; an unverified link is still returned.
    async fn verify(&self, link: String) -> String {
        match self.fetcher.head(&link).await {
            Ok(meta) if meta.is_pdf_content_type() => meta.final_url,
            Ok(_) | Err(_) => {
                debug!(url = %link, "scraped link not confirmed by HEAD; keeping it");
                link
            }
        }
    }
}

#[async_trait]
impl Strategy for LandingScrapeStrategy {
    fn method(&self) -> ResolutionMethod {
        ResolutionMethod::LandingScrape
    }

    fn applies_to(&self, record: &Record) -> bool {
        !record.candidate_urls.is_empty()
    }

    #[tracing::instrument(skip(self, record), fields(strategy = "landing_scrape", candidates = record.candidate_urls.len()))]
    async fn attempt(&self, record: &Record) -> StrategyOutcome {
        let mut errors = Vec::new();
        for candidate in &record.candidate_urls {
            let page = match self.fetcher.get_page(candidate).await {
                Ok(page) => page,
                Err(error) => {
                    errors.push(error.to_string());
                    continue;
                }
            };
            if page.meta.is_pdf_content_type() || url_ends_with_pdf(&page.meta.final_url) {
                return StrategyOutcome::Found(page.meta.final_url);
            }
            if let Some(link) = extract_pdf_link(&page.meta.final_url, &page.body) {
                return StrategyOutcome::Found(self.verify(link).await);
            }
            debug!(url = %candidate, "no pdf link on page");
        }
        if !errors.is_empty() && errors.len() == record.candidate_urls.len() {
            StrategyOutcome::Error(errors.join("; "))
        } else {
            StrategyOutcome::NotFound
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fetch::FetchSettings;
    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    // ==================== Extraction Tests ====================

    #[test]
    fn test_extract_citation_meta_relative_to_page() {
        let html = r#"<html><head><meta name="citation_pdf_url" content="/f/paper.pdf"></head></html>"#;
        assert_eq!(
            extract_pdf_link("https://pub.example/article/1", html).as_deref(),
            Some("https://pub.example/f/paper.pdf")
        );
    }

    #[test]
    fn test_extract_meta_property_and_preference_order() {
        let html = r#"<meta property="pdf_url" content="https://b/second.pdf">
            <meta property="citation_pdf_url" content="https://a/first.pdf">"#;
        assert_eq!(
            extract_pdf_link("https://pub.example/x", html).as_deref(),
            Some("https://a/first.pdf")
        );
    }

    #[test]
    fn test_extract_typed_link() {
        let html = r#"<link rel="alternate" type="application/PDF" href="../full/1">"#;
        assert_eq!(
            extract_pdf_link("https://pub.example/a/b/page", html).as_deref(),
            Some("https://pub.example/a/full/1")
        );
    }

    #[test]
    fn test_extract_anchor_rules() {
        let html = r#"<a href="/about">About</a><a href="/download?type=fulltext">Get</a>"#;
        assert_eq!(
            extract_pdf_link("https://pub.example/p", html).as_deref(),
            Some("https://pub.example/download?type=fulltext")
        );
        let html = r#"<a href="files/Paper.PDF">PDF</a>"#;
        assert_eq!(
            extract_pdf_link("https://pub.example/dir/p", html).as_deref(),
            Some("https://pub.example/dir/files/Paper.PDF")
        );
    }

    #[test]
    fn test_extract_raw_regex_fallback() {
        let html = r#"<script>var u = "https://cdn.example/x/y.pdf";</script>"#;
        assert_eq!(
            extract_pdf_link("https://pub.example/p", html).as_deref(),
            Some("https://cdn.example/x/y.pdf")
        );
    }

    #[test]
    fn test_extract_none_for_plain_page() {
        assert!(extract_pdf_link("https://pub.example/p", "<p>nothing here</p>").is_none());
    }

    // ==================== Strategy Tests ====================

    #[tokio::test]
    async fn test_landing_scrape_verifies_link_with_head() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/article/1"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"<meta name="citation_pdf_url" content="/f/paper.pdf">"#,
                "text/html",
            ))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/f/paper.pdf"))
            .respond_with(ResponseTemplate::new(200).insert_header("Content-Type", "application/pdf"))
            .mount(&server)
            .await;

        let strategy = LandingScrapeStrategy::new(HttpFetcher::new(&FetchSettings::default()).unwrap());
        let record =
            Record::new("csv", "1", "t").with_candidate_urls([format!("{}/article/1", server.uri())]);
        assert_eq!(
            strategy.attempt(&record).await,
            StrategyOutcome::Found(format!("{}/f/paper.pdf", server.uri()))
        );
    }

    #[tokio::test]
    async fn test_landing_scrape_keeps_unverified_link() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/article/2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(r#"<a href="/get/paper.pdf">pdf</a>"#, "text/html"),
            )
            .mount(&server)
            .await;

        let strategy = LandingScrapeStrategy::new(HttpFetcher::new(&FetchSettings::default()).unwrap());
        let record =
            Record::new("csv", "1", "t").with_candidate_urls([format!("{}/article/2", server.uri())]);
        assert_eq!(
            strategy.attempt(&record).await,
            StrategyOutcome::Found(format!("{}/get/paper.pdf", server.uri()))
        );
    }
}
