//! `OpenAlex` works and topics APIs.
//!
//! Works are paged with a cursor (`cursor=*`, then `meta.next_cursor`).

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{MetadataSource, PageToken, SourceError, SourcePage, SourceQuery, collapse_whitespace};
use crate::fetch::{HttpFetcher, url_with_query};
use crate::record::{Record, RecordDetails};

const SOURCE_NAME: &str = "openalex";
const FIRST_CURSOR: &str = "*";
const MAX_PER_PAGE: usize = 200;
const WORK_FIELDS: &str = "id,doi,display_name,publication_date,abstract_inverted_index,\
best_oa_location,primary_location,locations,topics,biblio,authorships";

#[derive(Debug, Deserialize)]
struct WorksResponse {
    #[serde(default)]
    results: Vec<Work>,
    #[serde(default)]
    meta: WorksMeta,
}

#[derive(Debug, Default, Deserialize)]
struct WorksMeta {
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Work {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    doi: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    publication_date: Option<String>,
    #[serde(default)]
    abstract_inverted_index: Option<HashMap<String, Vec<usize>>>,
    #[serde(default)]
    best_oa_location: Option<Location>,
    #[serde(default)]
    primary_location: Option<Location>,
    #[serde(default)]
    locations: Vec<Location>,
    #[serde(default)]
    topics: Vec<TopicRef>,
    #[serde(default)]
    biblio: Option<Biblio>,
    #[serde(default)]
    authorships: Vec<Authorship>,
}

#[derive(Debug, Default, Deserialize)]
struct Location {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    url_for_pdf: Option<String>,
    #[serde(default)]
    pdf_url: Option<String>,
    #[serde(default)]
    landing_page_url: Option<String>,
    #[serde(default)]
    source: Option<LocationSource>,
}

#[derive(Debug, Default, Deserialize)]
struct LocationSource {
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TopicRef {
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Biblio {
    #[serde(default)]
    journal_title: Option<String>,
    #[serde(default)]
    journal: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Authorship {
    #[serde(default)]
    author: Option<AuthorRef>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthorRef {
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TopicsResponse {
    #[serde(default)]
    results: Vec<TopicSummary>,
}

/// A research topic as listed by the topics endpoint.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct TopicSummary {
    /// Full id, e.g. `https://openalex.org/T10017`.
    #[serde(default)]
    pub id: String,
    /// Human-readable name.
    #[serde(default)]
    pub display_name: String,
    /// Number of works tagged with the topic.
    #[serde(default)]
    pub works_count: u64,
    /// Representative keywords.
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl TopicSummary {
    /// Id without the URL prefix (`T10017`).
    #[must_use]
    pub fn short_id(&self) -> &str {
        self.id.rsplit('/').next().unwrap_or(&self.id)
    }

    /// Display name, or the short id when the name is blank.
    #[must_use]
    pub fn label(&self) -> &str {
        let name = self.display_name.trim();
        if name.is_empty() { self.short_id() } else { name }
    }
}

/// Rebuilds abstract text from an inverted index (`word -> positions`).
///
/// Returns an empty string when the positions leave a gap. A position past
/// the number of listed positions always leaves one, so slots never outgrow
/// the index itself.
#[must_use]
pub fn reconstruct_abstract(index: &HashMap<String, Vec<usize>>) -> String {
    let Some(max_position) = index.values().flatten().copied().max() else {
        return String::new();
    };
    let total: usize = index.values().map(Vec::len).sum();
    let Some(len) = max_position.checked_add(1).filter(|&len| len <= total) else {
        return String::new();
    };
    let mut slots: Vec<Option<&str>> = vec![None; len];
    for (word, positions) in index {
        for &position in positions {
            if let Some(slot) = slots.get_mut(position) {
                *slot = Some(word.as_str());
            }
        }
    }
    let words: Option<Vec<&str>> = slots.into_iter().collect();
    words.map(|w| w.join(" ")).unwrap_or_default()
}

fn first_present<'a>(values: impl IntoIterator<Item = Option<&'a String>>) -> Option<String> {
    values
        .into_iter()
        .flatten()
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

/// Client for `OpenAlex` works search, topic-filtered works, and topic listing.
#[derive(Debug, Clone)]
pub struct OpenAlexSource {
    fetcher: HttpFetcher,
    base_url: String,
    contact_email: Option<String>,
}

impl OpenAlexSource {
    /// Creates a source against the given API base URL.
    #[must_use]
    pub fn new(fetcher: HttpFetcher, base_url: &str, contact_email: Option<String>) -> Self {
        Self {
            fetcher,
            base_url: base_url.trim_end_matches('/').to_string(),
            contact_email,
        }
    }

    /// Lists topics matching `term`, most populous first, truncated to `top_n`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the request fails or the body is not the
    /// expected JSON.
    #[tracing::instrument(skip(self), fields(source = SOURCE_NAME))]
    pub async fn search_topics(
        &self,
        term: &str,
        top_n: usize,
    ) -> Result<Vec<TopicSummary>, SourceError> {
        let per_page = top_n.clamp(25, MAX_PER_PAGE).to_string();
        let url = url_with_query(
            &self.base_url,
            "/topics",
            &[("search", term), ("per-page", &per_page)],
        )?;
        let response: TopicsResponse = self.fetcher.get_json(&url, &[]).await?;
        let mut topics = response.results;
        topics.sort_by(|a, b| b.works_count.cmp(&a.works_count));
        topics.truncate(top_n);
        Ok(topics)
    }

    fn normalize(&self, work: Work) -> Record {
        let best = work.best_oa_location.unwrap_or_default();
        let primary = work.primary_location.unwrap_or_default();
        let first = work.locations.into_iter().next().unwrap_or_default();

        let direct = first_present([
            best.pdf_url.as_ref(),
            best.url_for_pdf.as_ref(),
            best.url.as_ref(),
            primary.pdf_url.as_ref(),
            primary.url.as_ref(),
        ]);
        let candidates: Vec<String> = [&best, &primary, &first]
            .into_iter()
            .flat_map(|loc| [&loc.pdf_url, &loc.landing_page_url, &loc.url])
            .filter_map(Clone::clone)
            .collect();

        let biblio = work.biblio.unwrap_or_default();
        let journal = first_present([
            biblio.journal_title.as_ref(),
            biblio.journal.as_ref(),
            primary.source.as_ref().and_then(|s| s.display_name.as_ref()),
        ])
        .unwrap_or_default();

        let details = RecordDetails {
            abstract_text: work
                .abstract_inverted_index
                .as_ref()
                .map(reconstruct_abstract)
                .unwrap_or_default(),
            authors: work
                .authorships
                .iter()
                .filter_map(|a| a.author.as_ref().and_then(|x| x.display_name.clone()))
                .collect::<Vec<_>>()
                .join(";"),
            published: work.publication_date.unwrap_or_default(),
            topics: work
                .topics
                .iter()
                .filter_map(|t| t.display_name.clone())
                .collect::<Vec<_>>()
                .join(";"),
            journal,
        };

        let title = work.display_name.or(work.title).unwrap_or_default();
        let mut record = Record::new(SOURCE_NAME, work.id.unwrap_or_default(), collapse_whitespace(&title))
            .with_doi(work.doi.unwrap_or_default())
            .with_pdf_url(direct.unwrap_or_default())
            .with_candidate_urls(candidates)
            .with_details(details);
        if let Some(email) = &self.contact_email {
            record = record.with_contact_email(email.clone());
        }
        record
    }
}

#[async_trait]
impl MetadataSource for OpenAlexSource {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    fn first_page(&self) -> PageToken {
        PageToken::Cursor(FIRST_CURSOR.to_string())
    }

    fn max_page_size(&self) -> usize {
        MAX_PER_PAGE
    }

    #[tracing::instrument(skip(self), fields(source = SOURCE_NAME))]
    async fn fetch_page(
        &self,
        query: &SourceQuery,
        token: &PageToken,
        page_size: usize,
    ) -> Result<SourcePage, SourceError> {
        let cursor = match token {
            PageToken::Cursor(cursor) => cursor.as_str(),
            PageToken::Offset(_) | PageToken::Page(_) => FIRST_CURSOR,
        };
        let per_page = page_size.clamp(1, MAX_PER_PAGE).to_string();
        let (key, value) = match query {
            SourceQuery::Search(phrase) => ("search", phrase.clone()),
            SourceQuery::Topic(topic_id) => ("filter", format!("topics.id:{topic_id}")),
        };
        let url = url_with_query(
            &self.base_url,
            "/works",
            &[
                (key, value.as_str()),
                ("per-page", per_page.as_str()),
                ("select", WORK_FIELDS),
                ("cursor", cursor),
            ],
        )?;

        let response: WorksResponse = self.fetcher.get_json(&url, &[]).await?;
        debug!(results = response.results.len(), "works page");

        let next = response
            .meta
            .next_cursor
            .filter(|c| !c.is_empty() && !response.results.is_empty())
            .map(PageToken::Cursor);
        let records = response.results.into_iter().map(|w| self.normalize(w)).collect();
        Ok(SourcePage { records, next })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fetch::FetchSettings;
    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, ResponseTemplate};

    fn source(base: &str) -> OpenAlexSource {
        let fetcher = HttpFetcher::new(&FetchSettings::default()).unwrap();
        OpenAlexSource::new(fetcher, base, Some("me@example.org".to_string()))
    }

    #[test]
    fn test_reconstruct_abstract_orders_by_position() {
        let mut index = HashMap::new();
        index.insert("water".to_string(), vec![0, 2]);
        index.insert("and".to_string(), vec![1]);
        assert_eq!(reconstruct_abstract(&index), "water and water");
    }

    #[test]
    fn test_reconstruct_abstract_gap_is_empty() {
        let mut index = HashMap::new();
        index.insert("a".to_string(), vec![0]);
        index.insert("c".to_string(), vec![2]);
        assert_eq!(reconstruct_abstract(&index), "");
        assert_eq!(reconstruct_abstract(&HashMap::new()), "");
    }

    #[test]
    fn test_reconstruct_abstract_huge_position_is_empty() {
        let mut index = HashMap::new();
        index.insert("a".to_string(), vec![0]);
        index.insert("b".to_string(), vec![usize::MAX]);
        assert_eq!(reconstruct_abstract(&index), "");

        index.insert("b".to_string(), vec![10_000_000_000]);
        assert_eq!(reconstruct_abstract(&index), "");
    }

    #[test]
    fn test_normalize_survives_malformed_abstract_index() {
        let json = serde_json::json!({
            "id": "https://openalex.org/W9",
            "display_name": "Odd Index",
            "abstract_inverted_index": {"a": [0], "b": [18_446_744_073_709_551_615_u64]}
        });
        let work: Work = serde_json::from_value(json).unwrap();
        let record = source("https://api.openalex.org").normalize(work);
        assert_eq!(record.title, "Odd Index");
        assert_eq!(record.details.abstract_text, "");
    }

    #[test]
    fn test_topic_short_id() {
        let topic = TopicSummary {
            id: "https://openalex.org/T10017".to_string(),
            display_name: " ".to_string(),
            works_count: 1,
            keywords: Vec::new(),
        };
        assert_eq!(topic.short_id(), "T10017");
        assert_eq!(topic.label(), "T10017");
    }

    #[test]
    fn test_normalize_work_fields() {
        let json = serde_json::json!({
            "id": "https://openalex.org/W1",
            "doi": "https://doi.org/10.1/ABC",
            "display_name": "Solar  power\n in deserts",
            "publication_date": "2023-05-01",
            "abstract_inverted_index": {"Sun": [0], "shines": [1]},
            "best_oa_location": {"pdf_url": null, "landing_page_url": "https://pub/x"},
            "primary_location": {"pdf_url": "https://pub/x.pdf", "source": {"display_name": "Energy J"}},
            "locations": [{"landing_page_url": "https://repo/y"}],
            "topics": [{"display_name": "Solar"}, {"display_name": "Energy"}],
            "authorships": [{"author": {"display_name": "A. One"}}, {"author": {"display_name": "B. Two"}}]
        });
        let work: Work = serde_json::from_value(json).unwrap();
        let record = source("https://api.openalex.org").normalize(work);

        assert_eq!(record.source, "openalex");
        assert_eq!(record.identifier, "https://openalex.org/W1");
        assert_eq!(record.title, "Solar power in deserts");
        assert_eq!(record.bare_doi(), Some("10.1/ABC"));
        assert_eq!(record.pdf_url.as_deref(), Some("https://pub/x.pdf"));
        assert_eq!(
            record.candidate_urls,
            vec!["https://pub/x", "https://pub/x.pdf", "https://repo/y"]
        );
        assert_eq!(record.details.abstract_text, "Sun shines");
        assert_eq!(record.details.topics, "Solar;Energy");
        assert_eq!(record.details.authors, "A. One;B. Two");
        assert_eq!(record.details.journal, "Energy J");
        assert_eq!(record.contact_email.as_deref(), Some("me@example.org"));
    }

    #[tokio::test]
    async fn test_fetch_page_uses_cursor_and_returns_next() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/works"))
            .and(query_param("search", "water supply"))
            .and(query_param("cursor", "*"))
            .and(query_param("per-page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [{"id": "W1", "display_name": "One"}, {"id": "W2", "display_name": "Two"}],
                "meta": {"next_cursor": "abc"}
            })))
            .mount(&server)
            .await;

        let openalex = source(&server.uri());
        let page = openalex
            .fetch_page(
                &SourceQuery::Search("water supply".to_string()),
                &openalex.first_page(),
                2,
            )
            .await
            .unwrap();
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.next, Some(PageToken::Cursor("abc".to_string())));
    }

    #[tokio::test]
    async fn test_fetch_page_topic_filter_and_end_of_results() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/works"))
            .and(query_param("filter", "topics.id:T10017"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [],
                "meta": {"next_cursor": "still-here"}
            })))
            .mount(&server)
            .await;

        let openalex = source(&server.uri());
        let page = openalex
            .fetch_page(
                &SourceQuery::Topic("T10017".to_string()),
                &PageToken::Cursor("*".to_string()),
                200,
            )
            .await
            .unwrap();
        assert!(page.records.is_empty());
        assert!(page.next.is_none());
    }

    #[tokio::test]
    async fn test_search_topics_sorted_and_truncated() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/topics"))
            .and(query_param("search", "technology"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    {"id": "https://openalex.org/T1", "display_name": "Small", "works_count": 10},
                    {"id": "https://openalex.org/T2", "display_name": "Big", "works_count": 500, "keywords": ["ai", "ml"]},
                    {"id": "https://openalex.org/T3", "display_name": "Mid", "works_count": 100}
                ]
            })))
            .mount(&server)
            .await;

        let topics = source(&server.uri()).search_topics("technology", 2).await.unwrap();
        let names: Vec<&str> = topics.iter().map(|t| t.display_name.as_str()).collect();
        assert_eq!(names, vec!["Big", "Mid"]);
        assert_eq!(topics[0].short_id(), "T2");
        assert_eq!(topics[0].keywords, vec!["ai", "ml"]);
    }
}
