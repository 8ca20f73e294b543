//! CORE v3 works search (API key required).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{MetadataSource, PageToken, SourceError, SourcePage, SourceQuery, collapse_whitespace};
use crate::fetch::{HttpFetcher, url_with_query};
use crate::record::{Record, RecordDetails};

const SOURCE_NAME: &str = "core";
const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default, rename = "totalHits")]
    total_hits: Option<u64>,
    #[serde(default)]
    results: Vec<Value>,
}

/// Reads a string field, accepting numbers as well.
fn string_field(item: &Value, key: &str) -> String {
    match item.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Joins a list of strings or `{name}` objects with `;`.
fn joined_names(item: &Value, key: &str) -> String {
    let Some(Value::Array(values)) = item.get(key) else {
        return String::new();
    };
    values
        .iter()
        .filter_map(|v| match v {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Object(map) => map.get("name").and_then(Value::as_str).map(str::to_string),
            _ => None,
        })
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(";")
}

fn journal_title(item: &Value) -> String {
    item.get("journals")
        .and_then(Value::as_array)
        .and_then(|journals| journals.first())
        .and_then(|j| j.get("title"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn normalize(item: &Value) -> Record {
    let details = RecordDetails {
        abstract_text: collapse_whitespace(&string_field(item, "abstract")),
        authors: joined_names(item, "authors"),
        published: string_field(item, "publishedDate"),
        topics: joined_names(item, "tags"),
        journal: journal_title(item),
    };
    let landing = item
        .get("links")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter(|link| link.get("type").and_then(Value::as_str) != Some("download"))
        .filter_map(|link| link.get("url").and_then(Value::as_str))
        .map(str::to_string)
        .collect::<Vec<_>>();

    Record::new(
        SOURCE_NAME,
        string_field(item, "id"),
        collapse_whitespace(&string_field(item, "title")),
    )
    .with_doi(string_field(item, "doi"))
    .with_pdf_url(string_field(item, "downloadUrl"))
    .with_candidate_urls(landing)
    .with_details(details)
}

/// Client for `GET {base}/v3/search/works`.
#[derive(Debug, Clone)]
pub struct CoreSource {
    fetcher: HttpFetcher,
    base_url: String,
    api_key: String,
    contact_email: Option<String>,
}

impl CoreSource {
    /// Creates a source; `api_key` is sent verbatim in the `Authorization` header.
    #[must_use]
    pub fn new(
        fetcher: HttpFetcher,
        base_url: &str,
        api_key: impl Into<String>,
        contact_email: Option<String>,
    ) -> Self {
        Self {
            fetcher,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            contact_email,
        }
    }
}

#[async_trait]
impl MetadataSource for CoreSource {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    fn first_page(&self) -> PageToken {
        PageToken::Page(1)
    }

    fn max_page_size(&self) -> usize {
        MAX_PAGE_SIZE
    }

    #[tracing::instrument(skip(self), fields(source = SOURCE_NAME))]
    async fn fetch_page(
        &self,
        query: &SourceQuery,
        token: &PageToken,
        page_size: usize,
    ) -> Result<SourcePage, SourceError> {
        let SourceQuery::Search(phrase) = query else {
            return Err(SourceError::UnsupportedQuery {
                source_name: SOURCE_NAME,
                query: query.clone(),
            });
        };
        let page = match token {
            PageToken::Page(page) => (*page).max(1),
            PageToken::Cursor(_) | PageToken::Offset(_) => 1,
        };
        let size = page_size.clamp(1, MAX_PAGE_SIZE);
        let page_param = page.to_string();
        let size_param = size.to_string();
        let url = url_with_query(
            &self.base_url,
            "/v3/search/works",
            &[
                ("q", phrase.as_str()),
                ("page", page_param.as_str()),
                ("pageSize", size_param.as_str()),
            ],
        )?;

        let response: SearchResponse = self
            .fetcher
            .get_json(&url, &[("Authorization", self.api_key.as_str())])
            .await?;
        debug!(results = response.results.len(), total = ?response.total_hits, "core page");

        let seen = (page as usize - 1) * size + response.results.len();
        let more = response
            .total_hits
            .is_some_and(|total| (seen as u64) < total);
        let next = (more && !response.results.is_empty()).then(|| PageToken::Page(page + 1));

        let records = response
            .results
            .iter()
            .map(|item| {
                let record = normalize(item);
                match &self.contact_email {
                    Some(email) => record.with_contact_email(email.clone()),
                    None => record,
                }
            })
            .collect();
        Ok(SourcePage { records, next })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fetch::FetchSettings;
    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, ResponseTemplate};

    #[test]
    fn test_normalize_flexible_fields() {
        let item = serde_json::json!({
            "id": 12345,
            "title": "Irrigation\n  in  Kenya",
            "doi": "10.5/irr",
            "downloadUrl": "https://core.ac.uk/download/12345.pdf",
            "abstract": "Drip  irrigation.",
            "authors": [{"name": "Jane Doe"}, "John Roe"],
            "publishedDate": "2021-03-01T00:00:00",
            "tags": ["Agriculture", "Water"],
            "journals": [{"title": "Irrigation Science"}],
            "links": [
                {"type": "download", "url": "https://core.ac.uk/download/12345.pdf"},
                {"type": "display", "url": "https://core.ac.uk/works/12345"}
            ]
        });
        let record = normalize(&item);
        assert_eq!(record.source, "core");
        assert_eq!(record.identifier, "12345");
        assert_eq!(record.title, "Irrigation in Kenya");
        assert_eq!(record.pdf_url.as_deref(), Some("https://core.ac.uk/download/12345.pdf"));
        assert_eq!(record.candidate_urls, vec!["https://core.ac.uk/works/12345"]);
        assert_eq!(record.details.authors, "Jane Doe;John Roe");
        assert_eq!(record.details.topics, "Agriculture;Water");
        assert_eq!(record.details.journal, "Irrigation Science");
        assert_eq!(record.details.abstract_text, "Drip irrigation.");
    }

    #[test]
    fn test_normalize_missing_fields_are_empty() {
        let record = normalize(&serde_json::json!({"title": "Only a title"}));
        assert!(record.doi.is_none());
        assert!(record.pdf_url.is_none());
        assert!(record.candidate_urls.is_empty());
        assert_eq!(record.details, RecordDetails::default());
    }

    #[tokio::test]
    async fn test_fetch_page_sends_key_and_continues_by_total_hits() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/v3/search/works"))
            .and(header("Authorization", "secret-key"))
            .and(query_param("q", "crop yield"))
            .and(query_param("page", "1"))
            .and(query_param("pageSize", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "totalHits": 3,
                "results": [{"id": 1, "title": "First"}]
            })))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&FetchSettings::default()).unwrap();
        let core = CoreSource::new(fetcher, &server.uri(), "secret-key", None);
        let page = core
            .fetch_page(&SourceQuery::Search("crop yield".to_string()), &core.first_page(), 1)
            .await
            .unwrap();
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.next, Some(PageToken::Page(2)));
    }

    #[tokio::test]
    async fn test_fetch_page_unauthorized_is_permanent() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/v3/search/works"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&FetchSettings::default()).unwrap();
        let core = CoreSource::new(fetcher, &server.uri(), "bad", None);
        let err = core
            .fetch_page(&SourceQuery::Search("x".to_string()), &core.first_page(), 10)
            .await
            .unwrap_err();
        assert_eq!(err.failure_type(), crate::harvest::FailureType::Permanent);
    }
}
