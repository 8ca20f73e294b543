//! arXiv Atom query API.

use async_trait::async_trait;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::debug;

use super::{MetadataSource, PageToken, SourceError, SourcePage, SourceQuery, collapse_whitespace};
use crate::fetch::{HttpFetcher, url_with_query};
use crate::record::{Record, RecordDetails};
use crate::resolver::construct_arxiv_pdf_url;

const SOURCE_NAME: &str = "arxiv";
const MAX_RESULTS_PER_CALL: usize = 100;

/// One `<entry>` of an arXiv Atom feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArxivEntry {
    /// Abstract page URL, e.g. `http://arxiv.org/abs/2301.12345v1`.
    pub id: String,
    pub title: String,
    pub summary: String,
    pub published: String,
    pub authors: Vec<String>,
    /// Href of the `<link type="application/pdf">` element.
    pub pdf_link: Option<String>,
    pub doi: Option<String>,
    pub categories: Vec<String>,
    pub journal_ref: Option<String>,
}

impl ArxivEntry {
    /// Converts the entry into a normalized record.
    ///
    /// The PDF link falls back to one constructed from the abstract URL.
    #[must_use]
    pub fn into_record(self) -> Record {
        let pdf_url = self
            .pdf_link
            .clone()
            .or_else(|| construct_arxiv_pdf_url(&self.id))
            .unwrap_or_default();
        let details = RecordDetails {
            abstract_text: self.summary,
            authors: self.authors.join(";"),
            published: self.published,
            topics: self.categories.join(";"),
            journal: self.journal_ref.unwrap_or_default(),
        };
        Record::new(SOURCE_NAME, self.id.clone(), self.title)
            .with_doi(self.doi.unwrap_or_default())
            .with_pdf_url(pdf_url)
            .with_candidate_urls([self.id])
            .with_details(details)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    None,
    Id,
    Title,
    Summary,
    Published,
    AuthorName,
    Doi,
    JournalRef,
}

/// Parses an Atom feed into entries, in document order.
///
/// # Errors
///
/// Returns [`SourceError::Parse`] on malformed XML.
pub fn parse_atom_feed(xml: &str) -> Result<Vec<ArxivEntry>, SourceError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut current: Option<ArxivEntry> = None;
    let mut field = Field::None;
    let mut in_author = false;
    let mut author_name = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let name = e.local_name();
                match name.as_ref() {
                    b"entry" => current = Some(ArxivEntry::default()),
                    b"author" => {
                        in_author = true;
                        author_name.clear();
                    }
                    other => {
                        field = match other {
                            b"id" => Field::Id,
                            b"title" => Field::Title,
                            b"summary" => Field::Summary,
                            b"published" => Field::Published,
                            b"name" if in_author => Field::AuthorName,
                            b"doi" => Field::Doi,
                            b"journal_ref" => Field::JournalRef,
                            _ => Field::None,
                        };
                    }
                }
                if let Some(entry) = current.as_mut() {
                    apply_attributes(entry, e)?;
                }
            }
            Ok(Event::Empty(ref e)) => {
                if let Some(entry) = current.as_mut() {
                    apply_attributes(entry, e)?;
                }
            }
            Ok(Event::Text(ref t)) => {
                let Some(entry) = current.as_mut() else {
                    continue;
                };
                let text = t
                    .unescape()
                    .map_err(|e| SourceError::parse(SOURCE_NAME, e.to_string()))?;
                match field {
                    Field::Id => entry.id.push_str(text.trim()),
                    Field::Title => entry.title.push_str(&text),
                    Field::Summary => entry.summary.push_str(&text),
                    Field::Published => entry.published.push_str(text.trim()),
                    Field::AuthorName => author_name.push_str(&text),
                    Field::Doi => entry.doi = Some(text.trim().to_string()),
                    Field::JournalRef => entry.journal_ref = Some(collapse_whitespace(&text)),
                    Field::None => {}
                }
            }
            Ok(Event::End(ref e)) => {
                field = Field::None;
                match e.local_name().as_ref() {
                    b"entry" => {
                        if let Some(mut entry) = current.take() {
                            entry.title = collapse_whitespace(&entry.title);
                            entry.summary = collapse_whitespace(&entry.summary);
                            entries.push(entry);
                        }
                    }
                    b"author" => {
                        in_author = false;
                        let name = collapse_whitespace(&author_name);
                        if let Some(entry) = current.as_mut()
                            && !name.is_empty()
                        {
                            entry.authors.push(name);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(SourceError::parse(
                    SOURCE_NAME,
                    format!("error at position {}: {e}", reader.error_position()),
                ));
            }
            _ => {}
        }
    }

    Ok(entries)
}

/// Picks up `<link type="application/pdf" href>` and `<category term>`.
fn apply_attributes(entry: &mut ArxivEntry, element: &BytesStart<'_>) -> Result<(), SourceError> {
    let tag = element.local_name();
    if tag.as_ref() != b"link" && tag.as_ref() != b"category" {
        return Ok(());
    }

    let mut href = None;
    let mut link_type = None;
    let mut term = None;
    for attr in element.attributes() {
        let attr = attr.map_err(|e| SourceError::parse(SOURCE_NAME, e.to_string()))?;
        let value = attr
            .unescape_value()
            .map_err(|e| SourceError::parse(SOURCE_NAME, e.to_string()))?
            .into_owned();
        match attr.key.local_name().as_ref() {
            b"href" => href = Some(value),
            b"type" => link_type = Some(value),
            b"term" => term = Some(value),
            _ => {}
        }
    }

    if tag.as_ref() == b"link" {
        if entry.pdf_link.is_none() && link_type.as_deref() == Some("application/pdf") {
            entry.pdf_link = href;
        }
    } else if let Some(term) = term
        && !entry.categories.contains(&term)
    {
        entry.categories.push(term);
    }
    Ok(())
}

/// Client for the arXiv query API.
#[derive(Debug, Clone)]
pub struct ArxivSource {
    fetcher: HttpFetcher,
    query_url: String,
    contact_email: Option<String>,
}

impl ArxivSource {
    /// Creates a source against the query endpoint (`http://export.arxiv.org/api/query`).
    #[must_use]
    pub fn new(fetcher: HttpFetcher, query_url: &str, contact_email: Option<String>) -> Self {
        Self {
            fetcher,
            query_url: query_url.to_string(),
            contact_email,
        }
    }
}

#[async_trait]
impl MetadataSource for ArxivSource {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    fn first_page(&self) -> PageToken {
        PageToken::Offset(0)
    }

    fn max_page_size(&self) -> usize {
        MAX_RESULTS_PER_CALL
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
        let start = match token {
            PageToken::Offset(offset) => *offset,
            PageToken::Cursor(_) | PageToken::Page(_) => 0,
        };
        let batch = page_size.clamp(1, MAX_RESULTS_PER_CALL);
        let search_query = format!("all:{phrase}");
        let start_param = start.to_string();
        let batch_param = batch.to_string();
        let url = url_with_query(
            &self.query_url,
            "",
            &[
                ("search_query", search_query.as_str()),
                ("start", start_param.as_str()),
                ("max_results", batch_param.as_str()),
            ],
        )?;

        let body = self.fetcher.get_text(&url, &[]).await?;
        let entries = parse_atom_feed(&body)?;
        debug!(entries = entries.len(), start, "atom page");

        let next = (entries.len() >= batch).then(|| PageToken::Offset(start + entries.len()));
        let records = entries
            .into_iter()
            .map(|entry| {
                let record = entry.into_record();
                match &self.contact_email {
                    Some(email) => record.with_contact_email(email.clone()),
                    None => record,
                }
            })
            .collect();
        Ok(SourcePage { records, next })
    }
}
