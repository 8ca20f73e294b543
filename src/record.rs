//! Normalized bibliographic records and the canonical identity derived from them.
//!
//! A [`Record`] is what every metadata source adapter (and the CSV reader)
//! hands to the core. Fields that a source may or may not provide are typed
//! as `Option` or empty collections instead of being looked up by key.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::resolver::compile_static_regex;

/// Anything that is neither a word character nor whitespace.
static NON_WORD_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"[^\w\s]"));

/// Prefixes stripped from DOI values so `https://doi.org/10.1/x` and `10.1/x`
/// identify the same work.
const DOI_PREFIXES: [&str; 5] = [
    "https://doi.org/",
    "http://doi.org/",
    "https://dx.doi.org/",
    "http://dx.doi.org/",
    "doi:",
];

/// Descriptive fields carried through to output files only.
///
/// The resolver and merger never read these.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordDetails {
    /// Abstract text (reconstructed from an inverted index for `OpenAlex`).
    pub abstract_text: String,
    /// Author names joined with `;`.
    pub authors: String,
    /// Publication date or year as reported by the source.
    pub published: String,
    /// Topic/category labels joined with `;`.
    pub topics: String,
    /// Journal or venue name.
    pub journal: String,
}

/// One item from one metadata source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Source-native identifier (often a URL such as `https://openalex.org/W1`).
    pub identifier: String,
    /// DOI as reported by the source, if any.
    pub doi: Option<String>,
    /// Display title.
    pub title: String,
    /// Source tag, e.g. `openalex`, `arxiv`, `core`, `csv`.
    pub source: String,
    /// A URL the source already claims is the full text.
    pub pdf_url: Option<String>,
    /// Further URLs worth probing, in the order the source supplied them.
    pub candidate_urls: Vec<String>,
    /// Contact email for polite identification and OA lookups.
    pub contact_email: Option<String>,
    /// Output-only descriptive fields.
    pub details: RecordDetails,
}

impl Record {
    /// Creates a record with the mandatory fields; everything else starts empty.
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        identifier: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            doi: None,
            title: title.into(),
            source: source.into(),
            pdf_url: None,
            candidate_urls: Vec::new(),
            contact_email: None,
            details: RecordDetails::default(),
        }
    }

    /// Sets the DOI; blank values are stored as `None`.
    #[must_use]
    pub fn with_doi(mut self, doi: impl Into<String>) -> Self {
        self.doi = non_blank(doi.into());
        self
    }

    /// Sets the direct full-text URL; blank values are stored as `None`.
    #[must_use]
    pub fn with_pdf_url(mut self, url: impl Into<String>) -> Self {
        self.pdf_url = non_blank(url.into());
        self
    }

    /// Appends candidate URLs, skipping blanks and duplicates while keeping order.
    #[must_use]
    pub fn with_candidate_urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for url in urls {
            if let Some(url) = non_blank(url.into())
                && !self.candidate_urls.contains(&url)
            {
                self.candidate_urls.push(url);
            }
        }
        self
    }

    /// Sets the contact email; blank values are stored as `None`.
    #[must_use]
    pub fn with_contact_email(mut self, email: impl Into<String>) -> Self {
        self.contact_email = non_blank(email.into());
        self
    }

    /// Replaces the descriptive fields.
    #[must_use]
    pub fn with_details(mut self, details: RecordDetails) -> Self {
        self.details = details;
        self
    }

    /// Returns the DOI without any resolver prefix (`https://doi.org/`, `doi:`).
    #[must_use]
    pub fn bare_doi(&self) -> Option<&str> {
        self.doi.as_deref().map(strip_doi_prefix).filter(|d| !d.is_empty())
    }

    /// Derives the deduplication identity of this record.
    #[must_use]
    pub fn canonical_key(&self) -> Option<CanonicalKey> {
        CanonicalKey::derive(self.doi.as_deref(), &self.title)
    }
}

/// Deduplication identity: lowercased DOI, else a normalized title.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalKey(String);

impl CanonicalKey {
    /// Computes the key from a DOI and title.
    ///
    /// Returns `None` when neither yields a non-empty value; such records
    /// cannot take part in merging.
    #[must_use]
    pub fn derive(doi: Option<&str>, title: &str) -> Option<Self> {
        let doi_key = doi
            .map(|d| strip_doi_prefix(d).to_lowercase())
            .unwrap_or_default();
        if !doi_key.is_empty() {
            return Some(Self(doi_key));
        }
        let title_key = normalize_title(title);
        (!title_key.is_empty()).then_some(Self(title_key))
    }

    /// Returns the key text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lowercases, turns punctuation into spaces, and collapses whitespace.
#[must_use]
pub fn normalize_title(title: &str) -> String {
    let lowered = title.to_lowercase();
    let spaced = NON_WORD_RE.replace_all(&lowered, " ");
    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_doi_prefix(doi: &str) -> &str {
    let trimmed = doi.trim();
    DOI_PREFIXES
        .iter()
        .find_map(|prefix| {
            trimmed
                .get(..prefix.len())
                .filter(|head| head.eq_ignore_ascii_case(prefix))
                .map(|_| trimmed[prefix.len()..].trim())
        })
        .unwrap_or(trimmed)
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == value.len() {
        Some(value)
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_title_strips_punctuation_and_case() {
        assert_eq!(normalize_title("Water Supply, Zambia!"), "water supply zambia");
        assert_eq!(normalize_title("  water   supply\tzambia "), "water supply zambia");
    }

    #[test]
    fn test_normalize_title_keeps_unicode_letters_and_underscore() {
        assert_eq!(normalize_title("Énergie_Solaire: Étude"), "énergie_solaire étude");
    }

    #[test]
    fn test_canonical_key_prefers_doi_lowercased() {
        let key = CanonicalKey::derive(Some("  10.1/ABC "), "Some Title").unwrap();
        assert_eq!(key.as_str(), "10.1/abc");
    }

    #[test]
    fn test_canonical_key_strips_doi_resolver_prefix() {
        let a = CanonicalKey::derive(Some("https://doi.org/10.1/ABC"), "").unwrap();
        let b = CanonicalKey::derive(Some("10.1/abc"), "").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_canonical_key_falls_back_to_title() {
        let a = CanonicalKey::derive(None, "Water Supply, Zambia!").unwrap();
        let b = CanonicalKey::derive(Some("   "), "water supply zambia").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "water supply zambia");
    }

    #[test]
    fn test_canonical_key_empty_when_nothing_usable() {
        assert!(CanonicalKey::derive(None, "").is_none());
        assert!(CanonicalKey::derive(Some(""), "?!. ,").is_none());
    }

    #[test]
    fn test_canonical_key_is_deterministic() {
        let first = CanonicalKey::derive(None, "A Study: Of Things");
        let second = CanonicalKey::derive(None, "A Study: Of Things");
        assert_eq!(first, second);
    }

    #[test]
    fn test_record_builders_drop_blank_values() {
        let record = Record::new("csv", "1", "t")
            .with_doi(" ")
            .with_pdf_url("")
            .with_contact_email("  ")
            .with_candidate_urls(["", "https://a", "https://a", " https://b "]);
        assert!(record.doi.is_none());
        assert!(record.pdf_url.is_none());
        assert!(record.contact_email.is_none());
        assert_eq!(record.candidate_urls, vec!["https://a", "https://b"]);
    }

    #[test]
    fn test_bare_doi_strips_prefix() {
        let record = Record::new("openalex", "W1", "t").with_doi("https://doi.org/10.5/XYZ");
        assert_eq!(record.bare_doi(), Some("10.5/XYZ"));
        let record = Record::new("core", "1", "t").with_doi("doi:10.5/q");
        assert_eq!(record.bare_doi(), Some("10.5/q"));
    }
}
