//! Shared utilities for resolver strategies: static regexes, URL joining, DOI checks.

use regex::Regex;
use url::Url;

/// Compiles a regex at static init; panics on invalid pattern.
pub fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}

/// Resolves a possibly relative URL string against a base URL.
///
/// Returns the value as-is if it already starts with `http://` or `https://`;
/// gives `//...` the base URL's scheme; otherwise joins with `base_url`.
#[must_use]
pub fn absolutize_url(value: &str, base_url: &Url) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if value.starts_with("http://") || value.starts_with("https://") {
        return Some(value.to_string());
    }
    if value.starts_with("//") {
        return Some(format!("{}:{value}", base_url.scheme()));
    }
    base_url.join(value).ok().map(|url| url.to_string())
}

/// True for values that are plausibly DOIs: `10.` prefix or a `doi.org` URL.
#[must_use]
pub fn is_doi_like(value: &str) -> bool {
    let value = value.trim().to_ascii_lowercase();
    value.starts_with("10.") || value.contains("doi.org")
}

/// True when the URL's text ends in `.pdf`, ignoring case.
#[must_use]
pub fn url_ends_with_pdf(url: &str) -> bool {
    url.trim().to_ascii_lowercase().ends_with(".pdf")
}
