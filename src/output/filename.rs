//! File and directory names for saved documents.

use std::sync::LazyLock;

use regex::Regex;

use crate::record::Record;
use crate::resolver::compile_static_regex;

/// Longest sanitized name, in characters, before the extension.
pub const MAX_FILENAME_LEN: usize = 200;

/// Longest title prefix used as a filename stem.
pub const TITLE_STEM_LEN: usize = 120;

/// Used when nothing survives sanitization.
pub const FALLBACK_NAME: &str = "file";

/// Directory for records without any sector or source label.
pub const FALLBACK_SECTOR_DIR: &str = "other";

static RESERVED_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r#"[\\/:"*?<>|]+"#));
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"\s+"));

/// Makes `value` safe as a single path component.
///
/// Truncates to `max_len` characters, replaces runs of `\ / : " * ? < > |`
/// and runs of whitespace with `_`, strips `_` from both ends, and falls
/// back to `file` when nothing is left.
#[must_use]
pub fn safe_filename(value: &str, max_len: usize) -> String {
    let truncated: String = value.chars().take(max_len).collect();
    let replaced = RESERVED_RE.replace_all(&truncated, "_");
    let replaced = WHITESPACE_RE.replace_all(&replaced, "_");
    let trimmed = replaced.trim_matches('_');
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        FALLBACK_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Filename for a record's PDF: sanitized bare DOI, else the sanitized
/// title prefix, with a `.pdf` suffix.
#[must_use]
pub fn pdf_file_name(record: &Record) -> String {
    let stem = match record.bare_doi() {
        Some(doi) => safe_filename(doi, MAX_FILENAME_LEN),
        None => {
            let title: String = record.title.chars().take(TITLE_STEM_LEN).collect();
            safe_filename(&title, MAX_FILENAME_LEN)
        }
    };
    format!("{stem}.pdf")
}

/// Directory label: first non-empty of the given candidates, sanitized,
/// else `other`.
#[must_use]
pub fn sector_dir_name<'a>(candidates: impl IntoIterator<Item = &'a str>) -> String {
    candidates
        .into_iter()
        .map(str::trim)
        .find(|c| !c.is_empty())
        .map_or_else(|| FALLBACK_SECTOR_DIR.to_string(), |c| safe_filename(c, MAX_FILENAME_LEN))
}
