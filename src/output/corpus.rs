//! Harvest corpus CSV.

use std::path::Path;

use serde::Serialize;
use tracing::info;

use super::{OutputError, join_set};
use crate::merge::MergedRecord;

/// Column order of the corpus file.
pub const CORPUS_COLUMNS: [&str; 13] = [
    "source",
    "id",
    "doi",
    "title",
    "abstract",
    "authors",
    "published",
    "pdf_url",
    "topics",
    "journal",
    "assigned_sectors",
    "provenance_sources",
    "query_sector",
];

#[derive(Debug, Serialize)]
struct CorpusRow<'a> {
    source: &'a str,
    id: &'a str,
    doi: &'a str,
    title: &'a str,
    #[serde(rename = "abstract")]
    abstract_text: &'a str,
    authors: &'a str,
    published: &'a str,
    pdf_url: &'a str,
    topics: &'a str,
    journal: &'a str,
    assigned_sectors: String,
    provenance_sources: String,
    query_sector: &'a str,
}

impl<'a> CorpusRow<'a> {
    fn from_merged(merged: &'a MergedRecord) -> Self {
        let record = merged.record();
        Self {
            source: &record.source,
            id: &record.identifier,
            doi: record.doi.as_deref().unwrap_or_default(),
            title: &record.title,
            abstract_text: &record.details.abstract_text,
            authors: &record.details.authors,
            published: &record.details.published,
            pdf_url: record.pdf_url.as_deref().unwrap_or_default(),
            topics: &record.details.topics,
            journal: &record.details.journal,
            assigned_sectors: join_set(merged.assigned_sectors()),
            provenance_sources: join_set(merged.provenance_sources()),
            query_sector: merged.query_sector(),
        }
    }
}

/// Writes merged records to `path` in the given order; returns rows written.
///
/// # Errors
///
/// Returns [`OutputError`] when the file cannot be created or written.
pub fn write_corpus<'a>(
    path: &Path,
    records: impl IntoIterator<Item = &'a MergedRecord>,
) -> Result<usize, OutputError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| OutputError::io(parent, e))?;
    }
    // Header written explicitly so an empty corpus still has one.
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|e| OutputError::csv(path, e))?;
    writer
        .write_record(CORPUS_COLUMNS)
        .map_err(|e| OutputError::csv(path, e))?;

    let mut rows = 0;
    for merged in records {
        writer
            .serialize(CorpusRow::from_merged(merged))
            .map_err(|e| OutputError::csv(path, e))?;
        rows += 1;
    }
    writer.flush().map_err(|e| OutputError::io(path, e))?;
    info!(path = %path.display(), rows, "corpus written");
    Ok(rows)
}
