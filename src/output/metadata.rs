//! Per-topic `metadata.csv`.

use std::path::{Path, PathBuf};

use serde::Serialize;

use super::OutputError;
use crate::harvest::DownloadOutcome;
use crate::record::Record;

/// Column order of `metadata.csv`.
pub const METADATA_COLUMNS: [&str; 10] = [
    "openalex_id",
    "title",
    "doi",
    "publication_date",
    "pdf_url",
    "saved_file",
    "error",
    "resolution_method",
    "topics",
    "journal",
];

#[derive(Debug, Serialize)]
struct MetadataRow<'a> {
    openalex_id: &'a str,
    title: &'a str,
    doi: &'a str,
    publication_date: &'a str,
    pdf_url: &'a str,
    saved_file: String,
    error: String,
    resolution_method: &'static str,
    topics: &'a str,
    journal: &'a str,
}

/// Writes one row per processed work of a topic.
#[derive(Debug)]
pub struct MetadataWriter {
    path: PathBuf,
    writer: csv::Writer<std::fs::File>,
    rows: usize,
}

impl MetadataWriter {
    /// Creates `path` and writes the header.
    ///
    /// # Errors
    ///
    /// Returns [`OutputError::Csv`] when the file cannot be created.
    pub fn create(path: &Path) -> Result<Self, OutputError> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(path)
            .map_err(|e| OutputError::csv(path, e))?;
        writer
            .write_record(METADATA_COLUMNS)
            .map_err(|e| OutputError::csv(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer,
            rows: 0,
        })
    }

    /// Appends the row for `record`.
    ///
    /// # Errors
    ///
    /// Returns [`OutputError::Csv`] on write failure.
    pub fn write(&mut self, record: &Record, outcome: &DownloadOutcome) -> Result<(), OutputError> {
        let row = MetadataRow {
            openalex_id: &record.identifier,
            title: &record.title,
            doi: record.doi.as_deref().unwrap_or_default(),
            publication_date: &record.details.published,
            pdf_url: outcome.pdf_url_used.as_deref().unwrap_or_default(),
            saved_file: outcome
                .saved_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            error: outcome.error_text(),
            resolution_method: outcome.method.map_or("", |m| m.as_str()),
            topics: &record.details.topics,
            journal: &record.details.journal,
        };
        self.writer
            .serialize(row)
            .map_err(|e| OutputError::csv(&self.path, e))?;
        self.rows += 1;
        Ok(())
    }

    /// Rows written so far.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Flushes and closes the file.
    ///
    /// # Errors
    ///
    /// Returns [`OutputError::Io`] when the final flush fails.
    pub fn finish(mut self) -> Result<PathBuf, OutputError> {
        self.writer
            .flush()
            .map_err(|e| OutputError::io(&self.path, e))?;
        Ok(self.path)
    }
}
