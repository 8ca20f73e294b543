//! CSV files and on-disk layout of a run.
//!
//! - [`filename`] - sanitized file and directory names
//! - [`corpus`] - deduplicated harvest corpus
//! - [`results`] - download-mode input table and augmented result rows
//! - [`metadata`] - per-topic `metadata.csv`

pub mod corpus;
pub mod filename;
pub mod metadata;
pub mod results;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub use corpus::{CORPUS_COLUMNS, write_corpus};
pub use filename::{pdf_file_name, safe_filename, sector_dir_name};
pub use metadata::{METADATA_COLUMNS, MetadataWriter};
pub use results::{InputRow, InputTable, RESULT_COLUMNS, ResultsWriter, results_path_for};

/// Errors reading or writing run files.
#[derive(Debug, Error)]
pub enum OutputError {
    /// CSV encoding or decoding failed.
    #[error("CSV error in {path}: {source}")]
    Csv {
        /// File being read or written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: csv::Error,
    },

    /// Filesystem error.
    #[error("IO error for {path}: {source}")]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

impl OutputError {
    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Joins a set of labels with `;` in its iteration order.
pub(crate) fn join_set<'a>(values: impl IntoIterator<Item = &'a String>) -> String {
    values
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(";")
}
