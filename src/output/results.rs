//! Download-mode input table and `<stem>_with_pdfs.csv` result rows.
//!
//! Input CSVs come from a harvest run or from anywhere else; every column
//! is optional and missing ones read as empty strings. The result file
//! repeats each input row verbatim and appends three result columns.

use std::path::{Path, PathBuf};

use csv::StringRecord;
use tracing::debug;

use super::OutputError;
use super::filename::sector_dir_name;
use crate::harvest::DownloadOutcome;
use crate::record::{Record, RecordDetails};

/// Columns appended to every input row.
pub const RESULT_COLUMNS: [&str; 3] = ["pdf_url_used", "saved_path", "download_error"];

/// Columns that may carry a direct full-text URL, in priority order.
const DIRECT_URL_COLUMNS: [&str; 2] = ["pdf_url", "pdf"];

/// Columns that may carry further candidate URLs, in priority order.
const CANDIDATE_COLUMNS: [&str; 5] = ["openalex_pdf", "best_pdf", "landing_page", "landing_url", "url"];

/// Source tag for rows that do not name one.
const CSV_SOURCE: &str = "csv";

/// A CSV file held in memory with its header row.
#[derive(Debug, Clone, Default)]
pub struct InputTable {
    headers: Vec<String>,
    rows: Vec<StringRecord>,
}

impl InputTable {
    /// Reads a CSV file with a header row.
    ///
    /// # Errors
    ///
    /// Returns [`OutputError::Csv`] when the file cannot be opened or parsed.
    pub fn read(path: &Path) -> Result<Self, OutputError> {
        let reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .map_err(|e| OutputError::csv(path, e))?;
        Self::from_csv_reader(reader, path)
    }

    /// Reads CSV text (tests, stdin).
    ///
    /// # Errors
    ///
    /// Returns [`OutputError::Csv`] on malformed input.
    pub fn from_reader<R: std::io::Read>(input: R) -> Result<Self, OutputError> {
        let reader = csv::ReaderBuilder::new().flexible(true).from_reader(input);
        Self::from_csv_reader(reader, Path::new("<input>"))
    }

    fn from_csv_reader<R: std::io::Read>(
        mut reader: csv::Reader<R>,
        path: &Path,
    ) -> Result<Self, OutputError> {
        let headers = reader
            .headers()
            .map_err(|e| OutputError::csv(path, e))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        let rows = reader
            .records()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| OutputError::csv(path, e))?;
        debug!(path = %path.display(), rows = rows.len(), "input table read");
        Ok(Self { headers, rows })
    }

    /// Header names, trimmed.
    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Number of data rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when there are no data rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows in file order.
    pub fn rows(&self) -> impl Iterator<Item = InputRow<'_>> {
        self.rows.iter().map(|values| InputRow {
            headers: &self.headers,
            values,
        })
    }
}

/// Borrowed view of one input row.
#[derive(Debug, Clone, Copy)]
pub struct InputRow<'a> {
    headers: &'a [String],
    values: &'a StringRecord,
}

impl<'a> InputRow<'a> {
    /// Trimmed value of `column`; empty when the column or cell is missing.
    #[must_use]
    pub fn get(&self, column: &str) -> &'a str {
        self.headers
            .iter()
            .position(|h| h == column)
            .and_then(|index| self.values.get(index))
            .map_or("", str::trim)
    }

    fn first_of(&self, columns: &[&str]) -> &'a str {
        columns
            .iter()
            .map(|c| self.get(c))
            .find(|v| !v.is_empty())
            .unwrap_or_default()
    }

    /// Raw cell values, one per header (missing trailing cells as empty).
    #[must_use]
    pub fn values(&self) -> Vec<&'a str> {
        (0..self.headers.len())
            .map(|i| self.values.get(i).unwrap_or_default())
            .collect()
    }

    /// Builds the normalized record for this row.
    #[must_use]
    pub fn to_record(&self, contact_email: Option<&str>) -> Record {
        let source = match self.get("source") {
            "" => CSV_SOURCE,
            other => other,
        };
        let details = RecordDetails {
            abstract_text: self.get("abstract").to_string(),
            authors: self.get("authors").to_string(),
            published: self.first_of(&["published", "publication_date"]).to_string(),
            topics: self.get("topics").to_string(),
            journal: self.get("journal").to_string(),
        };
        let record = Record::new(source, self.get("id"), self.first_of(&["title", "display_name"]))
            .with_doi(self.get("doi"))
            .with_pdf_url(self.first_of(&DIRECT_URL_COLUMNS))
            .with_candidate_urls(CANDIDATE_COLUMNS.iter().map(|c| self.get(c)))
            .with_details(details);
        match contact_email {
            Some(email) => record.with_contact_email(email),
            None => record,
        }
    }

    /// Directory label: first assigned sector, else query sector, else
    /// source, else `other`.
    #[must_use]
    pub fn sector_dir(&self) -> String {
        let first_assigned = self
            .get("assigned_sectors")
            .split(';')
            .map(str::trim)
            .find(|s| !s.is_empty())
            .unwrap_or_default();
        sector_dir_name([first_assigned, self.get("query_sector"), self.get("source")])
    }
}

/// `<dir>/<stem>_with_pdfs.csv` for an input path.
#[must_use]
pub fn results_path_for(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map_or_else(|| "input".into(), |s| s.to_string_lossy());
    input.with_file_name(format!("{stem}_with_pdfs.csv"))
}

/// Streams result rows to disk as items complete.
#[derive(Debug)]
pub struct ResultsWriter {
    path: PathBuf,
    writer: csv::Writer<std::fs::File>,
    passthrough: Vec<usize>,
}

impl ResultsWriter {
    /// Creates the file and writes the header row.
    ///
    /// Input columns named like a result column are replaced, not duplicated.
    ///
    /// # Errors
    ///
    /// Returns [`OutputError`] when the file cannot be created or written.
    pub fn create(path: &Path, input_headers: &[String]) -> Result<Self, OutputError> {
        let mut writer = csv::Writer::from_path(path).map_err(|e| OutputError::csv(path, e))?;
        let passthrough: Vec<usize> = input_headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !RESULT_COLUMNS.contains(&h.as_str()))
            .map(|(i, _)| i)
            .collect();

        let mut header_row: Vec<&str> = passthrough
            .iter()
            .map(|&i| input_headers[i].as_str())
            .collect();
        header_row.extend(RESULT_COLUMNS);
        writer
            .write_record(&header_row)
            .map_err(|e| OutputError::csv(path, e))?;

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            passthrough,
        })
    }

    /// Appends one row: the input values followed by the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`OutputError::Csv`] on write failure.
    pub fn write_row(&mut self, row: &InputRow<'_>, outcome: &DownloadOutcome) -> Result<(), OutputError> {
        let values = row.values();
        let mut out: Vec<String> = self
            .passthrough
            .iter()
            .map(|&i| values.get(i).copied().unwrap_or_default().to_string())
            .collect();
        out.push(outcome.pdf_url_used.clone().unwrap_or_default());
        out.push(
            outcome
                .saved_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        );
        out.push(outcome.error_text());
        self.writer
            .write_record(&out)
            .map_err(|e| OutputError::csv(&self.path, e))
    }

    /// Flushes and closes the file, returning its path.
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
