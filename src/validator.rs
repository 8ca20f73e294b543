//! Streaming content validation: confirm a fetched body is a PDF before saving it.
//!
//! The first chunk of the body decides. A destination file is only created
//! once the check passes, and a transport failure after that point removes
//! the partially written file.

use std::fmt;
use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};

use crate::fetch::{BodyStream, FetchError, HttpFetcher};
use crate::resolver::url_ends_with_pdf;

/// Leading bytes of every PDF file.
pub const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// Why a download was not saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// The body was empty.
    EmptyResponse,
    /// The body failed the PDF check.
    NotPdf,
    /// The server answered with an error status.
    HttpError(u16),
    /// Any other failure (transport, filesystem).
    Other(String),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyResponse => f.write_str("empty_response"),
            Self::NotPdf => f.write_str("not_pdf"),
            Self::HttpError(code) => write!(f, "http_error_{code}"),
            Self::Other(message) => f.write_str(message),
        }
    }
}

/// Result of [`ContentValidator::fetch_and_validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// The body passed the check and was written to disk.
    Saved {
        /// Total bytes written.
        bytes_written: u64,
    },
    /// Nothing was saved.
    Rejected(RejectReason),
}

impl ValidationOutcome {
    /// True when the file was saved.
    #[must_use]
    pub fn is_saved(&self) -> bool {
        matches!(self, Self::Saved { .. })
    }
}

/// Returns true if a response looks like a PDF.
///
/// Accepts a final URL ending in `.pdf`, or a first chunk that starts with or
/// contains the `%PDF` marker.
#[must_use]
pub fn passes_pdf_check(final_url: &str, first_chunk: &[u8]) -> bool {
    url_ends_with_pdf(final_url)
        || first_chunk.starts_with(PDF_MAGIC)
        || first_chunk
            .windows(PDF_MAGIC.len())
            .any(|window| window == PDF_MAGIC)
}

/// Downloads and validates candidate documents.
#[derive(Debug, Clone)]
pub struct ContentValidator {
    fetcher: HttpFetcher,
}

impl ContentValidator {
    /// Creates a validator that downloads through `fetcher`.
    #[must_use]
    pub fn new(fetcher: HttpFetcher) -> Self {
        Self { fetcher }
    }

    /// Streams `url` and saves it to `destination` if it is a PDF.
    ///
    /// Parent directories of `destination` are created only when the body
    /// passes the check.
    #[instrument(skip(self, destination), fields(url = %url, dest = %destination.display()))]
    pub async fn fetch_and_validate(&self, url: &str, destination: &Path) -> ValidationOutcome {
        let mut stream = match self.fetcher.open_stream(url, None).await {
            Ok(stream) => stream,
            Err(error) => return ValidationOutcome::Rejected(reject_reason(&error)),
        };

        let first_chunk = match stream.next_chunk().await {
            Some(Ok(chunk)) => chunk,
            Some(Err(error)) => return ValidationOutcome::Rejected(reject_reason(&error)),
            None => {
                debug!("empty body");
                return ValidationOutcome::Rejected(RejectReason::EmptyResponse);
            }
        };

        if !passes_pdf_check(&stream.meta().final_url, &first_chunk) {
            debug!(content_type = %stream.meta().content_type, "body is not a pdf");
            return ValidationOutcome::Rejected(RejectReason::NotPdf);
        }

        match write_stream(destination, first_chunk, &mut stream).await {
            Ok(bytes_written) => {
                info!(path = %destination.display(), bytes = bytes_written, "saved");
                ValidationOutcome::Saved { bytes_written }
            }
            Err(reason) => {
                debug!(path = %destination.display(), "removing partial file");
                let _ = tokio::fs::remove_file(destination).await;
                ValidationOutcome::Rejected(reason)
            }
        }
    }
}

fn reject_reason(error: &FetchError) -> RejectReason {
    match error.status() {
        Some(code) => RejectReason::HttpError(code),
        None => RejectReason::Other(error.to_string()),
    }
}

/// Writes the first chunk then the rest of the stream, returning bytes written.
async fn write_stream(
    destination: &Path,
    first_chunk: Vec<u8>,
    stream: &mut BodyStream,
) -> Result<u64, RejectReason> {
    let io_error = |e: std::io::Error| {
        RejectReason::Other(format!("IO error writing to {}: {e}", destination.display()))
    };

    if let Some(parent) = destination.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
    }
    let file = File::create(destination).await.map_err(io_error)?;
    let mut writer = BufWriter::new(file);

    writer.write_all(&first_chunk).await.map_err(io_error)?;
    let mut bytes_written = first_chunk.len() as u64;

    while let Some(chunk) = stream.next_chunk().await {
        let chunk = chunk.map_err(|e| RejectReason::Other(e.to_string()))?;
        writer.write_all(&chunk).await.map_err(io_error)?;
        bytes_written += chunk.len() as u64;
    }

    writer.flush().await.map_err(io_error)?;
    Ok(bytes_written)
}
