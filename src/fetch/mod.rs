//! HTTP fetch capability shared by metadata sources, resolver strategies, and
//! the content validator.
//!
//! [`HttpFetcher`] is created once per run and cloned into every component
//! that needs network access; clones share one connection pool.

mod error;

pub use error::FetchError;

use std::fmt;
use std::time::Duration;

use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use reqwest::header::{ACCEPT, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use crate::user_agent;

/// Default TCP connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default read timeout in seconds.
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 30;

/// Client construction settings.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Timeout for each read from the socket.
    pub read_timeout: Duration,
    /// Contact email embedded in the User-Agent.
    pub contact_email: Option<String>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS),
            contact_email: None,
        }
    }
}

/// Status line facts of a completed request, after redirects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseMeta {
    /// URL the request ended at.
    pub final_url: String,
    /// HTTP status code.
    pub status: u16,
    /// Lowercased `Content-Type`, empty if absent.
    pub content_type: String,
}

impl ResponseMeta {
    fn from_response(response: &Response) -> Self {
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        Self {
            final_url: response.url().to_string(),
            status: response.status().as_u16(),
            content_type,
        }
    }

    /// True when the content type names a PDF.
    #[must_use]
    pub fn is_pdf_content_type(&self) -> bool {
        self.content_type.contains("pdf")
    }
}

/// A page fetched as text.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Response facts.
    pub meta: ResponseMeta,
    /// Decoded body. Left empty when the response is a PDF.
    pub body: String,
}

/// An open streaming response body.
pub struct BodyStream {
    meta: ResponseMeta,
    chunks: BoxStream<'static, Result<Vec<u8>, FetchError>>,
}

impl fmt::Debug for BodyStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BodyStream")
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}

impl BodyStream {
    fn from_response(response: Response) -> Self {
        let meta = ResponseMeta::from_response(&response);
        let url = meta.final_url.clone();
        let chunks = response
            .bytes_stream()
            .map(move |chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(|e| FetchError::from_reqwest(url.clone(), e))
            })
            .boxed();
        Self { meta, chunks }
    }

    /// Response facts.
    #[must_use]
    pub fn meta(&self) -> &ResponseMeta {
        &self.meta
    }

    /// Returns the next non-empty chunk, or `None` at end of body.
    pub async fn next_chunk(&mut self) -> Option<Result<Vec<u8>, FetchError>> {
        loop {
            match self.chunks.next().await {
                Some(Ok(chunk)) if chunk.is_empty() => {}
                other => return other,
            }
        }
    }

    /// Reads chunks until at least `len` bytes are buffered or the body ends.
    ///
    /// # Errors
    ///
    /// Returns the transport error of the failing chunk.
    pub async fn read_prefix(&mut self, len: usize) -> Result<Vec<u8>, FetchError> {
        let mut buffer = Vec::new();
        while buffer.len() < len {
            match self.next_chunk().await {
                Some(chunk) => buffer.extend_from_slice(&chunk?),
                None => break,
            }
        }
        Ok(buffer)
    }
}

/// HTTP capability: HEAD, page GET, JSON/text GET, and streaming GET.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Builds a fetcher with the given timeouts and polite User-Agent.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::ClientBuild`] if the TLS backend or system proxy
    /// configuration cannot be loaded.
    pub fn new(settings: &FetchSettings) -> Result<Self, FetchError> {
        let client = Client::builder()
            .connect_timeout(settings.connect_timeout)
            .read_timeout(settings.read_timeout)
            .gzip(true)
            .user_agent(user_agent::polite_user_agent(
                settings.contact_email.as_deref(),
            ))
            .build()
            .map_err(|source| FetchError::ClientBuild { source })?;
        Ok(Self { client })
    }

    /// HEAD request with redirects followed.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on invalid URL, transport failure, or a
    /// non-success status.
    #[instrument(level = "debug", skip(self), fields(url = %url))]
    pub async fn head(&self, url: &str) -> Result<ResponseMeta, FetchError> {
        let response = self.send(self.client.head(url), url).await?;
        Ok(ResponseMeta::from_response(&response))
    }

    /// GET a page and decode it as text unless it is a PDF.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on invalid URL, transport failure, or a
    /// non-success status.
    #[instrument(level = "debug", skip(self), fields(url = %url))]
    pub async fn get_page(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let response = self.send(self.client.get(url), url).await?;
        let meta = ResponseMeta::from_response(&response);
        let body = if meta.is_pdf_content_type() {
            String::new()
        } else {
            response
                .text()
                .await
                .map_err(|e| FetchError::from_reqwest(url, e))?
        };
        Ok(FetchedPage { meta, body })
    }

    /// GET a body as text, sending the given extra headers.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on invalid URL, transport failure, or a
    /// non-success status.
    pub async fn get_text(&self, url: &str, headers: &[(&str, &str)]) -> Result<String, FetchError> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let response = self.send(request, url).await?;
        response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))
    }

    /// GET and deserialize a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Decode`] when the body is not the expected JSON,
    /// otherwise the same errors as [`get_text`](Self::get_text).
    #[instrument(level = "debug", skip(self, headers), fields(url = %url))]
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<T, FetchError> {
        let mut with_accept = vec![(ACCEPT.as_str(), "application/json")];
        with_accept.extend_from_slice(headers);
        let body = self.get_text(url, &with_accept).await?;
        serde_json::from_str(&body).map_err(|e| FetchError::decode(url, e.to_string()))
    }

    /// Streaming GET, optionally with an `Accept` header.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on invalid URL, transport failure, or a
    /// non-success status. Errors while reading the body surface from
    /// [`BodyStream::next_chunk`].
    #[instrument(level = "debug", skip(self), fields(url = %url))]
    pub async fn open_stream(
        &self,
        url: &str,
        accept: Option<&str>,
    ) -> Result<BodyStream, FetchError> {
        let mut request = self.client.get(url);
        if let Some(accept) = accept {
            request = request.header(ACCEPT, accept);
        }
        let response = self.send(request, url).await?;
        Ok(BodyStream::from_response(response))
    }

    async fn send(&self, request: RequestBuilder, url: &str) -> Result<Response, FetchError> {
        Url::parse(url).map_err(|_| FetchError::invalid_url(url))?;

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(std::string::ToString::to_string);
            debug!(status = status.as_u16(), "non-success status");
            return Err(FetchError::http_status_with_retry_after(
                url,
                status.as_u16(),
                retry_after,
            ));
        }
        Ok(response)
    }
}

/// Joins `path` onto `base` and appends form-encoded query parameters.
///
/// # Errors
///
/// Returns [`FetchError::InvalidUrl`] if the combined URL does not parse.
pub fn url_with_query(base: &str, path: &str, params: &[(&str, &str)]) -> Result<String, FetchError> {
    let joined = format!("{}{}", base.trim_end_matches('/'), path);
    let mut url = Url::parse(&joined).map_err(|_| FetchError::invalid_url(&joined))?;
    if !params.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in params {
            pairs.append_pair(key, value);
        }
    }
    Ok(url.to_string())
}
