//! Page-level retry decisions for metadata source requests.
//!
//! A failed page request is classified into a [`FailureType`]:
//! - [`FailureType::Transient`] - may succeed after the fixed transient delay
//! - [`FailureType::RateLimited`] - HTTP 429; wait for `Retry-After` and retry
//! - [`FailureType::Permanent`] - retrying would not help
//!
//! [`RetryPolicy`] bounds how often each kind is retried. Delays themselves
//! come from the [`Pacer`](super::Pacer); there is no jitter or exponential
//! growth, so runs are reproducible.

use std::time::Duration;

use tracing::{debug, instrument};

use super::pacing::MAX_RETRY_AFTER;
use crate::fetch::FetchError;

/// Default retries for transient failures.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Default number of 429 waits tolerated for one page.
pub const DEFAULT_MAX_RATE_LIMIT_WAITS: u32 = 5;

/// Classification of a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Temporary failure that may succeed on retry.
    ///
    /// Examples: network timeout, 5xx server errors, connection refused.
    Transient,

    /// Server rate limiting (HTTP 429).
    RateLimited,

    /// Permanent failure that won't succeed regardless of retries.
    ///
    /// Examples: 404 Not Found, 400 Bad Request, invalid URL, undecodable body.
    Permanent,
}

/// Decision on whether to retry a failed page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the same request.
    Retry {
        /// Which attempt number this will be (first retry is attempt 2).
        attempt: u32,
    },

    /// Give up on this request.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Bounds on page-level retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    max_rate_limit_waits: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            max_rate_limit_waits: DEFAULT_MAX_RATE_LIMIT_WAITS,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with explicit bounds.
    #[must_use]
    pub fn new(max_retries: u32, max_rate_limit_waits: u32) -> Self {
        Self {
            max_retries,
            max_rate_limit_waits,
        }
    }

    /// Transient retries allowed after the first attempt.
    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// 429 waits allowed for one request.
    #[must_use]
    pub fn max_rate_limit_waits(&self) -> u32 {
        self.max_rate_limit_waits
    }

    /// Decides whether to retry.
    ///
    /// `failures_so_far` counts earlier failures of the same kind for this
    /// request, including the one being decided.
    #[instrument(skip(self), fields(max_retries = self.max_retries))]
    pub fn should_retry(&self, failure_type: FailureType, failures_so_far: u32) -> RetryDecision {
        let limit = match failure_type {
            FailureType::Permanent => {
                return RetryDecision::DoNotRetry {
                    reason: "permanent failure - retry would not help".to_string(),
                };
            }
            FailureType::Transient => self.max_retries,
            FailureType::RateLimited => self.max_rate_limit_waits,
        };

        if failures_so_far > limit {
            debug!(failures_so_far, limit, "retry budget exhausted");
            return RetryDecision::DoNotRetry {
                reason: format!("retry budget ({limit}) exhausted"),
            };
        }

        RetryDecision::Retry {
            attempt: failures_so_far + 1,
        }
    }
}

/// Classifies a fetch error for retry decisions.
///
/// | Error | Type |
/// |-------|------|
/// | HTTP 429 | RateLimited |
/// | HTTP 408, 5xx | Transient |
/// | Other HTTP status | Permanent |
/// | Timeout, network | Transient |
/// | Invalid URL, decode, client build | Permanent |
#[must_use]
pub fn classify_error(error: &FetchError) -> FailureType {
    match error {
        FetchError::HttpStatus { status, .. } => classify_http_status(*status),
        FetchError::Timeout { .. } | FetchError::Network { .. } => FailureType::Transient,
        FetchError::InvalidUrl { .. } | FetchError::Decode { .. } | FetchError::ClientBuild { .. } => {
            FailureType::Permanent
        }
    }
}

fn classify_http_status(status: u16) -> FailureType {
    match status {
        429 => FailureType::RateLimited,
        408 | 500..=599 => FailureType::Transient,
        _ => FailureType::Permanent,
    }
}

/// Parses a `Retry-After` header value (delta-seconds or HTTP-date).
///
/// Values above one hour are capped; dates in the past yield zero.
/// Returns `None` for negative or unparseable values.
#[must_use]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    if let Ok(seconds) = header_value.parse::<i64>() {
        if seconds < 0 {
            debug!(seconds, "negative Retry-After value, ignoring");
            return None;
        }
        #[allow(clippy::cast_sign_loss)]
        return Some(Duration::from_secs(seconds as u64).min(MAX_RETRY_AFTER));
    }

    match httpdate::parse_http_date(header_value) {
        Ok(datetime) => Some(
            datetime
                .duration_since(std::time::SystemTime::now())
                .map_or(Duration::ZERO, |d| d.min(MAX_RETRY_AFTER)),
        ),
        Err(_) => {
            debug!(header_value, "unparseable Retry-After value");
            None
        }
    }
}
