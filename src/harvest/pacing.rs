//! Politeness sleeps and backoff waits.
//!
//! Every wait in a run goes through one [`Pacer`], so tests can swap in
//! [`Pacer::disabled`] and run without sleeping.
//!
//! # Example
//!
//! ```
//! use harvester_core::harvest::{Pacer, PacingPolicy, Pause};
//!
//! # async fn example() {
//! let pacer = Pacer::new(PacingPolicy::default());
//! pacer.pause(Pause::BetweenPages).await;
//!
//! let quiet = Pacer::disabled();
//! quiet.pause(Pause::BetweenItems).await; // returns immediately
//! # }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::{debug, warn};

/// Default sleep between items in download/topics runs.
pub const DEFAULT_BETWEEN_ITEMS: Duration = Duration::from_millis(800);

/// Default sleep between result pages.
pub const DEFAULT_BETWEEN_PAGES: Duration = Duration::from_millis(500);

/// Wait used for a 429 response without a usable `Retry-After`.
pub const DEFAULT_RATE_LIMIT_WAIT: Duration = Duration::from_secs(30);

/// Fixed delay before retrying a transient failure.
pub const DEFAULT_TRANSIENT_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Maximum honored `Retry-After` (1 hour).
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Fixed delays for each kind of wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacingPolicy {
    /// Sleep between successive network-bound items.
    pub between_items: Duration,
    /// Sleep between result pages, and between sources within a sector.
    pub between_pages: Duration,
    /// Wait after a 429 response that carried no usable `Retry-After`.
    pub rate_limit_default: Duration,
    /// Delay before retrying a transient failure.
    pub transient_retry: Duration,
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self {
            between_items: DEFAULT_BETWEEN_ITEMS,
            between_pages: DEFAULT_BETWEEN_PAGES,
            rate_limit_default: DEFAULT_RATE_LIMIT_WAIT,
            transient_retry: DEFAULT_TRANSIENT_RETRY_DELAY,
        }
    }
}

/// Kinds of wait a run performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pause {
    /// Between two items.
    BetweenItems,
    /// Between two pages or two sources.
    BetweenPages,
    /// After a 429, with the server's `Retry-After` if it sent a usable one.
    RateLimited(Option<Duration>),
    /// Before retrying a transient failure.
    TransientRetry,
}

/// Performs (or skips) waits according to a [`PacingPolicy`].
#[derive(Debug)]
pub struct Pacer {
    policy: PacingPolicy,
    disabled: bool,
    total_waited_ms: AtomicU64,
}

impl Pacer {
    /// Creates a pacer that sleeps according to `policy`.
    #[must_use]
    pub fn new(policy: PacingPolicy) -> Self {
        Self {
            policy,
            disabled: false,
            total_waited_ms: AtomicU64::new(0),
        }
    }

    /// Creates a pacer that never sleeps.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            policy: PacingPolicy::default(),
            disabled: true,
            total_waited_ms: AtomicU64::new(0),
        }
    }

    /// Returns true if this pacer never sleeps.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// The delay a pause of this kind would take.
    #[must_use]
    pub fn delay_for(&self, pause: Pause) -> Duration {
        if self.disabled {
            return Duration::ZERO;
        }
        match pause {
            Pause::BetweenItems => self.policy.between_items,
            Pause::BetweenPages => self.policy.between_pages,
            Pause::RateLimited(retry_after) => retry_after
                .unwrap_or(self.policy.rate_limit_default)
                .min(MAX_RETRY_AFTER),
            Pause::TransientRetry => self.policy.transient_retry,
        }
    }

    /// Sleeps for the delay of `pause`.
    pub async fn pause(&self, pause: Pause) {
        let delay = self.delay_for(pause);
        if delay.is_zero() {
            return;
        }
        if matches!(pause, Pause::RateLimited(_)) {
            warn!(delay_secs = delay.as_secs(), "rate limited; waiting before retry");
        } else {
            debug!(?pause, delay_ms = delay.as_millis(), "pacing");
        }
        #[allow(clippy::cast_possible_truncation)]
        self.total_waited_ms
            .fetch_add(delay.as_millis() as u64, Ordering::Relaxed);
        tokio::time::sleep(delay).await;
    }

    /// Total time spent waiting so far.
    #[must_use]
    pub fn total_waited(&self) -> Duration {
        Duration::from_millis(self.total_waited_ms.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_pacing_policy_defaults() {
        let policy = PacingPolicy::default();
        assert_eq!(policy.between_items, Duration::from_millis(800));
        assert_eq!(policy.between_pages, Duration::from_millis(500));
        assert_eq!(policy.rate_limit_default, Duration::from_secs(30));
        assert_eq!(policy.transient_retry, Duration::from_secs(10));
    }

    #[test]
    fn test_disabled_pacer_has_zero_delays() {
        let pacer = Pacer::disabled();
        assert!(pacer.is_disabled());
        assert_eq!(pacer.delay_for(Pause::BetweenItems), Duration::ZERO);
        assert_eq!(pacer.delay_for(Pause::RateLimited(Some(Duration::from_secs(9)))), Duration::ZERO);
    }

    #[test]
    fn test_rate_limited_uses_retry_after_or_default_and_caps() {
        let pacer = Pacer::new(PacingPolicy::default());
        assert_eq!(
            pacer.delay_for(Pause::RateLimited(Some(Duration::from_secs(5)))),
            Duration::from_secs(5)
        );
        assert_eq!(pacer.delay_for(Pause::RateLimited(None)), Duration::from_secs(30));
        assert_eq!(
            pacer.delay_for(Pause::RateLimited(Some(Duration::from_secs(10_000)))),
            MAX_RETRY_AFTER
        );
    }

    #[tokio::test]
    async fn test_disabled_pacer_does_not_accumulate() {
        let pacer = Pacer::disabled();
        pacer.pause(Pause::TransientRetry).await;
        assert_eq!(pacer.total_waited(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_pause_sleeps_for_policy_delay() {
        tokio::time::pause();
        let pacer = Pacer::new(PacingPolicy {
            between_pages: Duration::from_secs(2),
            ..PacingPolicy::default()
        });
        let start = tokio::time::Instant::now();
        pacer.pause(Pause::BetweenPages).await;
        assert!(start.elapsed() >= Duration::from_secs(2));
        assert_eq!(pacer.total_waited(), Duration::from_secs(2));
    }
}
