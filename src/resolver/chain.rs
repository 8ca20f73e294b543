//! Resolver chain with the fixed-order resolution loop.

use std::collections::BTreeMap;
use std::sync::Mutex;

use tracing::{debug, info, warn};

use super::{NO_PDF_FOUND, ResolutionMethod, ResolutionResult, Strategy, StrategyOutcome};
use crate::record::Record;

/// Record of one strategy run during a resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyAttempt {
    /// Strategy that ran.
    pub method: ResolutionMethod,
    /// What it produced.
    pub outcome: StrategyOutcome,
}

/// Full account of one resolution: the verdict plus every strategy that ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainReport {
    /// Final verdict.
    pub result: ResolutionResult,
    /// Attempts in execution order. Strategies that did not apply are absent.
    pub attempts: Vec<StrategyAttempt>,
}

impl ChainReport {
    /// Methods that ran, in order.
    #[must_use]
    pub fn attempted_methods(&self) -> Vec<ResolutionMethod> {
        self.attempts.iter().map(|a| a.method).collect()
    }
}

/// Running count of strategy errors per method.
#[derive(Debug, Default)]
pub struct ChainDiagnostics {
    strategy_errors: Mutex<BTreeMap<ResolutionMethod, u64>>,
}

impl ChainDiagnostics {
    fn record_error(&self, method: ResolutionMethod) {
        let mut errors = self
            .strategy_errors
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *errors.entry(method).or_insert(0) += 1;
    }

    /// Error counts keyed by method.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<ResolutionMethod, u64> {
        self.strategy_errors
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Sum of all strategy errors so far.
    #[must_use]
    pub fn total_errors(&self) -> u64 {
        self.snapshot().values().sum()
    }
}

/// A fixed-order collection of strategies.
///
/// Strategies run in registration order; the first [`StrategyOutcome::Found`]
/// wins. `NotFound` and `Error` both fall through to the next strategy.
pub struct ResolverChain {
    strategies: Vec<Box<dyn Strategy>>,
    diagnostics: ChainDiagnostics,
}

impl ResolverChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
            diagnostics: ChainDiagnostics::default(),
        }
    }

    /// Appends a strategy to the end of the chain.
    pub fn register(&mut self, strategy: Box<dyn Strategy>) {
        debug!(method = %strategy.method(), "registering strategy");
        self.strategies.push(strategy);
    }

    /// Methods in chain order.
    #[must_use]
    pub fn methods(&self) -> Vec<ResolutionMethod> {
        self.strategies.iter().map(|s| s.method()).collect()
    }

    /// Strategy error counters accumulated over the chain's lifetime.
    #[must_use]
    pub fn diagnostics(&self) -> &ChainDiagnostics {
        &self.diagnostics
    }

    /// Resolves a record to a document URL.
    pub async fn resolve(&self, record: &Record) -> ResolutionResult {
        self.resolve_with_report(record).await.result
    }

    /// Resolves a record and reports every strategy that ran.
    #[tracing::instrument(skip(self, record), fields(id = %record.identifier, source = %record.source))]
    pub async fn resolve_with_report(&self, record: &Record) -> ChainReport {
        let mut attempts = Vec::new();

        for strategy in &self.strategies {
            let method = strategy.method();
            if !strategy.applies_to(record) {
                continue;
            }

            let outcome = strategy.attempt(record).await;
            attempts.push(StrategyAttempt {
                method,
                outcome: outcome.clone(),
            });

            match outcome {
                StrategyOutcome::Found(url) => {
                    info!(method = %method, url = %url, "resolved");
                    return ChainReport {
                        result: ResolutionResult::Resolved { url, method },
                        attempts,
                    };
                }
                StrategyOutcome::NotFound => {
                    debug!(method = %method, "strategy found nothing");
                }
                StrategyOutcome::Error(detail) => {
                    warn!(method = %method, error = %detail, "strategy failed");
                    self.diagnostics.record_error(method);
                }
            }
        }

        debug!(tried = attempts.len(), "no strategy produced a URL");
        ChainReport {
            result: ResolutionResult::Failed {
                reason: NO_PDF_FOUND.to_string(),
            },
            attempts,
        }
    }
}

impl std::fmt::Debug for ResolverChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.strategies.iter().map(|s| s.method().as_str()).collect();
        f.debug_struct("ResolverChain")
            .field("strategies", &names)
            .finish_non_exhaustive()
    }
}

impl Default for ResolverChain {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Scripted {
        method: ResolutionMethod,
        applies: bool,
        outcome: StrategyOutcome,
        calls: Arc<AtomicUsize>,
    }

    impl Scripted {
        fn boxed(
            method: ResolutionMethod,
            applies: bool,
            outcome: StrategyOutcome,
        ) -> (Box<dyn Strategy>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let strategy = Self {
                method,
                applies,
                outcome,
                calls: Arc::clone(&calls),
            };
            (Box::new(strategy), calls)
        }
    }

    #[async_trait]
    impl Strategy for Scripted {
        fn method(&self) -> ResolutionMethod {
            self.method
        }

        fn applies_to(&self, _record: &Record) -> bool {
            self.applies
        }

        async fn attempt(&self, _record: &Record) -> StrategyOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone()
        }
    }

    fn record() -> Record {
        Record::new("csv", "1", "Some title")
    }

    #[tokio::test]
    async fn test_chain_first_found_wins_and_later_strategies_do_not_run() {
        let mut chain = ResolverChain::new();
        let (a, _) = Scripted::boxed(ResolutionMethod::ApiLookup, true, StrategyOutcome::NotFound);
        let (b, _) = Scripted::boxed(
            ResolutionMethod::ContentNegotiation,
            true,
            StrategyOutcome::Found("https://x/y.pdf".to_string()),
        );
        let (c, c_calls) = Scripted::boxed(
            ResolutionMethod::LandingScrape,
            true,
            StrategyOutcome::Found("https://z.pdf".to_string()),
        );
        chain.register(a);
        chain.register(b);
        chain.register(c);

        let report = chain.resolve_with_report(&record()).await;
        assert_eq!(
            report.result,
            ResolutionResult::Resolved {
                url: "https://x/y.pdf".to_string(),
                method: ResolutionMethod::ContentNegotiation,
            }
        );
        assert_eq!(c_calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            report.attempted_methods(),
            vec![ResolutionMethod::ApiLookup, ResolutionMethod::ContentNegotiation]
        );
    }

    #[tokio::test]
    async fn test_chain_error_continues_and_is_counted() {
        let mut chain = ResolverChain::new();
        let (a, _) = Scripted::boxed(
            ResolutionMethod::ApiLookup,
            true,
            StrategyOutcome::Error("timeout".to_string()),
        );
        let (b, _) = Scripted::boxed(ResolutionMethod::CandidateProbe, true, StrategyOutcome::NotFound);
        chain.register(a);
        chain.register(b);

        let result = chain.resolve(&record()).await;
        assert_eq!(
            result,
            ResolutionResult::Failed {
                reason: NO_PDF_FOUND.to_string()
            }
        );
        assert_eq!(chain.diagnostics().total_errors(), 1);
        assert_eq!(
            chain.diagnostics().snapshot().get(&ResolutionMethod::ApiLookup),
            Some(&1)
        );
    }

    #[tokio::test]
    async fn test_chain_skips_inapplicable_strategies() {
        let mut chain = ResolverChain::new();
        let (a, a_calls) = Scripted::boxed(
            ResolutionMethod::CsvDirect,
            false,
            StrategyOutcome::Found("https://never".to_string()),
        );
        chain.register(a);

        let report = chain.resolve_with_report(&record()).await;
        assert_eq!(a_calls.load(Ordering::SeqCst), 0);
        assert!(report.attempts.is_empty());
        assert!(report.result.url().is_none());
    }

    #[tokio::test]
    async fn test_chain_is_deterministic() {
        let mut chain = ResolverChain::new();
        let (a, _) = Scripted::boxed(ResolutionMethod::ApiLookup, true, StrategyOutcome::NotFound);
        let (b, _) = Scripted::boxed(
            ResolutionMethod::LandingScrape,
            true,
            StrategyOutcome::Found("https://p/q.pdf".to_string()),
        );
        chain.register(a);
        chain.register(b);

        let first = chain.resolve_with_report(&record()).await;
        let second = chain.resolve_with_report(&record()).await;
        assert_eq!(first, second);
    }

    #[test]
    fn test_chain_debug_lists_strategy_names() {
        let mut chain = ResolverChain::new();
        let (a, _) = Scripted::boxed(ResolutionMethod::CsvDirect, true, StrategyOutcome::NotFound);
        chain.register(a);
        let debug = format!("{chain:?}");
        assert!(debug.contains("csv_direct"));
    }
}
