//! Direct URL strategy: the record already names its full text.

use async_trait::async_trait;

use super::{ResolutionMethod, Strategy, StrategyOutcome};
use crate::record::Record;

/// Returns the record's `pdf_url` verbatim, without touching the network.
#[derive(Debug, Default)]
pub struct CsvDirectStrategy;

impl CsvDirectStrategy {
    /// Creates a new direct strategy.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Strategy for CsvDirectStrategy {
    fn method(&self) -> ResolutionMethod {
        ResolutionMethod::CsvDirect
    }

    fn applies_to(&self, record: &Record) -> bool {
        record.pdf_url.is_some()
    }

    async fn attempt(&self, record: &Record) -> StrategyOutcome {
        record
            .pdf_url
            .clone()
            .map_or(StrategyOutcome::NotFound, StrategyOutcome::Found)
    }
}
