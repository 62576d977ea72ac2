use serde::{Deserialize, Serialize};

use super::identifier::Identifier;
use super::outcome::{ItemResult, OutcomeStatus, ProcessingOutcome};

/// Aggregate of every outcome in one batch.
///
/// The serialized form is the externally observed report contract:
/// `{ total, successful, failed, skipped, results: [{identifier, status, detail?}] }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    pub results: Vec<ItemResult>,
}

impl BatchResult {
    /// Identifiers whose outcome was `failed`, in input order
    pub fn failed_identifiers(&self) -> Vec<Identifier> {
        self.results
            .iter()
            .filter(|r| r.status == OutcomeStatus::Failed)
            .map(|r| r.identifier.clone())
            .collect()
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }

    /// `total == successful + failed + skipped` and one row per identifier
    pub fn is_consistent(&self) -> bool {
        self.total == self.successful + self.failed + self.skipped
            && self.results.len() == self.total
    }
}

/// Failure of a best-effort step, kept beside the result instead of changing the outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub identifier: Identifier,
    pub step: String,
    pub message: String,
}

/// Accumulates outcomes in the order they are recorded
#[derive(Debug, Default)]
pub struct ResultAggregator {
    result: BatchResult,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            result: BatchResult {
                results: Vec::with_capacity(capacity),
                ..Default::default()
            },
        }
    }

    pub fn record(&mut self, identifier: Identifier, outcome: &ProcessingOutcome) {
        match outcome.status() {
            OutcomeStatus::Success => self.result.successful += 1,
            OutcomeStatus::Failed => self.result.failed += 1,
            OutcomeStatus::Skipped => self.result.skipped += 1,
        }
        self.result.total += 1;
        self.result.results.push(ItemResult::new(identifier, outcome));
    }

    pub fn finish(self) -> BatchResult {
        self.result
    }
}
