use serde::{Deserialize, Serialize};

use super::identifier::Identifier;
use super::service::RecordId;

/// Terminal status for one identifier within a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingOutcome {
    Success { record_id: RecordId },
    Skipped { reason: String },
    Failed { error: String },
}

impl ProcessingOutcome {
    pub fn success(record_id: RecordId) -> Self {
        ProcessingOutcome::Success { record_id }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        ProcessingOutcome::Skipped { reason: reason.into() }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        ProcessingOutcome::Failed { error: error.into() }
    }

    pub fn status(&self) -> OutcomeStatus {
        match self {
            ProcessingOutcome::Success { .. } => OutcomeStatus::Success,
            ProcessingOutcome::Skipped { .. } => OutcomeStatus::Skipped,
            ProcessingOutcome::Failed { .. } => OutcomeStatus::Failed,
        }
    }

    /// Detail string shown in the report row
    pub fn detail(&self) -> String {
        match self {
            ProcessingOutcome::Success { record_id } => record_id.to_string(),
            ProcessingOutcome::Skipped { reason } => reason.clone(),
            ProcessingOutcome::Failed { error } => error.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Failed,
    Skipped,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Success => "success",
            OutcomeStatus::Failed => "failed",
            OutcomeStatus::Skipped => "skipped",
        }
    }
}

/// One row of the batch report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemResult {
    pub identifier: Identifier,
    pub status: OutcomeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ItemResult {
    pub fn new(identifier: Identifier, outcome: &ProcessingOutcome) -> Self {
        let detail = outcome.detail();
        Self {
            identifier,
            status: outcome.status(),
            detail: if detail.is_empty() { None } else { Some(detail) },
        }
    }
}
