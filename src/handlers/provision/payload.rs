use serde::{Deserialize, Serialize};

use crate::provisioning::{BatchResult, BatchRun, Diagnostic};

/// Emails as pasted free text or as a JSON array
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum EmailInput {
    Text(String),
    List(Vec<String>),
}

impl EmailInput {
    pub fn into_raw(self) -> String {
        match self {
            EmailInput::Text(text) => text,
            EmailInput::List(list) => list.join("\n"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProvisionResponse {
    pub report: BatchResult,
    pub diagnostics: Vec<Diagnostic>,
    pub elapsed_ms: u64,
}

impl From<BatchRun> for ProvisionResponse {
    fn from(run: BatchRun) -> Self {
        Self {
            report: run.result,
            diagnostics: run.diagnostics,
            elapsed_ms: run.elapsed.as_millis() as u64,
        }
    }
}
