use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use super::batch::{MissingPolicy, TargetConfig};
use super::error::ServiceError;
use super::identifier::Identifier;
use super::outcome::ProcessingOutcome;
use super::result::Diagnostic;
use super::service::{CreateResult, ExistingRecord, Lookup, ProvisioningService, RecordId};

pub const ALREADY_EXISTS: &str = "already exists";

/// Outcome of one identifier plus any best-effort failures observed on the way
#[derive(Debug, Clone)]
pub struct ItemReport {
    pub outcome: ProcessingOutcome,
    pub diagnostics: Vec<Diagnostic>,
}

/// Runs the lookup / create / link / grant sequence for a single identifier.
///
/// `process` never returns an error: anything raised by lookup, create or the link of an
/// existing record becomes `Failed`, and follow-ups after a successful create only add
/// diagnostics.
pub struct ItemProcessor {
    service: Arc<dyn ProvisioningService>,
    call_timeout: Duration,
}

impl ItemProcessor {
    pub fn new(service: Arc<dyn ProvisioningService>, call_timeout: Duration) -> Self {
        Self { service, call_timeout }
    }

    pub async fn process(&self, identifier: &Identifier, target: &TargetConfig) -> ItemReport {
        let mut diagnostics = Vec::new();

        let outcome = match self.provision(identifier, target, &mut diagnostics).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Provisioning failed for {}: {}", identifier, e);
                ProcessingOutcome::failed(e.to_string())
            }
        };

        debug!("{} -> {:?}", identifier, outcome.status());
        ItemReport { outcome, diagnostics }
    }

    async fn provision(
        &self,
        identifier: &Identifier,
        target: &TargetConfig,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<ProcessingOutcome, ServiceError> {
        let lookup = self
            .call(self.service.lookup(identifier, target.link.as_ref()))
            .await?;

        match lookup {
            Lookup::Existing(ExistingRecord { record_id, linked }) => match &target.link {
                Some(link) if !linked => {
                    self.call(self.service.link(&record_id, link)).await?;
                    Ok(ProcessingOutcome::success(record_id))
                }
                _ => Ok(ProcessingOutcome::skipped(ALREADY_EXISTS)),
            },
            Lookup::NotFound => {
                if target.on_missing == MissingPolicy::Fail {
                    return Ok(ProcessingOutcome::failed(format!(
                        "no account found for {}",
                        identifier
                    )));
                }

                match self.call(self.service.create(identifier, &target.attributes)).await? {
                    CreateResult::AlreadyExists(existing) => {
                        // Lost a race with another writer; attach what they created if we can.
                        if let (Some(record_id), Some(link)) = (existing, &target.link) {
                            let linked = self.call(self.service.link(&record_id, link)).await;
                            self.note(identifier, "link", linked, diagnostics);
                        }
                        Ok(ProcessingOutcome::skipped(ALREADY_EXISTS))
                    }
                    CreateResult::Created(record_id) => {
                        self.follow_up(identifier, &record_id, target, diagnostics).await;
                        Ok(ProcessingOutcome::success(record_id))
                    }
                }
            }
        }
    }

    async fn follow_up(
        &self,
        identifier: &Identifier,
        record_id: &RecordId,
        target: &TargetConfig,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        if let Some(link) = &target.link {
            let linked = self.call(self.service.link(record_id, link)).await;
            self.note(identifier, "link", linked, diagnostics);
        }

        for entitlement in &target.entitlements {
            let granted = self.call(self.service.grant(record_id, entitlement)).await;
            self.note(identifier, &format!("grant {}", entitlement.label()), granted, diagnostics);
        }
    }

    fn note(
        &self,
        identifier: &Identifier,
        step: &str,
        result: Result<(), ServiceError>,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        if let Err(e) = result {
            warn!("Best-effort step '{}' failed for {}: {}", step, identifier, e);
            diagnostics.push(Diagnostic {
                identifier: identifier.clone(),
                step: step.to_string(),
                message: e.to_string(),
            });
        }
    }

    async fn call<T, F>(&self, fut: F) -> Result<T, ServiceError>
    where
        F: Future<Output = Result<T, ServiceError>>,
    {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(ServiceError::Timeout(self.call_timeout)),
        }
    }
}
