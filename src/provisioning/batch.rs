use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

use super::error::ProvisioningError;
use super::identifier::Identifier;
use super::parser::parse_identifiers;
use super::processor::{ItemProcessor, ItemReport};
use super::result::{BatchResult, Diagnostic, ResultAggregator};
use super::service::{Entitlement, LinkTarget, ProvisioningService, RecordAttributes};

/// What to do when lookup finds no backing record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingPolicy {
    #[default]
    Create,
    Fail,
}

/// Configuration applied uniformly to every identifier of a batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    pub attributes: RecordAttributes,
    pub link: Option<LinkTarget>,
    pub entitlements: Vec<Entitlement>,
    pub on_missing: MissingPolicy,
}

/// Row-level data for one identifier, layered over the batch's `TargetConfig`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemOverride {
    /// Replaces the uniform attributes when present
    pub attributes: Option<RecordAttributes>,
    /// Granted in addition to the uniform entitlements
    pub entitlements: Vec<Entitlement>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    pub raw_input: String,
    pub target: TargetConfig,
    pub overrides: BTreeMap<Identifier, ItemOverride>,
}

impl BatchRequest {
    pub fn new(raw_input: impl Into<String>, target: TargetConfig) -> Self {
        Self {
            raw_input: raw_input.into(),
            target,
            overrides: BTreeMap::new(),
        }
    }

    /// Attach row-level data; the first override for an identifier wins, like the parser's dedup
    pub fn with_override(mut self, identifier: Identifier, item: ItemOverride) -> Self {
        self.overrides.entry(identifier).or_insert(item);
        self
    }

    /// The configuration one identifier is processed with
    pub fn target_for(&self, identifier: &Identifier) -> Cow<'_, TargetConfig> {
        match self.overrides.get(identifier) {
            None => Cow::Borrowed(&self.target),
            Some(item) => {
                let mut target = self.target.clone();
                if let Some(attributes) = &item.attributes {
                    target.attributes = attributes.clone();
                }
                target.entitlements.extend(item.entitlements.iter().cloned());
                Cow::Owned(target)
            }
        }
    }

    /// A follow-up request covering only the identifiers that failed in `result`.
    /// `None` when nothing failed.
    pub fn retry_failed(&self, result: &BatchResult) -> Option<BatchRequest> {
        let failed = result.failed_identifiers();
        if failed.is_empty() {
            return None;
        }
        let raw_input = failed
            .iter()
            .map(Identifier::as_str)
            .collect::<Vec<_>>()
            .join("\n");
        let overrides = self
            .overrides
            .iter()
            .filter(|(identifier, _)| failed.contains(identifier))
            .map(|(identifier, item)| (identifier.clone(), item.clone()))
            .collect();
        Some(BatchRequest {
            raw_input,
            target: self.target.clone(),
            overrides,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSettings {
    /// Upper bound on every remote call; exceeding it fails the item
    pub call_timeout: Duration,
    /// Identifiers in flight at once. 1 keeps processing strictly sequential.
    pub concurrency: usize,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(30),
            concurrency: 1,
        }
    }
}

impl BatchSettings {
    pub fn from_config(config: &crate::config::ProvisioningConfig) -> Self {
        Self {
            call_timeout: Duration::from_millis(config.call_timeout_ms),
            concurrency: config.concurrency,
        }
    }

    fn validate(&self) -> Result<(), ProvisioningError> {
        if self.call_timeout.is_zero() {
            return Err(ProvisioningError::InvalidConfig(
                "call timeout must be greater than zero".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(ProvisioningError::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Finished batch: the report plus the best-effort side channel
#[derive(Debug, Clone, Serialize)]
pub struct BatchRun {
    pub result: BatchResult,
    pub diagnostics: Vec<Diagnostic>,
    #[serde(skip)]
    pub elapsed: Duration,
}

pub struct BatchRunner {
    processor: ItemProcessor,
    settings: BatchSettings,
}

impl BatchRunner {
    pub fn new(
        service: Arc<dyn ProvisioningService>,
        settings: BatchSettings,
    ) -> Result<Self, ProvisioningError> {
        settings.validate()?;
        Ok(Self {
            processor: ItemProcessor::new(service, settings.call_timeout),
            settings,
        })
    }

    /// Parse the request and process every identifier.
    ///
    /// Only a parse failure is returned as an error, and it happens before any remote call.
    pub async fn run(&self, request: &BatchRequest) -> Result<BatchRun, ProvisioningError> {
        let identifiers = parse_identifiers(&request.raw_input)?;
        let started = Instant::now();
        info!(
            "Starting batch of {} identifier(s) (concurrency {})",
            identifiers.len(),
            self.settings.concurrency
        );

        let mut aggregator = ResultAggregator::with_capacity(identifiers.len());
        let mut diagnostics = Vec::new();

        if self.settings.concurrency <= 1 {
            for identifier in identifiers {
                let target = request.target_for(&identifier);
                let report = self.processor.process(&identifier, &target).await;
                Self::collect(&mut aggregator, &mut diagnostics, identifier, report);
            }
        } else {
            let processor = &self.processor;
            let reports: Vec<(Identifier, ItemReport)> = stream::iter(identifiers)
                .map(|identifier| async move {
                    let target = request.target_for(&identifier);
                    let report = processor.process(&identifier, &target).await;
                    (identifier, report)
                })
                .buffered(self.settings.concurrency)
                .collect()
                .await;
            for (identifier, report) in reports {
                Self::collect(&mut aggregator, &mut diagnostics, identifier, report);
            }
        }

        let result = aggregator.finish();
        let elapsed = started.elapsed();
        info!(
            "Batch complete: {}/{} successful, {} failed, {} skipped in {:?}",
            result.successful, result.total, result.failed, result.skipped, elapsed
        );

        Ok(BatchRun {
            result,
            diagnostics,
            elapsed,
        })
    }

    fn collect(
        aggregator: &mut ResultAggregator,
        diagnostics: &mut Vec<Diagnostic>,
        identifier: Identifier,
        report: ItemReport,
    ) {
        aggregator.record(identifier, &report.outcome);
        diagnostics.extend(report.diagnostics);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provisioning::outcome::OutcomeStatus;
    use crate::provisioning::service::MembershipTier;
    use crate::testing::{Fault, MemoryService};
    use uuid::Uuid;

    fn id(s: &str) -> Identifier {
        Identifier::parse(s).unwrap()
    }

    fn runner(service: &Arc<MemoryService>, concurrency: usize) -> BatchRunner {
        BatchRunner::new(
            service.clone(),
            BatchSettings {
                call_timeout: Duration::from_secs(5),
                concurrency,
            },
        )
        .unwrap()
    }

    fn trainee_target() -> TargetConfig {
        TargetConfig {
            link: Some(LinkTarget::TrainingBatch { batch_id: Uuid::new_v4() }),
            entitlements: vec![Entitlement::Membership {
                tier: MembershipTier::Professional,
                duration_months: 12,
            }],
            ..TargetConfig::default()
        }
    }

    fn statuses(result: &BatchResult) -> Vec<OutcomeStatus> {
        result.results.iter().map(|r| r.status).collect()
    }

    #[tokio::test]
    async fn empty_input_makes_no_remote_calls() {
        let service = Arc::new(MemoryService::new());
        let err = runner(&service, 1)
            .run(&BatchRequest::new("  \n , ", TargetConfig::default()))
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisioningError::Validation(_)));
        assert_eq!(service.calls().total(), 0);
    }

    #[tokio::test]
    async fn one_failure_does_not_abort_the_batch() {
        let service = Arc::new(MemoryService::new());
        service.inject(&id("b@x.com"), Fault::Create);

        let run = runner(&service, 1)
            .run(&BatchRequest::new("a@x.com\nb@x.com\nc@x.com", TargetConfig::default()))
            .await
            .unwrap();

        assert_eq!(
            statuses(&run.result),
            vec![OutcomeStatus::Success, OutcomeStatus::Failed, OutcomeStatus::Success]
        );
        assert_eq!(run.result.failed, 1);
        assert!(run.result.is_consistent());
    }

    #[tokio::test]
    async fn rerunning_a_provisioned_batch_skips_everything() {
        let service = Arc::new(MemoryService::new());
        let runner = runner(&service, 1);
        let request = BatchRequest::new("a@x.com, b@x.com, c@x.com", trainee_target());

        let first = runner.run(&request).await.unwrap();
        assert_eq!(first.result.successful, 3);

        let second = runner.run(&request).await.unwrap();
        assert_eq!(second.result.skipped, 3);
        assert_eq!(second.result.successful, 0);
        assert_eq!(service.calls().create, 3);
        assert_eq!(service.record_count(), 3);
    }

    #[tokio::test]
    async fn mixed_batch_keeps_counts_consistent() {
        let service = Arc::new(MemoryService::new());
        service.seed(&id("existing@x.com"));
        service.inject(&id("broken@x.com"), Fault::Lookup);
        service.inject(&id("nogrant@x.com"), Fault::Grant);

        let target = TargetConfig {
            entitlements: vec![Entitlement::Membership {
                tier: MembershipTier::Basic,
                duration_months: 6,
            }],
            ..TargetConfig::default()
        };
        let run = runner(&service, 1)
            .run(&BatchRequest::new(
                "new@x.com\nexisting@x.com\nbroken@x.com\nnogrant@x.com\njunk",
                target,
            ))
            .await
            .unwrap();

        assert_eq!(run.result.total, 4);
        assert_eq!(run.result.successful, 2);
        assert_eq!(run.result.skipped, 1);
        assert_eq!(run.result.failed, 1);
        assert!(run.result.is_consistent());
        assert_eq!(run.diagnostics.len(), 1);
        assert_eq!(run.diagnostics[0].identifier, id("nogrant@x.com"));
    }

    #[tokio::test]
    async fn concurrent_runs_preserve_input_order() {
        let service = Arc::new(MemoryService::new());
        service.inject(&id("c@x.com"), Fault::Create);
        let input = (0..20)
            .map(|i| format!("user{}@x.com", i))
            .chain(std::iter::once("c@x.com".to_string()))
            .collect::<Vec<_>>()
            .join(",");

        let run = runner(&service, 4)
            .run(&BatchRequest::new(input, TargetConfig::default()))
            .await
            .unwrap();

        assert!(run.result.is_consistent());
        assert_eq!(run.result.total, 21);
        assert_eq!(run.result.failed, 1);
        assert_eq!(run.result.results[0].identifier, id("user0@x.com"));
        assert_eq!(run.result.results[20].identifier, id("c@x.com"));
    }

    #[tokio::test]
    async fn retry_request_contains_only_failures() {
        let service = Arc::new(MemoryService::new());
        service.inject(&id("b@x.com"), Fault::Create);
        let request = BatchRequest::new("a@x.com, b@x.com", TargetConfig::default());

        let run = runner(&service, 1).run(&request).await.unwrap();
        let retry = request.retry_failed(&run.result).unwrap();
        assert_eq!(retry.raw_input, "b@x.com");
        assert_eq!(retry.target, request.target);

        service.clear_faults();
        let rerun = runner(&service, 1).run(&retry).await.unwrap();
        assert_eq!(rerun.result.successful, 1);
        assert!(request.retry_failed(&rerun.result).is_none());
    }

    #[tokio::test]
    async fn row_overrides_apply_only_to_their_identifier() {
        let service = Arc::new(MemoryService::new());
        let uniform = TargetConfig {
            attributes: RecordAttributes {
                source: Some("bulk_upload".to_string()),
                ..RecordAttributes::default()
            },
            ..TargetConfig::default()
        };
        let row = ItemOverride {
            attributes: Some(RecordAttributes {
                full_name: Some("Layla Nasser".to_string()),
                country: Some("AE".to_string()),
                ..RecordAttributes::default()
            }),
            entitlements: vec![Entitlement::Membership {
                tier: MembershipTier::Basic,
                duration_months: 12,
            }],
        };
        let request = BatchRequest::new("layla@x.com
plain@x.com", uniform)
            .with_override(id("layla@x.com"), row);

        let run = runner(&service, 1).run(&request).await.unwrap();

        assert_eq!(run.result.successful, 2);
        let layla = service.attributes_of(&id("layla@x.com")).unwrap();
        assert_eq!(layla.full_name.as_deref(), Some("Layla Nasser"));
        assert_eq!(layla.country.as_deref(), Some("AE"));
        let plain = service.attributes_of(&id("plain@x.com")).unwrap();
        assert_eq!(plain.source.as_deref(), Some("bulk_upload"));
        assert_eq!(service.grants_for(&id("layla@x.com")).len(), 1);
        assert!(service.grants_for(&id("plain@x.com")).is_empty());
    }

    #[test]
    fn first_override_for_an_identifier_wins() {
        let first = ItemOverride {
            attributes: Some(RecordAttributes {
                full_name: Some("First".to_string()),
                ..RecordAttributes::default()
            }),
            entitlements: Vec::new(),
        };
        let request = BatchRequest::new("a@x.com", TargetConfig::default())
            .with_override(id("a@x.com"), first.clone())
            .with_override(id("a@x.com"), ItemOverride::default());

        assert_eq!(request.overrides.get(&id("a@x.com")), Some(&first));
        assert!(matches!(request.target_for(&id("b@x.com")), Cow::Borrowed(_)));
    }

    #[tokio::test]
    async fn retry_keeps_row_data_of_failed_identifiers() {
        let service = Arc::new(MemoryService::new());
        service.inject(&id("b@x.com"), Fault::Create);
        let request = BatchRequest::new("a@x.com, b@x.com", TargetConfig::default())
            .with_override(id("a@x.com"), ItemOverride::default())
            .with_override(id("b@x.com"), ItemOverride::default());

        let run = runner(&service, 1).run(&request).await.unwrap();
        let retry = request.retry_failed(&run.result).unwrap();

        assert_eq!(retry.overrides.len(), 1);
        assert!(retry.overrides.contains_key(&id("b@x.com")));
    }

    #[test]
    fn rejects_invalid_settings() {
        let service: Arc<dyn ProvisioningService> = Arc::new(MemoryService::new());
        let zero_timeout = BatchSettings {
            call_timeout: Duration::ZERO,
            concurrency: 1,
        };
        assert!(BatchRunner::new(service.clone(), zero_timeout).is_err());

        let zero_workers = BatchSettings {
            concurrency: 0,
            ..BatchSettings::default()
        };
        assert!(BatchRunner::new(service, zero_workers).is_err());
    }
}
