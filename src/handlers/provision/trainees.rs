use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::provisioning::{
    BatchRequest, Certification, Entitlement, LinkTarget, MembershipTier, MissingPolicy,
    RecordAttributes, TargetConfig, TrackSource,
};
use crate::state::AppState;

use super::payload::{EmailInput, ProvisionResponse};
use super::run_batch;

#[derive(Debug, Deserialize)]
pub struct TraineeBatchPayload {
    /// When absent, pending trainees of the batch are provisioned
    pub emails: Option<EmailInput>,
    /// Narrows the pending trainees; only valid without `emails`
    pub trainee_ids: Option<Vec<Uuid>>,
    #[serde(default)]
    pub activate_membership: bool,
    pub membership_type: Option<MembershipTier>,
    #[serde(default)]
    pub grant_curriculum_access: bool,
    /// Overrides each trainee's own certification type
    pub certification: Option<Certification>,
    pub language: Option<String>,
}

impl TraineeBatchPayload {
    pub fn target(&self, batch_id: Uuid, duration_months: u32) -> Result<TargetConfig, ApiError> {
        let mut entitlements = Vec::new();

        if self.activate_membership {
            let tier = self.membership_type.ok_or_else(|| {
                ApiError::field_error(
                    "membership_type",
                    "membership_type is required when activate_membership is set",
                )
            })?;
            entitlements.push(Entitlement::Membership { tier, duration_months });
        }

        if self.grant_curriculum_access {
            let track = match self.certification {
                Some(certification) => TrackSource::Fixed { certification },
                None => TrackSource::Trainee { batch_id },
            };
            entitlements.push(Entitlement::CurriculumAccess {
                track,
                language: self.language.clone().unwrap_or_else(|| "en".to_string()),
                duration_months,
            });
        }

        Ok(TargetConfig {
            attributes: RecordAttributes {
                role: Some("individual".to_string()),
                source: Some("ecp_training".to_string()),
                roster_batch: Some(batch_id),
                ..RecordAttributes::default()
            },
            link: Some(LinkTarget::TrainingBatch { batch_id }),
            entitlements,
            on_missing: MissingPolicy::Create,
        })
    }
}

/// POST /api/provision/trainees/:batch_id - create accounts for trainees of a training batch
pub async fn post(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
    Json(payload): Json<TraineeBatchPayload>,
) -> ApiResult<ProvisionResponse> {
    let target = payload.target(batch_id, state.default_duration_months)?;

    let raw_input = match (payload.emails, payload.trainee_ids.as_deref()) {
        (Some(_), Some(_)) => {
            return Err(ApiError::bad_request("send either emails or trainee_ids, not both"));
        }
        (Some(emails), None) => emails.into_raw(),
        (None, trainee_ids) => {
            let pending = state
                .roster
                .pending_emails(batch_id, trainee_ids)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to load trainees for batch {}: {}", batch_id, e);
                    ApiError::internal_server_error("Failed to load batch trainees")
                })?;
            pending.join("\n")
        }
    };

    tracing::info!("Provisioning trainee accounts for batch {}", batch_id);
    let run = run_batch(&state, BatchRequest::new(raw_input, target)).await?;

    if run.result.successful > 0 {
        if let Err(e) = state.roster.touch_batch(batch_id).await {
            tracing::warn!("Failed to update timestamp of batch {}: {}", batch_id, e);
        }
    }

    Ok(ApiResponse::success(ProvisionResponse::from(run)))
}
