use axum::{extract::State, Extension, Json};
use serde::Deserialize;

use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::provisioning::{BatchRequest, LinkTarget, MembershipTier, MissingPolicy, TargetConfig};
use crate::state::AppState;

use super::payload::{EmailInput, ProvisionResponse};
use super::run_batch;

#[derive(Debug, Deserialize)]
pub struct MembershipBatchPayload {
    pub emails: EmailInput,
    pub membership_type: MembershipTier,
    pub duration_months: Option<u32>,
    pub notes: Option<String>,
}

impl MembershipBatchPayload {
    pub fn target(&self, default_months: u32, admin: &AuthUser) -> Result<TargetConfig, ApiError> {
        let duration_months = self.duration_months.unwrap_or(default_months);
        if duration_months == 0 || duration_months > 120 {
            return Err(ApiError::field_error(
                "duration_months",
                "duration_months must be between 1 and 120",
            ));
        }

        Ok(TargetConfig {
            link: Some(LinkTarget::Membership {
                tier: self.membership_type,
                duration_months,
                notes: self.notes.clone(),
                admin_user_id: Some(admin.user_id),
            }),
            // Memberships are only activated for people who already have an account
            on_missing: MissingPolicy::Fail,
            ..TargetConfig::default()
        })
    }
}

/// POST /api/provision/memberships - activate a membership tier for existing accounts
pub async fn post(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Json(payload): Json<MembershipBatchPayload>,
) -> ApiResult<ProvisionResponse> {
    let target = payload.target(state.default_duration_months, &admin)?;

    tracing::info!(
        "{} is activating {} memberships in bulk",
        admin.email,
        payload.membership_type.as_str()
    );
    let run = run_batch(&state, BatchRequest::new(payload.emails.into_raw(), target)).await?;
    Ok(ApiResponse::success(ProvisionResponse::from(run)))
}
