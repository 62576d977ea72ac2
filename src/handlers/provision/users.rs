use axum::{extract::State, Json};
use serde::Deserialize;

use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::provisioning::{user_rows_request, UserRow};
use crate::state::AppState;

use super::payload::ProvisionResponse;
use super::run_batch;

#[derive(Debug, Deserialize)]
pub struct UserBatchPayload {
    pub users: Vec<UserRow>,
    /// Grant curriculum access for rows that name a certification track
    #[serde(default)]
    pub activate_content: bool,
    pub duration_months: Option<u32>,
}

/// POST /api/provision/users - create standalone accounts from per-row profile data
pub async fn post(
    State(state): State<AppState>,
    Json(payload): Json<UserBatchPayload>,
) -> ApiResult<ProvisionResponse> {
    if payload.users.is_empty() {
        return Err(ApiError::field_error("users", "No users provided"));
    }
    let duration_months = payload.duration_months.unwrap_or(state.default_duration_months);
    if duration_months == 0 || duration_months > 120 {
        return Err(ApiError::field_error(
            "duration_months",
            "duration_months must be between 1 and 120",
        ));
    }

    tracing::info!("Creating {} user account(s) from bulk upload", payload.users.len());
    let request = user_rows_request(&payload.users, payload.activate_content, duration_months);
    let run = run_batch(&state, request).await?;
    Ok(ApiResponse::success(ProvisionResponse::from(run)))
}
