use axum::Json;
use serde::Deserialize;

use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::provisioning::{parse_with_report, ParseReport};

use super::payload::EmailInput;

#[derive(Debug, Deserialize)]
pub struct PreviewPayload {
    pub emails: EmailInput,
}

/// POST /api/provision/preview - parse only, no remote calls
pub async fn post(Json(payload): Json<PreviewPayload>) -> ApiResult<ParseReport> {
    let report = parse_with_report(&payload.emails.into_raw());
    if report.is_empty() {
        return Err(ApiError::field_error("emails", "no valid identifiers in input"));
    }
    Ok(ApiResponse::success(report))
}
