pub mod memberships;
pub mod payload;
pub mod preview;
pub mod trainees;
pub mod users;

pub use memberships::post as memberships;
pub use preview::post as preview;
pub use trainees::post as trainees;
pub use users::post as users;

use crate::error::ApiError;
use crate::provisioning::{parse_with_report, BatchRequest, BatchRun, BatchRunner};
use crate::state::AppState;

/// Shared core of every provisioning endpoint: enforce the batch size limit, then run
async fn run_batch(state: &AppState, request: BatchRequest) -> Result<BatchRun, ApiError> {
    let count = parse_with_report(&request.raw_input).identifiers.len();
    if count > state.max_identifiers {
        return Err(ApiError::payload_too_large(format!(
            "batch has {} identifiers; the limit is {}",
            count, state.max_identifiers
        )));
    }

    let runner = BatchRunner::new(state.service.clone(), state.settings)?;
    Ok(runner.run(&request).await?)
}
