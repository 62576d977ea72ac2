use std::time::Duration;
use thiserror::Error;

/// Batch-level errors. Only these escalate to the caller; item failures never do.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProvisioningError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Errors reported by the provisioning service boundary
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Remote call timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ServiceError::NotFound("row not found".to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                ServiceError::Conflict(db.message().to_string())
            }
            other => ServiceError::Backend(other.to_string()),
        }
    }
}
