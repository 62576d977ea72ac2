use sqlx::PgPool;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::provisioning::{BatchSettings, ProvisioningService};
use crate::services::{PgProvisioningService, PgTraineeRoster, TraineeRoster};

/// Shared dependencies handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<dyn ProvisioningService>,
    pub roster: Arc<dyn TraineeRoster>,
    pub settings: BatchSettings,
    pub max_identifiers: usize,
    pub default_duration_months: u32,
    pub jwt_secret: Arc<str>,
    /// Present when the server runs against a real database; used by the health check
    pub pool: Option<PgPool>,
}

impl AppState {
    /// State wired to the Postgres-backed service
    pub fn postgres(pool: PgPool, config: &AppConfig) -> Self {
        let mut state = Self::new(
            Arc::new(PgProvisioningService::new(pool.clone())),
            Arc::new(PgTraineeRoster::new(pool.clone())),
            config,
        );
        state.pool = Some(pool);
        state
    }

    pub fn new(
        service: Arc<dyn ProvisioningService>,
        roster: Arc<dyn TraineeRoster>,
        config: &AppConfig,
    ) -> Self {
        Self {
            service,
            roster,
            settings: BatchSettings::from_config(&config.provisioning),
            max_identifiers: config.provisioning.max_identifiers,
            default_duration_months: config.provisioning.default_duration_months,
            jwt_secret: Arc::from(config.security.jwt_secret.as_str()),
            pool: None,
        }
    }
}
