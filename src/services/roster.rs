use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::provisioning::ServiceError;

/// Read and bookkeeping access to the training batch tables
#[async_trait]
pub trait TraineeRoster: Send + Sync {
    /// Emails of batch trainees that have no account yet, optionally narrowed to `trainee_ids`
    async fn pending_emails(
        &self,
        batch_id: Uuid,
        trainee_ids: Option<&[Uuid]>,
    ) -> Result<Vec<String>, ServiceError>;

    /// Bump the batch's `updated_at` after accounts were created for it
    async fn touch_batch(&self, batch_id: Uuid) -> Result<(), ServiceError>;
}

#[derive(Clone)]
pub struct PgTraineeRoster {
    pool: PgPool,
}

impl PgTraineeRoster {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TraineeRoster for PgTraineeRoster {
    async fn pending_emails(
        &self,
        batch_id: Uuid,
        trainee_ids: Option<&[Uuid]>,
    ) -> Result<Vec<String>, ServiceError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT email
             FROM ecp_trainees
             WHERE batch_id = $1
               AND user_id IS NULL
               AND ($2::uuid[] IS NULL OR id = ANY($2))
             ORDER BY created_at ASC",
        )
        .bind(batch_id)
        .bind(trainee_ids.map(<[Uuid]>::to_vec))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(email,)| email).collect())
    }

    async fn touch_batch(&self, batch_id: Uuid) -> Result<(), ServiceError> {
        sqlx::query("UPDATE ecp_training_batches SET updated_at = now() WHERE id = $1")
            .bind(batch_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
