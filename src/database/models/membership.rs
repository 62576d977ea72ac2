use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Membership {
    pub id: Uuid,
    pub user_id: Uuid,
    pub membership_type: String,
    pub status: String,
    pub expiry_date: Option<DateTime<Utc>>,
}

impl Membership {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status == "active" && self.expiry_date.map(|e| e > now).unwrap_or(true)
    }
}
