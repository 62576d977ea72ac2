use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::error::ServiceError;
use super::identifier::Identifier;

/// Identifier of a backing record (a user account) in the remote store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub Uuid);

impl RecordId {
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Uuid> for RecordId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingRecord {
    pub record_id: RecordId,
    /// Whether the record is already linked to the requested target
    pub linked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    NotFound,
    Existing(ExistingRecord),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateResult {
    Created(RecordId),
    /// Another writer created the record first. The id is present when the backend reports it.
    AlreadyExists(Option<RecordId>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipTier {
    Basic,
    Professional,
}

impl MembershipTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipTier::Basic => "basic",
            MembershipTier::Professional => "professional",
        }
    }
}

impl FromStr for MembershipTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "basic" => Ok(MembershipTier::Basic),
            "professional" => Ok(MembershipTier::Professional),
            other => Err(format!("unknown membership tier '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Certification {
    Cp,
    Scp,
}

impl Certification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Certification::Cp => "cp",
            Certification::Scp => "scp",
        }
    }
}

impl FromStr for Certification {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "CP" | "BDA-CP" => Ok(Certification::Cp),
            "SCP" | "BDA-SCP" => Ok(Certification::Scp),
            other => Err(format!("unknown certification track '{}'", other)),
        }
    }
}

/// The entity a record gets linked to as part of its primary provisioning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LinkTarget {
    /// Attach the account to the trainee row of an ECP training batch
    TrainingBatch { batch_id: Uuid },
    /// Activate a membership; an active membership of the same tier counts as linked
    Membership {
        tier: MembershipTier,
        duration_months: u32,
        notes: Option<String>,
        admin_user_id: Option<Uuid>,
    },
}

/// Where the curriculum track of a grant comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "from", rename_all = "snake_case")]
pub enum TrackSource {
    Fixed { certification: Certification },
    /// The `certification_type` of the record's trainee row in this batch
    Trainee { batch_id: Uuid },
}

/// Best-effort follow-up granted after a record is created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entitlement {
    Membership {
        tier: MembershipTier,
        duration_months: u32,
    },
    CurriculumAccess {
        track: TrackSource,
        language: String,
        duration_months: u32,
    },
}

impl Entitlement {
    pub fn label(&self) -> String {
        match self {
            Entitlement::Membership { tier, .. } => format!("membership:{}", tier.as_str()),
            Entitlement::CurriculumAccess { track, .. } => match track {
                TrackSource::Fixed { certification } => {
                    format!("curriculum:{}", certification.as_str())
                }
                TrackSource::Trainee { .. } => "curriculum:trainee-track".to_string(),
            },
        }
    }
}

/// Profile attributes for records created by a batch.
///
/// A batch carries one uniform set; per-identifier rows may replace it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordAttributes {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub country: Option<String>,
    pub language: Option<String>,
    pub company_name: Option<String>,
    pub job_title: Option<String>,
    pub role: Option<String>,
    pub source: Option<String>,
    pub notes: Option<String>,
    /// Fill missing profile fields from the identifier's trainee row in this batch
    pub roster_batch: Option<Uuid>,
}

impl RecordAttributes {
    /// Split the full name into first and last name: first token, then the rest
    pub fn split_name(&self) -> (String, String) {
        let full = self.full_name.as_deref().unwrap_or("").trim();
        let mut parts = full.split_whitespace();
        let first = parts.next().unwrap_or("").to_string();
        let last = parts.collect::<Vec<_>>().join(" ");
        (first, last)
    }
}

/// Remote user-provisioning boundary consumed by the per-item processor.
///
/// Implementations are injected into the batch runner; nothing in the pipeline reaches
/// a global client.
#[async_trait]
pub trait ProvisioningService: Send + Sync {
    async fn lookup(
        &self,
        identifier: &Identifier,
        target: Option<&LinkTarget>,
    ) -> Result<Lookup, ServiceError>;

    async fn create(
        &self,
        identifier: &Identifier,
        attributes: &RecordAttributes,
    ) -> Result<CreateResult, ServiceError>;

    async fn link(&self, record_id: &RecordId, target: &LinkTarget) -> Result<(), ServiceError>;

    async fn grant(
        &self,
        record_id: &RecordId,
        entitlement: &Entitlement,
    ) -> Result<(), ServiceError>;
}
