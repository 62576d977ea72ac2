use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::models::{Membership, Trainee, User};
use crate::provisioning::membership::extended_expiry;
use crate::provisioning::{
    Certification, CreateResult, Entitlement, ExistingRecord, Identifier, LinkTarget, Lookup,
    MembershipTier, ProvisioningService, RecordAttributes, RecordId, ServiceError, TrackSource,
};

const DEFAULT_SOURCE: &str = "bulk_provisioning";
const DEFAULT_ROLE: &str = "individual";

/// `ProvisioningService` backed directly by the portal's Postgres tables
#[derive(Clone)]
pub struct PgProvisioningService {
    pool: PgPool,
}

impl PgProvisioningService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_user(&self, identifier: &Identifier) -> Result<Option<User>, ServiceError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, first_name, last_name, role, created_at
             FROM users
             WHERE lower(email) = $1
             LIMIT 1",
        )
        .bind(identifier.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn trainee_row(
        &self,
        batch_id: Uuid,
        identifier: &Identifier,
    ) -> Result<Option<Trainee>, ServiceError> {
        let trainee = sqlx::query_as::<_, Trainee>(
            "SELECT id, batch_id, email, first_name, last_name, phone, company_name, job_title,
                    certification_type::text AS certification_type, user_id
             FROM ecp_trainees
             WHERE batch_id = $1 AND lower(email) = $2
             LIMIT 1",
        )
        .bind(batch_id)
        .bind(identifier.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(trainee)
    }

    async fn find_trainee(
        &self,
        batch_id: Uuid,
        identifier: &Identifier,
    ) -> Result<Trainee, ServiceError> {
        self.trainee_row(batch_id, identifier).await?.ok_or_else(|| {
            ServiceError::NotFound(format!("{} is not a trainee of batch {}", identifier, batch_id))
        })
    }

    /// Curriculum track of the trainee linked to `user_id` in the batch
    async fn trainee_track(
        &self,
        batch_id: Uuid,
        user_id: Uuid,
    ) -> Result<Certification, ServiceError> {
        let trainee = sqlx::query_as::<_, Trainee>(
            "SELECT id, batch_id, email, first_name, last_name, phone, company_name, job_title,
                    certification_type::text AS certification_type, user_id
             FROM ecp_trainees
             WHERE batch_id = $1 AND user_id = $2
             LIMIT 1",
        )
        .bind(batch_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("user {} is not linked to batch {}", user_id, batch_id))
        })?;
        Ok(trainee.certification())
    }

    /// Most recent membership of the tier for the user, active or not
    async fn latest_membership(
        &self,
        user_id: Uuid,
        tier: MembershipTier,
    ) -> Result<Option<Membership>, ServiceError> {
        let membership = sqlx::query_as::<_, Membership>(
            "SELECT id, user_id, membership_type, status, expiry_date
             FROM user_memberships
             WHERE user_id = $1 AND membership_type = $2
             ORDER BY expiry_date DESC NULLS LAST
             LIMIT 1",
        )
        .bind(user_id)
        .bind(tier.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(membership)
    }

    /// Attributes with gaps filled from the identifier's trainee row in `roster_batch`
    async fn resolve_profile(
        &self,
        identifier: &Identifier,
        attributes: &RecordAttributes,
    ) -> Result<Profile, ServiceError> {
        let trainee = match attributes.roster_batch {
            Some(batch_id) => self.trainee_row(batch_id, identifier).await?,
            None => None,
        };
        Ok(Profile::merge(attributes, trainee.as_ref()))
    }

    /// Activate or extend a membership and write the audit row. Returns the membership id.
    async fn activate_membership(
        &self,
        user_id: Uuid,
        tier: MembershipTier,
        duration_months: u32,
        notes: String,
        admin_user_id: Option<Uuid>,
    ) -> Result<Uuid, ServiceError> {
        let now = Utc::now();
        let membership_id = match self.latest_membership(user_id, tier).await? {
            Some(current) => {
                let expiry = extended_expiry(current.expiry_date, now, duration_months);
                sqlx::query(
                    "UPDATE user_memberships
                     SET status = 'active', expiry_date = $2, updated_at = now()
                     WHERE id = $1",
                )
                .bind(current.id)
                .bind(expiry)
                .execute(&self.pool)
                .await?;
                current.id
            }
            None => {
                let expiry = extended_expiry(None, now, duration_months);
                let (id,): (Uuid,) = sqlx::query_as(
                    "INSERT INTO user_memberships
                         (id, user_id, membership_type, status, start_date, expiry_date)
                     VALUES ($1, $2, $3, 'active', $4, $5)
                     RETURNING id",
                )
                .bind(Uuid::new_v4())
                .bind(user_id)
                .bind(tier.as_str())
                .bind(now)
                .bind(expiry)
                .fetch_one(&self.pool)
                .await?;
                id
            }
        };

        // The activation itself succeeded; a missing audit row is only worth a warning
        let logged = sqlx::query(
            "INSERT INTO membership_activation_logs
                 (user_id, membership_id, action, triggered_by, admin_user_id, notes)
             VALUES ($1, $2, 'activated', 'admin', $3, $4)",
        )
        .bind(user_id)
        .bind(membership_id)
        .bind(admin_user_id)
        .bind(&notes)
        .execute(&self.pool)
        .await;
        if let Err(e) = logged {
            warn!("Failed to log activation of membership {}: {}", membership_id, e);
        }

        info!("Activated {} membership {} for user {}", tier.as_str(), membership_id, user_id);
        Ok(membership_id)
    }
}

/// Column values for a new `users` row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub country_code: Option<String>,
    pub preferred_language: Option<String>,
    pub company_name: Option<String>,
    pub job_title: Option<String>,
}

impl Profile {
    /// Explicit attributes win; the trainee row fills whatever they leave out
    pub fn merge(attributes: &RecordAttributes, trainee: Option<&Trainee>) -> Self {
        let (first_name, last_name) = match (&attributes.full_name, trainee) {
            (None, Some(trainee)) => (trainee.first_name.clone(), trainee.last_name.clone()),
            _ => attributes.split_name(),
        };
        Self {
            first_name,
            last_name,
            phone: attributes
                .phone
                .clone()
                .or_else(|| trainee.and_then(|t| t.phone.clone())),
            country_code: attributes.country.clone(),
            preferred_language: attributes.language.clone(),
            company_name: attributes
                .company_name
                .clone()
                .or_else(|| trainee.and_then(|t| t.company_name.clone())),
            job_title: attributes
                .job_title
                .clone()
                .or_else(|| trainee.and_then(|t| t.job_title.clone())),
        }
    }
}

/// Audit note for a bulk activation
pub fn activation_note(notes: Option<&str>, duration_months: u32) -> String {
    match notes.map(str::trim).filter(|n| !n.is_empty()) {
        Some(notes) => format!("Bulk activation - {}", notes),
        None => format!("Bulk activation ({} months)", duration_months),
    }
}

#[async_trait]
impl ProvisioningService for PgProvisioningService {
    async fn lookup(
        &self,
        identifier: &Identifier,
        target: Option<&LinkTarget>,
    ) -> Result<Lookup, ServiceError> {
        if let Some(LinkTarget::TrainingBatch { batch_id }) = target {
            let trainee = self.find_trainee(*batch_id, identifier).await?;
            if let Some(user_id) = trainee.user_id {
                return Ok(Lookup::Existing(ExistingRecord {
                    record_id: RecordId(user_id),
                    linked: true,
                }));
            }
        }

        let user = match self.find_user(identifier).await? {
            Some(user) => user,
            None => return Ok(Lookup::NotFound),
        };

        let linked = match target {
            None => true,
            // Checked above: the trainee row has no account yet
            Some(LinkTarget::TrainingBatch { .. }) => false,
            Some(LinkTarget::Membership { tier, .. }) => self
                .latest_membership(user.id, *tier)
                .await?
                .map(|m| m.is_active_at(Utc::now()))
                .unwrap_or(false),
        };

        Ok(Lookup::Existing(ExistingRecord {
            record_id: RecordId(user.id),
            linked,
        }))
    }

    async fn create(
        &self,
        identifier: &Identifier,
        attributes: &RecordAttributes,
    ) -> Result<CreateResult, ServiceError> {
        let profile = self.resolve_profile(identifier, attributes).await?;

        let inserted: Option<(Uuid,)> = sqlx::query_as(
            "INSERT INTO users
                 (id, email, first_name, last_name, phone, country_code, preferred_language,
                  company_name, job_title, role, source, profile_completed, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, false, now(), now())
             ON CONFLICT (email) DO NOTHING
             RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(identifier.as_str())
        .bind(profile.first_name)
        .bind(profile.last_name)
        .bind(profile.phone)
        .bind(profile.country_code)
        .bind(profile.preferred_language)
        .bind(profile.company_name)
        .bind(profile.job_title)
        .bind(attributes.role.as_deref().unwrap_or(DEFAULT_ROLE))
        .bind(attributes.source.as_deref().unwrap_or(DEFAULT_SOURCE))
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some((id,)) => Ok(CreateResult::Created(RecordId(id))),
            None => {
                let existing = self.find_user(identifier).await?.map(|u| RecordId(u.id));
                Ok(CreateResult::AlreadyExists(existing))
            }
        }
    }

    async fn link(&self, record_id: &RecordId, target: &LinkTarget) -> Result<(), ServiceError> {
        match target {
            LinkTarget::TrainingBatch { batch_id } => {
                let updated = sqlx::query(
                    "UPDATE ecp_trainees
                     SET user_id = $1
                     WHERE batch_id = $2
                       AND user_id IS NULL
                       AND lower(email) = (SELECT lower(email) FROM users WHERE id = $1)",
                )
                .bind(record_id.0)
                .bind(batch_id)
                .execute(&self.pool)
                .await?;
                if updated.rows_affected() == 0 {
                    return Err(ServiceError::NotFound(format!(
                        "no unlinked trainee in batch {} for user {}",
                        batch_id, record_id
                    )));
                }
                Ok(())
            }
            LinkTarget::Membership {
                tier,
                duration_months,
                notes,
                admin_user_id,
            } => {
                self.activate_membership(
                    record_id.0,
                    *tier,
                    *duration_months,
                    activation_note(notes.as_deref(), *duration_months),
                    *admin_user_id,
                )
                .await?;
                Ok(())
            }
        }
    }

    async fn grant(
        &self,
        record_id: &RecordId,
        entitlement: &Entitlement,
    ) -> Result<(), ServiceError> {
        match entitlement {
            Entitlement::Membership { tier, duration_months } => {
                self.activate_membership(
                    record_id.0,
                    *tier,
                    *duration_months,
                    "Activated via ECP training batch".to_string(),
                    None,
                )
                .await?;
                Ok(())
            }
            Entitlement::CurriculumAccess {
                track,
                language,
                duration_months,
            } => {
                let certification = match track {
                    TrackSource::Fixed { certification } => *certification,
                    TrackSource::Trainee { batch_id } => {
                        self.trainee_track(*batch_id, record_id.0).await?
                    }
                };
                let now = Utc::now();
                let expires_at = extended_expiry(None, now, *duration_months);
                sqlx::query(
                    "INSERT INTO user_curriculum_access
                         (user_id, certification_type, language, purchased_at, expires_at,
                          is_active, source)
                     VALUES ($1, $2, $3, $4, $5, true, $6)
                     ON CONFLICT (user_id, language) DO UPDATE
                     SET certification_type = EXCLUDED.certification_type,
                         expires_at = EXCLUDED.expires_at,
                         is_active = true",
                )
                .bind(record_id.0)
                .bind(certification.as_str())
                .bind(language.to_lowercase())
                .bind(now)
                .bind(expires_at)
                .bind(DEFAULT_SOURCE)
                .execute(&self.pool)
                .await?;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trainee() -> Trainee {
        Trainee {
            id: Uuid::new_v4(),
            batch_id: Uuid::new_v4(),
            email: "rana@x.com".to_string(),
            first_name: "Rana".to_string(),
            last_name: "Fares".to_string(),
            phone: Some("+971500000000".to_string()),
            company_name: Some("Gulf Ops".to_string()),
            job_title: Some("Analyst".to_string()),
            certification_type: "CP".to_string(),
            user_id: None,
        }
    }

    #[test]
    fn profile_takes_trainee_columns_when_attributes_are_silent() {
        let profile = Profile::merge(&RecordAttributes::default(), Some(&trainee()));
        assert_eq!(profile.first_name, "Rana");
        assert_eq!(profile.last_name, "Fares");
        assert_eq!(profile.phone.as_deref(), Some("+971500000000"));
        assert_eq!(profile.company_name.as_deref(), Some("Gulf Ops"));
        assert_eq!(profile.job_title.as_deref(), Some("Analyst"));
    }

    #[test]
    fn explicit_attributes_win_over_trainee_row() {
        let attributes = RecordAttributes {
            full_name: Some("Rana M. Fares".to_string()),
            job_title: Some("Lead".to_string()),
            country: Some("AE".to_string()),
            ..RecordAttributes::default()
        };
        let profile = Profile::merge(&attributes, Some(&trainee()));
        assert_eq!(profile.first_name, "Rana");
        assert_eq!(profile.last_name, "M. Fares");
        assert_eq!(profile.job_title.as_deref(), Some("Lead"));
        assert_eq!(profile.company_name.as_deref(), Some("Gulf Ops"));
        assert_eq!(profile.country_code.as_deref(), Some("AE"));
    }

    #[test]
    fn profile_without_trainee_uses_attributes_only() {
        let profile = Profile::merge(&RecordAttributes::default(), None);
        assert_eq!(profile, Profile::default());
    }

    #[test]
    fn activation_note_prefers_admin_notes() {
        assert_eq!(
            activation_note(Some("Q3 partner cohort"), 12),
            "Bulk activation - Q3 partner cohort"
        );
    }

    #[test]
    fn activation_note_falls_back_to_duration() {
        assert_eq!(activation_note(None, 6), "Bulk activation (6 months)");
        assert_eq!(activation_note(Some("   "), 12), "Bulk activation (12 months)");
    }
}
