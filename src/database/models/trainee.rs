use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::provisioning::Certification;

/// Row of `ecp_trainees`: a person enrolled in a partner training batch
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Trainee {
    pub id: Uuid,
    pub batch_id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub company_name: Option<String>,
    pub job_title: Option<String>,
    /// `CP` or `SCP`, selected as text
    pub certification_type: String,
    pub user_id: Option<Uuid>,
}

impl Trainee {
    /// Curriculum track of the trainee; anything that is not CP counts as SCP
    pub fn certification(&self) -> Certification {
        match self.certification_type.parse() {
            Ok(certification) => certification,
            Err(_) => Certification::Scp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trainee(certification_type: &str) -> Trainee {
        Trainee {
            id: Uuid::new_v4(),
            batch_id: Uuid::new_v4(),
            email: "t@x.com".to_string(),
            first_name: "Mona".to_string(),
            last_name: "Saleh".to_string(),
            phone: None,
            company_name: None,
            job_title: None,
            certification_type: certification_type.to_string(),
            user_id: None,
        }
    }

    #[test]
    fn maps_certification_type_to_track() {
        assert_eq!(trainee("CP").certification(), Certification::Cp);
        assert_eq!(trainee("SCP").certification(), Certification::Scp);
        assert_eq!(trainee("").certification(), Certification::Scp);
    }
}
