use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::scoped::ClinicScoped;
use crate::store::StoreError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatientDraft {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl ClinicScoped for Patient {
    type Draft = PatientDraft;

    const TABLE: &'static str = "patients";
    const LABEL: &'static str = "Patient";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "tenant_id",
        "first_name",
        "last_name",
        "date_of_birth",
        "phone",
        "email",
        "is_deleted",
        "created_at",
        "updated_at",
    ];

    fn from_draft(draft: PatientDraft, tenant_id: Uuid, now: DateTime<Utc>) -> Result<Self, StoreError> {
        let patient = Self {
            id: Uuid::new_v4(),
            tenant_id,
            first_name: draft.first_name.trim().to_string(),
            last_name: draft.last_name.trim().to_string(),
            date_of_birth: draft.date_of_birth,
            phone: draft.phone,
            email: draft.email,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        };
        patient.validate()?;
        Ok(patient)
    }

    fn validate(&self) -> Result<(), StoreError> {
        if self.first_name.trim().is_empty() || self.last_name.trim().is_empty() {
            return Err(StoreError::Invalid("Patient first and last name are required".to_string()));
        }
        if let Some(email) = &self.email {
            if !email.contains('@') {
                return Err(StoreError::Invalid(format!("Invalid email address: {}", email)));
            }
        }
        if let Some(dob) = self.date_of_birth {
            if dob > self.created_at.date_naive() {
                return Err(StoreError::Invalid("Date of birth cannot be in the future".to_string()));
            }
        }
        Ok(())
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }

    fn is_deleted(&self) -> bool {
        self.is_deleted
    }

    fn mark_deleted(&mut self, now: DateTime<Utc>) {
        self.is_deleted = true;
        self.updated_at = now;
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}
