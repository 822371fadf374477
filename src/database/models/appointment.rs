use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::scoped::ClinicScoped;
use crate::store::StoreError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub status: String,
    pub reason: Option<String>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppointmentDraft {
    pub patient_id: Uuid,
    #[serde(default)]
    pub doctor_id: Option<Uuid>,
    pub scheduled_at: DateTime<Utc>,
    #[serde(default = "default_duration")]
    pub duration_minutes: i32,
    #[serde(default)]
    pub reason: Option<String>,
}

fn default_duration() -> i32 {
    30
}

const STATUSES: &[&str] = &["Scheduled", "CheckedIn", "Completed", "Cancelled", "NoShow"];

impl ClinicScoped for Appointment {
    type Draft = AppointmentDraft;

    const TABLE: &'static str = "appointments";
    const LABEL: &'static str = "Appointment";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "tenant_id",
        "patient_id",
        "doctor_id",
        "scheduled_at",
        "duration_minutes",
        "status",
        "reason",
        "is_deleted",
        "created_at",
        "updated_at",
    ];

    fn from_draft(draft: AppointmentDraft, tenant_id: Uuid, now: DateTime<Utc>) -> Result<Self, StoreError> {
        let appointment = Self {
            id: Uuid::new_v4(),
            tenant_id,
            patient_id: draft.patient_id,
            doctor_id: draft.doctor_id,
            scheduled_at: draft.scheduled_at,
            duration_minutes: draft.duration_minutes,
            status: "Scheduled".to_string(),
            reason: draft.reason,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        };
        appointment.validate()?;
        Ok(appointment)
    }

    fn validate(&self) -> Result<(), StoreError> {
        if !(1..=24 * 60).contains(&self.duration_minutes) {
            return Err(StoreError::Invalid(
                "Appointment duration must be between 1 and 1440 minutes".to_string(),
            ));
        }
        if !STATUSES.contains(&self.status.as_str()) {
            return Err(StoreError::Invalid(format!("Unknown appointment status: {}", self.status)));
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
