use axum::extract::{Extension, Path, State};
use axum::Json;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::{Appointment, AppointmentDraft, Patient};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::store::StoreError;
use crate::tenancy::TenantContext;

use super::records::repository;

/// POST /api/appointments - the patient must be visible in the same clinic
pub async fn create(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Json(draft): Json<AppointmentDraft>,
) -> ApiResult<Appointment> {
    ensure_patient_visible(&state, &ctx, draft.patient_id).await?;

    let row = repository::<Appointment>(&state, &ctx)?.create(draft).await?;
    Ok(ApiResponse::created(row))
}

/// PATCH /api/appointments/:id - a new `patient_id` is held to the same rule as on create
pub async fn update(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<Uuid>,
    Json(changes): Json<Map<String, Value>>,
) -> ApiResult<Appointment> {
    let appointments = repository::<Appointment>(&state, &ctx)?;
    if let Some(raw) = changes.get("patient_id") {
        let patient_id: Uuid = serde_json::from_value(raw.clone())
            .map_err(|_| ApiError::validation_error(format!("Invalid patient_id: {}", raw), None))?;
        ensure_patient_visible(&state, &ctx, patient_id).await?;
    }

    let row = appointments.update(id, changes).await?;
    Ok(ApiResponse::success(row))
}

async fn ensure_patient_visible(state: &AppState, ctx: &TenantContext, patient_id: Uuid) -> Result<(), ApiError> {
    match repository::<Patient>(state, ctx)?.get(patient_id).await {
        Ok(_) => Ok(()),
        Err(StoreError::NotFound(_)) => Err(ApiError::validation_error(
            format!("Patient {} does not exist in this clinic", patient_id),
            None,
        )),
        Err(e) => Err(e.into()),
    }
}
