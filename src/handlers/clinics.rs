use axum::extract::{Extension, State};
use axum::Json;
use serde::Deserialize;

use crate::app::AppState;
use crate::database::models::Tenant;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::tenancy::TenantContext;

#[derive(Debug, Deserialize)]
pub struct CreateClinic {
    pub name: String,
}

/// GET /api/clinics - clinics the caller is an active member of
pub async fn list(State(state): State<AppState>, Extension(ctx): Extension<TenantContext>) -> ApiResult<Vec<Tenant>> {
    let user_id = ctx.require_user()?;
    let clinics = state.stores.tenants.list_for_user(user_id).await?;
    Ok(ApiResponse::success(clinics))
}

/// POST /api/clinics - new clinic owned by the caller, with the caller as member
pub async fn create(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Json(body): Json<CreateClinic>,
) -> ApiResult<Tenant> {
    let user_id = ctx.require_user()?;
    let name = validate_name(&body.name)?;

    let clinic = state.stores.tenants.create_tenant(name, user_id).await?;
    tracing::info!("User {} created clinic {} ({})", user_id, clinic.name, clinic.id);
    Ok(ApiResponse::created(clinic))
}

fn validate_name(raw: &str) -> Result<&str, ApiError> {
    let name = raw.trim();
    if name.chars().count() < 2 {
        return Err(ApiError::validation_error("Clinic name must be at least 2 characters", None));
    }
    if name.chars().count() > 100 {
        return Err(ApiError::validation_error("Clinic name must be at most 100 characters", None));
    }
    Ok(name)
}
