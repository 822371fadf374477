//! CRUD handlers shared by every clinic-scoped entity.
//!
//! Routing instantiates them per type (`records::list::<Patient>`); the
//! repository they build applies the isolation predicate for them.

use axum::extract::{Extension, Path, Query, State};
use axum::Json;
use serde_json::{Map, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::{Appointment, Patient};
use crate::database::{ClinicScoped, ScopedRepository};
use crate::error::ApiError;
use crate::filter::FilterData;
use crate::middleware::{ApiResponse, ApiResult};
use crate::store::RecordStore;
use crate::tenancy::TenantContext;

/// Which store in [`AppState`] holds rows of `T`.
pub trait RecordSource<T: ClinicScoped> {
    fn records(&self) -> Arc<dyn RecordStore<T>>;
}

impl RecordSource<Patient> for AppState {
    fn records(&self) -> Arc<dyn RecordStore<Patient>> {
        self.stores.patients.clone()
    }
}

impl RecordSource<Appointment> for AppState {
    fn records(&self) -> Arc<dyn RecordStore<Appointment>> {
        self.stores.appointments.clone()
    }
}

/// Repository for `T` bound to the request context. Refuses requests that
/// resolved no clinic.
pub fn repository<T>(state: &AppState, ctx: &TenantContext) -> Result<ScopedRepository<T>, ApiError>
where
    T: ClinicScoped,
    AppState: RecordSource<T>,
{
    ctx.require_tenant()?;
    Ok(ScopedRepository::new(state.records(), ctx))
}

/// GET /api/{entity}
pub async fn list<T>(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Query(filter): Query<FilterData>,
) -> ApiResult<Vec<T>>
where
    T: ClinicScoped,
    AppState: RecordSource<T>,
{
    let rows = repository::<T>(&state, &ctx)?.list(filter).await?;
    Ok(ApiResponse::success(rows))
}

/// POST /api/{entity}
pub async fn create<T>(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Json(draft): Json<T::Draft>,
) -> ApiResult<T>
where
    T: ClinicScoped,
    AppState: RecordSource<T>,
{
    let row = repository::<T>(&state, &ctx)?.create(draft).await?;
    Ok(ApiResponse::created(row))
}

/// GET /api/{entity}/:id
pub async fn show<T>(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<T>
where
    T: ClinicScoped,
    AppState: RecordSource<T>,
{
    let row = repository::<T>(&state, &ctx)?.get(id).await?;
    Ok(ApiResponse::success(row))
}

/// PATCH /api/{entity}/:id
pub async fn update<T>(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<Uuid>,
    Json(changes): Json<Map<String, Value>>,
) -> ApiResult<T>
where
    T: ClinicScoped,
    AppState: RecordSource<T>,
{
    let row = repository::<T>(&state, &ctx)?.update(id, changes).await?;
    Ok(ApiResponse::success(row))
}

/// DELETE /api/{entity}/:id - soft delete
pub async fn delete<T>(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<()>
where
    T: ClinicScoped,
    AppState: RecordSource<T>,
{
    repository::<T>(&state, &ctx)?.soft_delete(id).await?;
    Ok(ApiResponse::no_content())
}
