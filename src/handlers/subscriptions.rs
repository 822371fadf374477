use axum::extract::{Extension, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::{ActiveSubscription, Subscription};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::quota::{QuotaError, UsageReport};
use crate::tenancy::TenantContext;

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub package_id: Uuid,
}

/// POST /api/subscriptions - replace the governing subscription with a new
/// one on `package_id`. Only the subscription owner may do this.
pub async fn create(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Json(body): Json<SubscribeRequest>,
) -> ApiResult<Subscription> {
    let user_id = ctx.require_user()?;
    let owner = state.quota.owner_for(&ctx).await?.unwrap_or(user_id);
    if owner != user_id {
        return Err(ApiError::forbidden("Only the clinic owner can change its subscription"));
    }

    let subscription = state
        .stores
        .subscriptions
        .subscribe(owner, body.package_id, Utc::now())
        .await?;
    tracing::info!(
        "User {} subscribed to package {} until {}",
        owner,
        body.package_id,
        subscription.end_date
    );
    Ok(ApiResponse::created(subscription))
}

/// GET /api/subscriptions/current
pub async fn current(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
) -> ApiResult<ActiveSubscription> {
    let user_id = ctx.require_user()?;
    let owner = state.quota.owner_for(&ctx).await?.unwrap_or(user_id);
    let active = state
        .stores
        .subscriptions
        .active_subscription(owner)
        .await?
        .ok_or(QuotaError::NoActiveSubscription)?;
    Ok(ApiResponse::success(active))
}

/// GET /api/subscriptions/usage
pub async fn usage(State(state): State<AppState>, Extension(ctx): Extension<TenantContext>) -> ApiResult<UsageReport> {
    ctx.require_user()?;
    let report = state.quota.usage_report(&ctx).await?;
    Ok(ApiResponse::success(report))
}
