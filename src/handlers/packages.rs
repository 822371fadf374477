use axum::extract::State;

use crate::app::AppState;
use crate::database::models::SubscriptionPackage;
use crate::middleware::{ApiResponse, ApiResult};

/// GET /api/packages - the plan catalog with limits
pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<SubscriptionPackage>> {
    let packages = state.stores.subscriptions.list_packages().await?;
    Ok(ApiResponse::success(packages))
}
