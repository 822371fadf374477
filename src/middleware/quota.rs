use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::app::AppState;
use crate::error::ApiError;
use crate::tenancy::TenantContext;

/// Quota admission around the rest of the stack: check, run, then count the
/// creation if the response was a success.
pub async fn quota_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx = request
        .extensions()
        .get::<TenantContext>()
        .cloned()
        .unwrap_or_default();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let admission = state.quota.check(&ctx, &method, &path).await?;
    let response = next.run(request).await;
    state.quota.commit(&admission, response.status()).await;

    Ok(response)
}
