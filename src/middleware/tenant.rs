use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::app::AppState;
use crate::auth::Identity;
use crate::error::ApiError;

/// Resolves the clinic for the request and injects a [`crate::tenancy::TenantContext`].
///
/// Every request leaves here with a context, possibly empty. A claimed clinic
/// the identity cannot access ends the request with 403 before any handler
/// runs.
pub async fn tenant_context_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = request.extensions().get::<Identity>().cloned();
    let ctx = state.resolver.context_for(identity.as_ref()).await?;

    request.extensions_mut().insert(ctx);
    Ok(next.run(request).await)
}
