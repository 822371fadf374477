use axum::extract::Extension;
use serde::Serialize;
use uuid::Uuid;

use crate::auth::Role;
use crate::middleware::{ApiResponse, ApiResult};
use crate::tenancy::TenantContext;

#[derive(Debug, Serialize)]
pub struct WhoAmI {
    pub user_id: Uuid,
    pub role: Option<Role>,
    pub tenant_id: Option<Uuid>,
}

/// GET /api/auth/whoami - the resolved request context
pub async fn whoami(Extension(ctx): Extension<TenantContext>) -> ApiResult<WhoAmI> {
    let user_id = ctx.require_user()?;
    Ok(ApiResponse::success(WhoAmI {
        user_id,
        role: ctx.role(),
        tenant_id: ctx.tenant_id(),
    }))
}
