use axum::extract::State;
use axum::response::Json;
use chrono::Utc;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::error::ApiError;

/// GET /
pub async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "Clinic API",
            "version": env!("CARGO_PKG_VERSION"),
            "endpoints": {
                "health": "/health (public)",
                "auth": "/api/auth/whoami",
                "clinics": "/api/clinics",
                "patients": "/api/patients[/:id]",
                "appointments": "/api/appointments[/:id]",
                "packages": "/api/packages",
                "subscriptions": "/api/subscriptions, /api/subscriptions/current, /api/subscriptions/usage",
            }
        }
    }))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state.stores.tenants.ping().await.map_err(|e| {
        tracing::error!("Health check failed: {}", e);
        ApiError::service_unavailable("database unavailable")
    })?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "status": "ok",
            "timestamp": Utc::now(),
        }
    })))
}
