use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::auth::{JwtError, TokenKeys};
use crate::config::AppConfig;
use crate::database::models::{Appointment, Patient};
use crate::handlers::{appointments, auth, clinics, health, packages, records, subscriptions};
use crate::middleware::{identity_middleware, quota_middleware, tenant_context_middleware};
use crate::quota::QuotaAdmission;
use crate::store::Stores;
use crate::tenancy::TenantResolver;

/// Shared state handed to every middleware and handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub tokens: Arc<TokenKeys>,
    pub stores: Stores,
    pub resolver: Arc<TenantResolver>,
    pub quota: Arc<QuotaAdmission>,
}

impl AppState {
    pub fn new(config: AppConfig, stores: Stores) -> Result<Self, JwtError> {
        let tokens = TokenKeys::new(&config.security.jwt_secret, config.security.jwt_expiry_hours)?;
        let resolver = TenantResolver::new(stores.memberships.clone(), stores.tenants.clone());
        let quota = QuotaAdmission::new(
            stores.subscriptions.clone(),
            stores.tenants.clone(),
            stores.usage.clone(),
            &config.quota,
        );

        Ok(Self {
            config: Arc::new(config),
            tokens: Arc::new(tokens),
            stores,
            resolver: Arc::new(resolver),
            quota: Arc::new(quota),
        })
    }
}

/// Full application router. Requests pass identity, then tenant context,
/// then quota admission before reaching a handler.
pub fn router(state: AppState) -> Router {
    let max_body = state.config.api.max_request_size_bytes;
    let cors = cors_layer(&state.config.security.cors_origins);

    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health))
        .merge(api_routes())
        // last added runs first
        .layer(from_fn_with_state(state.clone(), quota_middleware))
        .layer(from_fn_with_state(state.clone(), tenant_context_middleware))
        .layer(from_fn_with_state(state.clone(), identity_middleware))
        .layer(DefaultBodyLimit::max(max_body))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/whoami", get(auth::whoami))
        .route("/api/clinics", get(clinics::list).post(clinics::create))
        .route(
            "/api/patients",
            get(records::list::<Patient>).post(records::create::<Patient>),
        )
        .route(
            "/api/patients/:id",
            get(records::show::<Patient>)
                .patch(records::update::<Patient>)
                .delete(records::delete::<Patient>),
        )
        .route(
            "/api/appointments",
            get(records::list::<Appointment>).post(appointments::create),
        )
        .route(
            "/api/appointments/:id",
            get(records::show::<Appointment>)
                .patch(appointments::update)
                .delete(records::delete::<Appointment>),
        )
        .route("/api/packages", get(packages::list))
        .route("/api/subscriptions", post(subscriptions::create))
        .route("/api/subscriptions/current", get(subscriptions::current))
        .route("/api/subscriptions/usage", get(subscriptions::usage))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", o);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}
