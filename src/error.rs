// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::auth::JwtError;
use crate::database::DatabaseError;
use crate::quota::QuotaError;
use crate::store::StoreError;
use crate::tenancy::{ContextError, ResolveError};

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ValidationError {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),
    TenantAccessDenied(String),
    ClinicContextRequired(String),
    NoActiveSubscription(String),
    SubscriptionExpired(String),
    LimitExceeded(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::ValidationError { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_)
            | ApiError::TenantAccessDenied(_)
            | ApiError::ClinicContextRequired(_)
            | ApiError::NoActiveSubscription(_)
            | ApiError::SubscriptionExpired(_)
            | ApiError::LimitExceeded(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::TenantAccessDenied(msg)
            | ApiError::ClinicContextRequired(msg)
            | ApiError::NoActiveSubscription(msg)
            | ApiError::SubscriptionExpired(msg)
            | ApiError::LimitExceeded(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::InternalServerError(msg)
            | ApiError::ServiceUnavailable(msg) => msg,
            ApiError::ValidationError { message, .. } => message,
        }
    }

    /// Error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::TenantAccessDenied(_) => "AUTH_CLINIC_ACCESS_DENIED",
            ApiError::ClinicContextRequired(_) => "CLINIC_CONTEXT_REQUIRED",
            ApiError::NoActiveSubscription(_) => "SUBSCRIPTION_NO_ACTIVE",
            ApiError::SubscriptionExpired(_) => "SUBSCRIPTION_EXPIRED",
            ApiError::LimitExceeded(_) => "SUBSCRIPTION_LIMIT_EXCEEDED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        let mut response = json!({
            "success": false,
            "code": self.error_code(),
            "message": self.message(),
        });

        if let ApiError::ValidationError { field_errors: Some(field_errors), .. } = self {
            response["field_errors"] = json!(field_errors);
        }

        response
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation_error(
        message: impl Into<String>,
        field_errors: Option<HashMap<String, String>>,
    ) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            field_errors,
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(msg) => ApiError::not_found(msg),
            StoreError::Conflict(msg) => ApiError::conflict(msg),
            StoreError::Invalid(msg) => ApiError::validation_error(msg, None),
            StoreError::SystemField(field) => {
                let mut field_errors = HashMap::new();
                field_errors.insert(field.clone(), "System field cannot be set via API".to_string());
                ApiError::validation_error(format!("System field '{}' is read-only", field), Some(field_errors))
            }
            StoreError::OutOfScope => {
                tracing::error!("Write attempted outside the request's clinic scope");
                ApiError::forbidden("Record does not belong to the current clinic")
            }
            StoreError::Filter(e) => ApiError::bad_request(e.to_string()),
            StoreError::Serialization(e) => {
                // Malformed stored rows are an internal problem; bad input is caught earlier
                tracing::error!("Record serialization error: {}", e);
                ApiError::internal_server_error("Failed to process record")
            }
            StoreError::Database(sqlx_err) => {
                // Log the real error but return generic message
                tracing::error!("SQLx error: {}", sqlx_err);
                ApiError::internal_server_error("Database error occurred")
            }
        }
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        tracing::error!("Database error: {}", err);
        ApiError::service_unavailable("Database temporarily unavailable")
    }
}

impl From<ContextError> for ApiError {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::MissingIdentity => ApiError::unauthorized("Authentication required"),
            ContextError::MissingTenant => {
                ApiError::ClinicContextRequired("No clinic is selected for this request".to_string())
            }
            ContextError::TenantAlreadyResolved { .. } => {
                tracing::error!("{}", err);
                ApiError::internal_server_error("Clinic context cannot change within a request")
            }
        }
    }
}

impl From<ResolveError> for ApiError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::AccessDenied { tenant_id, .. } => ApiError::TenantAccessDenied(format!(
                "You do not have access to clinic {}",
                tenant_id
            )),
            ResolveError::Store(e) => {
                tracing::error!("Tenant resolution failed: {}", e);
                ApiError::service_unavailable("Unable to resolve clinic context")
            }
        }
    }
}

impl From<QuotaError> for ApiError {
    fn from(err: QuotaError) -> Self {
        match err {
            QuotaError::NoActiveSubscription => ApiError::NoActiveSubscription(
                "No active subscription found. Please subscribe to a package".to_string(),
            ),
            QuotaError::SubscriptionExpired { ended_at } => ApiError::SubscriptionExpired(format!(
                "Your subscription expired on {}. Please renew to continue",
                ended_at.format("%Y-%m-%d")
            )),
            QuotaError::LimitExceeded { resource, limit, .. } => ApiError::LimitExceeded(format!(
                "You have reached the {} limit ({}) of your subscription package",
                resource, limit
            )),
            QuotaError::Store(e) => {
                tracing::error!("Quota check failed: {}", e);
                ApiError::service_unavailable("Unable to verify subscription limits")
            }
        }
    }
}

impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::InvalidSecret | JwtError::InvalidExpiry(_) | JwtError::TokenGeneration(_) => {
                tracing::error!("Token configuration error: {}", err);
                ApiError::internal_server_error("Authentication is misconfigured")
            }
            JwtError::InvalidToken(_) | JwtError::UnknownRole(_) => ApiError::unauthorized(err.to_string()),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status_code(), Json(self.to_json())).into_response()
    }
}
