#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use clinic_api::app::{router, AppState};
use clinic_api::auth::Role;
use clinic_api::config::{AppConfig, Environment};
use clinic_api::database::models::{QuotaLimit, Subscription, SubscriptionStatus, Tenant};
use clinic_api::quota::ResourceType;
use clinic_api::store::memory::MemoryStore;
use clinic_api::store::Stores;

/// In-process application over a fresh memory store.
pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub state: AppState,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(AppConfig::for_environment(Environment::Development))
    }

    pub fn with_config(config: AppConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let stores = Stores::memory(store.clone());
        Self::with_stores(config, store, stores)
    }

    /// App over `stores`, which may swap some collaborators out of `store`.
    pub fn with_stores(config: AppConfig, store: Arc<MemoryStore>, stores: Stores) -> Self {
        let state = AppState::new(config, stores).expect("development secret is valid");
        let router = router(state.clone());
        Self { store, state, router }
    }

    pub fn token(&self, user_id: Uuid, role: Role, clinic: Option<Uuid>) -> String {
        self.state.tokens.issue(user_id, role, clinic).expect("token issues")
    }

    /// Send one request and return the status with the decoded body
    /// (`Value::Null` when the body is empty).
    pub async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request builds");

        let response = self.router.clone().oneshot(request).await.expect("router is infallible");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body reads");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("body is JSON")
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(token), Some(body)).await
    }

    /// Clinic owned by `owner`, with the owner as an active member.
    pub async fn clinic_owned_by(&self, name: &str, owner: Uuid) -> Tenant {
        let clinic = self.store.add_tenant(name, Some(owner)).await;
        self.store.add_membership(owner, clinic.id).await;
        clinic
    }

    /// Active subscription for `owner` on a fresh plan with the given limits.
    pub async fn subscribe(&self, owner: Uuid, limits: Vec<(ResourceType, QuotaLimit)>) -> Subscription {
        self.subscribe_until(owner, limits, Utc::now() + Duration::days(29)).await
    }

    pub async fn subscribe_until(
        &self,
        owner: Uuid,
        limits: Vec<(ResourceType, QuotaLimit)>,
        end_date: chrono::DateTime<Utc>,
    ) -> Subscription {
        let package = self.store.add_package(&format!("Plan {}", Uuid::new_v4()), limits).await;
        self.store
            .add_subscription(owner, package.id, end_date - Duration::days(30), end_date, SubscriptionStatus::Active)
            .await
    }
}

pub fn patient_body(first_name: &str) -> Value {
    serde_json::json!({
        "first_name": first_name,
        "last_name": "Example",
        "email": "patient@example.com",
    })
}

pub fn code(body: &Value) -> &str {
    body["code"].as_str().unwrap_or_default()
}
