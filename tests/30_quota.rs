mod common;

use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use clinic_api::auth::Role;
use clinic_api::config::{AppConfig, Environment};
use clinic_api::database::models::{QuotaLimit, UsageTracking};
use clinic_api::quota::ResourceType;
use clinic_api::store::memory::MemoryStore;
use clinic_api::store::{StoreError, Stores, UsageStore};
use common::{code, patient_body, TestApp};

fn patients(limit: i64) -> Vec<(ResourceType, QuotaLimit)> {
    vec![(ResourceType::Patients, QuotaLimit::from(limit))]
}

#[tokio::test]
async fn creation_at_the_limit_is_rejected_without_counting() {
    let app = TestApp::new();
    let owner = Uuid::new_v4();
    app.clinic_owned_by("Full House", owner).await;
    let subscription = app.subscribe(owner, patients(5)).await;
    app.store.set_usage(subscription.id, ResourceType::Patients, 5).await;

    let token = app.token(owner, Role::ClinicManager, None);
    let (status, body) = app.post("/api/patients", &token, patient_body("Overflow")).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(code(&body), "SUBSCRIPTION_LIMIT_EXCEEDED");
    assert_eq!(app.store.usage_of(subscription.id, ResourceType::Patients).await, Some(5));
    assert!(app.store.stored_records::<clinic_api::database::models::Patient>().await.is_empty());
}

#[tokio::test]
async fn successful_creation_below_the_limit_counts_once() {
    let app = TestApp::new();
    let owner = Uuid::new_v4();
    app.clinic_owned_by("Almost Full", owner).await;
    let subscription = app.subscribe(owner, patients(5)).await;
    app.store.set_usage(subscription.id, ResourceType::Patients, 4).await;

    let token = app.token(owner, Role::ClinicManager, None);
    let (status, _) = app.post("/api/patients", &token, patient_body("Last")).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(app.store.usage_of(subscription.id, ResourceType::Patients).await, Some(5));

    let (status, body) = app.post("/api/patients", &token, patient_body("One Too Many")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(code(&body), "SUBSCRIPTION_LIMIT_EXCEEDED");
}

#[tokio::test]
async fn failed_creation_is_not_counted() {
    let app = TestApp::new();
    let owner = Uuid::new_v4();
    app.clinic_owned_by("Strict", owner).await;
    let subscription = app.subscribe(owner, patients(5)).await;
    app.store.set_usage(subscription.id, ResourceType::Patients, 4).await;

    let token = app.token(owner, Role::Receptionist, None);
    let (status, body) = app
        .post("/api/patients", &token, json!({"first_name": "  ", "last_name": "Blank"}))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(code(&body), "VALIDATION_ERROR");
    assert_eq!(app.store.usage_of(subscription.id, ResourceType::Patients).await, Some(4));
}

#[tokio::test]
async fn first_creation_starts_the_counter_at_one() {
    let app = TestApp::new();
    let owner = Uuid::new_v4();
    app.clinic_owned_by("Fresh", owner).await;
    let subscription = app.subscribe(owner, patients(100)).await;

    let token = app.token(owner, Role::Doctor, None);
    let (status, _) = app.post("/api/patients", &token, patient_body("First")).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(app.store.usage_of(subscription.id, ResourceType::Patients).await, Some(1));
}

#[tokio::test]
async fn unlimited_plan_never_rejects() {
    let app = TestApp::new();
    let owner = Uuid::new_v4();
    app.clinic_owned_by("Enterprise", owner).await;
    let subscription = app.subscribe(owner, patients(-1)).await;
    app.store.set_usage(subscription.id, ResourceType::Patients, 1_000_000).await;

    let token = app.token(owner, Role::Doctor, None);
    let (status, _) = app.post("/api/patients", &token, patient_body("Another")).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        app.store.usage_of(subscription.id, ResourceType::Patients).await,
        Some(1_000_001)
    );
}

#[tokio::test]
async fn staff_are_governed_by_the_owners_subscription() {
    let app = TestApp::new();
    let owner = Uuid::new_v4();
    let clinic = app.clinic_owned_by("Shared", owner).await;
    let subscription = app.subscribe(owner, patients(2)).await;
    app.store.set_usage(subscription.id, ResourceType::Patients, 2).await;

    let nurse = Uuid::new_v4();
    app.store.add_membership(nurse, clinic.id).await;
    let token = app.token(nurse, Role::Nurse, None);
    let (status, body) = app.post("/api/patients", &token, patient_body("Blocked")).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(code(&body), "SUBSCRIPTION_LIMIT_EXCEEDED");
}

#[tokio::test]
async fn missing_subscription_blocks_mutations_only() {
    let app = TestApp::new();
    let owner = Uuid::new_v4();
    app.clinic_owned_by("Unpaid", owner).await;
    let token = app.token(owner, Role::ClinicManager, None);

    let (status, body) = app.post("/api/patients", &token, patient_body("Nobody")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(code(&body), "SUBSCRIPTION_NO_ACTIVE");

    let (status, _) = app.get("/api/patients", &token).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn expired_subscription_has_its_own_code() {
    let app = TestApp::new();
    let owner = Uuid::new_v4();
    app.clinic_owned_by("Lapsed", owner).await;
    app.subscribe_until(owner, patients(100), Utc::now() - Duration::days(1)).await;

    let token = app.token(owner, Role::ClinicManager, None);
    let (status, body) = app.post("/api/patients", &token, patient_body("Late")).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(code(&body), "SUBSCRIPTION_EXPIRED");
}

#[tokio::test]
async fn expired_subscription_blocks_every_mutation() {
    let app = TestApp::new();
    let owner = Uuid::new_v4();
    app.clinic_owned_by("Archive", owner).await;
    app.subscribe_until(owner, patients(100), Utc::now() - Duration::days(1)).await;
    let token = app.token(owner, Role::Doctor, None);

    // refused before the handler could answer 404
    let uri = format!("/api/patients/{}", Uuid::new_v4());
    let (status, body) = app
        .send(Method::PATCH, &uri, Some(&token), Some(json!({"phone": "555"})))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(code(&body), "SUBSCRIPTION_EXPIRED");

    let (status, body) = app.send(Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(code(&body), "SUBSCRIPTION_EXPIRED");

    let (status, _) = app.get(&uri, &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn exempt_paths_are_not_checked() {
    let app = TestApp::new();
    let owner = Uuid::new_v4();
    let package = app.store.add_package("Starter", patients(100)).await;
    let token = app.token(owner, Role::ClinicManager, None);

    let (status, body) = app
        .post("/api/subscriptions", &token, json!({"package_id": package.id}))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["status"], "Active");
}

#[tokio::test]
async fn undeclared_resource_types_are_untracked() {
    let app = TestApp::new();
    let owner = Uuid::new_v4();
    app.clinic_owned_by("Patients Only", owner).await;
    let subscription = app.subscribe(owner, patients(10)).await;
    let token = app.token(owner, Role::Doctor, None);

    let (_, patient) = app.post("/api/patients", &token, patient_body("Booked")).await;
    let (status, body) = app
        .post(
            "/api/appointments",
            &token,
            json!({"patient_id": patient["data"]["id"], "scheduled_at": "2031-03-01T10:00:00Z"}),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(app.store.usage_of(subscription.id, ResourceType::Appointments).await, None);
    assert_eq!(app.store.usage_of(subscription.id, ResourceType::Patients).await, Some(1));
}

#[tokio::test]
async fn clinic_creation_is_counted_against_the_creator() {
    let app = TestApp::new();
    let founder = Uuid::new_v4();
    let subscription = app
        .subscribe(founder, vec![(ResourceType::Clinics, QuotaLimit::from(1))])
        .await;
    let token = app.token(founder, Role::ClinicManager, None);

    let (status, body) = app.post("/api/clinics", &token, json!({"name": "Founders"})).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(app.store.usage_of(subscription.id, ResourceType::Clinics).await, Some(1));

    let (status, body) = app.post("/api/clinics", &token, json!({"name": "Second Site"})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(code(&body), "SUBSCRIPTION_LIMIT_EXCEEDED");
}

#[tokio::test]
async fn disabled_quota_admits_everything() {
    let mut config = AppConfig::for_environment(Environment::Development);
    config.quota.enabled = false;
    let app = TestApp::with_config(config);
    let owner = Uuid::new_v4();
    app.clinic_owned_by("Free", owner).await;

    let token = app.token(owner, Role::Doctor, None);
    let (status, _) = app.post("/api/patients", &token, patient_body("Gratis")).await;
    assert_eq!(status, StatusCode::CREATED);
}

/// Reads from the memory store, but every increment fails.
struct StuckCounter(Arc<MemoryStore>);

#[async_trait]
impl UsageStore for StuckCounter {
    async fn get_or_create(&self, subscription_id: Uuid, resource: ResourceType) -> Result<UsageTracking, StoreError> {
        self.0.get_or_create(subscription_id, resource).await
    }

    async fn increment(&self, _: Uuid, _: ResourceType, _: i64) -> Result<UsageTracking, StoreError> {
        Err(StoreError::Conflict("usage row locked".to_string()))
    }

    async fn summary(&self, subscription_id: Uuid) -> Result<Vec<UsageTracking>, StoreError> {
        self.0.summary(subscription_id).await
    }
}

#[tokio::test]
async fn failed_usage_update_does_not_fail_the_creation() {
    let store = Arc::new(MemoryStore::new());
    let mut stores = Stores::memory(store.clone());
    stores.usage = Arc::new(StuckCounter(store.clone()));
    let app = TestApp::with_stores(AppConfig::for_environment(Environment::Development), store, stores);

    let owner = Uuid::new_v4();
    app.clinic_owned_by("Resilient", owner).await;
    let subscription = app.subscribe(owner, patients(5)).await;
    app.store.set_usage(subscription.id, ResourceType::Patients, 1).await;

    let token = app.token(owner, Role::Receptionist, None);
    let (status, body) = app.post("/api/patients", &token, patient_body("Kept")).await;

    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(app.store.stored_records::<clinic_api::database::models::Patient>().await.len(), 1);
    assert_eq!(app.store.usage_of(subscription.id, ResourceType::Patients).await, Some(1));
}

#[tokio::test]
async fn staff_clinic_creation_uses_their_own_plan() {
    let app = TestApp::new();
    let owner = Uuid::new_v4();
    let clinic = app.clinic_owned_by("Main Street", owner).await;
    let owners_plan = app
        .subscribe(owner, vec![(ResourceType::Clinics, QuotaLimit::from(5))])
        .await;

    let manager = Uuid::new_v4();
    app.store.add_membership(manager, clinic.id).await;
    let managers_plan = app
        .subscribe(manager, vec![(ResourceType::Clinics, QuotaLimit::from(1))])
        .await;

    let token = app.token(manager, Role::ClinicManager, None);
    let (status, body) = app.post("/api/clinics", &token, json!({"name": "Branch"})).await;

    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(app.store.usage_of(managers_plan.id, ResourceType::Clinics).await, Some(1));
    assert_eq!(app.store.usage_of(owners_plan.id, ResourceType::Clinics).await, None);
}
