//! Collaborator seams for the tenancy and quota pipeline.
//!
//! Each trait is one capability the pipeline consumes. `postgres` implements
//! them over sqlx; `memory` keeps everything in process for development and
//! tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::database::models::{
    ActiveSubscription, Appointment, Patient, Subscription, SubscriptionPackage, Tenant, UsageTracking,
};
use crate::database::{ClinicScoped, IsolationPredicate};
use crate::filter::{FilterData, FilterError};
use crate::quota::ResourceType;

pub mod memory;
pub mod postgres;

use memory::MemoryStore;
use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Invalid(String),

    #[error("system field '{0}' cannot be written")]
    SystemField(String),

    #[error("write outside the current clinic scope")]
    OutOfScope,

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// True iff an active membership links `user_id` to `tenant_id`.
    async fn has_access(&self, user_id: Uuid, tenant_id: Uuid) -> Result<bool, StoreError>;

    /// Tenant of the user's earliest active membership.
    async fn first_membership(&self, user_id: Uuid) -> Result<Option<Uuid>, StoreError>;
}

#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// Earliest created clinic that is not deleted.
    async fn first_tenant(&self) -> Result<Option<Uuid>, StoreError>;

    async fn owner_of(&self, tenant_id: Uuid) -> Result<Option<Uuid>, StoreError>;

    /// Create a clinic owned by `owner` together with the owner's membership.
    async fn create_tenant(&self, name: &str, owner: Uuid) -> Result<Tenant, StoreError>;

    /// Clinics the user holds an active membership in, oldest first.
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Tenant>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// The owner's subscription with status Active, regardless of end date.
    async fn active_subscription(&self, owner: Uuid) -> Result<Option<ActiveSubscription>, StoreError>;

    async fn list_packages(&self) -> Result<Vec<SubscriptionPackage>, StoreError>;

    /// Cancel the owner's active subscription, if any, and start a new one on
    /// `package_id` beginning at `now`.
    async fn subscribe(&self, owner: Uuid, package_id: Uuid, now: DateTime<Utc>) -> Result<Subscription, StoreError>;
}

#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Counter for the pair, created at zero on first access.
    async fn get_or_create(&self, subscription_id: Uuid, resource: ResourceType) -> Result<UsageTracking, StoreError>;

    async fn increment(
        &self,
        subscription_id: Uuid,
        resource: ResourceType,
        amount: i64,
    ) -> Result<UsageTracking, StoreError>;

    async fn summary(&self, subscription_id: Uuid) -> Result<Vec<UsageTracking>, StoreError>;
}

/// Row storage for one scoped entity type. Every method takes the isolation
/// predicate; there is no way to read or write without one.
#[async_trait]
pub trait RecordStore<T: ClinicScoped>: Send + Sync {
    async fn select(&self, predicate: &IsolationPredicate, filter: &FilterData) -> Result<Vec<T>, StoreError>;

    async fn select_one(&self, predicate: &IsolationPredicate, id: Uuid) -> Result<Option<T>, StoreError>;

    /// Fails with `OutOfScope` unless the predicate admits the record's tenant.
    async fn insert(&self, predicate: &IsolationPredicate, record: T) -> Result<T, StoreError>;

    /// Overwrite the visible row with the same id. `None` when no such row is visible.
    async fn replace(&self, predicate: &IsolationPredicate, record: T) -> Result<Option<T>, StoreError>;

    /// Flag the visible row deleted. `false` when no such row is visible.
    async fn soft_delete(&self, predicate: &IsolationPredicate, id: Uuid) -> Result<bool, StoreError>;
}

/// The full set of collaborators, shared by every request.
#[derive(Clone)]
pub struct Stores {
    pub memberships: Arc<dyn MembershipStore>,
    pub tenants: Arc<dyn TenantDirectory>,
    pub subscriptions: Arc<dyn SubscriptionStore>,
    pub usage: Arc<dyn UsageStore>,
    pub patients: Arc<dyn RecordStore<Patient>>,
    pub appointments: Arc<dyn RecordStore<Appointment>>,
}

impl Stores {
    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self {
            memberships: store.clone(),
            tenants: store.clone(),
            subscriptions: store.clone(),
            usage: store.clone(),
            patients: store.clone(),
            appointments: store,
        }
    }

    pub fn postgres(pool: PgPool) -> Self {
        let store = Arc::new(PgStore::new(pool));
        Self {
            memberships: store.clone(),
            tenants: store.clone(),
            subscriptions: store.clone(),
            usage: store.clone(),
            patients: store.clone(),
            appointments: store,
        }
    }
}
