use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{MembershipStore, RecordStore, StoreError, SubscriptionStore, TenantDirectory, UsageStore};
use crate::database::catalog::{self, CatalogError};
use crate::database::models::{
    ActiveSubscription, Membership, PackageLimit, QuotaLimit, Subscription, SubscriptionPackage,
    SubscriptionStatus, Tenant, UsageTracking,
};
use crate::database::{ClinicScoped, IsolationPredicate};
use crate::filter::{FilterData, FilterOrderInfo, SortDirection};
use crate::quota::ResourceType;

#[derive(Default)]
struct State {
    tenants: Vec<Tenant>,
    memberships: Vec<Membership>,
    packages: Vec<SubscriptionPackage>,
    subscriptions: Vec<Subscription>,
    usage: HashMap<(Uuid, ResourceType), UsageTracking>,
    // scoped rows keyed by table, kept as JSON so one map serves every entity
    records: HashMap<&'static str, Vec<Value>>,
}

impl State {
    fn table(&self, name: &str) -> &[Value] {
        self.records.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    fn insert_tenant(&mut self, name: &str, owner_user_id: Option<Uuid>, created_at: DateTime<Utc>) -> Tenant {
        let tenant = Tenant {
            id: Uuid::new_v4(),
            name: name.to_string(),
            owner_user_id,
            is_deleted: false,
            created_at,
        };
        self.tenants.push(tenant.clone());
        tenant
    }

    fn insert_membership(&mut self, user_id: Uuid, tenant_id: Uuid, created_at: DateTime<Utc>) -> Membership {
        let membership = Membership {
            id: Uuid::new_v4(),
            user_id,
            tenant_id,
            is_active: true,
            created_at,
        };
        self.memberships.push(membership.clone());
        membership
    }
}

/// Process-local store used when no database is configured, and by tests.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store preloaded with the built-in package catalog.
    pub fn with_default_catalog() -> Result<Self, CatalogError> {
        let state = State {
            packages: catalog::default_catalog()?,
            ..State::default()
        };
        Ok(Self {
            state: RwLock::new(state),
        })
    }

    pub async fn add_tenant(&self, name: &str, owner_user_id: Option<Uuid>) -> Tenant {
        self.add_tenant_at(name, owner_user_id, Utc::now()).await
    }

    pub async fn add_tenant_at(&self, name: &str, owner_user_id: Option<Uuid>, created_at: DateTime<Utc>) -> Tenant {
        self.state.write().await.insert_tenant(name, owner_user_id, created_at)
    }

    pub async fn add_membership(&self, user_id: Uuid, tenant_id: Uuid) -> Membership {
        self.add_membership_at(user_id, tenant_id, Utc::now()).await
    }

    pub async fn add_membership_at(&self, user_id: Uuid, tenant_id: Uuid, created_at: DateTime<Utc>) -> Membership {
        self.state.write().await.insert_membership(user_id, tenant_id, created_at)
    }

    pub async fn deactivate_membership(&self, user_id: Uuid, tenant_id: Uuid) {
        let mut state = self.state.write().await;
        for membership in state
            .memberships
            .iter_mut()
            .filter(|m| m.user_id == user_id && m.tenant_id == tenant_id)
        {
            membership.is_active = false;
        }
    }

    pub async fn add_package(&self, name: &str, limits: Vec<(ResourceType, QuotaLimit)>) -> SubscriptionPackage {
        let package = SubscriptionPackage {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: None,
            price: Default::default(),
            duration_days: 30,
            limits: limits
                .into_iter()
                .map(|(resource_type, limit_value)| PackageLimit {
                    resource_type,
                    limit_value,
                })
                .collect(),
        };
        self.state.write().await.packages.push(package.clone());
        package
    }

    pub async fn add_subscription(
        &self,
        owner_user_id: Uuid,
        package_id: Uuid,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        status: SubscriptionStatus,
    ) -> Subscription {
        let subscription = Subscription {
            id: Uuid::new_v4(),
            owner_user_id,
            package_id,
            start_date,
            end_date,
            status,
            created_at: start_date,
        };
        self.state.write().await.subscriptions.push(subscription.clone());
        subscription
    }

    pub async fn set_usage(&self, subscription_id: Uuid, resource: ResourceType, current_usage: i64) {
        let mut state = self.state.write().await;
        let row = state
            .usage
            .entry((subscription_id, resource))
            .or_insert_with(|| UsageTracking::new(subscription_id, resource));
        row.current_usage = current_usage;
        row.last_updated = Utc::now();
    }

    pub async fn usage_of(&self, subscription_id: Uuid, resource: ResourceType) -> Option<i64> {
        let state = self.state.read().await;
        state.usage.get(&(subscription_id, resource)).map(|u| u.current_usage)
    }

    /// Every stored row of `T`, soft-deleted ones included.
    pub async fn stored_records<T: ClinicScoped>(&self) -> Vec<T> {
        let state = self.state.read().await;
        state
            .table(T::TABLE)
            .iter()
            .filter_map(|value| serde_json::from_value(value.clone()).ok())
            .collect()
    }
}

#[async_trait]
impl MembershipStore for MemoryStore {
    async fn has_access(&self, user_id: Uuid, tenant_id: Uuid) -> Result<bool, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .memberships
            .iter()
            .any(|m| m.is_active && m.user_id == user_id && m.tenant_id == tenant_id))
    }

    async fn first_membership(&self, user_id: Uuid) -> Result<Option<Uuid>, StoreError> {
        let state = self.state.read().await;
        // min_by_key keeps the first of equal keys, so ties go to insertion order
        Ok(state
            .memberships
            .iter()
            .filter(|m| m.is_active && m.user_id == user_id)
            .min_by_key(|m| m.created_at)
            .map(|m| m.tenant_id))
    }
}

#[async_trait]
impl TenantDirectory for MemoryStore {
    async fn first_tenant(&self) -> Result<Option<Uuid>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .tenants
            .iter()
            .filter(|t| !t.is_deleted)
            .min_by_key(|t| t.created_at)
            .map(|t| t.id))
    }

    async fn owner_of(&self, tenant_id: Uuid) -> Result<Option<Uuid>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .tenants
            .iter()
            .find(|t| t.id == tenant_id && !t.is_deleted)
            .and_then(|t| t.owner_user_id))
    }

    async fn create_tenant(&self, name: &str, owner: Uuid) -> Result<Tenant, StoreError> {
        let mut state = self.state.write().await;
        if state.tenants.iter().any(|t| !t.is_deleted && t.name == name) {
            return Err(StoreError::Conflict(format!("Clinic '{}' already exists", name)));
        }
        let now = Utc::now();
        let tenant = state.insert_tenant(name, Some(owner), now);
        state.insert_membership(owner, tenant.id, now);
        Ok(tenant)
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Tenant>, StoreError> {
        let state = self.state.read().await;
        let mut tenants: Vec<Tenant> = state
            .tenants
            .iter()
            .filter(|t| {
                !t.is_deleted
                    && state
                        .memberships
                        .iter()
                        .any(|m| m.is_active && m.user_id == user_id && m.tenant_id == t.id)
            })
            .cloned()
            .collect();
        tenants.sort_by_key(|t| t.created_at);
        Ok(tenants)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl SubscriptionStore for MemoryStore {
    async fn active_subscription(&self, owner: Uuid) -> Result<Option<ActiveSubscription>, StoreError> {
        let state = self.state.read().await;
        let Some(subscription) = state
            .subscriptions
            .iter()
            .filter(|s| s.owner_user_id == owner && s.status == SubscriptionStatus::Active)
            .max_by_key(|s| s.start_date)
        else {
            return Ok(None);
        };

        let package = state
            .packages
            .iter()
            .find(|p| p.id == subscription.package_id)
            .ok_or_else(|| StoreError::NotFound(format!("Package {} not found", subscription.package_id)))?;

        Ok(Some(ActiveSubscription {
            subscription: subscription.clone(),
            package_name: package.name.clone(),
            limits: package.limits.clone(),
        }))
    }

    async fn list_packages(&self) -> Result<Vec<SubscriptionPackage>, StoreError> {
        let state = self.state.read().await;
        let mut packages = state.packages.clone();
        packages.sort_by(|a, b| a.price.cmp(&b.price).then_with(|| a.name.cmp(&b.name)));
        Ok(packages)
    }

    async fn subscribe(&self, owner: Uuid, package_id: Uuid, now: DateTime<Utc>) -> Result<Subscription, StoreError> {
        let mut state = self.state.write().await;
        let duration_days = state
            .packages
            .iter()
            .find(|p| p.id == package_id)
            .map(|p| p.duration_days)
            .ok_or_else(|| StoreError::NotFound(format!("Package {} not found", package_id)))?;

        for previous in state
            .subscriptions
            .iter_mut()
            .filter(|s| s.owner_user_id == owner && s.status == SubscriptionStatus::Active)
        {
            previous.status = SubscriptionStatus::Cancelled;
        }

        let subscription = Subscription {
            id: Uuid::new_v4(),
            owner_user_id: owner,
            package_id,
            start_date: now,
            end_date: now + Duration::days(i64::from(duration_days)),
            status: SubscriptionStatus::Active,
            created_at: now,
        };
        state.subscriptions.push(subscription.clone());
        Ok(subscription)
    }
}

#[async_trait]
impl UsageStore for MemoryStore {
    async fn get_or_create(&self, subscription_id: Uuid, resource: ResourceType) -> Result<UsageTracking, StoreError> {
        let mut state = self.state.write().await;
        Ok(state
            .usage
            .entry((subscription_id, resource))
            .or_insert_with(|| UsageTracking::new(subscription_id, resource))
            .clone())
    }

    async fn increment(
        &self,
        subscription_id: Uuid,
        resource: ResourceType,
        amount: i64,
    ) -> Result<UsageTracking, StoreError> {
        let mut state = self.state.write().await;
        let row = state
            .usage
            .entry((subscription_id, resource))
            .or_insert_with(|| UsageTracking::new(subscription_id, resource));
        row.current_usage += amount;
        row.last_updated = Utc::now();
        Ok(row.clone())
    }

    async fn summary(&self, subscription_id: Uuid) -> Result<Vec<UsageTracking>, StoreError> {
        let state = self.state.read().await;
        let mut rows: Vec<UsageTracking> = state
            .usage
            .values()
            .filter(|u| u.subscription_id == subscription_id)
            .cloned()
            .collect();
        rows.sort_by_key(|u| u.resource_type.as_str());
        Ok(rows)
    }
}

#[async_trait]
impl<T: ClinicScoped> RecordStore<T> for MemoryStore {
    async fn select(&self, predicate: &IsolationPredicate, filter: &FilterData) -> Result<Vec<T>, StoreError> {
        let page = filter.page()?;
        let state = self.state.read().await;

        let mut rows = Vec::new();
        for value in state.table(T::TABLE) {
            let row: T = serde_json::from_value(value.clone())?;
            if predicate.matches(&row) {
                rows.push((value, row));
            }
        }
        rows.sort_by(|(a, _), (b, _)| compare_rows(a, b, &page.order));

        Ok(rows
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .map(|(_, row)| row)
            .collect())
    }

    async fn select_one(&self, predicate: &IsolationPredicate, id: Uuid) -> Result<Option<T>, StoreError> {
        let state = self.state.read().await;
        for value in state.table(T::TABLE) {
            let row: T = serde_json::from_value(value.clone())?;
            if row.id() == id && predicate.matches(&row) {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    async fn insert(&self, predicate: &IsolationPredicate, record: T) -> Result<T, StoreError> {
        if !predicate.admits_write(record.tenant_id()) {
            return Err(StoreError::OutOfScope);
        }

        let mut state = self.state.write().await;
        let rows = state.records.entry(T::TABLE).or_default();
        let id = serde_json::Value::String(record.id().to_string());
        if rows.iter().any(|row| row.get("id") == Some(&id)) {
            return Err(StoreError::Conflict(format!("{} {} already exists", T::LABEL, record.id())));
        }
        rows.push(serde_json::to_value(&record)?);
        Ok(record)
    }

    async fn replace(&self, predicate: &IsolationPredicate, record: T) -> Result<Option<T>, StoreError> {
        let mut state = self.state.write().await;
        let Some(rows) = state.records.get_mut(T::TABLE) else {
            return Ok(None);
        };

        for slot in rows.iter_mut() {
            let current: T = serde_json::from_value(slot.clone())?;
            if current.id() != record.id() || !predicate.matches(&current) {
                continue;
            }
            if current.tenant_id() != record.tenant_id() {
                return Err(StoreError::OutOfScope);
            }
            *slot = serde_json::to_value(&record)?;
            return Ok(Some(record));
        }
        Ok(None)
    }

    async fn soft_delete(&self, predicate: &IsolationPredicate, id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let Some(rows) = state.records.get_mut(T::TABLE) else {
            return Ok(false);
        };

        for slot in rows.iter_mut() {
            let mut current: T = serde_json::from_value(slot.clone())?;
            if current.id() == id && predicate.matches(&current) {
                current.mark_deleted(Utc::now());
                *slot = serde_json::to_value(&current)?;
                return Ok(true);
            }
        }
        Ok(false)
    }
}

fn compare_rows(a: &Value, b: &Value, order: &[FilterOrderInfo]) -> Ordering {
    for info in order {
        let ordering = compare_values(a.get(&info.column), b.get(&info.column));
        let ordering = match info.sort {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => {
            // timestamps compare by instant, not by their text
            match (x.parse::<DateTime<Utc>>(), y.parse::<DateTime<Utc>>()) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                _ => x.cmp(y),
            }
        }
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn usage_rows_are_created_lazily_at_zero() {
        let store = MemoryStore::new();
        let sub = Uuid::new_v4();
        assert_eq!(store.usage_of(sub, ResourceType::Patients).await, None);

        let row = store.get_or_create(sub, ResourceType::Patients).await.unwrap();
        assert_eq!(row.current_usage, 0);
        assert_eq!(store.usage_of(sub, ResourceType::Patients).await, Some(0));

        let row = store.increment(sub, ResourceType::Patients, 1).await.unwrap();
        assert_eq!(row.current_usage, 1);
        assert_eq!(store.summary(sub).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn subscribe_cancels_previous_active_subscription() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let basic = store.add_package("Basic", vec![]).await;
        let pro = store.add_package("Pro", vec![(ResourceType::Patients, QuotaLimit::Bounded(10))]).await;
        let now = Utc::now();

        let first = store.subscribe(owner, basic.id, now).await.unwrap();
        let second = store.subscribe(owner, pro.id, now).await.unwrap();
        assert_eq!(second.end_date, now + Duration::days(30));

        let active = store.active_subscription(owner).await.unwrap().unwrap();
        assert_eq!(active.subscription.id, second.id);
        assert_ne!(active.subscription.id, first.id);
        assert_eq!(active.limit_for(ResourceType::Patients), Some(QuotaLimit::Bounded(10)));
    }

    #[tokio::test]
    async fn subscribe_to_unknown_package_is_not_found() {
        let store = MemoryStore::new();
        let result = store.subscribe(Uuid::new_v4(), Uuid::new_v4(), Utc::now()).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn created_clinic_comes_with_owner_membership() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let clinic = store.create_tenant("Riverside", owner).await.unwrap();

        assert!(store.has_access(owner, clinic.id).await.unwrap());
        assert_eq!(store.owner_of(clinic.id).await.unwrap(), Some(owner));
        assert_eq!(store.list_for_user(owner).await.unwrap().len(), 1);
        assert!(matches!(
            store.create_tenant("Riverside", Uuid::new_v4()).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn default_catalog_is_loaded() {
        let store = MemoryStore::with_default_catalog().unwrap();
        assert!(!store.list_packages().await.unwrap().is_empty());
    }

    #[test]
    fn timestamps_order_by_instant() {
        let earlier = Value::String("2024-01-01T00:00:00.5Z".to_string());
        let later = Value::String("2024-01-01T00:00:01Z".to_string());
        assert_eq!(compare_values(Some(&earlier), Some(&later)), Ordering::Less);
        assert_eq!(compare_values(None, Some(&later)), Ordering::Less);
    }
}
