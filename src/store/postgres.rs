use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{FromRow, PgPool, Postgres, Row};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

use super::{MembershipStore, RecordStore, StoreError, SubscriptionStore, TenantDirectory, UsageStore};
use crate::database::models::{
    ActiveSubscription, PackageLimit, QuotaLimit, Subscription, SubscriptionPackage, SubscriptionStatus, Tenant,
    UsageTracking,
};
use crate::database::{ClinicScoped, IsolationPredicate};
use crate::filter::{Filter, FilterData, SqlParam, SqlResult};
use crate::quota::ResourceType;

/// Columns `replace` never writes: identity and tenant are fixed at creation,
/// deletion goes through `soft_delete`.
const REPLACE_SKIPPED: &[&str] = &["id", "tenant_id", "is_deleted", "created_at"];

#[derive(FromRow)]
struct SubscriptionRow {
    id: Uuid,
    owner_user_id: Uuid,
    package_id: Uuid,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = StoreError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        Ok(Subscription {
            id: row.id,
            owner_user_id: row.owner_user_id,
            package_id: row.package_id,
            start_date: row.start_date,
            end_date: row.end_date,
            status: parse_column("subscriptions.status", &row.status)?,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct ActiveRow {
    #[sqlx(flatten)]
    subscription: SubscriptionRow,
    package_name: String,
}

#[derive(FromRow)]
struct PackageRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    price: Decimal,
    duration_days: i32,
}

#[derive(FromRow)]
struct LimitRow {
    package_id: Uuid,
    resource_type: String,
    limit_value: i64,
}

impl TryFrom<LimitRow> for PackageLimit {
    type Error = StoreError;

    fn try_from(row: LimitRow) -> Result<Self, Self::Error> {
        Ok(PackageLimit {
            resource_type: parse_column("package_limits.resource_type", &row.resource_type)?,
            limit_value: QuotaLimit::from(row.limit_value),
        })
    }
}

#[derive(FromRow)]
struct UsageRow {
    id: Uuid,
    subscription_id: Uuid,
    resource_type: String,
    current_usage: i64,
    last_updated: DateTime<Utc>,
}

impl TryFrom<UsageRow> for UsageTracking {
    type Error = StoreError;

    fn try_from(row: UsageRow) -> Result<Self, Self::Error> {
        Ok(UsageTracking {
            id: row.id,
            subscription_id: row.subscription_id,
            resource_type: parse_column("usage_tracking.resource_type", &row.resource_type)?,
            current_usage: row.current_usage,
            last_updated: row.last_updated,
        })
    }
}

/// sqlx-backed implementation of every store trait over one shared pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert or update a package by name and replace its limits.
    pub async fn import_package(&self, package: &SubscriptionPackage) -> Result<Uuid, StoreError> {
        let mut tx = self.pool.begin().await?;

        let package_id: Uuid = sqlx::query_scalar(
            "INSERT INTO subscription_packages (id, name, description, price, duration_days)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (name) DO UPDATE
             SET description = EXCLUDED.description,
                 price = EXCLUDED.price,
                 duration_days = EXCLUDED.duration_days
             RETURNING id",
        )
        .bind(package.id)
        .bind(&package.name)
        .bind(&package.description)
        .bind(package.price)
        .bind(package.duration_days)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM package_limits WHERE package_id = $1")
            .bind(package_id)
            .execute(&mut *tx)
            .await?;

        for limit in &package.limits {
            sqlx::query("INSERT INTO package_limits (package_id, resource_type, limit_value) VALUES ($1, $2, $3)")
                .bind(package_id)
                .bind(limit.resource_type.as_str())
                .bind(i64::from(limit.limit_value))
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(package_id)
    }

    async fn fetch_json_rows(&self, sql: SqlResult) -> Result<Vec<Value>, StoreError> {
        let SqlResult { query: text, params } = sql;
        let mut query = sqlx::query(&text);
        for param in params {
            query = bind_param(query, param);
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(json_column).collect()
    }

    async fn limits_for(&self, package_id: Uuid) -> Result<Vec<PackageLimit>, StoreError> {
        let rows: Vec<LimitRow> = sqlx::query_as(
            "SELECT package_id, resource_type, limit_value FROM package_limits
             WHERE package_id = $1 ORDER BY resource_type",
        )
        .bind(package_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(PackageLimit::try_from).collect()
    }
}

fn bind_param<'q>(query: Query<'q, Postgres, PgArguments>, param: SqlParam) -> Query<'q, Postgres, PgArguments> {
    match param {
        SqlParam::Uuid(v) => query.bind(v),
        SqlParam::Bool(v) => query.bind(v),
        SqlParam::Int(v) => query.bind(v),
        SqlParam::Text(v) => query.bind(v),
        SqlParam::Json(v) => query.bind(v),
    }
}

fn json_column(row: &PgRow) -> Result<Value, StoreError> {
    Ok(row.try_get::<Value, _>("row")?)
}

fn parse_column<T: FromStr<Err = String>>(column: &str, raw: &str) -> Result<T, StoreError> {
    raw.parse()
        .map_err(|e| StoreError::Invalid(format!("bad value in {}: {}", column, e)))
}

fn map_write_error(err: sqlx::Error, what: &str) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return StoreError::Conflict(format!("{} already exists", what));
        }
        if db.is_foreign_key_violation() {
            return StoreError::Invalid(format!("{} references a missing record", what));
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl MembershipStore for PgStore {
    async fn has_access(&self, user_id: Uuid, tenant_id: Uuid) -> Result<bool, StoreError> {
        let allowed: bool = sqlx::query_scalar(
            "SELECT EXISTS (
                SELECT 1 FROM memberships m
                JOIN clinics c ON c.id = m.tenant_id
                WHERE m.user_id = $1 AND m.tenant_id = $2
                  AND m.is_active AND NOT c.is_deleted
             )",
        )
        .bind(user_id)
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(allowed)
    }

    async fn first_membership(&self, user_id: Uuid) -> Result<Option<Uuid>, StoreError> {
        let tenant_id = sqlx::query_scalar(
            "SELECT m.tenant_id FROM memberships m
             JOIN clinics c ON c.id = m.tenant_id
             WHERE m.user_id = $1 AND m.is_active AND NOT c.is_deleted
             ORDER BY m.created_at, m.id
             LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(tenant_id)
    }
}

#[async_trait]
impl TenantDirectory for PgStore {
    async fn first_tenant(&self) -> Result<Option<Uuid>, StoreError> {
        let tenant_id = sqlx::query_scalar(
            "SELECT id FROM clinics WHERE NOT is_deleted ORDER BY created_at, id LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(tenant_id)
    }

    async fn owner_of(&self, tenant_id: Uuid) -> Result<Option<Uuid>, StoreError> {
        let owner: Option<Option<Uuid>> =
            sqlx::query_scalar("SELECT owner_user_id FROM clinics WHERE id = $1 AND NOT is_deleted")
                .bind(tenant_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(owner.flatten())
    }

    async fn create_tenant(&self, name: &str, owner: Uuid) -> Result<Tenant, StoreError> {
        let mut tx = self.pool.begin().await?;

        let tenant: Tenant = sqlx::query_as(
            "INSERT INTO clinics (id, name, owner_user_id) VALUES ($1, $2, $3)
             RETURNING id, name, owner_user_id, is_deleted, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(owner)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_write_error(e, &format!("Clinic '{}'", name)))?;

        sqlx::query("INSERT INTO memberships (id, user_id, tenant_id) VALUES ($1, $2, $3)")
            .bind(Uuid::new_v4())
            .bind(owner)
            .bind(tenant.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(tenant)
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Tenant>, StoreError> {
        let tenants = sqlx::query_as(
            "SELECT c.id, c.name, c.owner_user_id, c.is_deleted, c.created_at
             FROM clinics c
             JOIN memberships m ON m.tenant_id = c.id
             WHERE m.user_id = $1 AND m.is_active AND NOT c.is_deleted
             ORDER BY c.created_at, c.id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tenants)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl SubscriptionStore for PgStore {
    async fn active_subscription(&self, owner: Uuid) -> Result<Option<ActiveSubscription>, StoreError> {
        let row: Option<ActiveRow> = sqlx::query_as(
            "SELECT s.id, s.owner_user_id, s.package_id, s.start_date, s.end_date, s.status, s.created_at,
                    p.name AS package_name
             FROM subscriptions s
             JOIN subscription_packages p ON p.id = s.package_id
             WHERE s.owner_user_id = $1 AND s.status = 'Active'
             ORDER BY s.start_date DESC
             LIMIT 1",
        )
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let subscription = Subscription::try_from(row.subscription)?;
        let limits = self.limits_for(subscription.package_id).await?;

        Ok(Some(ActiveSubscription {
            subscription,
            package_name: row.package_name,
            limits,
        }))
    }

    async fn list_packages(&self) -> Result<Vec<SubscriptionPackage>, StoreError> {
        let packages: Vec<PackageRow> = sqlx::query_as(
            "SELECT id, name, description, price, duration_days FROM subscription_packages ORDER BY price, name",
        )
        .fetch_all(&self.pool)
        .await?;

        let limit_rows: Vec<LimitRow> = sqlx::query_as(
            "SELECT package_id, resource_type, limit_value FROM package_limits ORDER BY resource_type",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut limits: HashMap<Uuid, Vec<PackageLimit>> = HashMap::new();
        for row in limit_rows {
            let package_id = row.package_id;
            limits.entry(package_id).or_default().push(PackageLimit::try_from(row)?);
        }

        Ok(packages
            .into_iter()
            .map(|p| SubscriptionPackage {
                limits: limits.remove(&p.id).unwrap_or_default(),
                id: p.id,
                name: p.name,
                description: p.description,
                price: p.price,
                duration_days: p.duration_days,
            })
            .collect())
    }

    async fn subscribe(&self, owner: Uuid, package_id: Uuid, now: DateTime<Utc>) -> Result<Subscription, StoreError> {
        let mut tx = self.pool.begin().await?;

        let duration_days: i32 = sqlx::query_scalar("SELECT duration_days FROM subscription_packages WHERE id = $1")
            .bind(package_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("Package {} not found", package_id)))?;

        sqlx::query("UPDATE subscriptions SET status = 'Cancelled' WHERE owner_user_id = $1 AND status = 'Active'")
            .bind(owner)
            .execute(&mut *tx)
            .await?;

        let row: SubscriptionRow = sqlx::query_as(
            "INSERT INTO subscriptions (id, owner_user_id, package_id, start_date, end_date, status, created_at)
             VALUES ($1, $2, $3, $4, $5, 'Active', $4)
             RETURNING id, owner_user_id, package_id, start_date, end_date, status, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(owner)
        .bind(package_id)
        .bind(now)
        .bind(now + Duration::days(i64::from(duration_days)))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_write_error(e, "Active subscription"))?;

        tx.commit().await?;
        Subscription::try_from(row)
    }
}

#[async_trait]
impl UsageStore for PgStore {
    async fn get_or_create(&self, subscription_id: Uuid, resource: ResourceType) -> Result<UsageTracking, StoreError> {
        sqlx::query(
            "INSERT INTO usage_tracking (id, subscription_id, resource_type, current_usage, last_updated)
             VALUES ($1, $2, $3, 0, now())
             ON CONFLICT (subscription_id, resource_type) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(subscription_id)
        .bind(resource.as_str())
        .execute(&self.pool)
        .await?;

        let row: UsageRow = sqlx::query_as(
            "SELECT id, subscription_id, resource_type, current_usage, last_updated
             FROM usage_tracking WHERE subscription_id = $1 AND resource_type = $2",
        )
        .bind(subscription_id)
        .bind(resource.as_str())
        .fetch_one(&self.pool)
        .await?;
        UsageTracking::try_from(row)
    }

    async fn increment(
        &self,
        subscription_id: Uuid,
        resource: ResourceType,
        amount: i64,
    ) -> Result<UsageTracking, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row: UsageRow = sqlx::query_as(
            "INSERT INTO usage_tracking (id, subscription_id, resource_type, current_usage, last_updated)
             VALUES ($1, $2, $3, $4, now())
             ON CONFLICT (subscription_id, resource_type) DO UPDATE
             SET current_usage = usage_tracking.current_usage + EXCLUDED.current_usage,
                 last_updated = now()
             RETURNING id, subscription_id, resource_type, current_usage, last_updated",
        )
        .bind(Uuid::new_v4())
        .bind(subscription_id)
        .bind(resource.as_str())
        .bind(amount)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        UsageTracking::try_from(row)
    }

    async fn summary(&self, subscription_id: Uuid) -> Result<Vec<UsageTracking>, StoreError> {
        let rows: Vec<UsageRow> = sqlx::query_as(
            "SELECT id, subscription_id, resource_type, current_usage, last_updated
             FROM usage_tracking WHERE subscription_id = $1 ORDER BY resource_type",
        )
        .bind(subscription_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(UsageTracking::try_from).collect()
    }
}

#[async_trait]
impl<T: ClinicScoped> RecordStore<T> for PgStore {
    async fn select(&self, predicate: &IsolationPredicate, filter: &FilterData) -> Result<Vec<T>, StoreError> {
        let mut query = Filter::new(T::TABLE, *predicate)?;
        query.assign(filter)?;

        let rows = self.fetch_json_rows(query.to_sql()).await?;
        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(StoreError::from))
            .collect()
    }

    async fn select_one(&self, predicate: &IsolationPredicate, id: Uuid) -> Result<Option<T>, StoreError> {
        let mut query = Filter::new(T::TABLE, *predicate)?;
        query.where_eq("id", SqlParam::Uuid(id))?;

        let rows = self.fetch_json_rows(query.to_sql()).await?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(serde_json::from_value(row)?)),
            None => Ok(None),
        }
    }

    async fn insert(&self, predicate: &IsolationPredicate, record: T) -> Result<T, StoreError> {
        if !predicate.admits_write(record.tenant_id()) {
            return Err(StoreError::OutOfScope);
        }

        let sql = Filter::insert_sql(T::TABLE)?;
        let row = sqlx::query(&sql)
            .bind(serde_json::to_value(&record)?)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_write_error(e, T::LABEL))?;
        Ok(serde_json::from_value(json_column(&row)?)?)
    }

    async fn replace(&self, predicate: &IsolationPredicate, record: T) -> Result<Option<T>, StoreError> {
        let document = serde_json::to_value(&record)?;
        let columns: Vec<String> = match &document {
            Value::Object(map) => map
                .keys()
                .filter(|k| !REPLACE_SKIPPED.contains(&k.as_str()))
                .cloned()
                .collect(),
            _ => return Err(StoreError::Invalid(format!("{} is not an object", T::LABEL))),
        };

        let mut query = Filter::new(T::TABLE, *predicate)?;
        query.where_eq("id", SqlParam::Uuid(record.id()))?;
        // tenant_id is never in the SET list; pinning it here refuses a moved row
        query.where_eq("tenant_id", SqlParam::Uuid(record.tenant_id()))?;

        let mut sql = query.to_replace_sql(&columns)?;
        sql.params[0] = SqlParam::Json(document);

        let rows = self
            .fetch_json_rows(sql)
            .await
            .map_err(|e| match e {
                StoreError::Database(db) => map_write_error(db, T::LABEL),
                other => other,
            })?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(serde_json::from_value(row)?)),
            None => Ok(None),
        }
    }

    async fn soft_delete(&self, predicate: &IsolationPredicate, id: Uuid) -> Result<bool, StoreError> {
        let mut query = Filter::new(T::TABLE, *predicate)?;
        query.where_eq("id", SqlParam::Uuid(id))?;

        let SqlResult { query: text, params } = query.to_soft_delete_sql();
        let mut statement = sqlx::query(&text);
        for param in params {
            statement = bind_param(statement, param);
        }
        let result = statement.execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }
}
