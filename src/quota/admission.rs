use axum::http::{Method, StatusCode};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use super::resource::{path_has_prefix, resource_for_path, ResourceType};
use crate::config::QuotaConfig;
use crate::database::models::QuotaLimit;
use crate::store::{StoreError, SubscriptionStore, TenantDirectory, UsageStore};
use crate::tenancy::TenantContext;

#[derive(Debug, Error)]
pub enum QuotaError {
    #[error("no active subscription")]
    NoActiveSubscription,

    #[error("subscription ended at {ended_at}")]
    SubscriptionExpired { ended_at: DateTime<Utc> },

    #[error("{resource} limit of {limit} reached (current usage {usage})")]
    LimitExceeded {
        resource: ResourceType,
        limit: i64,
        usage: i64,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of the pre-check. Carried through the request so the post-commit
/// step knows which counter, if any, to bump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Quota disabled, exempt path, or a non-mutating method.
    Exempt,
    /// No identity on the request; quota only applies to authenticated actors.
    Unauthenticated,
    /// Subscription is live. `tracked` is set for a creation against a
    /// resource type the plan declares.
    Admitted {
        subscription_id: Uuid,
        tracked: Option<ResourceType>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageEntry {
    pub resource_type: ResourceType,
    pub current_usage: i64,
    pub limit: QuotaLimit,
    pub remaining: Option<i64>,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageReport {
    pub subscription_id: Uuid,
    pub package_name: String,
    pub end_date: DateTime<Utc>,
    pub resources: Vec<UsageEntry>,
}

/// Check-before / increment-after gate around mutating requests.
///
/// The check and the increment are separate store calls, so concurrent
/// creations racing at `limit - 1` can overshoot the limit. Usage is a
/// throttle, not a hard cap.
pub struct QuotaAdmission {
    subscriptions: Arc<dyn SubscriptionStore>,
    tenants: Arc<dyn TenantDirectory>,
    usage: Arc<dyn UsageStore>,
    enabled: bool,
    exempt_prefixes: Vec<String>,
}

impl QuotaAdmission {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionStore>,
        tenants: Arc<dyn TenantDirectory>,
        usage: Arc<dyn UsageStore>,
        config: &QuotaConfig,
    ) -> Self {
        Self {
            subscriptions,
            tenants,
            usage,
            enabled: config.enabled,
            exempt_prefixes: config.exempt_prefixes.clone(),
        }
    }

    pub fn is_exempt(&self, path: &str) -> bool {
        self.exempt_prefixes.iter().any(|prefix| path_has_prefix(path, prefix))
    }

    pub async fn check(&self, ctx: &TenantContext, method: &Method, path: &str) -> Result<Admission, QuotaError> {
        self.check_at(ctx, method, path, Utc::now()).await
    }

    pub async fn check_at(
        &self,
        ctx: &TenantContext,
        method: &Method,
        path: &str,
        now: DateTime<Utc>,
    ) -> Result<Admission, QuotaError> {
        if !self.enabled || !is_mutating(method) || self.is_exempt(path) {
            return Ok(Admission::Exempt);
        }
        let resource = resource_for_path(path).filter(|_| *method == Method::POST);
        let owner = match resource {
            // the creator owns the new clinic, so it is counted against them
            Some(ResourceType::Clinics) => ctx.user_id(),
            _ => self.owner_for(ctx).await?,
        };
        let Some(owner) = owner else {
            return Ok(Admission::Unauthenticated);
        };

        let Some(active) = self.subscriptions.active_subscription(owner).await? else {
            tracing::warn!("{} {} refused: owner {} has no active subscription", method, path, owner);
            return Err(QuotaError::NoActiveSubscription);
        };
        let subscription_id = active.subscription.id;
        if active.subscription.is_expired_at(now) {
            tracing::warn!("{} {} refused: subscription {} expired", method, path, subscription_id);
            return Err(QuotaError::SubscriptionExpired {
                ended_at: active.subscription.end_date,
            });
        }

        let declared = resource.and_then(|resource| active.limit_for(resource).map(|limit| (resource, limit)));
        let Some((resource, limit)) = declared else {
            return Ok(Admission::Admitted {
                subscription_id,
                tracked: None,
            });
        };

        let usage = self.usage.get_or_create(subscription_id, resource).await?;
        if limit.is_reached_by(usage.current_usage) {
            tracing::warn!(
                "{} {} refused: {} usage {} has reached limit {}",
                method,
                path,
                resource,
                usage.current_usage,
                limit
            );
            return Err(QuotaError::LimitExceeded {
                resource,
                limit: i64::from(limit),
                usage: usage.current_usage,
            });
        }

        Ok(Admission::Admitted {
            subscription_id,
            tracked: Some(resource),
        })
    }

    /// Record one creation after the wrapped operation finished with `status`.
    /// Failures are logged and swallowed; the business write already happened.
    pub async fn commit(&self, admission: &Admission, status: StatusCode) {
        let Admission::Admitted {
            subscription_id,
            tracked: Some(resource),
        } = admission
        else {
            return;
        };
        if !status.is_success() {
            return;
        }

        match self.usage.increment(*subscription_id, *resource, 1).await {
            Ok(row) => tracing::debug!(
                "{} usage for subscription {} is now {}",
                resource,
                subscription_id,
                row.current_usage
            ),
            Err(e) => tracing::error!(
                "Failed to record {} usage for subscription {}: {}",
                resource,
                subscription_id,
                e
            ),
        }
    }

    /// User whose subscription governs the request: the owner of the resolved
    /// clinic, or the acting user when no clinic is resolved or it has no owner.
    pub async fn owner_for(&self, ctx: &TenantContext) -> Result<Option<Uuid>, StoreError> {
        let Some(user_id) = ctx.user_id() else {
            return Ok(None);
        };
        match ctx.tenant_id() {
            Some(tenant_id) => Ok(Some(self.tenants.owner_of(tenant_id).await?.unwrap_or(user_id))),
            None => Ok(Some(user_id)),
        }
    }

    /// Usage against every limit the governing plan declares. Reading never
    /// creates counter rows.
    pub async fn usage_report(&self, ctx: &TenantContext) -> Result<UsageReport, QuotaError> {
        let owner = self
            .owner_for(ctx)
            .await?
            .ok_or(QuotaError::NoActiveSubscription)?;
        let active = self
            .subscriptions
            .active_subscription(owner)
            .await?
            .ok_or(QuotaError::NoActiveSubscription)?;
        let counters = self.usage.summary(active.subscription.id).await?;

        let resources = active
            .limits
            .iter()
            .map(|limit| {
                let counter = counters.iter().find(|c| c.resource_type == limit.resource_type);
                let current_usage = counter.map_or(0, |c| c.current_usage);
                UsageEntry {
                    resource_type: limit.resource_type,
                    current_usage,
                    limit: limit.limit_value,
                    remaining: limit.limit_value.remaining(current_usage),
                    last_updated: counter.map(|c| c.last_updated),
                }
            })
            .collect();

        Ok(UsageReport {
            subscription_id: active.subscription.id,
            package_name: active.package_name,
            end_date: active.subscription.end_date,
            resources,
        })
    }
}

pub fn is_mutating(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH | Method::DELETE)
}
