use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::quota::ResourceType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionStatus {
    Active,
    Expired,
    Cancelled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "Active",
            SubscriptionStatus::Expired => "Expired",
            SubscriptionStatus::Cancelled => "Cancelled",
        }
    }
}

impl FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(SubscriptionStatus::Active),
            "Expired" => Ok(SubscriptionStatus::Expired),
            "Cancelled" => Ok(SubscriptionStatus::Cancelled),
            other => Err(format!("unknown subscription status: {}", other)),
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cap on a resource type. Stored as an integer where `-1` means no cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum QuotaLimit {
    Bounded(i64),
    Unbounded,
}

impl QuotaLimit {
    pub const UNBOUNDED_SENTINEL: i64 = -1;

    /// True when `current_usage` leaves no room for another creation.
    pub fn is_reached_by(&self, current_usage: i64) -> bool {
        match self {
            QuotaLimit::Bounded(limit) => current_usage >= *limit,
            QuotaLimit::Unbounded => false,
        }
    }

    pub fn remaining(&self, current_usage: i64) -> Option<i64> {
        match self {
            QuotaLimit::Bounded(limit) => Some((limit - current_usage).max(0)),
            QuotaLimit::Unbounded => None,
        }
    }
}

impl From<i64> for QuotaLimit {
    fn from(raw: i64) -> Self {
        if raw < 0 {
            QuotaLimit::Unbounded
        } else {
            QuotaLimit::Bounded(raw)
        }
    }
}

impl From<QuotaLimit> for i64 {
    fn from(limit: QuotaLimit) -> Self {
        match limit {
            QuotaLimit::Bounded(value) => value,
            QuotaLimit::Unbounded => QuotaLimit::UNBOUNDED_SENTINEL,
        }
    }
}

impl fmt::Display for QuotaLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuotaLimit::Bounded(value) => write!(f, "{}", value),
            QuotaLimit::Unbounded => f.write_str("unlimited"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageLimit {
    pub resource_type: ResourceType,
    #[serde(rename = "limit")]
    pub limit_value: QuotaLimit,
}

/// A plan in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionPackage {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    pub duration_days: i32,
    pub limits: Vec<PackageLimit>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: Uuid,
    pub owner_user_id: Uuid,
    pub package_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: SubscriptionStatus,
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.end_date <= now
    }
}

/// The subscription with `status == Active` for an owner, plus its plan limits.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveSubscription {
    #[serde(flatten)]
    pub subscription: Subscription,
    pub package_name: String,
    pub limits: Vec<PackageLimit>,
}

impl ActiveSubscription {
    /// Limit declared by the plan for `resource`, if any.
    pub fn limit_for(&self, resource: ResourceType) -> Option<QuotaLimit> {
        self.limits
            .iter()
            .find(|l| l.resource_type == resource)
            .map(|l| l.limit_value)
    }
}
