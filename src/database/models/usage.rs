use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::quota::ResourceType;

/// Cumulative creations of one resource type under one subscription.
/// Deletions never lower it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageTracking {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub resource_type: ResourceType,
    pub current_usage: i64,
    pub last_updated: DateTime<Utc>,
}

impl UsageTracking {
    pub fn new(subscription_id: Uuid, resource_type: ResourceType) -> Self {
        Self {
            id: Uuid::new_v4(),
            subscription_id,
            resource_type,
            current_usage: 0,
            last_updated: Utc::now(),
        }
    }
}
