use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A clinic. Every scoped record belongs to exactly one.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub owner_user_id: Option<Uuid>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

/// Links a user to a clinic they may act within.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Membership {
    pub id: Uuid,
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}
