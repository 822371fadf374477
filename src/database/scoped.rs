use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use crate::store::StoreError;
use crate::tenancy::TenantContext;

/// Fields owned by the storage layer; API input may never set them.
pub const SYSTEM_FIELDS: &[&str] = &["id", "tenant_id", "is_deleted", "created_at", "updated_at"];

/// Capability shared by every persisted business entity: each row belongs to
/// one clinic and carries a soft-delete flag.
///
/// Implementing this trait is all a new entity needs to inherit isolation;
/// stores and the generic handlers apply [`IsolationPredicate`] on its behalf.
pub trait ClinicScoped: Serialize + DeserializeOwned + Clone + Send + Sync + Unpin + 'static {
    /// API input for creation.
    type Draft: DeserializeOwned + Send + 'static;

    const TABLE: &'static str;
    const LABEL: &'static str;
    /// Serialized field names, which are also the table's columns.
    const COLUMNS: &'static [&'static str];

    /// Build a new row inside `tenant_id`. The tenant is fixed from here on.
    fn from_draft(draft: Self::Draft, tenant_id: Uuid, now: DateTime<Utc>) -> Result<Self, StoreError>;

    /// Business validation, run on create and after every update merge.
    fn validate(&self) -> Result<(), StoreError>;

    fn id(&self) -> Uuid;
    fn tenant_id(&self) -> Uuid;
    fn is_deleted(&self) -> bool;
    fn mark_deleted(&mut self, now: DateTime<Utc>);
    fn touch(&mut self, now: DateTime<Utc>);
}

/// Implicit filter applied to every scoped read and write:
/// `tenant_id = <tenant> AND is_deleted = false`, or only
/// `is_deleted = false` when no tenant is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IsolationPredicate {
    tenant_id: Option<Uuid>,
}

impl IsolationPredicate {
    pub fn for_context(ctx: &TenantContext) -> Self {
        Self {
            tenant_id: ctx.tenant_id(),
        }
    }

    pub fn for_tenant(tenant_id: Uuid) -> Self {
        Self {
            tenant_id: Some(tenant_id),
        }
    }

    /// Cross-tenant view for internal jobs. Still hides soft-deleted rows.
    pub fn privileged() -> Self {
        Self { tenant_id: None }
    }

    pub fn tenant_id(&self) -> Option<Uuid> {
        self.tenant_id
    }

    pub fn is_scoped(&self) -> bool {
        self.tenant_id.is_some()
    }

    pub fn matches<T: ClinicScoped>(&self, row: &T) -> bool {
        !row.is_deleted() && self.tenant_id.map_or(true, |tenant| row.tenant_id() == tenant)
    }

    /// Whether a row stamped with `tenant_id` may be written under this predicate.
    /// Writes always require a concrete tenant.
    pub fn admits_write(&self, tenant_id: Uuid) -> bool {
        self.tenant_id == Some(tenant_id)
    }
}
