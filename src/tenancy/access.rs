use std::sync::Arc;
use uuid::Uuid;

use crate::store::{MembershipStore, StoreError};

/// Confirms an identity may act within a tenant.
///
/// A false positive here exposes another clinic's data, so the answer comes
/// from an active membership row and nothing else.
#[derive(Clone)]
pub struct AccessGuard {
    memberships: Arc<dyn MembershipStore>,
}

impl AccessGuard {
    pub fn new(memberships: Arc<dyn MembershipStore>) -> Self {
        Self { memberships }
    }

    pub async fn has_access(&self, user_id: Uuid, tenant_id: Uuid) -> Result<bool, StoreError> {
        let allowed = self.memberships.has_access(user_id, tenant_id).await?;
        if !allowed {
            tracing::warn!("User {} has no active membership in clinic {}", user_id, tenant_id);
        }
        Ok(allowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    #[tokio::test]
    async fn only_active_memberships_grant_access() {
        let store = Arc::new(MemoryStore::new());
        let user = Uuid::new_v4();
        let clinic = store.add_tenant("North", None).await;
        let other = store.add_tenant("South", None).await;
        store.add_membership(user, clinic.id).await;
        store.add_membership(user, other.id).await;
        store.deactivate_membership(user, other.id).await;

        let guard = AccessGuard::new(store.clone());
        assert!(guard.has_access(user, clinic.id).await.unwrap());
        assert!(!guard.has_access(user, other.id).await.unwrap());
        assert!(!guard.has_access(Uuid::new_v4(), clinic.id).await.unwrap());
    }
}
