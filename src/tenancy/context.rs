use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::{Identity, Role};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("clinic {current} already resolved for this request; refusing switch to {requested}")]
    TenantAlreadyResolved { current: Uuid, requested: Uuid },

    #[error("request has no authenticated identity")]
    MissingIdentity,

    #[error("request has no clinic context")]
    MissingTenant,
}

/// Request-scoped carrier of (user, role, tenant).
///
/// Built by the tenant middleware and handed explicitly to every data access.
/// Once a tenant is assigned it cannot be replaced for the rest of the request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TenantContext {
    user_id: Option<Uuid>,
    role: Option<Role>,
    tenant_id: Option<Uuid>,
}

impl TenantContext {
    /// Context for a request with no usable identity.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn for_identity(identity: &Identity) -> Self {
        Self {
            user_id: Some(identity.user_id),
            role: Some(identity.role),
            tenant_id: None,
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.user_id
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn tenant_id(&self) -> Option<Uuid> {
        self.tenant_id
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    /// Set the tenant. Re-assigning the same tenant is a no-op; a different
    /// one is refused.
    pub fn assign_tenant(&mut self, tenant_id: Uuid) -> Result<(), ContextError> {
        match self.tenant_id {
            Some(current) if current != tenant_id => Err(ContextError::TenantAlreadyResolved {
                current,
                requested: tenant_id,
            }),
            _ => {
                self.tenant_id = Some(tenant_id);
                Ok(())
            }
        }
    }

    pub fn with_tenant(mut self, tenant_id: Uuid) -> Result<Self, ContextError> {
        self.assign_tenant(tenant_id)?;
        Ok(self)
    }

    pub fn require_user(&self) -> Result<Uuid, ContextError> {
        self.user_id.ok_or(ContextError::MissingIdentity)
    }

    pub fn require_tenant(&self) -> Result<Uuid, ContextError> {
        self.require_user()?;
        self.tenant_id.ok_or(ContextError::MissingTenant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity {
            user_id: Uuid::new_v4(),
            role: Role::Receptionist,
            tenant_claim: None,
        }
    }

    #[test]
    fn tenant_cannot_be_switched_mid_request() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let mut ctx = TenantContext::for_identity(&identity()).with_tenant(first).unwrap();

        assert_eq!(
            ctx.assign_tenant(second),
            Err(ContextError::TenantAlreadyResolved {
                current: first,
                requested: second
            })
        );
        assert_eq!(ctx.tenant_id(), Some(first));

        // idempotent for the same tenant
        assert!(ctx.assign_tenant(first).is_ok());
    }

    #[test]
    fn anonymous_context_requires_identity_before_tenant() {
        let ctx = TenantContext::anonymous();
        assert!(!ctx.is_authenticated());
        assert_eq!(ctx.require_tenant(), Err(ContextError::MissingIdentity));
    }

    #[test]
    fn identity_without_tenant_is_missing_tenant() {
        let ctx = TenantContext::for_identity(&identity());
        assert!(ctx.require_user().is_ok());
        assert_eq!(ctx.require_tenant(), Err(ContextError::MissingTenant));
    }
}
