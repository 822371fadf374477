use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use super::access::AccessGuard;
use super::context::TenantContext;
use crate::auth::Identity;
use crate::store::{MembershipStore, StoreError, TenantDirectory};

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("user {user_id} has no access to clinic {tenant_id}")]
    AccessDenied { user_id: Uuid, tenant_id: Uuid },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// How the effective tenant for a request was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Explicit claim on the credential, verified by the access guard.
    Claimed(Uuid),
    /// Earliest active membership of the identity.
    Membership(Uuid),
    /// SuperAdmin with no membership: earliest clinic in the system.
    SystemDefault(Uuid),
    /// Nothing resolved; the request proceeds unscoped.
    Unscoped,
}

impl Resolution {
    pub fn tenant_id(&self) -> Option<Uuid> {
        match self {
            Resolution::Claimed(id) | Resolution::Membership(id) | Resolution::SystemDefault(id) => Some(*id),
            Resolution::Unscoped => None,
        }
    }
}

/// Derives the effective tenant for one request. No state is kept between
/// calls since memberships can change at any time.
#[derive(Clone)]
pub struct TenantResolver {
    guard: AccessGuard,
    memberships: Arc<dyn MembershipStore>,
    tenants: Arc<dyn TenantDirectory>,
}

impl TenantResolver {
    pub fn new(memberships: Arc<dyn MembershipStore>, tenants: Arc<dyn TenantDirectory>) -> Self {
        Self {
            guard: AccessGuard::new(memberships.clone()),
            memberships,
            tenants,
        }
    }

    pub async fn resolve(&self, identity: &Identity) -> Result<Resolution, ResolveError> {
        if let Some(claimed) = identity.tenant_claim {
            // Never fall back to another tenant when the claim is refused
            if !self.guard.has_access(identity.user_id, claimed).await? {
                return Err(ResolveError::AccessDenied {
                    user_id: identity.user_id,
                    tenant_id: claimed,
                });
            }
            return Ok(Resolution::Claimed(claimed));
        }

        if let Some(tenant_id) = self.memberships.first_membership(identity.user_id).await? {
            return Ok(Resolution::Membership(tenant_id));
        }

        // TODO: confirm with product whether SuperAdmin should keep this
        // membership-less default or be required to pick a clinic explicitly.
        if identity.role.is_super_admin() {
            if let Some(tenant_id) = self.tenants.first_tenant().await? {
                tracing::info!(
                    "SuperAdmin {} has no membership; defaulting to clinic {}",
                    identity.user_id,
                    tenant_id
                );
                return Ok(Resolution::SystemDefault(tenant_id));
            }
        }

        Ok(Resolution::Unscoped)
    }

    /// Build the request context. A missing identity yields an anonymous context.
    pub async fn context_for(&self, identity: Option<&Identity>) -> Result<TenantContext, ResolveError> {
        let Some(identity) = identity else {
            return Ok(TenantContext::anonymous());
        };

        let mut ctx = TenantContext::for_identity(identity);
        let resolution = self.resolve(identity).await?;
        if let Some(tenant_id) = resolution.tenant_id() {
            // fresh context, cannot already hold a tenant
            let _ = ctx.assign_tenant(tenant_id);
        }

        tracing::debug!(
            "Resolved clinic context for user {}: {:?}",
            identity.user_id,
            resolution
        );
        Ok(ctx)
    }
}
