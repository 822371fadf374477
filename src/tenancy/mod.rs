//! Per-request tenant derivation.
//!
//! Identity → [`TenantResolver`] → [`AccessGuard`] → [`TenantContext`]. The
//! context is rebuilt for every request; nothing here caches memberships.

pub mod access;
pub mod context;
pub mod resolver;

pub use access::AccessGuard;
pub use context::{ContextError, TenantContext};
pub use resolver::{Resolution, ResolveError, TenantResolver};
