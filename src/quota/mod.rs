pub mod admission;
pub mod resource;

pub use admission::{is_mutating, Admission, QuotaAdmission, QuotaError, UsageEntry, UsageReport};
pub use resource::{path_has_prefix, resource_for_path, ResourceType, DEFAULT_EXEMPT_PREFIXES, RESOURCE_PATHS};
