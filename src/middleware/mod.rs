pub mod identity;
pub mod quota;
pub mod response;
pub mod tenant;

pub use identity::identity_middleware;
pub use quota::quota_middleware;
pub use response::{ApiResponse, ApiResult};
pub use tenant::tenant_context_middleware;
