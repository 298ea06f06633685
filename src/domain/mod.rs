//! Domain layer - Core security entities, traits and errors

pub mod audit;
pub mod error;
pub mod identity;
pub mod policy;
pub mod quota;

pub use audit::{AuditError, AuditEventType, AuditQuery, AuditRecord, AuditStore};
pub use error::{GateStage, GatewayError, SetupError};
pub use identity::{ADMIN_SCOPE, ANONYMOUS, AuthError, Credential, Identity, IdentityService};
pub use policy::{OperationPolicy, RateLimitConfig};
pub use quota::ResourceClass;
