//! Identity domain
//!
//! Opaque credentials presented by callers, the principals they resolve to,
//! and the external service that performs the resolution.

mod credential;
mod entity;
mod service;

pub use credential::Credential;
pub use entity::{ADMIN_SCOPE, ANONYMOUS, Identity};
pub use service::{AuthError, IdentityService};

#[cfg(test)]
pub use service::MockIdentityService;
