//! Credential validation
//!
//! Resolves opaque credentials through the external identity service and
//! caches successful results for a bounded TTL.

mod http_identity;
mod validator;

pub use http_identity::HttpIdentityService;
pub use validator::CredentialValidator;
