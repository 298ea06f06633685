//! Identity service contract

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

use super::{Credential, Identity};

/// Failures talking to the identity service
///
/// Callers of the gateway never see these; every variant is collapsed into
/// an authentication failure.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("Identity service rejected credential with status {status}")]
    Rejected { status: u16 },

    #[error("Identity service timed out after {0:?}")]
    Timeout(Duration),

    #[error("Identity service unreachable: {0}")]
    Transport(String),

    #[error("Invalid identity service response: {0}")]
    InvalidResponse(String),
}

/// External service that turns an opaque credential into an identity
#[cfg_attr(test, automock)]
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Resolve a credential, failing on any non-success outcome
    async fn resolve(&self, credential: &Credential) -> Result<Identity, AuthError>;

    /// Service name for logging
    fn service_name(&self) -> &'static str;
}
