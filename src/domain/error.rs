use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::audit::AuditError;
use super::identity::AuthError;
use super::quota::ResourceClass;

/// Gate that produced an outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GateStage {
    Authentication,
    Authorization,
    RateLimit,
    Quota,
    Execution,
}

impl GateStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateStage::Authentication => "authentication",
            GateStage::Authorization => "authorization",
            GateStage::RateLimit => "rate_limit",
            GateStage::Quota => "quota",
            GateStage::Execution => "execution",
        }
    }
}

impl std::fmt::Display for GateStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of a guarded invocation that did not produce a result
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Authentication required")]
    AuthenticationRequired,

    /// Bad credential and identity-service outage are deliberately not distinguished
    #[error("Authentication failed: invalid credential")]
    AuthenticationFailed,

    #[error("Permission denied: requires one of: {}", join_scopes(.required))]
    PermissionDenied {
        operation: String,
        required: BTreeSet<String>,
    },

    #[error("Rate limit exceeded for {operation}; resets at {reset_at}")]
    RateLimited {
        operation: String,
        reset_at: DateTime<Utc>,
    },

    #[error("Quota exceeded for {resource_class}: maximum {ceiling} allowed")]
    QuotaExceeded {
        resource_class: ResourceClass,
        ceiling: u32,
    },

    #[error("Execution of {operation} failed: {message}")]
    ExecutionFailed { operation: String, message: String },
}

fn join_scopes(scopes: &BTreeSet<String>) -> String {
    scopes.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

impl GatewayError {
    pub fn stage(&self) -> GateStage {
        match self {
            Self::AuthenticationRequired | Self::AuthenticationFailed => GateStage::Authentication,
            Self::PermissionDenied { .. } => GateStage::Authorization,
            Self::RateLimited { .. } => GateStage::RateLimit,
            Self::QuotaExceeded { .. } => GateStage::Quota,
            Self::ExecutionFailed { .. } => GateStage::Execution,
        }
    }

    /// True for rejections decided before the operation ran
    pub fn is_denial(&self) -> bool {
        !matches!(self, Self::ExecutionFailed { .. })
    }

    /// Machine-readable reason, used in audit metadata
    pub fn reason(&self) -> &'static str {
        match self {
            Self::AuthenticationRequired => "authentication_required",
            Self::AuthenticationFailed => "authentication_failed",
            Self::PermissionDenied { .. } => "permission_denied",
            Self::RateLimited { .. } => "rate_limited",
            Self::QuotaExceeded { .. } => "quota_exceeded",
            Self::ExecutionFailed { .. } => "execution_failed",
        }
    }

    /// Time until a rate-limited caller may retry
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { reset_at, .. } => {
                Some((*reset_at - Utc::now()).to_std().unwrap_or(Duration::ZERO))
            }
            _ => None,
        }
    }
}

/// Failures assembling a gateway from configuration
#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Audit(#[from] AuditError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
