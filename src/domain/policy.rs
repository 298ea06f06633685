//! Per-operation access policy

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::identity::ADMIN_SCOPE;
use super::quota::ResourceClass;

/// Fixed-window rate limit: at most `max_requests` per `window_ms`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub window_ms: u64,
    pub max_requests: u32,
}

impl RateLimitConfig {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window_ms: window.as_millis().min(u64::MAX as u128) as u64,
            max_requests,
        }
    }

    pub fn per_minute(max_requests: u32) -> Self {
        Self::new(Duration::from_secs(60), max_requests)
    }

    /// Window length; a zero window counts as one millisecond
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms.max(1))
    }

    /// False for a zero-length window, which could never hold a count
    pub fn is_valid(&self) -> bool {
        self.window_ms > 0
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::per_minute(60)
    }
}

/// Policy entry for one named operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationPolicy {
    /// Holding any one of these scopes admits the caller
    pub required_scopes: BTreeSet<String>,

    /// Overrides the configured rate limit for this operation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitConfig>,

    /// Resource pool charged when the operation succeeds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_class: Option<ResourceClass>,
}

impl OperationPolicy {
    pub fn new(scopes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            required_scopes: scopes.into_iter().map(Into::into).collect(),
            rate_limit: None,
            resource_class: None,
        }
    }

    /// Deny-by-default policy applied to unknown operations
    pub fn admin_only() -> Self {
        Self::new([ADMIN_SCOPE])
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }

    pub fn with_resource_class(mut self, resource_class: ResourceClass) -> Self {
        self.resource_class = Some(resource_class);
        self
    }
}
