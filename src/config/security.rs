//! Security gateway configuration

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::domain::{OperationPolicy, RateLimitConfig, ResourceClass};

/// Settings for every gate in the security pipeline
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub auth: AuthSettings,
    pub rate_limit: RateLimitSettings,
    pub audit: AuditSettings,
    pub resources: ResourceSettings,
    /// Operation name to policy; missing operations require `admin`
    pub operations: HashMap<String, OperationPolicy>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// When false every request runs with an all-scopes identity
    pub enabled: bool,
    /// When false a request without a credential runs with an all-scopes identity
    pub require_auth: bool,
    pub identity_service_url: String,
    pub cache_ttl_secs: u64,
    pub request_timeout_secs: u64,
    pub cache_sweep_interval_secs: u64,
    pub max_cache_entries: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub enabled: bool,
    pub default: RateLimitConfig,
    pub per_operation: HashMap<String, RateLimitConfig>,
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuditSettings {
    /// When false records are only mirrored to the log stream
    pub enabled: bool,
    pub log_dir: PathBuf,
    pub flush_interval_ms: u64,
    pub max_buffer_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResourceSettings {
    /// Resource class name to maximum held count per identity
    pub ceilings: HashMap<String, u32>,
    pub idle_threshold_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            auth: AuthSettings::default(),
            rate_limit: RateLimitSettings::default(),
            audit: AuditSettings::default(),
            resources: ResourceSettings::default(),
            operations: default_operation_policies(),
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            require_auth: true,
            identity_service_url: "http://localhost:3000".to_string(),
            cache_ttl_secs: 300,
            request_timeout_secs: 5,
            cache_sweep_interval_secs: 60,
            max_cache_entries: 10_000,
        }
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        let five_minutes = Duration::from_secs(300);
        let per_operation = HashMap::from([
            ("deploy_decoy".to_string(), RateLimitConfig::new(five_minutes, 10)),
            ("stop_decoy".to_string(), RateLimitConfig::per_minute(30)),
            ("analyze_session".to_string(), RateLimitConfig::per_minute(100)),
            ("generate_injection".to_string(), RateLimitConfig::per_minute(30)),
            ("generate_tarpit".to_string(), RateLimitConfig::new(five_minutes, 5)),
            ("monitor_attacks".to_string(), RateLimitConfig::new(five_minutes, 10)),
            (
                "run_integrated_exercise".to_string(),
                RateLimitConfig::new(Duration::from_secs(3600), 5),
            ),
        ]);

        Self {
            enabled: true,
            default: RateLimitConfig::per_minute(60),
            per_operation,
            sweep_interval_secs: 60,
        }
    }
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            log_dir: PathBuf::from("./logs/audit"),
            flush_interval_ms: 5_000,
            max_buffer_size: 100,
        }
    }
}

impl Default for ResourceSettings {
    fn default() -> Self {
        Self {
            ceilings: HashMap::from([
                (ResourceClass::decoy().to_string(), 10),
                (ResourceClass::session().to_string(), 100),
            ]),
            idle_threshold_secs: 3600,
            sweep_interval_secs: 300,
        }
    }
}

impl AuthSettings {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl AuditSettings {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

impl ResourceSettings {
    pub fn ceilings(&self) -> HashMap<ResourceClass, u32> {
        self.ceilings
            .iter()
            .map(|(class, max)| (ResourceClass::new(class.clone()), *max))
            .collect()
    }

    pub fn idle_threshold(&self) -> Duration {
        Duration::from_secs(self.idle_threshold_secs)
    }
}

impl SecurityConfig {
    /// Reject settings the gates cannot enforce
    pub fn validate(&self) -> Result<(), String> {
        let mut invalid: Vec<String> = Vec::new();

        if !self.rate_limit.default.is_valid() {
            invalid.push("rate_limit.default".to_string());
        }
        for (operation, limit) in &self.rate_limit.per_operation {
            if !limit.is_valid() {
                invalid.push(format!("rate_limit.per_operation.{}", operation));
            }
        }
        for (operation, policy) in &self.operations {
            if policy.rate_limit.is_some_and(|limit| !limit.is_valid()) {
                invalid.push(format!("operations.{}.rate_limit", operation));
            }
        }

        if invalid.is_empty() {
            return Ok(());
        }

        invalid.sort();
        Err(format!(
            "rate limit window_ms must be greater than zero: {}",
            invalid.join(", ")
        ))
    }

    /// Per-operation limits: a policy's own limit wins over `rate_limit.per_operation`
    pub fn effective_rate_limits(&self) -> HashMap<String, RateLimitConfig> {
        let mut limits = self.rate_limit.per_operation.clone();

        for (operation, policy) in &self.operations {
            if let Some(limit) = policy.rate_limit {
                limits.insert(operation.clone(), limit);
            }
        }

        limits
    }
}

/// Built-in policy table for the Mantis tool set
pub fn default_operation_policies() -> HashMap<String, OperationPolicy> {
    HashMap::from([
        (
            "deploy_decoy".to_string(),
            OperationPolicy::new(["admin", "write", "decoy:deploy"])
                .with_resource_class(ResourceClass::decoy()),
        ),
        (
            "stop_decoy".to_string(),
            OperationPolicy::new(["admin", "write", "decoy:manage"]),
        ),
        (
            "list_active_decoys".to_string(),
            OperationPolicy::new(["admin", "read", "decoy:manage"]),
        ),
        (
            "analyze_session".to_string(),
            OperationPolicy::new(["admin", "write", "detection:analyze"])
                .with_resource_class(ResourceClass::session()),
        ),
        (
            "get_attack_stats".to_string(),
            OperationPolicy::new(["admin", "read", "stats:view"]),
        ),
        (
            "generate_injection".to_string(),
            OperationPolicy::new(["admin", "write", "injection:generate"]),
        ),
        (
            "test_injection".to_string(),
            OperationPolicy::new(["admin", "write", "injection:generate"]),
        ),
        (
            "monitor_attacks".to_string(),
            OperationPolicy::new(["admin", "read", "monitoring:view"]),
        ),
        ("configure_mantis".to_string(), OperationPolicy::admin_only()),
        (
            "generate_tarpit".to_string(),
            OperationPolicy::new(["admin", "write", "exercise:run"]),
        ),
        (
            "run_integrated_exercise".to_string(),
            OperationPolicy::new(["admin", "exercise:run"]),
        ),
    ])
}
