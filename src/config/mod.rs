//! Application configuration

mod app_config;
mod security;

pub use app_config::{AppConfig, LogFormat, LoggingConfig};
pub use security::{
    AuditSettings, AuthSettings, RateLimitSettings, ResourceSettings, SecurityConfig,
    default_operation_policies,
};
