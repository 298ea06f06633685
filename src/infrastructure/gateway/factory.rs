use std::sync::Arc;

use tracing::info;

use crate::config::SecurityConfig;
use crate::domain::{AuditStore, IdentityService, SetupError};
use crate::infrastructure::audit::{AuditJournal, FileAuditStore, JournalSettings};
use crate::infrastructure::auth::{CredentialValidator, HttpIdentityService};
use crate::infrastructure::authorizer::Authorizer;
use crate::infrastructure::quota::QuotaTracker;
use crate::infrastructure::rate_limiter::RateLimiter;

use super::service::{Gateway, GatewaySettings};

/// Wire a gateway from configuration, backed by the HTTP identity service and
/// the file audit store
pub async fn build_gateway(config: &SecurityConfig) -> Result<Gateway, SetupError> {
    config.validate().map_err(SetupError::InvalidConfig)?;

    let service: Arc<dyn IdentityService> = Arc::new(HttpIdentityService::new(
        &config.auth.identity_service_url,
        config.auth.request_timeout(),
    )?);
    let store: Arc<dyn AuditStore> =
        Arc::new(FileAuditStore::open(config.audit.log_dir.clone()).await?);

    Ok(assemble(config, service, store))
}

/// Wire a gateway around caller-supplied identity and audit backends
pub fn assemble(
    config: &SecurityConfig,
    service: Arc<dyn IdentityService>,
    store: Arc<dyn AuditStore>,
) -> Gateway {
    info!(
        identity_service = service.service_name(),
        auth_enabled = config.auth.enabled,
        require_auth = config.auth.require_auth,
        operations = config.operations.len(),
        "Building security gateway"
    );

    let validator = CredentialValidator::with_capacity(
        service,
        config.auth.cache_ttl(),
        config.auth.max_cache_entries,
    );
    let rate_limiter =
        RateLimiter::new(config.rate_limit.default).with_limits(config.effective_rate_limits());
    let quotas = QuotaTracker::new(config.resources.ceilings())
        .with_idle_threshold(config.resources.idle_threshold());
    let journal = AuditJournal::new(store, JournalSettings::from(&config.audit));

    Gateway::new(
        GatewaySettings::from(config),
        Arc::new(validator),
        Arc::new(Authorizer::new(config.operations.clone())),
        Arc::new(rate_limiter),
        Arc::new(quotas),
        Arc::new(journal),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ResourceClass;
    use crate::domain::identity::MockIdentityService;
    use crate::infrastructure::audit::InMemoryAuditStore;

    fn mock_service() -> Arc<dyn IdentityService> {
        let mut mock = MockIdentityService::new();
        mock.expect_service_name().return_const("mock");
        Arc::new(mock)
    }

    #[tokio::test]
    async fn test_assemble_applies_config() {
        let mut config = SecurityConfig::default();
        config.auth.require_auth = false;

        let gateway = assemble(&config, mock_service(), Arc::new(InMemoryAuditStore::new()));

        assert!(!gateway.settings().require_auth);
        assert_eq!(
            gateway.quotas().ceiling(&ResourceClass::decoy()),
            Some(10)
        );
        assert!(gateway.authorizer().policy("deploy_decoy").is_some());
    }

    #[tokio::test]
    async fn test_build_gateway_rejects_zero_window() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SecurityConfig::default();
        config.audit.log_dir = dir.path().to_path_buf();
        config.rate_limit.default.window_ms = 0;

        let error = build_gateway(&config).await.unwrap_err();

        assert!(matches!(error, SetupError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_build_gateway_creates_log_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SecurityConfig::default();
        config.audit.log_dir = dir.path().join("audit");

        build_gateway(&config).await.unwrap();

        assert!(dir.path().join("audit").is_dir());
    }
}
