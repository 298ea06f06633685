use std::future::Future;
use std::sync::Arc;

use serde_json::json;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::config::SecurityConfig;
use crate::domain::{AuditEventType, AuditRecord, GatewayError, Identity};
use crate::infrastructure::audit::AuditJournal;
use crate::infrastructure::auth::CredentialValidator;
use crate::infrastructure::authorizer::Authorizer;
use crate::infrastructure::observability;
use crate::infrastructure::quota::{QuotaTracker, Reservation};
use crate::infrastructure::rate_limiter::RateLimiter;

use super::denial::Denial;
use super::request::GuardedRequest;

/// Gate switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewaySettings {
    pub auth_enabled: bool,
    pub require_auth: bool,
    pub rate_limit_enabled: bool,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            auth_enabled: true,
            require_auth: true,
            rate_limit_enabled: true,
        }
    }
}

impl From<&SecurityConfig> for GatewaySettings {
    fn from(config: &SecurityConfig) -> Self {
        Self {
            auth_enabled: config.auth.enabled,
            require_auth: config.auth.require_auth,
            rate_limit_enabled: config.rate_limit.enabled,
        }
    }
}

/// An admitted request, ready to run
struct Admission {
    identity: Identity,
    reservation: Option<Reservation>,
}

/// Admit-or-deny front door for guarded operations
#[derive(Debug, Clone)]
pub struct Gateway {
    settings: GatewaySettings,
    validator: Arc<CredentialValidator>,
    authorizer: Arc<Authorizer>,
    rate_limiter: Arc<RateLimiter>,
    quotas: Arc<QuotaTracker>,
    journal: Arc<AuditJournal>,
}

impl Gateway {
    pub fn new(
        settings: GatewaySettings,
        validator: Arc<CredentialValidator>,
        authorizer: Arc<Authorizer>,
        rate_limiter: Arc<RateLimiter>,
        quotas: Arc<QuotaTracker>,
        journal: Arc<AuditJournal>,
    ) -> Self {
        Self {
            settings,
            validator,
            authorizer,
            rate_limiter,
            quotas,
            journal,
        }
    }

    pub fn settings(&self) -> GatewaySettings {
        self.settings
    }

    pub fn validator(&self) -> &Arc<CredentialValidator> {
        &self.validator
    }

    pub fn authorizer(&self) -> &Arc<Authorizer> {
        &self.authorizer
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    pub fn quotas(&self) -> &Arc<QuotaTracker> {
        &self.quotas
    }

    pub fn journal(&self) -> &Arc<AuditJournal> {
        &self.journal
    }

    /// Run `work` only if every gate admits the request.
    ///
    /// Exactly one audit record is written per call. A quota-bound operation
    /// reserves its slot at admission; the slot becomes held when the work
    /// succeeds and is given back when it fails. Releasing a held slot is the
    /// collaborator's job once the resource is torn down (see
    /// [`QuotaTracker::release`]).
    pub async fn execute_guarded<T, F, Fut>(
        &self,
        request: GuardedRequest,
        work: F,
    ) -> Result<T, GatewayError>
    where
        F: FnOnce(Identity) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let admission = match self.admit(&request).await {
            Ok(admission) => admission,
            Err(denial) => {
                observability::record_decision(&request.operation, denial.error.reason());
                debug!(
                    operation = %request.operation,
                    stage = %denial.error.stage(),
                    reason = denial.error.reason(),
                    "Request denied"
                );
                self.journal.record(denial.audit_record(&request));
                return Err(denial.error);
            }
        };

        observability::record_decision(&request.operation, "admitted");

        let Admission {
            identity,
            reservation,
        } = admission;

        let started = Instant::now();
        let outcome = work(identity.clone()).await;
        let elapsed = started.elapsed();
        let duration_ms = elapsed.as_millis() as u64;

        observability::record_execution(&request.operation, outcome.is_ok(), elapsed);

        let record = AuditRecord::new(AuditEventType::ToolInvoked)
            .with_identity(&identity)
            .with_operation(&request.operation)
            .with_parameters(request.parameters.clone());

        match outcome {
            Ok(value) => {
                let mut record =
                    record.with_result(json!({ "success": true, "duration_ms": duration_ms }));

                if let Some(reservation) = reservation {
                    let class = reservation.class().as_str().to_string();
                    let held = reservation.commit();
                    record = record
                        .with_metadata("resource_class", class)
                        .with_metadata("held", held);
                }

                self.journal.record(record);
                Ok(value)
            }
            Err(e) => {
                drop(reservation);
                let message = e.to_string();
                warn!(
                    operation = %request.operation,
                    error = %message,
                    "Guarded operation failed"
                );

                self.journal.record(
                    record
                        .with_result(json!({ "success": false, "duration_ms": duration_ms }))
                        .with_error(message.clone()),
                );

                Err(GatewayError::ExecutionFailed {
                    operation: request.operation,
                    message,
                })
            }
        }
    }

    /// Record an event produced outside the guarded path
    pub fn record_event(&self, record: AuditRecord) {
        self.journal.record(record);
    }

    /// Flush whatever the journal still holds
    pub async fn shutdown(&self) {
        if let Err(e) = self.journal.flush().await {
            error!(error = %e, pending = self.journal.pending(), "Final audit flush failed");
        }
    }

    async fn admit(&self, request: &GuardedRequest) -> Result<Admission, Denial> {
        let identity = self.authenticate(request).await?;
        let operation = request.operation.as_str();

        let required = self.authorizer.required_scopes(operation);
        if !self.authorizer.authorize(&identity, &required) {
            return Err(Denial::new(
                GatewayError::PermissionDenied {
                    operation: operation.to_string(),
                    required,
                },
                Some(identity),
            ));
        }

        if self.settings.rate_limit_enabled {
            let result = self
                .rate_limiter
                .check(identity.rate_limit_key(), operation)
                .await;

            if !result.allowed {
                return Err(Denial::new(
                    GatewayError::RateLimited {
                        operation: operation.to_string(),
                        reset_at: result.reset_at,
                    },
                    Some(identity),
                )
                .with_detail("limit", result.limit));
            }
        }

        let resource_class = request.resource_class.clone().or_else(|| {
            self.authorizer
                .policy(operation)
                .and_then(|policy| policy.resource_class.clone())
        });

        let reservation = match resource_class {
            Some(class) => match self.quotas.try_reserve(identity.quota_key(), &class) {
                Ok(reservation) => Some(reservation),
                Err(ceiling) => {
                    let held = self.quotas.held(identity.quota_key(), &class);
                    return Err(Denial::new(
                        GatewayError::QuotaExceeded {
                            resource_class: class,
                            ceiling,
                        },
                        Some(identity),
                    )
                    .with_detail("held", held));
                }
            },
            None => None,
        };

        Ok(Admission {
            identity,
            reservation,
        })
    }

    async fn authenticate(&self, request: &GuardedRequest) -> Result<Identity, Denial> {
        if !self.settings.auth_enabled {
            return Ok(Identity::unrestricted());
        }

        match request.presented_credential() {
            Some(credential) => self.validator.validate(credential).await.map_err(|e| {
                Denial::new(GatewayError::AuthenticationFailed, None)
                    .with_detail("credential_fingerprint", credential.fingerprint())
                    .with_detail("cause", e.to_string())
            }),
            None if self.settings.require_auth => {
                Err(Denial::new(GatewayError::AuthenticationRequired, None))
            }
            None => Ok(Identity::unrestricted()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::identity::MockIdentityService;
    use crate::domain::{AuditQuery, AuthError, OperationPolicy, RateLimitConfig, ResourceClass};
    use crate::infrastructure::audit::{InMemoryAuditStore, JournalSettings};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Harness {
        gateway: Gateway,
    }

    impl Harness {
        fn build(settings: GatewaySettings, service: MockIdentityService) -> Self {
            let policies = HashMap::from([
                (
                    "deploy_decoy".to_string(),
                    OperationPolicy::new(["admin", "decoy:deploy"])
                        .with_resource_class(ResourceClass::decoy()),
                ),
                (
                    "get_attack_stats".to_string(),
                    OperationPolicy::new(["admin", "read"]),
                ),
            ]);

            let validator = CredentialValidator::new(Arc::new(service), Duration::from_secs(300));
            let rate_limiter = RateLimiter::new(RateLimitConfig::per_minute(100)).with_limits(
                HashMap::from([(
                    "get_attack_stats".to_string(),
                    RateLimitConfig::new(Duration::from_secs(60), 2),
                )]),
            );
            let quotas = QuotaTracker::new(HashMap::from([(ResourceClass::decoy(), 1)]));
            let journal = AuditJournal::new(
                Arc::new(InMemoryAuditStore::new()),
                JournalSettings::default(),
            );

            Self {
                gateway: Gateway::new(
                    settings,
                    Arc::new(validator),
                    Arc::new(Authorizer::new(policies)),
                    Arc::new(rate_limiter),
                    Arc::new(quotas),
                    Arc::new(journal),
                ),
            }
        }

        async fn records(&self) -> Vec<AuditRecord> {
            self.gateway
                .journal()
                .query(&AuditQuery::new())
                .await
                .unwrap()
        }
    }

    fn auth_disabled() -> GatewaySettings {
        GatewaySettings {
            auth_enabled: false,
            require_auth: false,
            rate_limit_enabled: true,
        }
    }

    fn unused_service() -> MockIdentityService {
        let mut mock = MockIdentityService::new();
        mock.expect_resolve().never();
        mock.expect_service_name().return_const("mock");
        mock
    }

    fn service_returning(result: Result<Identity, AuthError>) -> MockIdentityService {
        let mut mock = MockIdentityService::new();
        mock.expect_resolve().returning(move |_| result.clone());
        mock.expect_service_name().return_const("mock");
        mock
    }

    fn reader() -> Identity {
        Identity::new(Some("user-1".into()), Some("key-1".into()), ["read"])
    }

    #[tokio::test]
    async fn test_auth_disabled_admits_with_full_scopes() {
        let harness = Harness::build(auth_disabled(), unused_service());

        let scopes = harness
            .gateway
            .execute_guarded(GuardedRequest::new("configure_mantis"), |identity| async move {
                Ok(identity.scopes().clone())
            })
            .await
            .unwrap();

        assert!(scopes.contains("admin"));

        let records = harness.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].event_type, AuditEventType::ToolInvoked);
        assert_eq!(records[0].result.as_ref().unwrap()["success"], json!(true));
    }

    #[tokio::test]
    async fn test_missing_scope_is_denied_with_single_audit_record() {
        let harness = Harness::build(GatewaySettings::default(), service_returning(Ok(reader())));
        let ran = AtomicUsize::new(0);

        let err = harness
            .gateway
            .execute_guarded(
                GuardedRequest::new("deploy_decoy").with_credential("sk-reader"),
                |_| async {
                    ran.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::PermissionDenied { .. }));
        assert!(err.to_string().contains("decoy:deploy"));
        assert_eq!(ran.load(Ordering::SeqCst), 0);

        let records = harness.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].event_type, AuditEventType::PermissionDenied);
        assert_eq!(records[0].identity_id.as_deref(), Some("user-1"));
        assert_eq!(
            records[0].metadata_value("stage"),
            Some(&json!("authorization"))
        );
        let required = records[0].metadata_value("required_scopes").unwrap();
        assert!(required.as_array().unwrap().contains(&json!("decoy:deploy")));
    }

    #[tokio::test]
    async fn test_third_rapid_call_is_rate_limited() {
        let harness = Harness::build(auth_disabled(), unused_service());
        let before = chrono::Utc::now();

        for _ in 0..2 {
            harness
                .gateway
                .execute_guarded(GuardedRequest::new("get_attack_stats"), |_| async { Ok(()) })
                .await
                .unwrap();
        }

        let err = harness
            .gateway
            .execute_guarded(GuardedRequest::new("get_attack_stats"), |_| async { Ok(()) })
            .await
            .unwrap_err();

        let reset_at = match err {
            GatewayError::RateLimited { reset_at, .. } => reset_at,
            other => panic!("unexpected error: {other:?}"),
        };
        let until_reset = reset_at - before;
        assert!(until_reset <= chrono::Duration::seconds(61));
        assert!(until_reset >= chrono::Duration::seconds(59));

        let records = harness.records().await;
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].event_type, AuditEventType::RateLimitExceeded);
    }

    #[tokio::test]
    async fn test_quota_ceiling_blocks_until_release() {
        let harness = Harness::build(auth_disabled(), unused_service());
        let decoy = ResourceClass::decoy();

        harness
            .gateway
            .execute_guarded(GuardedRequest::new("deploy_decoy"), |_| async { Ok(()) })
            .await
            .unwrap();

        let quotas = harness.gateway.quotas();
        assert_eq!(quotas.held("anonymous", &decoy), 1);
        assert!(!quotas.can_acquire("anonymous", &decoy));

        let err = harness
            .gateway
            .execute_guarded(GuardedRequest::new("deploy_decoy"), |_| async { Ok(()) })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GatewayError::QuotaExceeded { ceiling: 1, .. }
        ));

        quotas.release("anonymous", &decoy);

        harness
            .gateway
            .execute_guarded(GuardedRequest::new("deploy_decoy"), |_| async { Ok(()) })
            .await
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_quota_bound_calls_respect_ceiling() {
        let settings = GatewaySettings {
            rate_limit_enabled: false,
            ..auth_disabled()
        };
        let harness = Harness::build(settings, unused_service());

        let calls = (0..5).map(|_| {
            let gateway = harness.gateway.clone();
            tokio::spawn(async move {
                gateway
                    .execute_guarded(GuardedRequest::new("deploy_decoy"), |_| async {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(())
                    })
                    .await
            })
        });

        let results = futures::future::join_all(calls).await;
        let admitted = results.iter().filter(|r| r.as_ref().unwrap().is_ok()).count();
        let quotas = harness.gateway.quotas();

        assert_eq!(admitted, 1);
        assert_eq!(quotas.held("anonymous", &ResourceClass::decoy()), 1);
        assert_eq!(quotas.reserved("anonymous", &ResourceClass::decoy()), 0);
    }

    #[tokio::test]
    async fn test_failed_operation_does_not_acquire_quota() {
        let harness = Harness::build(auth_disabled(), unused_service());

        let err = harness
            .gateway
            .execute_guarded(GuardedRequest::new("deploy_decoy"), |_| async {
                Err::<(), _>(anyhow::anyhow!("port already in use"))
            })
            .await
            .unwrap_err();

        match &err {
            GatewayError::ExecutionFailed { message, .. } => {
                assert_eq!(message, "port already in use")
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let quotas = harness.gateway.quotas();
        assert_eq!(quotas.held("anonymous", &ResourceClass::decoy()), 0);
        assert_eq!(quotas.reserved("anonymous", &ResourceClass::decoy()), 0);

        let records = harness.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].event_type, AuditEventType::ToolInvoked);
        assert_eq!(records[0].error.as_deref(), Some("port already in use"));
        assert_eq!(records[0].result.as_ref().unwrap()["success"], json!(false));
    }

    #[tokio::test]
    async fn test_missing_credential_when_required() {
        let harness = Harness::build(GatewaySettings::default(), unused_service());

        let err = harness
            .gateway
            .execute_guarded(
                GuardedRequest::new("get_attack_stats").with_credential("   "),
                |_| async { Ok(()) },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::AuthenticationRequired));
        let records = harness.records().await;
        assert_eq!(records[0].event_type, AuditEventType::AuthFailure);
    }

    #[tokio::test]
    async fn test_optional_auth_admits_anonymous_caller() {
        let settings = GatewaySettings {
            require_auth: false,
            ..GatewaySettings::default()
        };
        let harness = Harness::build(settings, unused_service());

        let identity = harness
            .gateway
            .execute_guarded(GuardedRequest::new("get_attack_stats"), |identity| async move {
                Ok(identity)
            })
            .await
            .unwrap();

        assert!(!identity.is_authenticated());
        assert_eq!(identity.rate_limit_key(), "anonymous");
    }

    #[tokio::test]
    async fn test_rejected_credential_is_audited_without_plaintext() {
        let harness = Harness::build(
            GatewaySettings::default(),
            service_returning(Err(AuthError::Rejected { status: 401 })),
        );

        let err = harness
            .gateway
            .execute_guarded(
                GuardedRequest::new("get_attack_stats").with_credential("sk-live-secret"),
                |_| async { Ok(()) },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::AuthenticationFailed));

        let records = harness.records().await;
        assert_eq!(records.len(), 1);
        let line = serde_json::to_string(&records[0]).unwrap();
        assert!(!line.contains("sk-live-secret"));
        assert_eq!(
            records[0].metadata_value("credential_fingerprint"),
            Some(&json!(crate::domain::Credential::new("sk-live-secret").fingerprint()))
        );
    }

    #[tokio::test]
    async fn test_rate_limit_disabled_skips_check() {
        let settings = GatewaySettings {
            rate_limit_enabled: false,
            ..auth_disabled()
        };
        let harness = Harness::build(settings, unused_service());

        for _ in 0..5 {
            harness
                .gateway
                .execute_guarded(GuardedRequest::new("get_attack_stats"), |_| async { Ok(()) })
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_shutdown_flushes_pending_records() {
        let harness = Harness::build(auth_disabled(), unused_service());

        harness
            .gateway
            .record_event(AuditRecord::new(AuditEventType::ConfigChanged));
        assert_eq!(harness.gateway.journal().pending(), 1);

        harness.gateway.shutdown().await;

        assert_eq!(harness.gateway.journal().pending(), 0);
    }
}
