use serde_json::Value;

use crate::domain::{AuditEventType, AuditRecord, GatewayError, Identity};

use super::request::GuardedRequest;

/// A pre-execution rejection plus what is known about the caller
#[derive(Debug)]
pub(super) struct Denial {
    pub error: GatewayError,
    pub identity: Option<Identity>,
    details: Vec<(&'static str, Value)>,
}

impl Denial {
    pub fn new(error: GatewayError, identity: Option<Identity>) -> Self {
        Self {
            error,
            identity,
            details: Vec::new(),
        }
    }

    pub fn with_detail(mut self, key: &'static str, value: impl Into<Value>) -> Self {
        self.details.push((key, value.into()));
        self
    }

    pub fn event_type(&self) -> AuditEventType {
        match self.error {
            GatewayError::AuthenticationRequired | GatewayError::AuthenticationFailed => {
                AuditEventType::AuthFailure
            }
            GatewayError::PermissionDenied { .. } => AuditEventType::PermissionDenied,
            GatewayError::RateLimited { .. } => AuditEventType::RateLimitExceeded,
            GatewayError::QuotaExceeded { .. } => AuditEventType::QuotaExceeded,
            GatewayError::ExecutionFailed { .. } => AuditEventType::ErrorOccurred,
        }
    }

    /// The single audit record for a denied request
    pub fn audit_record(&self, request: &GuardedRequest) -> AuditRecord {
        let mut record = AuditRecord::new(self.event_type())
            .with_operation(&request.operation)
            .with_parameters(request.parameters.clone())
            .with_error(self.error.to_string())
            .with_metadata("stage", self.error.stage().as_str())
            .with_metadata("reason", self.error.reason());

        if let Some(identity) = &self.identity {
            record = record.with_identity(identity);
        }

        record = match &self.error {
            GatewayError::PermissionDenied { required, .. } => record.with_metadata(
                "required_scopes",
                required.iter().cloned().collect::<Vec<_>>(),
            ),
            GatewayError::RateLimited { reset_at, .. } => {
                record.with_metadata("reset_at", reset_at.to_rfc3339())
            }
            GatewayError::QuotaExceeded {
                resource_class,
                ceiling,
            } => record
                .with_metadata("resource_class", resource_class.as_str())
                .with_metadata("ceiling", *ceiling),
            _ => record,
        };

        for (key, value) in &self.details {
            record = record.with_metadata(*key, value.clone());
        }

        record
    }
}
