//! Audit record entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::domain::identity::Identity;

/// Kind of security-relevant event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    ToolInvoked,
    AuthSuccess,
    AuthFailure,
    RateLimitExceeded,
    PermissionDenied,
    QuotaExceeded,
    DecoyDeployed,
    DecoyStopped,
    AttackDetected,
    InjectionGenerated,
    ConfigChanged,
    ErrorOccurred,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::ToolInvoked => "tool_invoked",
            AuditEventType::AuthSuccess => "auth_success",
            AuditEventType::AuthFailure => "auth_failure",
            AuditEventType::RateLimitExceeded => "rate_limit_exceeded",
            AuditEventType::PermissionDenied => "permission_denied",
            AuditEventType::QuotaExceeded => "quota_exceeded",
            AuditEventType::DecoyDeployed => "decoy_deployed",
            AuditEventType::DecoyStopped => "decoy_stopped",
            AuditEventType::AttackDetected => "attack_detected",
            AuditEventType::InjectionGenerated => "injection_generated",
            AuditEventType::ConfigChanged => "config_changed",
            AuditEventType::ErrorOccurred => "error_occurred",
        }
    }
}

impl std::fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AuditEventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(Value::String(s.to_string()))
            .map_err(|_| format!("unknown audit event type: {}", s))
    }
}

/// One line of the audit journal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl AuditRecord {
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event_type,
            identity_id: None,
            api_key_id: None,
            operation: None,
            parameters: None,
            result: None,
            error: None,
            metadata: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Attach the principal's identifiers (never its credential)
    pub fn with_identity(mut self, identity: &Identity) -> Self {
        self.identity_id = identity.identity_id().map(str::to_string);
        self.api_key_id = identity.api_key_id().map(str::to_string);
        self
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    pub fn with_parameters(mut self, parameters: Option<Value>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_result(mut self, result: Value) -> Self {
        self.result = Some(result);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn metadata_value(&self, key: &str) -> Option<&Value> {
        self.metadata.as_ref().and_then(|m| m.get(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&AuditEventType::RateLimitExceeded).unwrap(),
            "\"rate_limit_exceeded\""
        );
        assert_eq!(
            "permission_denied".parse::<AuditEventType>().unwrap(),
            AuditEventType::PermissionDenied
        );
        assert!("not_an_event".parse::<AuditEventType>().is_err());
    }

    #[test]
    fn test_optional_fields_are_omitted() {
        let record =
            AuditRecord::new(AuditEventType::ConfigChanged).with_operation("configure_mantis");
        let line = serde_json::to_string(&record).unwrap();

        assert!(line.contains("\"operation\":\"configure_mantis\""));
        assert!(!line.contains("identity_id"));
        assert!(!line.contains("metadata"));
    }

    #[test]
    fn test_metadata_accumulates() {
        let record = AuditRecord::new(AuditEventType::QuotaExceeded)
            .with_metadata("resource_class", "decoy")
            .with_metadata("ceiling", 10);

        assert_eq!(record.metadata_value("resource_class"), Some(&Value::from("decoy")));
        assert_eq!(record.metadata_value("ceiling"), Some(&Value::from(10)));
    }
}
