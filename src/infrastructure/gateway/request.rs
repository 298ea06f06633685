use serde_json::Value;

use crate::domain::{Credential, ResourceClass};

/// One invocation to be admitted or denied
#[derive(Debug, Clone)]
pub struct GuardedRequest {
    pub operation: String,
    pub credential: Option<Credential>,
    /// Overrides the resource class from the operation's policy
    pub resource_class: Option<ResourceClass>,
    /// Recorded verbatim in the audit trail; callers must not pass secrets here
    pub parameters: Option<Value>,
}

impl GuardedRequest {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            credential: None,
            resource_class: None,
            parameters: None,
        }
    }

    pub fn with_credential(mut self, credential: impl Into<Credential>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    pub fn with_optional_credential(mut self, credential: Option<Credential>) -> Self {
        self.credential = credential;
        self
    }

    pub fn with_resource_class(mut self, resource_class: ResourceClass) -> Self {
        self.resource_class = Some(resource_class);
        self
    }

    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = Some(parameters);
        self
    }

    /// Credential if one was supplied and is non-blank
    pub fn presented_credential(&self) -> Option<&Credential> {
        self.credential.as_ref().filter(|c| !c.is_empty())
    }
}
