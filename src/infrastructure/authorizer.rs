//! Scope-based authorization
//!
//! The single place where the `admin` super-scope is honored.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::domain::{ADMIN_SCOPE, Identity, OperationPolicy};

/// Static operation policy table plus the admit/deny decision
#[derive(Debug, Clone, Default)]
pub struct Authorizer {
    policies: HashMap<String, OperationPolicy>,
}

impl Authorizer {
    pub fn new(policies: HashMap<String, OperationPolicy>) -> Self {
        Self { policies }
    }

    pub fn policy(&self, operation: &str) -> Option<&OperationPolicy> {
        self.policies.get(operation)
    }

    pub fn policies(&self) -> &HashMap<String, OperationPolicy> {
        &self.policies
    }

    /// Scopes that admit `operation`; unknown operations require `admin`
    pub fn required_scopes(&self, operation: &str) -> BTreeSet<String> {
        match self.policies.get(operation) {
            Some(policy) => policy.required_scopes.clone(),
            None => {
                debug!(operation, "No policy for operation, requiring admin");
                OperationPolicy::admin_only().required_scopes
            }
        }
    }

    /// True if the identity holds `admin` or any scope in `required`
    pub fn authorize(&self, identity: &Identity, required: &BTreeSet<String>) -> bool {
        let scopes = identity.scopes();
        scopes.contains(ADMIN_SCOPE) || !scopes.is_disjoint(required)
    }
}
