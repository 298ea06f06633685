//! Validated principal

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Super-scope implying every other scope
pub const ADMIN_SCOPE: &str = "admin";

/// Principal key used when an identity carries no identifiers
pub const ANONYMOUS: &str = "anonymous";

/// Principal derived from a credential, carrying its scope set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    identity_id: Option<String>,
    api_key_id: Option<String>,
    scopes: BTreeSet<String>,
    authenticated: bool,
}

impl Identity {
    /// Create an authenticated identity
    pub fn new(
        identity_id: Option<String>,
        api_key_id: Option<String>,
        scopes: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            identity_id,
            api_key_id,
            scopes: scopes.into_iter().map(Into::into).collect(),
            authenticated: true,
        }
    }

    /// All-scopes identity used when authentication is disabled or optional
    pub fn unrestricted() -> Self {
        Self {
            identity_id: None,
            api_key_id: None,
            scopes: BTreeSet::from([ADMIN_SCOPE.to_string()]),
            authenticated: false,
        }
    }

    pub fn identity_id(&self) -> Option<&str> {
        self.identity_id.as_deref()
    }

    pub fn api_key_id(&self) -> Option<&str> {
        self.api_key_id.as_deref()
    }

    pub fn scopes(&self) -> &BTreeSet<String> {
        &self.scopes
    }

    /// Whether this identity came from a validated credential
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Key for rate-limit windows: API key, then user, then anonymous
    pub fn rate_limit_key(&self) -> &str {
        self.api_key_id
            .as_deref()
            .or(self.identity_id.as_deref())
            .unwrap_or(ANONYMOUS)
    }

    /// Key for quota accounting: user, then API key, then anonymous
    pub fn quota_key(&self) -> &str {
        self.identity_id
            .as_deref()
            .or(self.api_key_id.as_deref())
            .unwrap_or(ANONYMOUS)
    }
}
