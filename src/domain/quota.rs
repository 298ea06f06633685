//! Bounded resource pools

use serde::{Deserialize, Serialize};

/// Named resource pool tracked per identity (e.g. `decoy`, `session`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceClass(String);

impl ResourceClass {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Concurrently deployed decoy services
    pub fn decoy() -> Self {
        Self::new("decoy")
    }

    /// Analyzed sessions
    pub fn session() -> Self {
        Self::new("session")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ResourceClass {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl std::fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
