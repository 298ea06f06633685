//! Opaque caller credential

use sha2::{Digest, Sha256};

/// Secret string presented by a caller
///
/// The plaintext is only ever handed to the identity service. `Debug` output
/// is redacted, and audit records carry at most a [`Credential::fingerprint`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().trim().to_string())
    }

    /// Plaintext value, for the identity-service request only
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Full SHA-256 digest, used as the validation cache key
    pub fn digest(&self) -> [u8; 32] {
        Sha256::digest(self.0.as_bytes()).into()
    }

    /// Short hex digest that is safe to write to logs and audit records
    pub fn fingerprint(&self) -> String {
        hex::encode(&self.digest()[..6])
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Credential({})", self.fingerprint())
    }
}

impl From<&str> for Credential {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Credential {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_does_not_leak_secret() {
        let credential = Credential::new("sk-super-secret");
        let debug = format!("{:?}", credential);

        assert!(!debug.contains("sk-super-secret"));
        assert!(debug.contains(&credential.fingerprint()));
    }

    #[test]
    fn test_fingerprint_is_stable_and_short() {
        let a = Credential::new("key-a");
        let b = Credential::new("key-a");
        let c = Credential::new("key-c");

        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.fingerprint().len(), 12);
    }

    #[test]
    fn test_whitespace_only_is_empty() {
        assert!(Credential::new("   ").is_empty());
        assert_eq!(Credential::new("  key  ").expose(), "key");
    }
}
