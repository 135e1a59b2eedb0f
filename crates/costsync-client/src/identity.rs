//! The client identity presented to the broker.
//!
//! Generated once per store instantiation as `<prefix>-<random suffix>` so
//! that two concurrently connected sessions never share a broker identity
//! (a shared identity would make the broker bounce the older session).
//! Discarded with the store on teardown.

use uuid::Uuid;

/// Process-lifetime-scoped broker identity for one store instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    id: String,
}

impl ClientIdentity {
    /// Generate a fresh identity with the configured prefix.
    pub fn generate(prefix: &str) -> Self {
        Self {
            id: format!("{prefix}-{}", Uuid::new_v4().simple()),
        }
    }

    /// The full identity string sent to the broker.
    pub fn as_str(&self) -> &str {
        &self.id
    }
}

impl core::fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_carries_the_prefix() {
        let identity = ClientIdentity::generate("costsync");
        assert!(identity.as_str().starts_with("costsync-"));
    }

    #[test]
    fn identities_are_unique_per_generation() {
        let a = ClientIdentity::generate("costsync");
        let b = ClientIdentity::generate("costsync");
        assert_ne!(a, b);
    }
}
