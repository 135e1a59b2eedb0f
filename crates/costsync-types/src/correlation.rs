//! Correlation tokens joining outbound commands to inbound confirmations.
//!
//! The backend offers no request/response channel: a published command is
//! only ever confirmed by a later inbound state message. A
//! [`CorrelationToken`] is injected into outbound command payloads under
//! [`CORRELATION_FIELD`]; a backend that echoes the field in the confirming
//! state message turns the optimistic-feedback heuristic into a verifiable
//! join.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JSON field name carrying the token on the wire.
pub const CORRELATION_FIELD: &str = "correlationId";

/// Unique token attached to one outbound command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CorrelationToken(pub Uuid);

impl CorrelationToken {
    /// Create a fresh random token.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Return the inner [`Uuid`] value.
    pub const fn into_inner(self) -> Uuid {
        self.0
    }

    /// Parse a token from its string form, e.g. when echoed by the backend.
    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw).ok().map(Self)
    }
}

impl Default for CorrelationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for CorrelationToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}
