//! Pending-command bookkeeping for confirmation joins.
//!
//! There is no synchronous request/response between a published command and
//! the state message that eventually reflects it. The tracker closes that
//! gap: the publisher injects a [`CorrelationToken`] into each tracked
//! command and registers it here; the ingest task hands every decoded
//! inbound value to [`CorrelationTracker::observe`], which confirms the
//! token when the backend echoed it. Commands the backend never confirms
//! are swept out by [`CorrelationTracker::expire`].
//!
//! The tracker is deliberately clock-free: callers pass `now` explicitly,
//! which keeps this crate pure and the expiry logic trivially testable.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use costsync_types::{CORRELATION_FIELD, CorrelationToken, Topic};
use serde_json::Value;

/// One outbound command awaiting confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCommand {
    /// The token injected into the command payload.
    pub token: CorrelationToken,
    /// The topic the command was published on.
    pub topic: Topic,
    /// When the command was published.
    pub issued_at: DateTime<Utc>,
}

/// Tracks outbound commands until the backend echoes their token.
#[derive(Debug, Default)]
pub struct CorrelationTracker {
    pending: BTreeMap<CorrelationToken, PendingCommand>,
}

impl CorrelationTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly published command as pending.
    pub fn track(&mut self, token: CorrelationToken, topic: Topic, issued_at: DateTime<Utc>) {
        self.pending.insert(
            token,
            PendingCommand {
                token,
                topic,
                issued_at,
            },
        );
    }

    /// Inspect a decoded inbound value for an echoed token.
    ///
    /// Returns the confirmed command when the value carries a
    /// [`CORRELATION_FIELD`] matching a pending token; unknown or absent
    /// tokens return `None` and leave the pending set unchanged.
    pub fn observe(&mut self, value: &Value) -> Option<PendingCommand> {
        let token = value
            .get(CORRELATION_FIELD)
            .and_then(Value::as_str)
            .and_then(CorrelationToken::parse)?;
        self.pending.remove(&token)
    }

    /// Drop commands issued more than `ttl` before `now`.
    ///
    /// Returns the expired commands so the caller can log them.
    pub fn expire(&mut self, now: DateTime<Utc>, ttl: Duration) -> Vec<PendingCommand> {
        let cutoff = now.checked_sub_signed(ttl).unwrap_or(DateTime::<Utc>::MIN_UTC);
        let (expired, kept): (BTreeMap<_, _>, BTreeMap<_, _>) = core::mem::take(&mut self.pending)
            .into_iter()
            .partition(|(_, cmd)| cmd.issued_at < cutoff);
        self.pending = kept;
        expired.into_values().collect()
    }

    /// Number of commands still awaiting confirmation.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Inject a token into a command payload.
///
/// Only object payloads can carry the field; for anything else the payload
/// is left untouched and `false` is returned, meaning the command goes out
/// untracked.
pub fn inject_token(value: &mut Value, token: CorrelationToken) -> bool {
    match value {
        Value::Object(map) => {
            map.insert(
                CORRELATION_FIELD.to_owned(),
                Value::String(token.to_string()),
            );
            true
        }
        _ => false,
    }
}
