//! Connection status surfaced to consumers.

use serde::{Deserialize, Serialize};

/// The connection manager's externally visible state.
///
/// Transitions are driven only by the connection manager: the status starts
/// at [`ConnectionStatus::Connecting`], moves to `Connected` once the broker
/// handshake completes, and to `Error` on a transport-level failure. The
/// transport's own retry loop brings it back to `Connected` after a
/// successful reconnect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionStatus {
    /// Transport handshake in progress; nothing received yet.
    #[default]
    Connecting,
    /// Handshake succeeded; subscriptions are (being) established.
    Connected,
    /// A protocol or transport-level error occurred; the transport keeps
    /// retrying in the background.
    Error,
}

impl ConnectionStatus {
    /// Whether outbound publishes are currently allowed.
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl core::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let label = match self {
            Self::Connecting => "CONNECTING",
            Self::Connected => "CONNECTED",
            Self::Error => "ERROR",
        };
        write!(f, "{label}")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn initial_status_is_connecting() {
        assert_eq!(ConnectionStatus::default(), ConnectionStatus::Connecting);
        assert!(!ConnectionStatus::default().is_connected());
    }

    #[test]
    fn serializes_to_wire_labels() {
        let json = serde_json::to_string(&ConnectionStatus::Connected).unwrap();
        assert_eq!(json, "\"CONNECTED\"");
        let back: ConnectionStatus = serde_json::from_str("\"ERROR\"").unwrap();
        assert_eq!(back, ConnectionStatus::Error);
    }
}
