//! The ingest task: the single consumer of transport events.
//!
//! Exactly one ingest task exists per store. It owns the snapshot and is
//! the only writer: inbound frames are decoded, checked against the active
//! connection generation, applied to the immutable snapshot, and the new
//! snapshot is swapped into a watch channel that every consumer observes.
//! Because the channel has one consumer, messages are applied strictly in
//! delivery order with no locking around `apply`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use costsync_core::{CorrelationTracker, PendingCommand, Snapshot, decode};
use costsync_types::ConnectionStatus;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

use crate::connection::Inbound;

/// Mutable state owned by the ingest task.
///
/// Kept separate from the task loop so every transition is a synchronous
/// function of one [`Inbound`] event, testable without channels or a
/// runtime.
pub(crate) struct IngestState {
    /// Generation of the connection whose events are currently applied.
    active_generation: u64,
    /// The latest snapshot; shared with consumers through the watch.
    snapshot: Arc<Snapshot>,
    /// Publishes each new snapshot atomically to all consumers.
    snapshot_tx: watch::Sender<Arc<Snapshot>>,
    /// Publishes status transitions to all consumers.
    status_tx: watch::Sender<ConnectionStatus>,
    /// Notifies consumers of confirmed commands.
    confirm_tx: broadcast::Sender<PendingCommand>,
    /// Pending-command bookkeeping, shared with the publisher.
    tracker: Arc<Mutex<CorrelationTracker>>,
    /// Age after which an unconfirmed command is swept out.
    pending_ttl: chrono::Duration,
}

impl IngestState {
    /// Create the ingest state around its output channels.
    pub(crate) fn new(
        snapshot_tx: watch::Sender<Arc<Snapshot>>,
        status_tx: watch::Sender<ConnectionStatus>,
        confirm_tx: broadcast::Sender<PendingCommand>,
        tracker: Arc<Mutex<CorrelationTracker>>,
        pending_ttl: chrono::Duration,
    ) -> Self {
        Self {
            active_generation: 0,
            snapshot: Arc::new(Snapshot::empty()),
            snapshot_tx,
            status_tx,
            confirm_tx,
            tracker,
            pending_ttl,
        }
    }

    /// Apply one transport event.
    pub(crate) fn handle(&mut self, event: Inbound) {
        match event {
            Inbound::Activate { generation } => {
                if generation > self.active_generation {
                    debug!(generation, "connection generation activated");
                    self.active_generation = generation;
                    // The superseded connection's last status must not leak
                    // into the new connection's handshake window.
                    self.set_status(ConnectionStatus::Connecting);
                }
            }
            Inbound::Status { generation, status } => {
                if generation != self.active_generation {
                    debug!(generation, status = %status, "discarding stale status event");
                    return;
                }
                self.set_status(status);
            }
            Inbound::Frame {
                generation,
                topic,
                payload,
            } => {
                if generation != self.active_generation {
                    debug!(generation, topic = %topic, "discarding frame from stale connection");
                    return;
                }
                match decode(&payload) {
                    Ok(value) => {
                        self.settle_correlations(&value);
                        let next = Arc::new(self.snapshot.apply(&topic, value));
                        self.snapshot = Arc::clone(&next);
                        let _ = self.snapshot_tx.send(next);
                        debug!(topic = %topic, revision = self.snapshot.revision(), "snapshot updated");
                    }
                    Err(e) => {
                        warn!(topic = %topic, error = %e, "dropping undecodable payload");
                    }
                }
            }
        }
    }

    /// Publish a status transition, skipping no-op repeats.
    fn set_status(&self, status: ConnectionStatus) {
        let previous = *self.status_tx.borrow();
        if previous != status {
            info!(from = %previous, to = %status, "connection status changed");
            let _ = self.status_tx.send(status);
        }
    }

    /// Confirm any echoed command token and sweep out expired ones.
    fn settle_correlations(&self, value: &serde_json::Value) {
        let mut tracker = lock_tracker(&self.tracker);
        if let Some(confirmed) = tracker.observe(value) {
            info!(token = %confirmed.token, topic = %confirmed.topic, "command confirmed");
            // send fails only when no consumer listens, which is normal.
            let _ = self.confirm_tx.send(confirmed);
        }
        for expired in tracker.expire(Utc::now(), self.pending_ttl) {
            warn!(
                token = %expired.token,
                topic = %expired.topic,
                "command expired without confirmation"
            );
        }
    }
}

/// Lock the shared tracker, recovering from a poisoned lock.
pub(crate) fn lock_tracker(
    tracker: &Mutex<CorrelationTracker>,
) -> MutexGuard<'_, CorrelationTracker> {
    tracker.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Consume transport events until every sender is gone.
pub(crate) async fn run_ingest(mut rx: mpsc::Receiver<Inbound>, mut state: IngestState) {
    while let Some(event) = rx.recv().await {
        state.handle(event);
    }
    debug!("ingest channel closed, pipeline stopped");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use costsync_types::{BucketId, CorrelationToken, Topic};
    use serde_json::json;

    struct Fixture {
        state: IngestState,
        snapshot_rx: watch::Receiver<Arc<Snapshot>>,
        status_rx: watch::Receiver<ConnectionStatus>,
        confirm_rx: broadcast::Receiver<PendingCommand>,
        tracker: Arc<Mutex<CorrelationTracker>>,
    }

    fn fixture() -> Fixture {
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(Snapshot::empty()));
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Connecting);
        let (confirm_tx, confirm_rx) = broadcast::channel(8);
        let tracker = Arc::new(Mutex::new(CorrelationTracker::new()));
        let state = IngestState::new(
            snapshot_tx,
            status_tx,
            confirm_tx,
            Arc::clone(&tracker),
            chrono::Duration::seconds(30),
        );
        Fixture {
            state,
            snapshot_rx,
            status_rx,
            confirm_rx,
            tracker,
        }
    }

    fn frame(generation: u64, topic: &str, payload: &[u8]) -> Inbound {
        Inbound::Frame {
            generation,
            topic: Topic::from(topic),
            payload: payload.to_vec(),
        }
    }

    #[test]
    fn enveloped_frame_lands_in_rates_and_catch_all() {
        let mut fx = fixture();
        fx.state.handle(Inbound::Activate { generation: 1 });
        fx.state.handle(frame(
            1,
            "X/State/Rate_Cards",
            br#"{"version":"1.0","topics":[{"value":{"basic":{"inbound":2.5}}}]}"#,
        ));

        let snapshot = fx.snapshot_rx.borrow().clone();
        let expected = json!({ "basic": { "inbound": 2.5 } });
        assert_eq!(snapshot.bucket(BucketId::Rates), Some(&expected));
        assert_eq!(snapshot.raw("X/State/Rate_Cards"), Some(&expected));
    }

    #[test]
    fn stale_generation_frame_is_discarded() {
        let mut fx = fixture();
        fx.state.handle(Inbound::Activate { generation: 2 });
        fx.state.handle(frame(1, "X/State/Rate_Cards", br#"{"late":true}"#));

        assert_eq!(fx.snapshot_rx.borrow().revision(), 0);
    }

    #[test]
    fn stale_status_event_is_discarded() {
        let mut fx = fixture();
        fx.state.handle(Inbound::Activate { generation: 2 });
        fx.state.handle(Inbound::Status {
            generation: 1,
            status: ConnectionStatus::Connected,
        });

        assert_eq!(*fx.status_rx.borrow(), ConnectionStatus::Connecting);
    }

    #[test]
    fn activation_resets_status_to_connecting() {
        let mut fx = fixture();
        fx.state.handle(Inbound::Activate { generation: 1 });
        fx.state.handle(Inbound::Status {
            generation: 1,
            status: ConnectionStatus::Connected,
        });

        // Replacing the connection must not leave the dead connection's
        // Connected status visible while the new one handshakes.
        fx.state.handle(Inbound::Activate { generation: 2 });
        assert_eq!(*fx.status_rx.borrow(), ConnectionStatus::Connecting);
    }

    #[test]
    fn activation_never_moves_backwards() {
        let mut fx = fixture();
        fx.state.handle(Inbound::Activate { generation: 3 });
        fx.state.handle(Inbound::Activate { generation: 2 });
        fx.state.handle(frame(3, "A", br#"1"#));

        assert_eq!(fx.snapshot_rx.borrow().revision(), 1);
    }

    #[test]
    fn status_transitions_reach_consumers() {
        let mut fx = fixture();
        fx.state.handle(Inbound::Activate { generation: 1 });
        fx.state.handle(Inbound::Status {
            generation: 1,
            status: ConnectionStatus::Connected,
        });
        assert_eq!(*fx.status_rx.borrow(), ConnectionStatus::Connected);

        fx.state.handle(Inbound::Status {
            generation: 1,
            status: ConnectionStatus::Error,
        });
        assert_eq!(*fx.status_rx.borrow(), ConnectionStatus::Error);
    }

    #[test]
    fn undecodable_payload_leaves_snapshot_untouched() {
        let mut fx = fixture();
        fx.state.handle(Inbound::Activate { generation: 1 });
        fx.state.handle(frame(1, "X/State/Rate_Cards", b"{not json"));

        let snapshot = fx.snapshot_rx.borrow().clone();
        assert_eq!(snapshot.revision(), 0);
        assert!(snapshot.is_empty());
    }

    #[test]
    fn frames_apply_in_delivery_order() {
        let mut fx = fixture();
        fx.state.handle(Inbound::Activate { generation: 1 });
        fx.state.handle(frame(1, "X/State/Rate_Cards", br#"{"seq":1}"#));
        fx.state.handle(frame(1, "X/State/Rate_Cards", br#"{"seq":2}"#));

        let snapshot = fx.snapshot_rx.borrow().clone();
        assert_eq!(snapshot.bucket(BucketId::Rates), Some(&json!({ "seq": 2 })));
        assert_eq!(snapshot.revision(), 2);
    }

    #[test]
    fn echoed_token_confirms_and_notifies() {
        let mut fx = fixture();
        let token = CorrelationToken::new();
        lock_tracker(&fx.tracker).track(token, Topic::from("X/Action/Set_Rate"), Utc::now());

        fx.state.handle(Inbound::Activate { generation: 1 });
        let payload = json!({
            "basic": { "inbound": 3.0 },
            "correlationId": token.to_string(),
        });
        fx.state.handle(frame(
            1,
            "X/State/Rate_Cards",
            &serde_json::to_vec(&payload).unwrap(),
        ));

        let confirmed = fx.confirm_rx.try_recv().unwrap();
        assert_eq!(confirmed.token, token);
        assert_eq!(lock_tracker(&fx.tracker).pending_len(), 0);
    }
}
