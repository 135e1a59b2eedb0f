//! The consumer-facing handle: snapshot reads, change notification, and
//! command publishing.
//!
//! Every consumer holds a clone of [`SyncHandle`]. All clones observe the
//! same snapshot reference after any apply; there is no per-consumer
//! filtering. Consumers reading a bucket must treat "absent or empty" as a
//! valid state, because buckets populate asynchronously and independently
//! of when a consumer happens to look.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::Utc;
use costsync_core::correlation::inject_token;
use costsync_core::{CorrelationTracker, PendingCommand, Snapshot};
use costsync_types::{ConnectionStatus, CorrelationToken, Topic};
use rumqttc::{AsyncClient, QoS};
use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, warn};

use crate::ingest::lock_tracker;

/// Result of a publish attempt.
///
/// Publishing never raises to the caller: failed preconditions degrade to
/// a logged outcome the caller may inspect or ignore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The command was serialized and queued on the transport.
    Sent,
    /// The connection status was not `Connected`; nothing was sent.
    NotConnected,
    /// Serialization failed or the transport queue rejected the command.
    Failed,
}

impl PublishOutcome {
    /// Whether the command reached the transport queue.
    pub const fn is_sent(self) -> bool {
        matches!(self, Self::Sent)
    }
}

/// Cheaply cloneable interface every consumer uses to read the store and
/// publish commands.
#[derive(Clone)]
pub struct SyncHandle {
    /// The transport client; swapped on reconnect, hence the lock.
    client: Arc<RwLock<AsyncClient>>,
    /// The store's broker identity, shared by all consumers.
    client_id: Arc<str>,
    snapshot_rx: watch::Receiver<Arc<Snapshot>>,
    status_rx: watch::Receiver<ConnectionStatus>,
    confirm_tx: broadcast::Sender<PendingCommand>,
    tracker: Arc<Mutex<CorrelationTracker>>,
}

impl SyncHandle {
    /// Assemble a handle from the store's shared parts.
    pub(crate) fn new(
        client: Arc<RwLock<AsyncClient>>,
        client_id: &str,
        snapshot_rx: watch::Receiver<Arc<Snapshot>>,
        status_rx: watch::Receiver<ConnectionStatus>,
        confirm_tx: broadcast::Sender<PendingCommand>,
        tracker: Arc<Mutex<CorrelationTracker>>,
    ) -> Self {
        Self {
            client,
            client_id: Arc::from(client_id),
            snapshot_rx,
            status_rx,
            confirm_tx,
            tracker,
        }
    }

    /// The latest snapshot reference.
    ///
    /// Never blocks and never observes a partially applied update.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot_rx.borrow())
    }

    /// Watch for snapshot changes.
    ///
    /// The receiver yields after every applied message; use
    /// [`watch::Receiver::borrow_and_update`] to read the newest snapshot.
    pub fn subscribe_snapshots(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.snapshot_rx.clone()
    }

    /// The current connection status.
    pub fn status(&self) -> ConnectionStatus {
        *self.status_rx.borrow()
    }

    /// Watch for connection status transitions.
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }

    /// Receive confirmations for tracked commands whose token the backend
    /// echoed in a later state message.
    pub fn subscribe_confirmations(&self) -> broadcast::Receiver<PendingCommand> {
        self.confirm_tx.subscribe()
    }

    /// The broker identity of this store's connection.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Publish a command value on a topic.
    ///
    /// The value is serialized to raw JSON and sent verbatim -- no envelope
    /// is added on the outbound path. Requires a `Connected` status; when
    /// disconnected the call is a logged no-op. No acknowledgement is
    /// modeled: a later inbound state message is assumed to reflect the
    /// effect.
    pub fn publish(&self, topic: &Topic, value: &Value) -> PublishOutcome {
        if !self.status().is_connected() {
            warn!(topic = %topic, "publish skipped: not connected");
            return PublishOutcome::NotConnected;
        }
        let payload = match serde_json::to_vec(value) {
            Ok(payload) => payload,
            Err(e) => {
                error!(topic = %topic, error = %e, "publish failed: unserializable value");
                return PublishOutcome::Failed;
            }
        };
        let client = self
            .client
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        match client.try_publish(topic.as_str(), QoS::AtMostOnce, false, payload) {
            Ok(()) => {
                debug!(topic = %topic, "command published");
                PublishOutcome::Sent
            }
            Err(e) => {
                error!(topic = %topic, error = %e, "publish failed: transport rejected command");
                PublishOutcome::Failed
            }
        }
    }

    /// Publish a command and track it for confirmation.
    ///
    /// A fresh [`CorrelationToken`] is injected into the payload under the
    /// `correlationId` field and registered as pending; when the backend
    /// echoes the field in a confirming state message, the token is
    /// delivered via [`SyncHandle::subscribe_confirmations`]. Returns
    /// `None` when the payload is not an object (published untracked) or
    /// when the publish did not reach the transport.
    pub fn publish_tracked(&self, topic: &Topic, mut value: Value) -> Option<CorrelationToken> {
        let token = CorrelationToken::new();
        if !inject_token(&mut value, token) {
            debug!(topic = %topic, "payload is not an object, publishing untracked");
            self.publish(topic, &value);
            return None;
        }
        match self.publish(topic, &value) {
            PublishOutcome::Sent => {
                lock_tracker(&self.tracker).track(token, topic.clone(), Utc::now());
                Some(token)
            }
            PublishOutcome::NotConnected | PublishOutcome::Failed => None,
        }
    }

    /// Number of tracked commands still awaiting confirmation.
    pub fn pending_commands(&self) -> usize {
        lock_tracker(&self.tracker).pending_len()
    }
}

impl core::fmt::Debug for SyncHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SyncHandle")
            .field("client_id", &self.client_id)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}
