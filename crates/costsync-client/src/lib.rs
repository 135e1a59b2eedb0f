//! MQTT transport layer for the CostSync state store.
//!
//! One [`SyncStore`] owns one broker connection and runs two tasks:
//!
//! 1. a **transport task** polling the rumqttc event loop, mapping connect
//!    acknowledgements, inbound publishes, and transport errors into
//!    messages on a single bounded channel, and
//! 2. an **ingest task** -- the channel's only consumer -- that decodes
//!    each frame, applies it to the immutable snapshot, and swaps the new
//!    snapshot into a watch channel.
//!
//! Consumers interact exclusively through cloned [`SyncHandle`]s: current
//! snapshot, change notification, connection status, and command
//! publishing. The store is constructed explicitly and injected into
//! consumers; init and dispose are documented operations rather than a
//! process-wide implicit singleton, which keeps lifetimes and test
//! isolation explicit.
//!
//! # Lifecycle
//!
//! ```ignore
//! let store = SyncStore::connect(SyncConfig::default()).await?;
//! let handle = store.handle();
//! // ... hand clones of `handle` to consumers ...
//! store.shutdown().await?;
//! ```

pub mod config;
pub mod error;
pub mod handle;
pub mod identity;

mod connection;
mod ingest;

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use rumqttc::{AsyncClient, EventLoop, MqttOptions, Transport};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub use config::{BrokerConfig, CommandConfig, ConfigError, LoggingConfig, SyncConfig};
pub use costsync_core::{PendingCommand, Snapshot};
pub use costsync_types::{BucketId, ConnectionStatus, CorrelationToken, Topic};
pub use error::ClientError;
pub use handle::{PublishOutcome, SyncHandle};
pub use identity::ClientIdentity;

use crate::connection::{Inbound, TransportSettings};
use crate::ingest::IngestState;
use costsync_core::CorrelationTracker;

/// Capacity of the transport-to-ingest channel.
const INGEST_QUEUE_CAPACITY: usize = 1024;

/// Capacity of the rumqttc request queue.
const MQTT_REQUEST_CAPACITY: usize = 64;

/// Capacity of the confirmation broadcast channel.
const CONFIRM_BROADCAST_CAPACITY: usize = 64;

/// The state-synchronization store: one broker connection, one snapshot,
/// many consumers.
///
/// Dropping the store stops its tasks; call [`SyncStore::shutdown`] first
/// for a graceful broker disconnect.
pub struct SyncStore {
    config: SyncConfig,
    identity: ClientIdentity,
    generation: u64,
    client: Arc<RwLock<AsyncClient>>,
    handle: SyncHandle,
    ingest_tx: mpsc::Sender<Inbound>,
    transport_task: JoinHandle<()>,
    ingest_task: JoinHandle<()>,
}

impl SyncStore {
    /// Create the store and start connecting to the broker.
    ///
    /// Returns as soon as both tasks are running; the connection is
    /// established in the background and surfaces through the handle's
    /// status. The initial status is `Connecting` and the initial snapshot
    /// is empty.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ChannelClosed`] if the ingest pipeline
    /// cannot be started.
    pub async fn connect(config: SyncConfig) -> Result<Self, ClientError> {
        let identity = ClientIdentity::generate(&config.broker.client_id_prefix);
        info!(
            client_id = %identity,
            host = %config.broker.host,
            port = config.broker.port,
            subscriptions = config.subscriptions.len(),
            "starting state store"
        );

        let (ingest_tx, ingest_rx) = mpsc::channel(INGEST_QUEUE_CAPACITY);
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(Snapshot::empty()));
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Connecting);
        let (confirm_tx, _) = broadcast::channel(CONFIRM_BROADCAST_CAPACITY);
        let tracker = Arc::new(Mutex::new(CorrelationTracker::new()));

        let state = IngestState::new(
            snapshot_tx,
            status_tx,
            confirm_tx.clone(),
            Arc::clone(&tracker),
            config.commands.pending_ttl(),
        );
        let ingest_task = tokio::spawn(ingest::run_ingest(ingest_rx, state));

        let generation = 1;
        ingest_tx
            .send(Inbound::Activate { generation })
            .await
            .map_err(|_| ClientError::ChannelClosed)?;

        let (client, eventloop) = build_transport(&config.broker, identity.as_str());
        let transport_task = tokio::spawn(connection::run_transport(
            eventloop,
            client.clone(),
            transport_settings(&config, generation),
            ingest_tx.clone(),
        ));

        let client = Arc::new(RwLock::new(client));
        let handle = SyncHandle::new(
            Arc::clone(&client),
            identity.as_str(),
            snapshot_rx,
            status_rx,
            confirm_tx,
            tracker,
        );

        Ok(Self {
            config,
            identity,
            generation,
            client,
            handle,
            ingest_tx,
            transport_task,
            ingest_task,
        })
    }

    /// A cloneable consumer handle onto this store.
    pub fn handle(&self) -> SyncHandle {
        self.handle.clone()
    }

    /// The broker identity this store connects with.
    pub const fn client_id(&self) -> &ClientIdentity {
        &self.identity
    }

    /// Replace the transport connection.
    ///
    /// The stale connection is closed first and its generation superseded,
    /// so any in-flight event it still delivers is discarded by the ingest
    /// task instead of being applied. At most one connection is ever
    /// active per store.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ChannelClosed`] if the ingest pipeline is
    /// gone.
    pub async fn reconnect(&mut self) -> Result<(), ClientError> {
        info!(generation = self.generation, "replacing transport connection");

        let stale = self.current_client();
        if let Err(e) = stale.disconnect().await {
            debug!(error = %e, "stale connection close failed (already down)");
        }
        self.transport_task.abort();

        self.generation = self.generation.wrapping_add(1);
        self.ingest_tx
            .send(Inbound::Activate {
                generation: self.generation,
            })
            .await
            .map_err(|_| ClientError::ChannelClosed)?;

        let (client, eventloop) = build_transport(&self.config.broker, self.identity.as_str());
        self.transport_task = tokio::spawn(connection::run_transport(
            eventloop,
            client.clone(),
            transport_settings(&self.config, self.generation),
            self.ingest_tx.clone(),
        ));
        *self
            .client
            .write()
            .unwrap_or_else(PoisonError::into_inner) = client;
        Ok(())
    }

    /// Gracefully dispose of the store.
    ///
    /// Sends a broker DISCONNECT when currently connected, then stops both
    /// tasks and discards the client identity.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Mqtt`] when the graceful disconnect fails;
    /// the tasks are stopped regardless.
    pub async fn shutdown(self) -> Result<(), ClientError> {
        info!(client_id = %self.identity, "shutting down state store");
        if self.handle.status().is_connected() {
            self.current_client()
                .disconnect()
                .await
                .map_err(|e| ClientError::Mqtt(e.to_string()))?;
        }
        // Drop aborts the tasks.
        Ok(())
    }

    /// Clone the currently active transport client.
    fn current_client(&self) -> AsyncClient {
        self.client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Drop for SyncStore {
    fn drop(&mut self) {
        self.transport_task.abort();
        self.ingest_task.abort();
    }
}

impl core::fmt::Debug for SyncStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SyncStore")
            .field("client_id", &self.identity)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

/// Build the MQTT client and event loop from broker options.
fn build_transport(broker: &BrokerConfig, client_id: &str) -> (AsyncClient, EventLoop) {
    let mut options = MqttOptions::new(client_id, broker.host.clone(), broker.port);
    options.set_keep_alive(broker.keep_alive());
    options.set_clean_session(broker.clean_session);
    if broker.tls {
        options.set_transport(Transport::tls_with_default_config());
    }
    if let (Some(username), Some(password)) = (&broker.username, &broker.password) {
        options.set_credentials(username.clone(), password.clone());
    }
    AsyncClient::new(options, MQTT_REQUEST_CAPACITY)
}

/// Derive transport task tuning for one connection generation.
fn transport_settings(config: &SyncConfig, generation: u64) -> TransportSettings {
    TransportSettings {
        generation,
        subscriptions: config.subscriptions.clone(),
        settle_delay: config.broker.settle_delay(),
        reconnect_period: config.broker.reconnect_period(),
        connect_timeout: config.broker.connect_timeout(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn unreachable_broker_config() -> SyncConfig {
        let mut config = SyncConfig::default();
        // Reserved port; nothing listens there in any test environment.
        config.broker.host = "127.0.0.1".to_owned();
        config.broker.port = 1;
        config.broker.reconnect_period_ms = 50;
        config.broker.connect_timeout_ms = 200;
        config
    }

    #[tokio::test]
    async fn store_starts_with_empty_snapshot_and_degraded_status() {
        let store = SyncStore::connect(unreachable_broker_config()).await.unwrap();
        let handle = store.handle();

        assert!(handle.snapshot().is_empty());
        assert!(!handle.status().is_connected());
        assert!(handle.client_id().starts_with("costsync-"));

        store.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn publish_without_connection_is_reported_not_sent() {
        let store = SyncStore::connect(unreachable_broker_config()).await.unwrap();
        let handle = store.handle();

        let outcome = handle.publish(&Topic::from("X/Action/Foo"), &json!({ "a": 1 }));
        assert_eq!(outcome, PublishOutcome::NotConnected);
        assert!(handle.snapshot().is_empty());

        store.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn reconnect_supersedes_the_previous_generation() {
        let mut store = SyncStore::connect(unreachable_broker_config()).await.unwrap();

        store.reconnect().await.unwrap();
        assert!(store.handle().snapshot().is_empty());

        store.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn tls_broker_config_builds_a_transport() {
        let broker = BrokerConfig {
            tls: true,
            ..BrokerConfig::default()
        };
        let (_client, _eventloop) = build_transport(&broker, "costsync-tls-test");
    }

    // Exercising the full connect/subscribe/ingest path needs a live
    // broker; run with one on localhost:1883 and remove the ignore.
    #[tokio::test]
    #[ignore]
    async fn connects_to_a_live_broker() {
        let store = SyncStore::connect(SyncConfig::default()).await.unwrap();
        let mut status = store.handle().subscribe_status();
        let _ = tokio::time::timeout(std::time::Duration::from_secs(5), status.changed()).await;
        assert!(store.handle().status().is_connected());
        store.shutdown().await.unwrap();
    }
}
