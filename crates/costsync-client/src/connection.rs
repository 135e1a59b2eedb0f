//! The transport task: one MQTT event loop per connection generation.
//!
//! The connection manager never handles messages in transport callbacks.
//! Instead this task polls the rumqttc event loop and maps everything it
//! sees -- connect acknowledgements, inbound publishes, transport errors --
//! into [`Inbound`] messages on a single bounded channel. One dedicated
//! ingest task consumes that channel, which preserves the store's
//! serialization invariant without relying on any event-loop ordering
//! guarantees.
//!
//! Every message carries the generation number of the connection that
//! produced it. The ingest task discards messages from superseded
//! generations, so a late event from a just-replaced connection can never
//! corrupt the active connection's state.

use std::time::Duration;

use costsync_types::{ConnectionStatus, Topic};
use rumqttc::{AsyncClient, Event, EventLoop, Packet, QoS, SubscribeFilter};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// One event forwarded from a transport connection to the ingest task.
#[derive(Debug)]
pub(crate) enum Inbound {
    /// Declare `generation` as the active connection. Sent by the store
    /// before the matching transport task starts polling.
    Activate {
        /// The connection generation being activated.
        generation: u64,
    },
    /// A connection status transition observed by the transport.
    Status {
        /// Generation of the connection reporting the transition.
        generation: u64,
        /// The new status.
        status: ConnectionStatus,
    },
    /// An inbound application message.
    Frame {
        /// Generation of the connection that received the message.
        generation: u64,
        /// The topic the message arrived on.
        topic: Topic,
        /// Raw payload bytes, decoded later by the ingest task.
        payload: Vec<u8>,
    },
}

/// Tuning for one transport task, derived from the broker config.
pub(crate) struct TransportSettings {
    /// Generation number stamped on every forwarded event.
    pub generation: u64,
    /// Fixed topic list subscribed after every successful (re)connect.
    pub subscriptions: Vec<String>,
    /// Delay between CONNACK and the bulk subscribe.
    pub settle_delay: Duration,
    /// Pause before re-polling after a transport failure.
    pub reconnect_period: Duration,
    /// Upper bound on one connection attempt.
    pub connect_timeout: Duration,
}

/// Poll the event loop until the ingest channel closes.
///
/// Reconnection is the transport's own job: after a failure the loop
/// reports `Error`, sleeps for the reconnect period, and polls again,
/// which re-establishes the connection. Each successful handshake repeats
/// the settle-delay-then-subscribe step.
pub(crate) async fn run_transport(
    mut eventloop: EventLoop,
    client: AsyncClient,
    settings: TransportSettings,
    tx: mpsc::Sender<Inbound>,
) {
    let generation = settings.generation;
    let mut connected = false;

    loop {
        let result = if connected {
            eventloop.poll().await
        } else {
            // Bound the handshake so a silent broker cannot park the
            // status machine in CONNECTING forever.
            match tokio::time::timeout(settings.connect_timeout, eventloop.poll()).await {
                Ok(result) => result,
                Err(_elapsed) => {
                    warn!(
                        generation,
                        timeout = ?settings.connect_timeout,
                        "connection attempt timed out"
                    );
                    if !forward(&tx, status_event(generation, ConnectionStatus::Error)).await {
                        return;
                    }
                    tokio::time::sleep(settings.reconnect_period).await;
                    continue;
                }
            }
        };

        match result {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                connected = true;
                info!(generation, code = ?ack.code, "broker connection established");
                if !forward(&tx, status_event(generation, ConnectionStatus::Connected)).await {
                    return;
                }
                spawn_bulk_subscribe(
                    client.clone(),
                    settings.subscriptions.clone(),
                    settings.settle_delay,
                    generation,
                );
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let frame = Inbound::Frame {
                    generation,
                    topic: Topic::from(publish.topic),
                    payload: publish.payload.to_vec(),
                };
                if !forward(&tx, frame).await {
                    return;
                }
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                // Broker-initiated disconnect; the next poll surfaces the
                // closed socket as an error and the retry path takes over.
                warn!(generation, "broker sent DISCONNECT");
                connected = false;
            }
            Ok(event) => {
                debug!(generation, event = ?event, "transport event");
            }
            Err(e) => {
                connected = false;
                warn!(generation, error = %e, "transport error, retrying");
                if !forward(&tx, status_event(generation, ConnectionStatus::Error)).await {
                    return;
                }
                tokio::time::sleep(settings.reconnect_period).await;
            }
        }
    }
}

/// Build a status event for this generation.
const fn status_event(generation: u64, status: ConnectionStatus) -> Inbound {
    Inbound::Status { generation, status }
}

/// Forward an event to the ingest task.
///
/// Returns `false` when the ingest side is gone, which means the store was
/// torn down and this transport task should stop.
async fn forward(tx: &mpsc::Sender<Inbound>, event: Inbound) -> bool {
    if tx.send(event).await.is_err() {
        debug!("ingest channel closed, stopping transport task");
        return false;
    }
    true
}

/// Issue the fixed subscription list in one bulk call after the settle
/// delay.
///
/// The delay works around a race where the broker acknowledges the
/// connection before it accepts subscription requests; see the config
/// documentation for the caveat.
fn spawn_bulk_subscribe(
    client: AsyncClient,
    subscriptions: Vec<String>,
    settle_delay: Duration,
    generation: u64,
) {
    if subscriptions.is_empty() {
        warn!(generation, "no subscriptions configured, nothing to receive");
        return;
    }
    tokio::spawn(async move {
        tokio::time::sleep(settle_delay).await;
        let filters: Vec<SubscribeFilter> = subscriptions
            .iter()
            .map(|topic| SubscribeFilter::new(topic.clone(), QoS::AtMostOnce))
            .collect();
        match client.subscribe_many(filters).await {
            Ok(()) => info!(generation, count = subscriptions.len(), "bulk subscribe issued"),
            Err(e) => warn!(generation, error = %e, "bulk subscribe failed"),
        }
    });
}
