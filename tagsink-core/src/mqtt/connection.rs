//! Transport connection lifecycle: connect, subscribe, dispatch, and
//! reconnect with exponential backoff.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rumqttc::v5::mqttbytes::v5::{DisconnectReasonCode, Packet};
use rumqttc::v5::{AsyncClient, Event, EventLoop};
use tagsink_config::MqttConfig;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::ingest::IngestPipeline;
use crate::mqtt::{qos_level, Backoff};

const DISCONNECT_GRACE: Duration = Duration::from_secs(2);

/// Transport connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
}

impl ConnectionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            _ => ConnectionState::Disconnected,
        }
    }
}

/// Lock-free view of the connection state. Written only by the manager
/// task; readable from anywhere.
#[derive(Debug)]
pub struct ConnectionStateCell(AtomicU8);

impl Default for ConnectionStateCell {
    fn default() -> Self {
        Self(AtomicU8::new(ConnectionState::Disconnected as u8))
    }
}

impl ConnectionStateCell {
    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Stores the new state, returning the previous one.
    fn set(&self, next: ConnectionState) -> ConnectionState {
        ConnectionState::from_u8(self.0.swap(next as u8, Ordering::AcqRel))
    }
}

/// Owns the MQTT event loop on a dedicated task.
///
/// The loop is the single writer of [`ConnectionStateCell`], which also
/// guarantees at most one connect attempt is ever in flight. Subscriptions
/// are not assumed to survive a reconnect and are re-established on every
/// ConnAck.
pub struct ConnectionManager {
    client: AsyncClient,
    event_loop: EventLoop,
    config: MqttConfig,
    state: Arc<ConnectionStateCell>,
    ingest: Arc<IngestPipeline>,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("state", &self.state.get())
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    pub fn new(
        client: AsyncClient,
        event_loop: EventLoop,
        config: MqttConfig,
        state: Arc<ConnectionStateCell>,
        ingest: Arc<IngestPipeline>,
    ) -> Self {
        Self { client, event_loop, config, state, ingest }
    }

    /// Drives the connection until shutdown. The initial connect failing
    /// does not end the loop; it enters the same backoff path as any later
    /// drop.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut backoff = Backoff::new(
            self.config.reconnect_initial(),
            self.config.reconnect_factor,
            self.config.reconnect_max(),
        );
        self.state.set(ConnectionState::Connecting);

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                event = self.event_loop.poll() => match event {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        self.state.set(ConnectionState::Connected);
                        backoff.reset();
                        info!("mqtt connected");
                        Self::subscribe_all(&self.client, &self.config).await;
                    }
                    Ok(Event::Incoming(Packet::Disconnect(disconnect))) => {
                        if disconnect.reason_code
                            == DisconnectReasonCode::SessionTakenOver
                        {
                            // Same recovery as any other drop; the log
                            // calls out the duplicate identity so the
                            // operator can fix the client id collision.
                            warn!(
                                client_id = %self.config.client_id,
                                "broker disconnect: session taken over by a \
                                 client with the same identity; check for \
                                 duplicate instances sharing a client id"
                            );
                        } else {
                            warn!(
                                reason = ?disconnect.reason_code,
                                "broker requested disconnect"
                            );
                        }
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let topic = String::from_utf8_lossy(&publish.topic)
                            .into_owned();
                        self.ingest
                            .handle_message(&topic, &publish.payload)
                            .await;
                    }
                    Ok(_) => {}
                    Err(err) => {
                        let delay = backoff.next_delay();
                        if self.state.set(ConnectionState::Disconnected)
                            == ConnectionState::Connected
                        {
                            warn!(
                                error = %err,
                                retry_in = ?delay,
                                "mqtt connection lost"
                            );
                        } else {
                            debug!(
                                error = %err,
                                retry_in = ?delay,
                                "mqtt connect attempt failed"
                            );
                        }
                        tokio::select! {
                            _ = shutdown.changed() => break,
                            _ = tokio::time::sleep(delay) => {}
                        }
                        self.state.set(ConnectionState::Connecting);
                    }
                }
            }
        }

        Self::stop(&self.client, &self.state).await;
    }

    /// Re-establishes every configured subscription; called after each
    /// successful (re)connection.
    ///
    /// Takes the fields directly rather than `&self` so the caller's
    /// future stays `Send` (the event loop held by `self` is not `Sync`).
    async fn subscribe_all(client: &AsyncClient, config: &MqttConfig) {
        let topic = &config.scan_topic;
        let qos = qos_level(config.qos);
        if let Err(err) = client.subscribe(topic, qos).await {
            warn!(topic, error = %err, "subscribe failed");
        } else {
            info!(topic, qos = config.qos, "subscribed");
        }
    }

    /// Best-effort disconnect with a bounded grace period.
    async fn stop(client: &AsyncClient, state: &ConnectionStateCell) {
        debug!("disconnecting mqtt client");
        if let Ok(Err(err)) =
            tokio::time::timeout(DISCONNECT_GRACE, client.disconnect()).await
        {
            warn!(error = %err, "error while disconnecting mqtt client");
        }
        state.set(ConnectionState::Disconnected);
    }
}
