//! Ack publishing over the MQTT client.

use async_trait::async_trait;
use rumqttc::v5::AsyncClient;
use tagsink_model::ScanAck;
use tracing::{debug, warn};

use crate::ingest::AckPublisher;
use crate::mqtt::qos_level;

/// Publishes acknowledgments to the configured ack topic, best effort.
///
/// With no ack topic configured every publish is a no-op; failures are
/// logged and swallowed, never escalated to the dispatch path.
#[derive(Clone)]
pub struct MqttAckPublisher {
    client: AsyncClient,
    topic: Option<String>,
    qos: u8,
}

impl std::fmt::Debug for MqttAckPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttAckPublisher")
            .field("topic", &self.topic)
            .field("qos", &self.qos)
            .finish_non_exhaustive()
    }
}

impl MqttAckPublisher {
    pub fn new(client: AsyncClient, topic: Option<String>, qos: u8) -> Self {
        Self { client, topic, qos }
    }
}

#[async_trait]
impl AckPublisher for MqttAckPublisher {
    async fn publish_ack(&self, ack: ScanAck) {
        let Some(topic) = self.topic.as_deref() else { return };
        let payload = match serde_json::to_vec(&ack) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "could not serialize ack");
                return;
            }
        };
        match self
            .client
            .publish(topic, qos_level(self.qos), false, payload)
            .await
        {
            Ok(_) => debug!(topic, ack = ?ack, "published ack"),
            Err(err) => warn!(topic, error = %err, "failed to publish ack"),
        }
    }
}
