//! MQTT transport: client construction, the connection manager, ack
//! publishing, and reconnect backoff.

mod acks;
mod backoff;
mod connection;

pub use acks::MqttAckPublisher;
pub use backoff::Backoff;
pub use connection::{ConnectionManager, ConnectionState, ConnectionStateCell};

use std::time::Duration;

use rumqttc::v5::{AsyncClient, EventLoop, MqttOptions};
use tagsink_config::MqttConfig;
use tracing::info;
use uuid::Uuid;

/// Outstanding-request capacity of the client channel.
const CLIENT_CHANNEL_CAPACITY: usize = 64;

const KEEP_ALIVE: Duration = Duration::from_secs(30);

/// Builds the client and its event loop from configuration.
///
/// The client id is the configured base plus hostname, process id and a
/// random suffix: two instances sharing a configuration must never present
/// the same identity, or the broker takes over one session with the other.
pub fn client(config: &MqttConfig) -> (AsyncClient, EventLoop) {
    let client_id = instance_client_id(&config.client_id);
    info!(
        client_id = %client_id,
        broker = %format!("{}:{}", config.broker_host, config.broker_port),
        "creating mqtt client"
    );

    let mut options = MqttOptions::new(
        client_id,
        config.broker_host.clone(),
        config.broker_port,
    );
    options.set_keep_alive(KEEP_ALIVE);
    options.set_clean_start(config.clean_start);
    if let (Some(username), Some(password)) =
        (config.username.as_ref(), config.password.as_ref())
    {
        options.set_credentials(username.clone(), password.clone());
    }

    AsyncClient::new(options, CLIENT_CHANNEL_CAPACITY)
}

fn instance_client_id(base: &str) -> String {
    let base = if base.trim().is_empty() { "tagsink" } else { base };
    let host = gethostname::gethostname();
    let host = match host.to_str() {
        Some(host) if !host.is_empty() => host,
        _ => "unknown",
    };
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{base}-{host}-{}-{}", std::process::id(), &suffix[..8])
}

/// Maps the configured 0..=2 level onto the protocol QoS.
pub(crate) fn qos_level(qos: u8) -> rumqttc::v5::mqttbytes::QoS {
    match qos {
        0 => rumqttc::v5::mqttbytes::QoS::AtMostOnce,
        1 => rumqttc::v5::mqttbytes::QoS::AtLeastOnce,
        _ => rumqttc::v5::mqttbytes::QoS::ExactlyOnce,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_ids_are_instance_unique() {
        let a = instance_client_id("tagsink");
        let b = instance_client_id("tagsink");
        assert!(a.starts_with("tagsink-"));
        assert_ne!(a, b);
    }

    #[test]
    fn client_id_carries_the_process_id() {
        let id = instance_client_id("tagsink");
        assert!(id.contains(&format!("-{}-", std::process::id())));
    }

    #[test]
    fn blank_base_falls_back() {
        assert!(instance_client_id("  ").starts_with("tagsink-"));
    }
}
