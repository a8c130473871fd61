//! Typed configuration models with service defaults.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Full service configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mqtt: MqttConfig,
    pub database: DatabaseConfig,
    pub backlog: BacklogConfig,
}

/// Broker connection, topics, and reconnect backoff knobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub broker_host: String,
    pub broker_port: u16,
    /// Base client identity; an instance-unique suffix is appended at
    /// connect time so concurrent deployments never collide.
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Topic carrying inbound scan reports.
    pub scan_topic: String,
    /// Topic for acknowledgments; acks are skipped entirely when unset.
    pub ack_topic: Option<String>,
    /// Delivery quality-of-service level, 0..=2.
    pub qos: u8,
    pub clean_start: bool,
    pub reconnect_initial_ms: u64,
    pub reconnect_factor: f64,
    pub reconnect_max_ms: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_host: "localhost".to_string(),
            broker_port: 1883,
            client_id: "tagsink".to_string(),
            username: None,
            password: None,
            scan_topic: "tagsink/scan".to_string(),
            ack_topic: None,
            qos: 1,
            clean_start: true,
            reconnect_initial_ms: 1_000,
            reconnect_factor: 2.0,
            reconnect_max_ms: 30_000,
        }
    }
}

impl MqttConfig {
    pub fn reconnect_initial(&self) -> Duration {
        Duration::from_millis(self.reconnect_initial_ms)
    }

    pub fn reconnect_max(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_ms)
    }
}

/// MariaDB/MySQL pool and health probe knobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_ms: u64,
    pub health_interval_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 5,
            acquire_timeout_ms: 3_000,
            health_interval_ms: 5_000,
        }
    }
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_millis(self.health_interval_ms)
    }
}

/// Disk-backed backlog queue knobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BacklogConfig {
    pub enabled: bool,
    pub dir: PathBuf,
    pub drain_interval_ms: u64,
    pub batch_size: usize,
}

impl Default for BacklogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from("data/backlog"),
            drain_interval_ms: 5_000,
            batch_size: 50,
        }
    }
}

impl BacklogConfig {
    pub fn drain_interval(&self) -> Duration {
        Duration::from_millis(self.drain_interval_ms)
    }
}
