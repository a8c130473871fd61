//! Environment binding and validation.

use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigLoadError;
use crate::models::{BacklogConfig, Config, DatabaseConfig, MqttConfig};

/// A loaded configuration plus any non-fatal findings worth logging.
#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: Vec<String>,
}

/// Binds [`Config`] from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads from `std::env`. The server calls `dotenvy::dotenv()` first so
    /// a local `.env` file participates.
    pub fn from_env() -> Result<ConfigLoad, ConfigLoadError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads from an arbitrary key lookup; the seam unit tests use.
    pub fn from_lookup<F>(lookup: F) -> Result<ConfigLoad, ConfigLoadError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(&lookup);
        let defaults = MqttConfig::default();

        let mqtt = MqttConfig {
            broker_host: env
                .string("MQTT_BROKER_HOST")
                .unwrap_or(defaults.broker_host),
            broker_port: env.parsed("MQTT_BROKER_PORT", defaults.broker_port)?,
            client_id: env.string("MQTT_CLIENT_ID").unwrap_or(defaults.client_id),
            username: env.string("MQTT_USERNAME"),
            password: env.string("MQTT_PASSWORD"),
            scan_topic: env
                .string("MQTT_TOPIC_SCAN")
                .unwrap_or(defaults.scan_topic),
            ack_topic: env.string("MQTT_TOPIC_ACK"),
            qos: env.parsed("MQTT_QOS", defaults.qos)?,
            clean_start: env
                .parsed("MQTT_CLEAN_START", defaults.clean_start)?,
            reconnect_initial_ms: env.parsed(
                "MQTT_RECONNECT_INITIAL_MS",
                defaults.reconnect_initial_ms,
            )?,
            reconnect_factor: env
                .parsed("MQTT_RECONNECT_FACTOR", defaults.reconnect_factor)?,
            reconnect_max_ms: env
                .parsed("MQTT_RECONNECT_MAX_MS", defaults.reconnect_max_ms)?,
        };

        let db_defaults = DatabaseConfig::default();
        let database = DatabaseConfig {
            url: env
                .string("DATABASE_URL")
                .ok_or(ConfigLoadError::MissingRequired { key: "DATABASE_URL" })?,
            max_connections: env.parsed(
                "DATABASE_MAX_CONNECTIONS",
                db_defaults.max_connections,
            )?,
            acquire_timeout_ms: env.parsed(
                "DATABASE_ACQUIRE_TIMEOUT_MS",
                db_defaults.acquire_timeout_ms,
            )?,
            health_interval_ms: env.parsed(
                "DATABASE_HEALTH_INTERVAL_MS",
                db_defaults.health_interval_ms,
            )?,
        };

        let bl_defaults = BacklogConfig::default();
        let backlog = BacklogConfig {
            enabled: env.parsed("BACKLOG_ENABLED", bl_defaults.enabled)?,
            dir: env
                .string("BACKLOG_DIR")
                .map(PathBuf::from)
                .unwrap_or(bl_defaults.dir),
            drain_interval_ms: env.parsed(
                "BACKLOG_DRAIN_INTERVAL_MS",
                bl_defaults.drain_interval_ms,
            )?,
            batch_size: env
                .parsed("BACKLOG_BATCH_SIZE", bl_defaults.batch_size)?,
        };

        let config = Config { mqtt, database, backlog };
        let warnings = validate(&config)?;
        Ok(ConfigLoad { config, warnings })
    }
}

/// Guard rails: hard errors for values that cannot work, warnings for
/// configurations that run but probably surprise the operator.
fn validate(config: &Config) -> Result<Vec<String>, ConfigLoadError> {
    if config.mqtt.qos > 2 {
        return Err(ConfigLoadError::InvalidValue {
            key: "MQTT_QOS",
            value: config.mqtt.qos.to_string(),
            reason: "quality-of-service level must be 0, 1 or 2".to_string(),
        });
    }
    if config.mqtt.reconnect_factor < 1.0 {
        return Err(ConfigLoadError::InvalidValue {
            key: "MQTT_RECONNECT_FACTOR",
            value: config.mqtt.reconnect_factor.to_string(),
            reason: "backoff growth factor must be >= 1.0".to_string(),
        });
    }
    if config.mqtt.reconnect_max_ms < config.mqtt.reconnect_initial_ms {
        return Err(ConfigLoadError::InvalidValue {
            key: "MQTT_RECONNECT_MAX_MS",
            value: config.mqtt.reconnect_max_ms.to_string(),
            reason: "backoff cap must be >= the initial delay".to_string(),
        });
    }
    if config.backlog.batch_size == 0 {
        return Err(ConfigLoadError::InvalidValue {
            key: "BACKLOG_BATCH_SIZE",
            value: "0".to_string(),
            reason: "drain batch size must be at least 1".to_string(),
        });
    }

    let mut warnings = Vec::new();
    if config.mqtt.ack_topic.is_none() {
        warnings.push(
            "MQTT_TOPIC_ACK is not set; acknowledgments are disabled"
                .to_string(),
        );
    }
    if !config.backlog.enabled {
        warnings.push(
            "backlog is disabled; messages arriving while the database is \
             down will be dropped after a negative ack"
                .to_string(),
        );
    }
    Ok(warnings)
}

struct Env<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    fn string(&self, key: &'static str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parsed<T>(&self, key: &'static str, default: T) -> Result<T, ConfigLoadError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.string(key) {
            None => Ok(default),
            Some(raw) => raw.parse::<T>().map_err(|err| {
                ConfigLoadError::InvalidValue {
                    key,
                    value: raw,
                    reason: err.to_string(),
                }
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<ConfigLoad, ConfigLoadError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ConfigLoader::from_lookup(|key| map.get(key).cloned())
    }

    const DB: (&str, &str) = ("DATABASE_URL", "mysql://tagsink@db/tagsink");

    #[test]
    fn defaults_apply_when_only_database_url_is_set() {
        let load = load(&[DB]).unwrap();
        let config = load.config;
        assert_eq!(config.mqtt.broker_host, "localhost");
        assert_eq!(config.mqtt.broker_port, 1883);
        assert_eq!(config.mqtt.qos, 1);
        assert!(config.mqtt.clean_start);
        assert_eq!(config.backlog.batch_size, 50);
        assert!(config.backlog.enabled);
    }

    #[test]
    fn database_url_is_required() {
        assert!(matches!(
            load(&[]),
            Err(ConfigLoadError::MissingRequired { key: "DATABASE_URL" })
        ));
    }

    #[test]
    fn malformed_numbers_are_hard_errors() {
        let err = load(&[DB, ("MQTT_BROKER_PORT", "not-a-port")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigLoadError::InvalidValue { key: "MQTT_BROKER_PORT", .. }
        ));
    }

    #[test]
    fn qos_range_is_enforced() {
        let err = load(&[DB, ("MQTT_QOS", "3")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigLoadError::InvalidValue { key: "MQTT_QOS", .. }
        ));
    }

    #[test]
    fn backoff_cap_below_initial_is_rejected() {
        let err = load(&[
            DB,
            ("MQTT_RECONNECT_INITIAL_MS", "5000"),
            ("MQTT_RECONNECT_MAX_MS", "1000"),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigLoadError::InvalidValue { key: "MQTT_RECONNECT_MAX_MS", .. }
        ));
    }

    #[test]
    fn missing_ack_topic_only_warns() {
        let load = load(&[DB]).unwrap();
        assert!(load.config.mqtt.ack_topic.is_none());
        assert!(load.warnings.iter().any(|w| w.contains("MQTT_TOPIC_ACK")));
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let load = load(&[DB, ("MQTT_CLIENT_ID", "   ")]).unwrap();
        assert_eq!(load.config.mqtt.client_id, "tagsink");
    }
}
