//! Shared configuration loading for Tagsink.
//!
//! Configuration is environment-driven (a `.env` file is loaded by the
//! server binary before this crate reads anything). The loader binds typed
//! structs with defaults, fails hard on malformed values, and surfaces
//! softer misconfigurations as warnings for the caller to log.

pub mod error;
pub mod loader;
pub mod models;

pub use error::ConfigLoadError;
pub use loader::{ConfigLoad, ConfigLoader};
pub use models::{BacklogConfig, Config, DatabaseConfig, MqttConfig};
