//! # Tagsink Core
//!
//! The resilient ingestion pipeline behind the Tagsink service.
//!
//! Three subsystems fail independently of each other and this crate
//! coordinates all of them without losing accepted work:
//!
//! - the MQTT transport ([`mqtt`]): connect, subscribe, dispatch inbound
//!   messages, publish acks, and reconnect with exponential backoff;
//! - the database ([`db`], [`health`]): sqlx gateways over MariaDB/MySQL,
//!   a periodic availability probe, and one-shot deferred migrations;
//! - the local disk ([`backlog`]): a directory-as-queue holding messages
//!   that arrived while the database was down, drained once it returns.
//!
//! [`ingest`] ties the three together: every inbound message either reaches
//! the [`processor`] and is acknowledged, or is backlogged and negatively
//! acknowledged. Delivery is at-least-once; idempotency is left to the
//! consumer of the ack topic.

pub mod backlog;
pub mod db;
pub mod error;
pub mod gateway;
pub mod health;
pub mod ingest;
pub mod mqtt;
pub mod processor;

pub use error::ProcessError;
pub use gateway::{DetectionsGateway, GatewayError, MetadataGateway};
pub use processor::ScanProcessor;
