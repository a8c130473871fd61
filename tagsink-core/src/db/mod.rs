//! MariaDB/MySQL adapters for the gateway ports.

mod detections;
mod metadata;

pub use detections::MySqlDetectionsGateway;
pub use metadata::MySqlMetadataGateway;

use sqlx::error::ErrorKind;
use sqlx::mysql::MySqlPoolOptions;
use sqlx::MySqlPool;
use tagsink_config::DatabaseConfig;

use crate::gateway::GatewayError;

/// Builds the shared pool without touching the network: the service must
/// come up and start backlogging even when the database is down.
pub fn connect_lazy(config: &DatabaseConfig) -> Result<MySqlPool, sqlx::Error> {
    MySqlPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout())
        .connect_lazy(&config.url)
}

/// Classifies a sqlx failure for the ack protocol.
pub(crate) fn classify(err: sqlx::Error) -> GatewayError {
    match err {
        sqlx::Error::Database(db) => match db.kind() {
            ErrorKind::ForeignKeyViolation
            | ErrorKind::NotNullViolation
            | ErrorKind::UniqueViolation
            | ErrorKind::CheckViolation => {
                GatewayError::Constraint(db.message().to_string())
            }
            _ => GatewayError::Other(db.message().to_string()),
        },
        err @ (sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)) => GatewayError::Unavailable(err.to_string()),
        other => GatewayError::Other(other.to_string()),
    }
}
