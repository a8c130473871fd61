//! Gateway ports between the pipeline and the storage layer.
//!
//! The processor and drainer only ever see these traits; the sqlx adapters
//! live in [`crate::db`] and the tests substitute mocks.

use async_trait::async_trait;
use tagsink_model::DetectionRecord;
use thiserror::Error;

/// Storage-layer failure, already classified for the ack protocol.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Foreign-key or NOT-NULL violation; the data is invalid against the
    /// current metadata and retrying will not help.
    #[error("constraint violation: {0}")]
    Constraint(String),
    /// The backend cannot be reached; the work is retryable.
    #[error("database unavailable: {0}")]
    Unavailable(String),
    #[error("database error: {0}")]
    Other(String),
}

/// Lookup of reader/location metadata provisioned out of band.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetadataGateway: Send + Sync {
    /// Resolves a device code (e.g. `"R01"`) to its reader id.
    async fn resolve_reader_id(
        &self,
        code: &str,
    ) -> Result<Option<i64>, GatewayError>;

    async fn location_exists(&self, id: i64) -> Result<bool, GatewayError>;
}

/// Persistence of derived detection records.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DetectionsGateway: Send + Sync {
    async fn save(&self, record: &DetectionRecord) -> Result<(), GatewayError>;
}
