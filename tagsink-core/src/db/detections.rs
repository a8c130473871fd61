use async_trait::async_trait;
use sqlx::MySqlPool;
use tagsink_model::DetectionRecord;
use tracing::debug;

use crate::db::classify;
use crate::gateway::{DetectionsGateway, GatewayError};

/// Inserts detection rows; one statement per record, no surrounding
/// transaction (the processor's insert-many is deliberately fail-fast).
#[derive(Debug, Clone)]
pub struct MySqlDetectionsGateway {
    pool: MySqlPool,
}

impl MySqlDetectionsGateway {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DetectionsGateway for MySqlDetectionsGateway {
    async fn save(&self, record: &DetectionRecord) -> Result<(), GatewayError> {
        sqlx::query(
            "INSERT INTO tag_detections \
             (reader_id, location_id, tag_id, rssi, machine, observed_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(record.reader_id)
        .bind(record.location_id)
        .bind(&record.tag_id)
        .bind(record.rssi)
        .bind(&record.machine)
        .bind(record.observed_at)
        .execute(&self.pool)
        .await
        .map_err(classify)?;

        debug!(
            tag_id = %record.tag_id,
            reader_id = record.reader_id,
            location_id = ?record.location_id,
            "persisted detection"
        );
        Ok(())
    }
}
