use async_trait::async_trait;
use sqlx::MySqlPool;

use crate::db::classify;
use crate::gateway::{GatewayError, MetadataGateway};

/// Reader/location lookups against the metadata tables.
#[derive(Debug, Clone)]
pub struct MySqlMetadataGateway {
    pool: MySqlPool,
}

impl MySqlMetadataGateway {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MetadataGateway for MySqlMetadataGateway {
    async fn resolve_reader_id(
        &self,
        code: &str,
    ) -> Result<Option<i64>, GatewayError> {
        sqlx::query_scalar::<_, i64>(
            "SELECT id FROM uhf_readers WHERE code = ?",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)
    }

    async fn location_exists(&self, id: i64) -> Result<bool, GatewayError> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM locations WHERE id = ?",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map(|count| count > 0)
        .map_err(classify)
    }
}
