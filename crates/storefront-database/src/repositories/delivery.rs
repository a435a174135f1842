//! Delivery ledger repository.
//!
//! The table is append-only: rows are inserted, never updated or deleted.

use sqlx::PgPool;

use storefront_core::error::{AppError, ErrorKind};
use storefront_core::result::AppResult;
use storefront_core::types::id::{NotificationId, UserId};

/// Repository for the `notification_deliveries` table.
#[derive(Debug, Clone)]
pub struct DeliveryRepository {
    pool: PgPool,
}

impl DeliveryRepository {
    /// Create a new delivery repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Whether a record exists for the exact pair.
    pub async fn exists(&self, notification_id: NotificationId, user_id: UserId) -> AppResult<bool> {
        sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM notification_deliveries \
             WHERE notification_id = $1 AND user_id = $2)",
        )
        .bind(notification_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to look up delivery", e))
    }

    /// Insert a record unless one exists.
    ///
    /// Returns `true` if this call wrote the row, `false` if the pair was
    /// already recorded.
    pub async fn insert_if_absent(
        &self,
        notification_id: NotificationId,
        user_id: UserId,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "INSERT INTO notification_deliveries (notification_id, user_id) VALUES ($1, $2) \
             ON CONFLICT (notification_id, user_id) DO NOTHING",
        )
        .bind(notification_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to record delivery", e))?;
        Ok(result.rows_affected() == 1)
    }
}
