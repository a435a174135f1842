//! Order status log repository.

use sqlx::PgPool;

use storefront_core::error::{AppError, ErrorKind};
use storefront_core::result::AppResult;
use storefront_entity::order::{NewOrderStatusLog, OrderStatusLog};

/// Write access to the `order_status_logs` table.
#[derive(Debug, Clone)]
pub struct OrderStatusRepository {
    pool: PgPool,
}

impl OrderStatusRepository {
    /// Create a new order status repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append a status transition.
    pub async fn create(&self, log: &NewOrderStatusLog) -> AppResult<OrderStatusLog> {
        sqlx::query_as::<_, OrderStatusLog>(
            "INSERT INTO order_status_logs (order_id, user_id, status, note) \
             VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(log.order_id)
        .bind(log.user_id)
        .bind(&log.status)
        .bind(&log.note)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to log order status", e)
        })
    }
}
