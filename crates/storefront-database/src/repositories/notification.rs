//! Notification repository implementation.

use sqlx::PgPool;

use storefront_core::error::{AppError, ErrorKind};
use storefront_core::result::AppResult;
use storefront_core::types::id::{NotificationId, UserId};
use storefront_entity::notification::{NewNotification, Notification};

/// Repository for the `notifications` table.
#[derive(Debug, Clone)]
pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    /// Create a new notification repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Unread notifications, newest first.
    ///
    /// With `owner` set only that mailbox is read; without it every
    /// mailbox is (admins route by kind, not by owner). `types`/`titles`
    /// narrow by `type` column or title when given. `undelivered_to` skips
    /// rows that already have a delivery record for that user.
    pub async fn find_unread(
        &self,
        owner: Option<UserId>,
        types: Option<&[String]>,
        titles: Option<&[String]>,
        undelivered_to: Option<UserId>,
    ) -> AppResult<Vec<Notification>> {
        sqlx::query_as::<_, Notification>(
            "SELECT n.* FROM notifications n \
             WHERE n.read = FALSE \
               AND ($1::uuid IS NULL OR n.user_id = $1) \
               AND ($2::text[] IS NULL OR n.type = ANY($2) OR n.title = ANY($3)) \
               AND ($4::uuid IS NULL OR NOT EXISTS ( \
                     SELECT 1 FROM notification_deliveries d \
                     WHERE d.notification_id = n.id AND d.user_id = $4)) \
             ORDER BY n.created_at DESC",
        )
        .bind(owner)
        .bind(types)
        .bind(titles)
        .bind(undelivered_to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to list unread notifications", e)
        })
    }

    /// Notifications of the given `type` values or titles, newest first.
    pub async fn find_by_types(
        &self,
        owner: Option<UserId>,
        types: &[String],
        titles: &[String],
        limit: i64,
    ) -> AppResult<Vec<Notification>> {
        sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications \
             WHERE ($1::uuid IS NULL OR user_id = $1) \
               AND (type = ANY($2) OR title = ANY($3)) \
             ORDER BY created_at DESC LIMIT $4",
        )
        .bind(owner)
        .bind(types)
        .bind(titles)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list messages", e))
    }

    /// Count unread notifications in a mailbox.
    pub async fn count_unread(&self, user_id: UserId) -> AppResult<i64> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND read = FALSE",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count unread", e))
    }

    /// Insert a notification and return the stored row.
    pub async fn create(&self, new: &NewNotification) -> AppResult<Notification> {
        sqlx::query_as::<_, Notification>(
            "INSERT INTO notifications (user_id, title, message, type, data) \
             VALUES ($1, $2, $3, $4, $5) RETURNING *",
        )
        .bind(new.user_id)
        .bind(&new.title)
        .bind(&new.message)
        .bind(new.kind.as_str())
        .bind(&new.data)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to create notification", e)
        })
    }

    /// Flip `read` on one notification. Returns `false` if nothing changed.
    pub async fn mark_read(&self, notification_id: NotificationId) -> AppResult<bool> {
        let result =
            sqlx::query("UPDATE notifications SET read = TRUE WHERE id = $1 AND read = FALSE")
                .bind(notification_id)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to mark read", e))?;
        Ok(result.rows_affected() > 0)
    }

    /// Flip `read` on every unread notification in a mailbox.
    pub async fn mark_all_read(&self, user_id: UserId) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET read = TRUE WHERE user_id = $1 AND read = FALSE",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to mark all read", e))?;
        Ok(result.rows_affected())
    }
}
