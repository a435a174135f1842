//! Delivery record entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use storefront_core::types::id::{NotificationId, UserId};

/// Marks a notification as shown to one recipient.
///
/// At most one record exists per `(notification_id, user_id)`; the pair is
/// the table's primary key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct DeliveryRecord {
    /// The delivered notification.
    pub notification_id: Uuid,
    /// The recipient it was shown to.
    pub user_id: Uuid,
    /// When the delivery was recorded.
    pub delivered_at: DateTime<Utc>,
}

impl DeliveryRecord {
    /// Create a record stamped with the current time.
    pub fn now(notification_id: NotificationId, user_id: UserId) -> Self {
        Self {
            notification_id: notification_id.into_uuid(),
            user_id: user_id.into_uuid(),
            delivered_at: Utc::now(),
        }
    }
}
