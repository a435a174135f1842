//! Notification entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use storefront_core::types::id::{NotificationId, UserId};

use super::kind::NotificationKind;

/// A row of the `notifications` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Notification {
    /// Unique notification identifier.
    pub id: Uuid,
    /// The mailbox owner.
    pub user_id: Uuid,
    /// Display title.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Raw `type` column; see [`Notification::kind`].
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub notification_type: String,
    /// Free-form attributes (order id, product id, ...).
    #[serde(default)]
    pub data: serde_json::Value,
    /// Whether the owner has read it.
    #[serde(default)]
    pub read: bool,
    /// When the notification was created.
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Typed notification id.
    pub fn notification_id(&self) -> NotificationId {
        NotificationId::from_uuid(self.id)
    }

    /// Typed owner id.
    pub fn owner(&self) -> UserId {
        UserId::from_uuid(self.user_id)
    }

    /// Routing kind of this row.
    pub fn kind(&self) -> NotificationKind {
        NotificationKind::classify(&self.notification_type, &self.title)
    }

    /// Check if the notification has not been read yet.
    pub fn is_unread(&self) -> bool {
        !self.read
    }
}

/// Insert payload for a notification row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNotification {
    /// Mailbox owner.
    pub user_id: UserId,
    /// Routing kind; also decides the title.
    pub kind: NotificationKind,
    /// Display title.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Free-form attributes.
    pub data: serde_json::Value,
}

impl NewNotification {
    /// Create a payload titled after its kind.
    pub fn new(user_id: UserId, kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            user_id,
            kind,
            title: kind.display_title().to_string(),
            message: message.into(),
            data: serde_json::Value::Object(serde_json::Map::new()),
        }
    }

    /// Attach free-form attributes.
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    /// Materialize the row as the database would return it.
    pub fn into_notification(self, id: Uuid, created_at: DateTime<Utc>) -> Notification {
        Notification {
            id,
            user_id: self.user_id.into_uuid(),
            title: self.title,
            message: self.message,
            notification_type: self.kind.as_str().to_string(),
            data: self.data,
            read: false,
            created_at,
        }
    }
}
