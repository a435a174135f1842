//! Order status log entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use storefront_core::types::id::{OrderId, UserId};

/// One status transition of an order, written by the order workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct OrderStatusLog {
    /// Row identifier.
    pub id: Uuid,
    /// The order that changed.
    pub order_id: Uuid,
    /// The customer who owns the order.
    pub user_id: Uuid,
    /// New status, e.g. `"shipped"`.
    pub status: String,
    /// Optional note left by the admin.
    pub note: Option<String>,
    /// When the transition was logged.
    pub created_at: DateTime<Utc>,
}

impl OrderStatusLog {
    /// Typed owner id.
    pub fn owner(&self) -> UserId {
        UserId::from_uuid(self.user_id)
    }

    /// Typed order id.
    pub fn order(&self) -> OrderId {
        OrderId::from_uuid(self.order_id)
    }
}

/// Insert payload for an order status log row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderStatusLog {
    /// The order that changed.
    pub order_id: OrderId,
    /// The customer who owns the order.
    pub user_id: UserId,
    /// New status.
    pub status: String,
    /// Optional note.
    pub note: Option<String>,
}
