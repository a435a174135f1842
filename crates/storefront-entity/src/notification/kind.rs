//! Notification kind enumeration.
//!
//! Routing decisions are made on the kind, never on display text. Rows
//! written by older clients only carry a title, so a kind can also be
//! recovered from the title.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What event a notification reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A customer placed an order.
    NewOrder,
    /// An admin confirmed the customer's order.
    OrderConfirmed,
    /// The customer's order moved to another status.
    OrderStatusChanged,
    /// An admin wrote to the customer.
    AdminMessage,
    /// A customer wrote to the admins.
    UserMessage,
    /// A product the customer follows was added or changed.
    ProductUpdate,
    /// Anything this notifier does not route.
    Unknown,
}

impl NotificationKind {
    /// Every routable kind.
    pub const ROUTABLE: [NotificationKind; 6] = [
        Self::NewOrder,
        Self::OrderConfirmed,
        Self::OrderStatusChanged,
        Self::AdminMessage,
        Self::UserMessage,
        Self::ProductUpdate,
    ];

    /// Value stored in the `type` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewOrder => "new_order",
            Self::OrderConfirmed => "order_confirmed",
            Self::OrderStatusChanged => "order_status",
            Self::AdminMessage => "admin_message",
            Self::UserMessage => "user_message",
            Self::ProductUpdate => "product",
            Self::Unknown => "unknown",
        }
    }

    /// Title shown to the recipient.
    pub fn display_title(&self) -> &'static str {
        match self {
            Self::NewOrder => "طلب جديد",
            Self::OrderConfirmed => "تم تأكيد الطلب",
            Self::OrderStatusChanged => "تحديث حالة الطلب",
            Self::AdminMessage => "رسالة من الإدارة",
            Self::UserMessage => "رسالة جديدة",
            Self::ProductUpdate => "منتج",
            Self::Unknown => "إشعار",
        }
    }

    /// Whether this kind is part of the chat thread between customers and admins.
    pub fn is_message(&self) -> bool {
        matches!(self, Self::AdminMessage | Self::UserMessage)
    }

    /// Parse a `type` column value.
    pub fn from_type_str(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "new_order" => Self::NewOrder,
            "order_confirmed" => Self::OrderConfirmed,
            "order_status" | "order_status_changed" => Self::OrderStatusChanged,
            "admin_message" => Self::AdminMessage,
            "user_message" | "message" => Self::UserMessage,
            "product" | "product_update" => Self::ProductUpdate,
            _ => Self::Unknown,
        }
    }

    /// Recover a kind from a display title.
    pub fn from_title(title: &str) -> Self {
        let title = title.trim();
        match title {
            "طلب جديد" => Self::NewOrder,
            "تم تأكيد الطلب" => Self::OrderConfirmed,
            "تحديث حالة الطلب" | "تم تحديث حالة الطلب" => Self::OrderStatusChanged,
            "رسالة من الإدارة" => Self::AdminMessage,
            "رسالة جديدة" | "رسالة جديدة من مستخدم" => Self::UserMessage,
            "منتج" | "منتج جديد" | "تحديث منتج" => Self::ProductUpdate,
            _ => Self::Unknown,
        }
    }

    /// Classify a row: the `type` column wins, the title is the fallback.
    pub fn classify(type_column: &str, title: &str) -> Self {
        match Self::from_type_str(type_column) {
            Self::Unknown => Self::from_title(title),
            kind => kind,
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
