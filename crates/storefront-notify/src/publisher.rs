//! Write path: creates the notification rows the listener and poller pick up.

use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use storefront_core::result::AppResult;
use storefront_core::types::id::{OrderId, UserId};
use storefront_entity::notification::{NewNotification, Notification, NotificationKind};
use storefront_entity::order::NewOrderStatusLog;

use crate::backend::{NotificationStore, UserDirectory};

/// Creates notifications for storefront events.
#[derive(Debug, Clone)]
pub struct NotificationPublisher {
    store: Arc<dyn NotificationStore>,
    users: Arc<dyn UserDirectory>,
}

fn short_id(order_id: OrderId) -> String {
    order_id.to_string().chars().take(8).collect()
}

impl NotificationPublisher {
    /// Create a publisher.
    pub fn new(store: Arc<dyn NotificationStore>, users: Arc<dyn UserDirectory>) -> Self {
        Self { store, users }
    }

    /// Write a notification into one user's mailbox.
    pub async fn notify_user(
        &self,
        user_id: UserId,
        kind: NotificationKind,
        message: impl Into<String>,
        data: serde_json::Value,
    ) -> AppResult<Notification> {
        let notification = self
            .store
            .insert(NewNotification::new(user_id, kind, message).with_data(data))
            .await?;
        info!(
            notification_id = %notification.id,
            user_id = %user_id,
            kind = kind.as_str(),
            "Notification created"
        );
        Ok(notification)
    }

    /// Write an admin-facing notification.
    ///
    /// A single row is stored in the oldest admin's mailbox; every admin's
    /// listener watches all mailboxes and keeps its own delivery record.
    /// Returns `None` when there is no admin.
    pub async fn notify_admins(
        &self,
        kind: NotificationKind,
        message: impl Into<String>,
        data: serde_json::Value,
    ) -> AppResult<Option<Notification>> {
        let Some(owner) = self.users.admin_ids().await?.into_iter().next() else {
            warn!(kind = kind.as_str(), "No admin account to notify");
            return Ok(None);
        };
        self.notify_user(owner, kind, message, data).await.map(Some)
    }

    /// A customer placed an order.
    pub async fn order_placed(
        &self,
        customer_id: UserId,
        order_id: OrderId,
    ) -> AppResult<Option<Notification>> {
        self.notify_admins(
            NotificationKind::NewOrder,
            format!("لديك طلب جديد رقم {}", short_id(order_id)),
            json!({ "orderId": order_id, "customerId": customer_id }),
        )
        .await
    }

    /// An admin confirmed a customer's order.
    pub async fn order_confirmed(
        &self,
        customer_id: UserId,
        order_id: OrderId,
    ) -> AppResult<Notification> {
        self.notify_user(
            customer_id,
            NotificationKind::OrderConfirmed,
            format!("تم تأكيد طلبك رقم {}", short_id(order_id)),
            json!({ "orderId": order_id }),
        )
        .await
    }

    /// An order moved to `status`. Writes the customer's notification, then
    /// the status log row.
    pub async fn order_status_changed(
        &self,
        customer_id: UserId,
        order_id: OrderId,
        status: &str,
        note: Option<String>,
    ) -> AppResult<Notification> {
        let notification = self
            .notify_user(
                customer_id,
                NotificationKind::OrderStatusChanged,
                format!("حالة طلبك رقم {}: {}", short_id(order_id), status),
                json!({ "orderId": order_id, "status": status }),
            )
            .await?;
        self.store
            .insert_status_log(NewOrderStatusLog {
                order_id,
                user_id: customer_id,
                status: status.to_string(),
                note,
            })
            .await?;
        Ok(notification)
    }

    /// A customer wrote to the admins.
    pub async fn user_message(
        &self,
        sender_id: UserId,
        message: impl Into<String>,
    ) -> AppResult<Option<Notification>> {
        self.notify_admins(
            NotificationKind::UserMessage,
            message,
            json!({ "senderId": sender_id }),
        )
        .await
    }

    /// An admin wrote to a customer.
    pub async fn admin_message(
        &self,
        recipient_id: UserId,
        message: impl Into<String>,
    ) -> AppResult<Notification> {
        self.notify_user(
            recipient_id,
            NotificationKind::AdminMessage,
            message,
            json!({}),
        )
        .await
    }

    /// A product the customer follows changed.
    pub async fn product_update(
        &self,
        user_id: UserId,
        product_id: &str,
        message: impl Into<String>,
    ) -> AppResult<Notification> {
        self.notify_user(
            user_id,
            NotificationKind::ProductUpdate,
            message,
            json!({ "productId": product_id }),
        )
        .await
    }
}
