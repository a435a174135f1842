//! Delivery ledger access.
//!
//! One record per (notification, recipient) marks a notification as shown
//! to that user. Records are only ever inserted. Store failures never
//! reach callers: lookups degrade to "not delivered" and writes to a
//! logged no-op.

use std::sync::Arc;

use tracing::{debug, error, trace};

use storefront_core::types::id::{NotificationId, UserId};

use crate::backend::DeliveryStore;

/// Append-only record of shown notifications.
#[derive(Debug, Clone)]
pub struct DeliveryLedger {
    store: Arc<dyn DeliveryStore>,
}

impl DeliveryLedger {
    /// Create a ledger over a delivery store.
    pub fn new(store: Arc<dyn DeliveryStore>) -> Self {
        Self { store }
    }

    /// Whether the notification was already shown to the user.
    pub async fn has_been_delivered(&self, notification_id: NotificationId, user_id: UserId) -> bool {
        match self.store.exists(notification_id, user_id).await {
            Ok(found) => found,
            Err(e) => {
                error!(
                    notification_id = %notification_id,
                    user_id = %user_id,
                    "Failed to check delivery record: {}",
                    e
                );
                false
            }
        }
    }

    /// Record that the notification was shown. Returns `true` if this call
    /// wrote the record; an existing record is not an error.
    pub async fn record_delivery(&self, notification_id: NotificationId, user_id: UserId) -> bool {
        match self.store.insert_if_absent(notification_id, user_id).await {
            Ok(true) => {
                trace!(notification_id = %notification_id, user_id = %user_id, "Delivery recorded");
                true
            }
            Ok(false) => {
                debug!(notification_id = %notification_id, user_id = %user_id, "Already delivered");
                false
            }
            Err(e) if e.is_conflict() => {
                debug!(notification_id = %notification_id, user_id = %user_id, "Already delivered");
                false
            }
            Err(e) => {
                error!(
                    notification_id = %notification_id,
                    user_id = %user_id,
                    "Failed to record delivery: {}",
                    e
                );
                false
            }
        }
    }
}
