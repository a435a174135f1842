//! Notification dispatcher: renders a payload, shows it and records the
//! delivery.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashSet;
use tracing::{debug, error, info, warn};

use storefront_core::types::id::{NotificationId, UserId};
use storefront_entity::notification::Notification;
use storefront_entity::user::SessionUser;

use crate::ledger::DeliveryLedger;
use crate::platform::{ForegroundSignal, PushPayload, PushPlatform};
use crate::session::SessionContext;

/// What happened to one dispatch request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Shown and recorded in the ledger.
    Delivered,
    /// Shown, but the ledger already had the record or could not be written.
    DeliveredUnrecorded,
    /// Another dispatch in this process already claimed the pair.
    AlreadyProcessed,
    /// The recipient is no longer the signed-in user.
    NoSession,
    /// The platform refused permission; the row stays in the database only.
    PermissionDenied,
    /// The platform failed to show it. Nothing was recorded.
    Failed,
}

impl DispatchOutcome {
    /// Whether the platform accepted the notification.
    pub fn was_shown(&self) -> bool {
        matches!(self, Self::Delivered | Self::DeliveredUnrecorded)
    }
}

/// Shows notifications at most once per (notification, recipient) in this
/// process.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    session: SessionContext,
    platform: Arc<dyn PushPlatform>,
    ledger: DeliveryLedger,
    foreground: ForegroundSignal,
    scheduled_delay: Duration,
    /// Pairs claimed by a dispatch in this process.
    processed: Arc<DashSet<(NotificationId, UserId)>>,
}

impl Dispatcher {
    /// Create a dispatcher.
    pub fn new(
        session: SessionContext,
        platform: Arc<dyn PushPlatform>,
        ledger: DeliveryLedger,
        foreground: ForegroundSignal,
        scheduled_delay: Duration,
    ) -> Self {
        Self {
            session,
            platform,
            ledger,
            foreground,
            scheduled_delay,
            processed: Arc::new(DashSet::new()),
        }
    }

    /// Show `notification` to `recipient` and record the delivery.
    pub async fn dispatch(
        &self,
        notification: &Notification,
        recipient: &SessionUser,
    ) -> DispatchOutcome {
        let key = (notification.notification_id(), recipient.id);

        if !self.session.is_current(recipient.id) {
            debug!(
                notification_id = %notification.id,
                recipient = %recipient.id,
                "Recipient is not the session user, skipping"
            );
            return DispatchOutcome::NoSession;
        }

        if !self.processed.insert(key) {
            debug!(
                notification_id = %notification.id,
                recipient = %recipient.id,
                "Notification already being processed"
            );
            return DispatchOutcome::AlreadyProcessed;
        }

        let granted = match self.platform.permission_status().await {
            Ok(status) => status.is_granted(),
            Err(e) => {
                warn!("Failed to read notification permission: {}", e);
                false
            }
        };
        if !granted {
            self.processed.remove(&key);
            info!(
                notification_id = %notification.id,
                recipient = %recipient.id,
                "Notification permission not granted; leaving notification in the inbox"
            );
            return DispatchOutcome::PermissionDenied;
        }

        let payload = PushPayload::from_notification(notification);
        let shown = if self.foreground.is_foreground() {
            self.platform.present(payload).await
        } else {
            self.platform.schedule(payload, self.scheduled_delay).await
        };

        if let Err(e) = shown {
            self.processed.remove(&key);
            error!(
                notification_id = %notification.id,
                recipient = %recipient.id,
                "Failed to show notification: {}",
                e
            );
            return DispatchOutcome::Failed;
        }

        if self
            .ledger
            .record_delivery(notification.notification_id(), recipient.id)
            .await
        {
            info!(
                notification_id = %notification.id,
                recipient = %recipient.id,
                kind = notification.kind().as_str(),
                "Notification delivered"
            );
            DispatchOutcome::Delivered
        } else {
            DispatchOutcome::DeliveredUnrecorded
        }
    }

    /// Forget every claim, letting the same pairs be dispatched again.
    pub fn clear_processed(&self) {
        let count = self.processed.len();
        self.processed.clear();
        debug!(count, "Processed notification set cleared");
    }

    /// Number of claimed pairs.
    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }

    /// The ledger this dispatcher writes to.
    pub fn ledger(&self) -> &DeliveryLedger {
        &self.ledger
    }
}
