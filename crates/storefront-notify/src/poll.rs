//! Poll-on-resume.
//!
//! Re-reads unread notifications that have no delivery record for the
//! user, narrowed by the store to the kinds the user's role receives, and
//! feeds them through the dispatcher. Covers anything the change
//! listener missed while detached, backgrounded or disconnected.

use std::sync::Arc;

use tracing::{debug, error, info};

use storefront_core::types::id::UserId;
use storefront_entity::notification::Notification;

use crate::backend::{NotificationStore, UnreadQuery};
use crate::dispatcher::Dispatcher;
use crate::filter::NotificationFilter;
use crate::session::SessionContext;

/// Catches up on undelivered unread notifications.
#[derive(Debug, Clone)]
pub struct UnreadSync {
    store: Arc<dyn NotificationStore>,
    filter: NotificationFilter,
    dispatcher: Dispatcher,
    session: SessionContext,
}

impl UnreadSync {
    /// Create a poller.
    pub fn new(
        store: Arc<dyn NotificationStore>,
        filter: NotificationFilter,
        dispatcher: Dispatcher,
        session: SessionContext,
    ) -> Self {
        Self {
            store,
            filter,
            dispatcher,
            session,
        }
    }

    /// Dispatch every relevant unread notification not yet delivered to
    /// `user_id`, newest first, one at a time. Returns the notifications
    /// that were handed to the dispatcher.
    ///
    /// Does nothing unless `user_id` is the signed-in user.
    pub async fn sync_unread(&self, user_id: UserId) -> Vec<Notification> {
        let Some(recipient) = self.session.current().filter(|u| u.id == user_id) else {
            debug!(user_id = %user_id, "No matching session, skipping unread sync");
            return Vec::new();
        };

        // Admins watch every mailbox.
        let base = if recipient.is_admin() {
            UnreadQuery::all_mailboxes()
        } else {
            UnreadQuery::mailbox(user_id)
        };
        let query = base
            .of_kinds(self.filter.routing().kinds_for(recipient.role).iter().copied())
            .undelivered_to(user_id);

        let mut pending: Vec<Notification> = match self.store.find_unread(&query).await {
            Ok(rows) => rows,
            Err(e) => {
                error!(user_id = %user_id, "Failed to fetch unread notifications: {}", e);
                return Vec::new();
            }
        };
        pending.retain(|n| self.filter.is_relevant(n, &recipient));
        pending.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        for notification in &pending {
            self.dispatcher.dispatch(notification, &recipient).await;
        }

        if !pending.is_empty() {
            info!(user_id = %user_id, count = pending.len(), "Unread notifications synced");
        }
        pending
    }
}
