//! UI-facing notification API.
//!
//! Every call degrades to a neutral value (empty list, zero, `false`) when
//! the backend fails; errors are logged here and never surface.

use std::sync::Arc;

use tracing::{error, info};

use storefront_core::types::id::{NotificationId, UserId};
use storefront_entity::notification::{Notification, NotificationKind};
use storefront_entity::user::{SessionUser, UserRole};

use crate::backend::{NotificationStore, UnreadQuery, UserDirectory};
use crate::dispatcher::Dispatcher;
use crate::filter::NotificationFilter;
use crate::poll::UnreadSync;
use crate::session::SessionContext;

/// Maximum rows returned by [`NotificationService::fetch_messages`].
pub const MESSAGE_PAGE_SIZE: usize = 100;

/// Notification inbox operations for the signed-in device.
#[derive(Debug, Clone)]
pub struct NotificationService {
    store: Arc<dyn NotificationStore>,
    users: Arc<dyn UserDirectory>,
    session: SessionContext,
    filter: NotificationFilter,
    dispatcher: Dispatcher,
    sync: UnreadSync,
}

impl NotificationService {
    /// Create the service.
    pub fn new(
        store: Arc<dyn NotificationStore>,
        users: Arc<dyn UserDirectory>,
        session: SessionContext,
        filter: NotificationFilter,
        dispatcher: Dispatcher,
        sync: UnreadSync,
    ) -> Self {
        Self {
            store,
            users,
            session,
            filter,
            dispatcher,
            sync,
        }
    }

    async fn is_admin(&self, user_id: UserId) -> bool {
        if let Some(user) = self.session.current().filter(|u| u.id == user_id) {
            return user.is_admin();
        }
        match self.users.find_user(user_id).await {
            Ok(user) => user.is_some_and(|u| u.role().is_admin()),
            Err(e) => {
                error!(user_id = %user_id, "Failed to look up user role: {}", e);
                false
            }
        }
    }

    /// Unread notifications the user should see, newest first.
    ///
    /// Customers get their own mailbox; admins get the admin-routed kinds
    /// from every mailbox.
    pub async fn fetch_unread_notifications(&self, user_id: UserId) -> Vec<Notification> {
        let query = if self.is_admin(user_id).await {
            UnreadQuery::all_mailboxes()
                .of_kinds(self.filter.routing().kinds_for(UserRole::Admin).iter().copied())
        } else {
            UnreadQuery::mailbox(user_id)
        };

        self.store.find_unread(&query).await.unwrap_or_else(|e| {
            error!(user_id = %user_id, "Failed to fetch unread notifications: {}", e);
            Vec::new()
        })
    }

    /// The chat thread between customers and admins, newest first.
    ///
    /// Admins see every message in both directions; customers see admin
    /// replies in their own mailbox.
    pub async fn fetch_messages(&self, user_id: UserId, is_admin: bool) -> Vec<Notification> {
        let (owner, kinds) = if is_admin {
            let thread: Vec<NotificationKind> = NotificationKind::ROUTABLE
                .into_iter()
                .filter(NotificationKind::is_message)
                .collect();
            (None, thread)
        } else {
            (Some(user_id), vec![NotificationKind::AdminMessage])
        };

        self.store
            .find_by_kinds(owner, &kinds, MESSAGE_PAGE_SIZE)
            .await
            .unwrap_or_else(|e| {
                error!(user_id = %user_id, "Failed to fetch messages: {}", e);
                Vec::new()
            })
    }

    /// Mark one notification read. `false` if nothing changed or the
    /// backend failed.
    pub async fn mark_notification_as_read(&self, id: NotificationId) -> bool {
        self.store.mark_read(id).await.unwrap_or_else(|e| {
            error!(notification_id = %id, "Failed to mark notification read: {}", e);
            false
        })
    }

    /// Mark every notification in the user's mailbox read. Returns how many
    /// changed.
    pub async fn mark_all_notifications_as_read(&self, user_id: UserId) -> u64 {
        match self.store.mark_all_read(user_id).await {
            Ok(count) => {
                info!(user_id = %user_id, count, "Notifications marked read");
                count
            }
            Err(e) => {
                error!(user_id = %user_id, "Failed to mark notifications read: {}", e);
                0
            }
        }
    }

    /// Unread rows in the user's mailbox.
    pub async fn unread_count(&self, user_id: UserId) -> i64 {
        self.store.count_unread(user_id).await.unwrap_or_else(|e| {
            error!(user_id = %user_id, "Failed to count unread notifications: {}", e);
            0
        })
    }

    /// Sign a user in, or out with `None`. Signing out also forgets which
    /// notifications this process has handled.
    pub fn set_current_user(&self, user: Option<SessionUser>) {
        match user {
            Some(user) => self.session.set_session(user),
            None => {
                self.session.clear_session();
                self.dispatcher.clear_processed();
            }
        }
    }

    /// Forget which notifications this process has handled.
    pub fn clear_processed_notifications(&self) {
        self.dispatcher.clear_processed();
    }

    /// Run poll-on-resume now.
    pub async fn sync_unread(&self, user_id: UserId) -> Vec<Notification> {
        self.sync.sync_unread(user_id).await
    }
}
