//! Current session user.
//!
//! The single source of truth for "who is this device notifying". One
//! writer (sign-in/sign-out) and many readers (filter, dispatcher,
//! listener, runtime) share it through a `watch` channel.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use storefront_core::types::id::UserId;
use storefront_entity::user::SessionUser;

/// Shared holder of the signed-in user.
#[derive(Debug, Clone)]
pub struct SessionContext {
    tx: Arc<watch::Sender<Option<SessionUser>>>,
}

impl SessionContext {
    /// Create a context with nobody signed in.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Sign a user in. Setting the same user again is a no-op and does not
    /// wake subscribers.
    pub fn set_session(&self, user: SessionUser) {
        let changed = self.tx.send_if_modified(|current| {
            if current.as_ref() == Some(&user) {
                return false;
            }
            *current = Some(user.clone());
            true
        });
        if changed {
            info!(user_id = %user.id, role = %user.role, "Session user set");
        }
    }

    /// Sign the current user out. Returns the user that was signed in.
    pub fn clear_session(&self) -> Option<SessionUser> {
        let mut previous = None;
        self.tx.send_if_modified(|current| {
            previous = current.take();
            previous.is_some()
        });
        if let Some(user) = &previous {
            info!(user_id = %user.id, "Session user cleared");
        }
        previous
    }

    /// Snapshot of the signed-in user.
    pub fn current(&self) -> Option<SessionUser> {
        self.tx.borrow().clone()
    }

    /// Whether `user_id` is the signed-in user.
    pub fn is_current(&self, user_id: UserId) -> bool {
        self.tx
            .borrow()
            .as_ref()
            .is_some_and(|user| user.id == user_id)
    }

    /// Receiver woken on every sign-in/sign-out transition.
    pub fn subscribe(&self) -> watch::Receiver<Option<SessionUser>> {
        self.tx.subscribe()
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}
