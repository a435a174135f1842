//! Realtime change listener.
//!
//! While a user is signed in, one feed channel delivers notification
//! inserts (every mailbox for admins, their own for customers) and the
//! user's order status log inserts. Each event goes through the ledger and
//! the filter before reaching the dispatcher.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};
use uuid::Uuid;

use storefront_core::result::AppResult;
use storefront_core::types::id::UserId;
use storefront_entity::notification::Notification;
use storefront_entity::user::SessionUser;

use crate::backend::{ChangeEvent, ChangeFeed, ChangeSpec, ChangeTable};
use crate::dispatcher::Dispatcher;
use crate::filter::NotificationFilter;
use crate::ledger::DeliveryLedger;
use crate::poll::UnreadSync;
use crate::session::SessionContext;

/// Whether a listener is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ListenerState {
    /// No subscription.
    Detached,
    /// Subscribed on behalf of a user.
    Attached {
        /// The user the subscription serves.
        user_id: UserId,
    },
}

/// Attaches realtime subscriptions for the signed-in user.
#[derive(Debug, Clone)]
pub struct ChangeListener {
    feed: Arc<dyn ChangeFeed>,
    session: SessionContext,
    ledger: DeliveryLedger,
    filter: NotificationFilter,
    dispatcher: Dispatcher,
    sync: UnreadSync,
    channel_prefix: String,
}

impl ChangeListener {
    /// Create a listener.
    pub fn new(
        feed: Arc<dyn ChangeFeed>,
        session: SessionContext,
        ledger: DeliveryLedger,
        filter: NotificationFilter,
        dispatcher: Dispatcher,
        sync: UnreadSync,
        channel_prefix: impl Into<String>,
    ) -> Self {
        Self {
            feed,
            session,
            ledger,
            filter,
            dispatcher,
            sync,
            channel_prefix: channel_prefix.into(),
        }
    }

    /// Feed channel name for one attach of a user. Every call yields a new
    /// name, so releasing an old handle never touches a newer subscription.
    pub fn channel_name(&self, user_id: UserId) -> String {
        format!("{}:{}:{}", self.channel_prefix, user_id, Uuid::new_v4())
    }

    /// Subscription predicates for a user.
    pub fn specs_for(user: &SessionUser) -> Vec<ChangeSpec> {
        let notifications = if user.is_admin() {
            ChangeSpec::inserts(ChangeTable::Notifications)
        } else {
            ChangeSpec::owned_by(ChangeTable::Notifications, user.id)
        };
        vec![
            notifications,
            ChangeSpec::owned_by(ChangeTable::OrderStatusLogs, user.id),
        ]
    }

    /// Subscribe on behalf of `user`. The subscription lives as long as the
    /// returned handle.
    pub async fn attach(&self, user: SessionUser) -> AppResult<ListenerHandle> {
        let channel = self.channel_name(user.id);
        let events = self.feed.subscribe(&channel, Self::specs_for(&user)).await?;

        let mut handle = ListenerHandle {
            channel,
            user: user.clone(),
            feed: self.feed.clone(),
            token: CancellationToken::new(),
            task: None,
            released: false,
        };
        let worker = EventWorker {
            listener: self.clone(),
            user,
        };
        handle.task = Some(tokio::spawn(worker.run(events, handle.token.clone())));

        info!(channel = %handle.channel, user_id = %handle.user.id, "Change listener attached");
        Ok(handle)
    }

    /// Stop listening. Events already being handled finish first.
    pub async fn detach(&self, handle: ListenerHandle) {
        handle.release().await;
    }
}

/// An attached subscription. Dropping it without [`ChangeListener::detach`]
/// still removes the channel.
#[derive(Debug)]
pub struct ListenerHandle {
    channel: String,
    user: SessionUser,
    feed: Arc<dyn ChangeFeed>,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
    released: bool,
}

impl ListenerHandle {
    /// The user this subscription serves.
    pub fn user_id(&self) -> UserId {
        self.user.id
    }

    /// Feed channel name.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Whether the event worker is still running.
    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    async fn release(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        self.feed.remove_channel(&self.channel).await;
        self.released = true;
        info!(channel = %self.channel, user_id = %self.user.id, "Change listener detached");
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.token.cancel();
        let feed = self.feed.clone();
        let channel = std::mem::take(&mut self.channel);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    feed.remove_channel(&channel).await;
                    debug!(channel = %channel, "Change listener released on drop");
                });
            }
            Err(_) => debug!(channel = %channel, "No runtime to release change listener"),
        }
    }
}

struct EventWorker {
    listener: ChangeListener,
    user: SessionUser,
}

impl EventWorker {
    async fn run(self, mut events: mpsc::Receiver<ChangeEvent>, token: CancellationToken) {
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => self.handle(event).await,
                    None => {
                        debug!(user_id = %self.user.id, "Change feed closed");
                        break;
                    }
                },
            }
        }
    }

    async fn handle(&self, event: ChangeEvent) {
        match event {
            ChangeEvent::NotificationInserted(notification) => {
                self.on_notification(&notification).await;
            }
            ChangeEvent::OrderStatusLogged(log) => {
                if log.owner() != self.user.id {
                    return;
                }
                trace!(order_id = %log.order(), status = %log.status, "Order status logged");
                self.listener.sync.sync_unread(self.user.id).await;
            }
        }
    }

    async fn on_notification(&self, notification: &Notification) {
        let listener = &self.listener;
        if !listener.session.is_current(self.user.id) {
            trace!(notification_id = %notification.id, "Session changed, dropping event");
            return;
        }
        if listener
            .ledger
            .has_been_delivered(notification.notification_id(), self.user.id)
            .await
        {
            trace!(notification_id = %notification.id, "Already delivered, dropping event");
            return;
        }
        if !listener.filter.is_relevant(notification, &self.user) {
            return;
        }
        listener.dispatcher.dispatch(notification, &self.user).await;
    }
}
