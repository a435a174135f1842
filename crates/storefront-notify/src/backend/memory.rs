//! In-memory backend for single-process deployments.
//!
//! Rows live in `DashMap`s; every insert on a realtime table is published
//! on a `broadcast` channel that subscribed feed channels filter.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use storefront_core::error::AppError;
use storefront_core::result::AppResult;
use storefront_core::types::id::{NotificationId, UserId};
use storefront_entity::delivery::DeliveryRecord;
use storefront_entity::notification::{NewNotification, Notification, NotificationKind};
use storefront_entity::order::{NewOrderStatusLog, OrderStatusLog};
use storefront_entity::user::{User, UserRole};

use super::{
    ChangeEvent, ChangeFeed, ChangeSpec, DeliveryStore, NotificationStore, UnreadQuery,
    UserDirectory,
};

/// Process-local tables and change feed.
#[derive(Debug)]
pub struct MemoryBackend {
    users: DashMap<UserId, User>,
    notifications: DashMap<NotificationId, Notification>,
    deliveries: DashMap<(NotificationId, UserId), DeliveryRecord>,
    status_logs: DashMap<Uuid, OrderStatusLog>,
    events: broadcast::Sender<ChangeEvent>,
    /// Channel name → forwarding task.
    subscriptions: DashMap<String, JoinHandle<()>>,
    feed_buffer: usize,
    /// Simulates a realtime outage: `subscribe` fails while set.
    feed_down: AtomicBool,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new(feed_buffer: usize) -> Self {
        let feed_buffer = feed_buffer.max(1);
        let (events, _) = broadcast::channel(feed_buffer);
        Self {
            users: DashMap::new(),
            notifications: DashMap::new(),
            deliveries: DashMap::new(),
            status_logs: DashMap::new(),
            events,
            subscriptions: DashMap::new(),
            feed_buffer,
            feed_down: AtomicBool::new(false),
        }
    }

    /// Create an account.
    pub fn add_user(&self, email: &str, role: UserRole) -> User {
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            full_name: None,
            role: role.as_str().to_string(),
            created_at: Utc::now(),
        };
        self.users.insert(UserId::from_uuid(user.id), user.clone());
        user
    }

    /// Snapshot of one notification row.
    pub fn notification(&self, id: NotificationId) -> Option<Notification> {
        self.notifications.get(&id).map(|n| n.value().clone())
    }

    /// Number of delivery records for a pair (0 or 1).
    pub fn delivery_count(&self, notification_id: NotificationId, user_id: UserId) -> usize {
        usize::from(self.deliveries.contains_key(&(notification_id, user_id)))
    }

    /// Total delivery records.
    pub fn total_deliveries(&self) -> usize {
        self.deliveries.len()
    }

    /// Number of open feed channels.
    pub fn open_channels(&self) -> usize {
        self.subscriptions.len()
    }

    /// Make `subscribe` fail until reset.
    pub fn set_feed_down(&self, down: bool) {
        self.feed_down.store(down, Ordering::SeqCst);
    }

    fn publish(&self, event: ChangeEvent) {
        // No receivers just means nobody is attached.
        let _ = self.events.send(event);
    }
}

async fn forward_changes(
    mut events: broadcast::Receiver<ChangeEvent>,
    channel: String,
    specs: Vec<ChangeSpec>,
    tx: mpsc::Sender<ChangeEvent>,
) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(channel = %channel, skipped, "Change feed lagged");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        if !specs.iter().any(|spec| spec.matches(&event)) {
            continue;
        }
        if tx.send(event).await.is_err() {
            break;
        }
    }
}

fn newest_first(rows: &mut [Notification]) {
    rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

#[async_trait]
impl NotificationStore for MemoryBackend {
    async fn find_unread(&self, query: &UnreadQuery) -> AppResult<Vec<Notification>> {
        let mut rows: Vec<Notification> = self
            .notifications
            .iter()
            .filter(|entry| {
                let n = entry.value();
                n.is_unread()
                    && query.owner.is_none_or(|owner| n.owner() == owner)
                    && query.allows(n.kind())
                    && query.undelivered_to.is_none_or(|user| {
                        !self.deliveries.contains_key(&(*entry.key(), user))
                    })
            })
            .map(|entry| entry.value().clone())
            .collect();
        newest_first(&mut rows);
        Ok(rows)
    }

    async fn find_by_kinds(
        &self,
        owner: Option<UserId>,
        kinds: &[NotificationKind],
        limit: usize,
    ) -> AppResult<Vec<Notification>> {
        let mut rows: Vec<Notification> = self
            .notifications
            .iter()
            .filter(|entry| {
                let n = entry.value();
                owner.is_none_or(|owner| n.owner() == owner) && kinds.contains(&n.kind())
            })
            .map(|entry| entry.value().clone())
            .collect();
        newest_first(&mut rows);
        rows.truncate(limit);
        Ok(rows)
    }

    async fn count_unread(&self, user_id: UserId) -> AppResult<i64> {
        let count = self
            .notifications
            .iter()
            .filter(|entry| entry.value().owner() == user_id && entry.value().is_unread())
            .count();
        Ok(count as i64)
    }

    async fn insert(&self, new: NewNotification) -> AppResult<Notification> {
        if !self.users.contains_key(&new.user_id) {
            return Err(AppError::validation(format!(
                "Notification owner {} does not exist",
                new.user_id
            )));
        }
        let notification = new.into_notification(Uuid::new_v4(), Utc::now());
        self.notifications
            .insert(notification.notification_id(), notification.clone());
        self.publish(ChangeEvent::NotificationInserted(notification.clone()));
        Ok(notification)
    }

    async fn insert_status_log(&self, log: NewOrderStatusLog) -> AppResult<OrderStatusLog> {
        let row = OrderStatusLog {
            id: Uuid::new_v4(),
            order_id: log.order_id.into_uuid(),
            user_id: log.user_id.into_uuid(),
            status: log.status,
            note: log.note,
            created_at: Utc::now(),
        };
        self.status_logs.insert(row.id, row.clone());
        self.publish(ChangeEvent::OrderStatusLogged(row.clone()));
        Ok(row)
    }

    async fn mark_read(&self, id: NotificationId) -> AppResult<bool> {
        Ok(match self.notifications.get_mut(&id) {
            Some(mut n) if !n.read => {
                n.read = true;
                true
            }
            _ => false,
        })
    }

    async fn mark_all_read(&self, user_id: UserId) -> AppResult<u64> {
        let mut changed = 0;
        for mut entry in self.notifications.iter_mut() {
            if entry.owner() == user_id && !entry.read {
                entry.read = true;
                changed += 1;
            }
        }
        Ok(changed)
    }
}

#[async_trait]
impl DeliveryStore for MemoryBackend {
    async fn exists(&self, notification_id: NotificationId, user_id: UserId) -> AppResult<bool> {
        Ok(self.deliveries.contains_key(&(notification_id, user_id)))
    }

    async fn insert_if_absent(
        &self,
        notification_id: NotificationId,
        user_id: UserId,
    ) -> AppResult<bool> {
        match self.deliveries.entry((notification_id, user_id)) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(DeliveryRecord::now(notification_id, user_id));
                Ok(true)
            }
        }
    }
}

#[async_trait]
impl UserDirectory for MemoryBackend {
    async fn find_user(&self, id: UserId) -> AppResult<Option<User>> {
        Ok(self.users.get(&id).map(|u| u.value().clone()))
    }

    async fn admin_ids(&self) -> AppResult<Vec<UserId>> {
        let mut admins: Vec<User> = self
            .users
            .iter()
            .filter(|entry| entry.value().role().is_admin())
            .map(|entry| entry.value().clone())
            .collect();
        admins.sort_by_key(|u| u.created_at);
        Ok(admins.into_iter().map(|u| UserId::from_uuid(u.id)).collect())
    }
}

#[async_trait]
impl ChangeFeed for MemoryBackend {
    async fn subscribe(
        &self,
        channel: &str,
        specs: Vec<ChangeSpec>,
    ) -> AppResult<mpsc::Receiver<ChangeEvent>> {
        if self.feed_down.load(Ordering::SeqCst) {
            return Err(AppError::realtime(format!(
                "Realtime unavailable; cannot open '{channel}'"
            )));
        }
        // Subscribe before spawning so nothing published after this call is missed.
        let events = self.events.subscribe();
        let (tx, rx) = mpsc::channel(self.feed_buffer);
        let task = tokio::spawn(forward_changes(events, channel.to_string(), specs, tx));

        if let Some(previous) = self.subscriptions.insert(channel.to_string(), task) {
            previous.abort();
        }
        debug!(channel, "Realtime channel subscribed");
        Ok(rx)
    }

    async fn remove_channel(&self, channel: &str) {
        if let Some((_, task)) = self.subscriptions.remove(channel) {
            task.abort();
            debug!(channel, "Realtime channel removed");
        }
    }
}
