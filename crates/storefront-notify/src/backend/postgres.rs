//! PostgreSQL backend.
//!
//! Tables go through the `storefront-database` repositories. The change
//! feed opens one `LISTEN` connection per subscribed channel and filters
//! the trigger payloads client-side against the channel's specs.

use async_trait::async_trait;
use dashmap::DashMap;
use sqlx::PgPool;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use storefront_core::config::backend::BackendConfig;
use storefront_core::result::AppResult;
use storefront_core::types::id::{NotificationId, UserId};
use storefront_database::change::{ChangeStream, RowChange};
use storefront_database::repositories::{
    DeliveryRepository, NotificationRepository, OrderStatusRepository, UserRepository,
};
use storefront_entity::notification::{NewNotification, Notification, NotificationKind};
use storefront_entity::order::{NewOrderStatusLog, OrderStatusLog};
use storefront_entity::user::User;

use super::{
    ChangeEvent, ChangeFeed, ChangeSpec, ChangeTable, DeliveryStore, NotificationStore,
    UnreadQuery, UserDirectory,
};

/// sqlx-backed implementation of every backend trait.
#[derive(Debug)]
pub struct PostgresBackend {
    pool: PgPool,
    notifications: NotificationRepository,
    deliveries: DeliveryRepository,
    users: UserRepository,
    status_logs: OrderStatusRepository,
    change_channel: String,
    feed_buffer: usize,
    /// Channel name → forwarding task.
    subscriptions: DashMap<String, JoinHandle<()>>,
}

impl PostgresBackend {
    /// Create a backend over an open pool.
    pub fn new(pool: PgPool, config: &BackendConfig) -> Self {
        Self {
            notifications: NotificationRepository::new(pool.clone()),
            deliveries: DeliveryRepository::new(pool.clone()),
            users: UserRepository::new(pool.clone()),
            status_logs: OrderStatusRepository::new(pool.clone()),
            pool,
            change_channel: config.change_channel.clone(),
            feed_buffer: config.feed_buffer.max(1),
            subscriptions: DashMap::new(),
        }
    }
}

/// Decode a trigger payload into a typed event. Tables the notifier does
/// not watch yield `None`.
pub fn decode_change(change: RowChange) -> AppResult<Option<ChangeEvent>> {
    let event = match ChangeTable::from_table_name(&change.table) {
        Some(ChangeTable::Notifications) => Some(ChangeEvent::NotificationInserted(
            serde_json::from_value::<Notification>(change.record)?,
        )),
        Some(ChangeTable::OrderStatusLogs) => Some(ChangeEvent::OrderStatusLogged(
            serde_json::from_value::<OrderStatusLog>(change.record)?,
        )),
        None => None,
    };
    Ok(event)
}

/// `type` column values and display titles matching `kinds`, so rows that
/// only carry a title are found too.
fn kind_filters(kinds: &[NotificationKind]) -> (Vec<String>, Vec<String>) {
    let types = kinds.iter().map(|k| k.as_str().to_string()).collect();
    let titles = kinds.iter().map(|k| k.display_title().to_string()).collect();
    (types, titles)
}

async fn forward_changes(
    mut stream: ChangeStream,
    channel: String,
    specs: Vec<ChangeSpec>,
    tx: mpsc::Sender<ChangeEvent>,
) {
    loop {
        let change = match stream.next().await {
            Ok(change) => change,
            Err(e) => {
                error!(channel = %channel, error = %e, "Change feed closed");
                break;
            }
        };
        let event = match decode_change(change) {
            Ok(Some(event)) => event,
            Ok(None) => continue,
            Err(e) => {
                warn!(channel = %channel, error = %e, "Undecodable change");
                continue;
            }
        };
        if !specs.iter().any(|spec| spec.matches(&event)) {
            continue;
        }
        if tx.send(event).await.is_err() {
            debug!(channel = %channel, "Subscriber gone; closing change feed");
            break;
        }
    }
    stream.close().await;
}

#[async_trait]
impl NotificationStore for PostgresBackend {
    async fn find_unread(&self, query: &UnreadQuery) -> AppResult<Vec<Notification>> {
        let (types, titles) = match &query.kinds {
            Some(kinds) => {
                let (types, titles) = kind_filters(kinds);
                (Some(types), Some(titles))
            }
            None => (None, None),
        };
        self.notifications
            .find_unread(
                query.owner,
                types.as_deref(),
                titles.as_deref(),
                query.undelivered_to,
            )
            .await
    }

    async fn find_by_kinds(
        &self,
        owner: Option<UserId>,
        kinds: &[NotificationKind],
        limit: usize,
    ) -> AppResult<Vec<Notification>> {
        let (types, titles) = kind_filters(kinds);
        self.notifications
            .find_by_types(owner, &types, &titles, limit as i64)
            .await
    }

    async fn count_unread(&self, user_id: UserId) -> AppResult<i64> {
        self.notifications.count_unread(user_id).await
    }

    async fn insert(&self, new: NewNotification) -> AppResult<Notification> {
        self.notifications.create(&new).await
    }

    async fn insert_status_log(&self, log: NewOrderStatusLog) -> AppResult<OrderStatusLog> {
        self.status_logs.create(&log).await
    }

    async fn mark_read(&self, id: NotificationId) -> AppResult<bool> {
        self.notifications.mark_read(id).await
    }

    async fn mark_all_read(&self, user_id: UserId) -> AppResult<u64> {
        self.notifications.mark_all_read(user_id).await
    }
}

#[async_trait]
impl DeliveryStore for PostgresBackend {
    async fn exists(&self, notification_id: NotificationId, user_id: UserId) -> AppResult<bool> {
        self.deliveries.exists(notification_id, user_id).await
    }

    async fn insert_if_absent(
        &self,
        notification_id: NotificationId,
        user_id: UserId,
    ) -> AppResult<bool> {
        self.deliveries
            .insert_if_absent(notification_id, user_id)
            .await
    }
}

#[async_trait]
impl UserDirectory for PostgresBackend {
    async fn find_user(&self, id: UserId) -> AppResult<Option<User>> {
        self.users.find_by_id(id).await
    }

    async fn admin_ids(&self) -> AppResult<Vec<UserId>> {
        self.users.find_admin_ids().await
    }
}

#[async_trait]
impl ChangeFeed for PostgresBackend {
    async fn subscribe(
        &self,
        channel: &str,
        specs: Vec<ChangeSpec>,
    ) -> AppResult<mpsc::Receiver<ChangeEvent>> {
        let stream = ChangeStream::connect(&self.pool, &self.change_channel).await?;
        let (tx, rx) = mpsc::channel(self.feed_buffer);
        let task = tokio::spawn(forward_changes(stream, channel.to_string(), specs, tx));

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
