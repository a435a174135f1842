//! Backend collaborators consumed by the notifier.
//!
//! Tables, the user directory and the realtime change feed are reached
//! through these traits. [`postgres`] implements them over sqlx and
//! `LISTEN`/`NOTIFY`; [`memory`] implements them in-process.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use storefront_core::config::backend::BackendConfig;
use storefront_core::result::AppResult;
use storefront_core::types::id::{NotificationId, UserId};
use storefront_entity::notification::{NewNotification, Notification, NotificationKind};
use storefront_entity::order::{NewOrderStatusLog, OrderStatusLog};
use storefront_entity::user::User;

pub use memory::MemoryBackend;
pub use postgres::PostgresBackend;

/// Selection of unread notifications.
///
/// Every narrowing is applied by the store, not by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnreadQuery {
    /// Only this mailbox. `None` reads every mailbox.
    pub owner: Option<UserId>,
    /// Only these kinds. `None` allows any kind.
    pub kinds: Option<Vec<NotificationKind>>,
    /// Skip rows with a delivery record for this user.
    pub undelivered_to: Option<UserId>,
}

impl UnreadQuery {
    /// Unread rows in one mailbox.
    pub fn mailbox(owner: UserId) -> Self {
        Self {
            owner: Some(owner),
            ..Self::default()
        }
    }

    /// Unread rows in every mailbox.
    pub fn all_mailboxes() -> Self {
        Self::default()
    }

    /// Narrow to the given kinds.
    pub fn of_kinds(mut self, kinds: impl IntoIterator<Item = NotificationKind>) -> Self {
        self.kinds = Some(kinds.into_iter().collect());
        self
    }

    /// Skip rows already delivered to `user_id`.
    pub fn undelivered_to(mut self, user_id: UserId) -> Self {
        self.undelivered_to = Some(user_id);
        self
    }

    /// Whether `kind` passes the kind narrowing.
    pub fn allows(&self, kind: NotificationKind) -> bool {
        self.kinds.as_ref().is_none_or(|kinds| kinds.contains(&kind))
    }
}

/// Query and write access to notifications and order status logs.
#[async_trait]
pub trait NotificationStore: Send + Sync + std::fmt::Debug + 'static {
    /// Unread rows matching `query`, newest first.
    async fn find_unread(&self, query: &UnreadQuery) -> AppResult<Vec<Notification>>;

    /// Rows of the given kinds, newest first, at most `limit`.
    async fn find_by_kinds(
        &self,
        owner: Option<UserId>,
        kinds: &[NotificationKind],
        limit: usize,
    ) -> AppResult<Vec<Notification>>;

    /// Unread rows in a mailbox.
    async fn count_unread(&self, user_id: UserId) -> AppResult<i64>;

    /// Insert a notification.
    async fn insert(&self, new: NewNotification) -> AppResult<Notification>;

    /// Append an order status transition.
    async fn insert_status_log(&self, log: NewOrderStatusLog) -> AppResult<OrderStatusLog>;

    /// Flip `read` on one row. `false` if it was already read or missing.
    async fn mark_read(&self, id: NotificationId) -> AppResult<bool>;

    /// Flip `read` on every unread row in a mailbox.
    async fn mark_all_read(&self, user_id: UserId) -> AppResult<u64>;
}

/// Append-only storage of delivery records.
#[async_trait]
pub trait DeliveryStore: Send + Sync + std::fmt::Debug + 'static {
    /// Whether the pair has a record.
    async fn exists(&self, notification_id: NotificationId, user_id: UserId) -> AppResult<bool>;

    /// Atomically insert unless present. `true` if this call wrote it.
    async fn insert_if_absent(
        &self,
        notification_id: NotificationId,
        user_id: UserId,
    ) -> AppResult<bool>;
}

/// Read access to accounts.
#[async_trait]
pub trait UserDirectory: Send + Sync + std::fmt::Debug + 'static {
    /// Find a user by id.
    async fn find_user(&self, id: UserId) -> AppResult<Option<User>>;

    /// Admin ids, oldest account first.
    async fn admin_ids(&self) -> AppResult<Vec<UserId>>;
}

/// Tables that publish insert events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeTable {
    /// `notifications`
    Notifications,
    /// `order_status_logs`
    OrderStatusLogs,
}

impl ChangeTable {
    /// Database table name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Notifications => "notifications",
            Self::OrderStatusLogs => "order_status_logs",
        }
    }

    /// Parse a table name.
    pub fn from_table_name(name: &str) -> Option<Self> {
        match name {
            "notifications" => Some(Self::Notifications),
            "order_status_logs" => Some(Self::OrderStatusLogs),
            _ => None,
        }
    }
}

/// An inserted row delivered by the change feed.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    /// A notification row was inserted.
    NotificationInserted(Notification),
    /// An order status transition was logged.
    OrderStatusLogged(OrderStatusLog),
}

impl ChangeEvent {
    /// Source table.
    pub fn table(&self) -> ChangeTable {
        match self {
            Self::NotificationInserted(_) => ChangeTable::Notifications,
            Self::OrderStatusLogged(_) => ChangeTable::OrderStatusLogs,
        }
    }

    /// Owner column of the inserted row.
    pub fn owner(&self) -> UserId {
        match self {
            Self::NotificationInserted(n) => n.owner(),
            Self::OrderStatusLogged(log) => log.owner(),
        }
    }
}

/// One subscription predicate: a table, optionally narrowed to an owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChangeSpec {
    /// Table to watch.
    pub table: ChangeTable,
    /// Only rows whose `user_id` equals this.
    pub owner: Option<UserId>,
}

impl ChangeSpec {
    /// Every insert on `table`.
    pub fn inserts(table: ChangeTable) -> Self {
        Self { table, owner: None }
    }

    /// Inserts on `table` owned by `owner`.
    pub fn owned_by(table: ChangeTable, owner: UserId) -> Self {
        Self {
            table,
            owner: Some(owner),
        }
    }

    /// Whether `event` satisfies this predicate.
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        event.table() == self.table && self.owner.is_none_or(|owner| owner == event.owner())
    }
}

/// Realtime insert feed.
#[async_trait]
pub trait ChangeFeed: Send + Sync + std::fmt::Debug + 'static {
    /// Open a named channel delivering events that match any of `specs`.
    /// Reusing a name replaces the previous channel.
    async fn subscribe(
        &self,
        channel: &str,
        specs: Vec<ChangeSpec>,
    ) -> AppResult<mpsc::Receiver<ChangeEvent>>;

    /// Close a channel. Unknown names are ignored.
    async fn remove_channel(&self, channel: &str);
}

/// The set of collaborators one notifier runs against.
#[derive(Debug, Clone)]
pub struct Backend {
    /// Notification and status log tables.
    pub notifications: Arc<dyn NotificationStore>,
    /// Delivery ledger table.
    pub deliveries: Arc<dyn DeliveryStore>,
    /// Accounts.
    pub users: Arc<dyn UserDirectory>,
    /// Realtime feed.
    pub feed: Arc<dyn ChangeFeed>,
}

impl Backend {
    /// PostgreSQL tables with a `LISTEN`/`NOTIFY` feed.
    pub fn postgres(pool: sqlx::PgPool, config: &BackendConfig) -> Self {
        let pg = Arc::new(PostgresBackend::new(pool, config));
        Self {
            notifications: pg.clone(),
            deliveries: pg.clone(),
            users: pg.clone(),
            feed: pg,
        }
    }

    /// Process-local tables and feed.
    pub fn memory(feed_buffer: usize) -> Self {
        Self::from_memory(Arc::new(MemoryBackend::new(feed_buffer)))
    }

    /// Wrap an existing in-memory backend.
    pub fn from_memory(mem: Arc<MemoryBackend>) -> Self {
        Self {
            notifications: mem.clone(),
            deliveries: mem.clone(),
            users: mem.clone(),
            feed: mem,
        }
    }
}
