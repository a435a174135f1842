//! The platform notification primitive.
//!
//! [`PushPlatform`] abstracts permission handling, immediate and delayed
//! presentation, and background-task registration. [`ForegroundSignal`]
//! carries the app's foreground/background state.

pub mod expo;
pub mod log;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use storefront_core::result::AppResult;
use storefront_entity::notification::Notification;

pub use expo::ExpoPushPlatform;
pub use log::LogPushPlatform;

/// Name of the background task that keeps delivery alive while suspended.
pub const BACKGROUND_NOTIFICATION_TASK: &str = "storefront-background-notifications";

/// Whether the user allows notifications to be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    /// Notifications may be shown.
    Granted,
    /// The user refused.
    Denied,
    /// The user has not been asked yet.
    Undetermined,
}

impl PermissionStatus {
    /// Whether presentation is allowed.
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted)
    }
}

/// What the platform renders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushPayload {
    /// Title line.
    pub title: String,
    /// Body text.
    pub body: String,
    /// Attributes delivered with the notification.
    pub data: serde_json::Value,
    /// Play the default sound.
    pub sound: bool,
}

impl PushPayload {
    /// Render a notification row.
    ///
    /// `data` carries the row's own attributes plus `notificationId` and
    /// `type`; those two keys always reflect the row.
    pub fn from_notification(notification: &Notification) -> Self {
        let mut data = match &notification.data {
            serde_json::Value::Object(map) => map.clone(),
            _ => serde_json::Map::new(),
        };
        data.insert(
            "notificationId".to_string(),
            serde_json::Value::String(notification.id.to_string()),
        );
        data.insert(
            "type".to_string(),
            serde_json::Value::String(notification.notification_type.clone()),
        );

        Self {
            title: notification.title.clone(),
            body: notification.message.clone(),
            data: serde_json::Value::Object(data),
            sound: true,
        }
    }
}

/// The device notification primitive.
#[async_trait]
pub trait PushPlatform: Send + Sync + std::fmt::Debug + 'static {
    /// Current permission state.
    async fn permission_status(&self) -> AppResult<PermissionStatus>;

    /// Ask for permission if it has not been granted.
    async fn request_permission(&self) -> AppResult<PermissionStatus>;

    /// Show a notification now.
    async fn present(&self, payload: PushPayload) -> AppResult<()>;

    /// Queue a notification to be shown after `delay`. Returns once queued.
    async fn schedule(&self, payload: PushPayload, delay: Duration) -> AppResult<()>;

    /// Register the background delivery task.
    async fn register_background_task(&self, name: &str) -> AppResult<()> {
        tracing::debug!(task = name, "Background tasks not supported by this platform");
        Ok(())
    }
}

/// App lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppState {
    /// The app is visible.
    Foreground,
    /// The app is suspended or hidden.
    Background,
}

/// Foreground/background signal shared by the dispatcher and runtime.
#[derive(Debug, Clone)]
pub struct ForegroundSignal {
    tx: Arc<watch::Sender<AppState>>,
}

impl ForegroundSignal {
    /// Create a signal in the given state.
    pub fn new(initial: AppState) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    /// Report a lifecycle transition. Repeating the current state is ignored.
    pub fn set(&self, state: AppState) {
        self.tx.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
    }

    /// Current state.
    pub fn current(&self) -> AppState {
        *self.tx.borrow()
    }

    /// Best-effort foreground check.
    pub fn is_foreground(&self) -> bool {
        self.current() == AppState::Foreground
    }

    /// Receiver woken on every transition.
    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.tx.subscribe()
    }
}

impl Default for ForegroundSignal {
    fn default() -> Self {
        Self::new(AppState::Foreground)
    }
}
