//! Notification delivery configuration.

use serde::{Deserialize, Serialize};

/// Settings for the dispatcher and change listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Delay before a background notification is shown, in milliseconds.
    #[serde(default = "default_scheduled_delay")]
    pub scheduled_delay_ms: u64,
    /// Prefix of the realtime channel name; the user id is appended.
    #[serde(default = "default_listener_channel_prefix")]
    pub listener_channel_prefix: String,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            scheduled_delay_ms: default_scheduled_delay(),
            listener_channel_prefix: default_listener_channel_prefix(),
        }
    }
}

fn default_scheduled_delay() -> u64 {
    1000
}

fn default_listener_channel_prefix() -> String {
    "notifications".to_string()
}
