//! Backend provider configuration.

use serde::{Deserialize, Serialize};

/// Which backend implementation serves tables and the change feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendProvider {
    /// PostgreSQL tables with a `LISTEN`/`NOTIFY` change feed.
    Postgres,
    /// Process-local tables and broadcast feed.
    Memory,
}

/// Backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Backend implementation.
    #[serde(default = "default_provider")]
    pub provider: BackendProvider,
    /// `pg_notify` channel the insert triggers publish on.
    #[serde(default = "default_change_channel")]
    pub change_channel: String,
    /// Buffer size for change feed channels.
    #[serde(default = "default_feed_buffer")]
    pub feed_buffer: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            change_channel: default_change_channel(),
            feed_buffer: default_feed_buffer(),
        }
    }
}

fn default_provider() -> BackendProvider {
    BackendProvider::Postgres
}

fn default_change_channel() -> String {
    "storefront_changes".to_string()
}

fn default_feed_buffer() -> usize {
    256
}
