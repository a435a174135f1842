//! Row change stream over `LISTEN`/`NOTIFY`.
//!
//! The insert triggers publish `{"table": ..., "record": ...}` on a single
//! channel. [`ChangeStream`] owns a dedicated listener connection and
//! decodes each payload into a [`RowChange`].

use serde::Deserialize;
use sqlx::PgPool;
use sqlx::postgres::PgListener;
use tracing::{debug, warn};

use storefront_core::error::{AppError, ErrorKind};
use storefront_core::result::AppResult;

/// One inserted row as published by the triggers.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RowChange {
    /// Source table name.
    pub table: String,
    /// The new row, serialized by `row_to_json`.
    pub record: serde_json::Value,
}

impl RowChange {
    /// Decode a notification payload.
    pub fn parse(payload: &str) -> AppResult<Self> {
        serde_json::from_str(payload).map_err(|e| {
            AppError::with_source(
                ErrorKind::Serialization,
                format!("Malformed change payload: {e}"),
                e,
            )
        })
    }
}

/// Trigger function installed by the migrations to publish inserts.
pub const PUBLISH_FUNCTION: &str = "storefront_publish_insert";

/// Whether a trigger function body passes `channel` to `pg_notify`.
pub fn publishes_on(source: &str, channel: &str) -> bool {
    source.contains(&format!("'{channel}'"))
}

/// Check that the installed [`PUBLISH_FUNCTION`] publishes on `channel`.
/// `None` when the function is not installed.
pub async fn trigger_publishes_on(pool: &PgPool, channel: &str) -> AppResult<Option<bool>> {
    let source: Option<String> =
        sqlx::query_scalar("SELECT prosrc FROM pg_proc WHERE proname = $1")
            .bind(PUBLISH_FUNCTION)
            .fetch_optional(pool)
            .await?;
    Ok(source.map(|body| publishes_on(&body, channel)))
}

/// A listener connection subscribed to the change channel.
#[derive(Debug)]
pub struct ChangeStream {
    listener: PgListener,
    channel: String,
}

impl ChangeStream {
    /// Open a listener connection and `LISTEN` on `channel`.
    pub async fn connect(pool: &PgPool, channel: &str) -> AppResult<Self> {
        let mut listener = PgListener::connect_with(pool).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Realtime,
                format!("Failed to open listener connection: {e}"),
                e,
            )
        })?;
        listener.listen(channel).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Realtime,
                format!("Failed to LISTEN on '{channel}': {e}"),
                e,
            )
        })?;
        debug!(channel, "Listening for row changes");
        Ok(Self {
            listener,
            channel: channel.to_string(),
        })
    }

    /// Wait for the next decodable change. Malformed payloads are skipped.
    pub async fn next(&mut self) -> AppResult<RowChange> {
        loop {
            let notification = self.listener.recv().await.map_err(|e| {
                AppError::with_source(
                    ErrorKind::Realtime,
                    format!("Listener on '{}' failed: {e}", self.channel),
                    e,
                )
            })?;
            match RowChange::parse(notification.payload()) {
                Ok(change) => return Ok(change),
                Err(e) => warn!(channel = %self.channel, error = %e, "Dropping change payload"),
            }
        }
    }

    /// Stop listening and release the connection.
    pub async fn close(mut self) {
        if let Err(e) = self.listener.unlisten_all().await {
            warn!(channel = %self.channel, error = %e, "UNLISTEN failed");
        }
    }
}
