//! Log-only push platform.

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use storefront_core::error::AppError;
use storefront_core::result::AppResult;

use super::{PermissionStatus, PushPayload, PushPlatform};

/// Writes notifications to the log instead of a device.
#[derive(Debug, Clone)]
pub struct LogPushPlatform {
    permission: PermissionStatus,
}

impl LogPushPlatform {
    /// A platform that shows everything.
    pub fn granted() -> Self {
        Self {
            permission: PermissionStatus::Granted,
        }
    }

    /// A platform with a fixed permission answer.
    pub fn with_permission(permission: PermissionStatus) -> Self {
        Self { permission }
    }

    fn ensure_granted(&self) -> AppResult<()> {
        if self.permission.is_granted() {
            Ok(())
        } else {
            Err(AppError::permission_denied("Notifications are not permitted"))
        }
    }
}

#[async_trait]
impl PushPlatform for LogPushPlatform {
    async fn permission_status(&self) -> AppResult<PermissionStatus> {
        Ok(self.permission)
    }

    async fn request_permission(&self) -> AppResult<PermissionStatus> {
        Ok(self.permission)
    }

    async fn present(&self, payload: PushPayload) -> AppResult<()> {
        self.ensure_granted()?;
        info!(title = %payload.title, body = %payload.body, data = %payload.data, "Notification");
        Ok(())
    }

    async fn schedule(&self, payload: PushPayload, delay: Duration) -> AppResult<()> {
        self.ensure_granted()?;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            info!(title = %payload.title, body = %payload.body, data = %payload.data, "Notification (scheduled)");
        });
        Ok(())
    }

    async fn register_background_task(&self, name: &str) -> AppResult<()> {
        info!(task = name, "Background notification task registered");
        Ok(())
    }
}
