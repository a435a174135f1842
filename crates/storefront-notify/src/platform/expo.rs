//! Expo push service client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use storefront_core::config::push::PushConfig;
use storefront_core::error::{AppError, ErrorKind};
use storefront_core::result::AppResult;

use super::{PermissionStatus, PushPayload, PushPlatform};

/// Sends notifications to this device through the Expo push service.
///
/// Permission is modelled by the device push token: without one the
/// platform reports [`PermissionStatus::Denied`].
#[derive(Debug, Clone)]
pub struct ExpoPushPlatform {
    client: reqwest::Client,
    endpoint: Arc<str>,
    token: Option<Arc<str>>,
}

#[derive(Debug, Serialize)]
struct ExpoMessage<'a> {
    to: &'a str,
    title: &'a str,
    body: &'a str,
    data: &'a serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    sound: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct ExpoResponse {
    #[serde(default)]
    data: Vec<ExpoTicket>,
}

#[derive(Debug, Deserialize)]
struct ExpoTicket {
    status: String,
    #[serde(default)]
    message: Option<String>,
}

impl ExpoPushPlatform {
    /// Build a client from configuration.
    pub fn new(config: &PushConfig) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| {
                AppError::with_source(ErrorKind::Configuration, "Failed to build push client", e)
            })?;

        Ok(Self {
            client,
            endpoint: Arc::from(config.expo_url.as_str()),
            token: config
                .expo_token
                .as_deref()
                .filter(|t| !t.trim().is_empty())
                .map(Arc::from),
        })
    }

    async fn send(&self, payload: &PushPayload) -> AppResult<()> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| AppError::permission_denied("No Expo push token configured"))?;

        let message = ExpoMessage {
            to: token,
            title: &payload.title,
            body: &payload.body,
            data: &payload.data,
            sound: payload.sound.then_some("default"),
        };

        let response = self
            .client
            .post(&*self.endpoint)
            .json(&[message])
            .send()
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Push, "Push request failed", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::push(format!("Push service returned {status}")));
        }

        let body: ExpoResponse = response
            .json()
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Push, "Unreadable push response", e))?;

        check_tickets(&body.data)
    }
}

fn check_tickets(tickets: &[ExpoTicket]) -> AppResult<()> {
    match tickets.iter().find(|t| t.status != "ok") {
        Some(ticket) => Err(AppError::push(format!(
            "Push rejected: {}",
            ticket.message.as_deref().unwrap_or("unknown error")
        ))),
        None => Ok(()),
    }
}

#[async_trait]
impl PushPlatform for ExpoPushPlatform {
    async fn permission_status(&self) -> AppResult<PermissionStatus> {
        Ok(match self.token {
            Some(_) => PermissionStatus::Granted,
            None => PermissionStatus::Denied,
        })
    }

    async fn request_permission(&self) -> AppResult<PermissionStatus> {
        // The token is issued on the device; there is nothing to prompt here.
        self.permission_status().await
    }

    async fn present(&self, payload: PushPayload) -> AppResult<()> {
        self.send(&payload).await?;
        debug!(title = %payload.title, "Push notification sent");
        Ok(())
    }

    async fn schedule(&self, payload: PushPayload, delay: Duration) -> AppResult<()> {
        if self.token.is_none() {
            return Err(AppError::permission_denied("No Expo push token configured"));
        }
        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = this.send(&payload).await {
                error!(title = %payload.title, error = %e, "Scheduled push failed");
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(token: Option<&str>) -> PushConfig {
        PushConfig {
            expo_token: token.map(str::to_string),
            ..PushConfig::default()
        }
    }

    #[tokio::test]
    async fn test_permission_follows_token() {
        let granted = ExpoPushPlatform::new(&config(Some("ExponentPushToken[abc]"))).unwrap();
        assert_eq!(
            granted.permission_status().await.unwrap(),
            PermissionStatus::Granted
        );

        let denied = ExpoPushPlatform::new(&config(Some("  "))).unwrap();
        assert_eq!(
            denied.request_permission().await.unwrap(),
            PermissionStatus::Denied
        );
    }

    #[tokio::test]
    async fn test_schedule_without_token_is_denied() {
        let platform = ExpoPushPlatform::new(&config(None)).unwrap();
        let payload = PushPayload {
            title: "t".to_string(),
            body: "b".to_string(),
            data: serde_json::json!({}),
            sound: true,
        };
        let err = platform
            .schedule(payload, Duration::from_millis(1))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::PermissionDenied);
    }

    #[test]
    fn test_ticket_errors_surface() {
        let body: ExpoResponse = serde_json::from_str(
            r#"{"data":[{"status":"ok","id":"1"},{"status":"error","message":"DeviceNotRegistered"}]}"#,
        )
        .unwrap();
        let err = check_tickets(&body.data).unwrap_err();
        assert!(err.message.contains("DeviceNotRegistered"));

        let ok: ExpoResponse = serde_json::from_str(r#"{"data":[{"status":"ok"}]}"#).unwrap();
        assert!(check_tickets(&ok.data).is_ok());
    }
}
