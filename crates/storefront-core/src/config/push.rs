//! Push platform configuration.

use serde::{Deserialize, Serialize};

/// Which push platform renders notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushProvider {
    /// Expo push service over HTTPS.
    Expo,
    /// Write notifications to the log only.
    Log,
}

/// Push delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushConfig {
    /// Push implementation.
    #[serde(default = "default_provider")]
    pub provider: PushProvider,
    /// Expo push endpoint.
    #[serde(default = "default_expo_url")]
    pub expo_url: String,
    /// Expo push token of this device. Missing means permission denied.
    #[serde(default)]
    pub expo_token: Option<String>,
    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            expo_url: default_expo_url(),
            expo_token: None,
            request_timeout_seconds: default_timeout(),
        }
    }
}

fn default_provider() -> PushProvider {
    PushProvider::Expo
}

fn default_expo_url() -> String {
    "https://exp.host/--/api/v2/push/send".to_string()
}

fn default_timeout() -> u64 {
    10
}
