//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use storefront_core::config::notifications::NotificationsConfig;
use storefront_core::error::AppError;
use storefront_core::result::AppResult;
use storefront_core::types::id::{NotificationId, UserId};
use storefront_entity::user::{SessionUser, UserRole};
use storefront_notify::backend::{DeliveryStore, MemoryBackend};
use storefront_notify::{
    Backend, ListenerState, Notifier, PermissionStatus, PushPayload, PushPlatform,
};

/// Push platform that records what it was asked to show.
#[derive(Debug, Default)]
pub struct RecordingPlatform {
    presented: Mutex<Vec<PushPayload>>,
    scheduled: Mutex<Vec<(PushPayload, Duration)>>,
    denied: AtomicBool,
    failing: AtomicBool,
}

impl RecordingPlatform {
    pub fn presented(&self) -> Vec<PushPayload> {
        self.presented.lock().unwrap().clone()
    }

    pub fn scheduled(&self) -> Vec<(PushPayload, Duration)> {
        self.scheduled.lock().unwrap().clone()
    }

    /// Notification ids of everything shown or scheduled.
    pub fn shown_ids(&self) -> Vec<String> {
        self.presented()
            .into_iter()
            .chain(self.scheduled().into_iter().map(|(p, _)| p))
            .filter_map(|p| p.data["notificationId"].as_str().map(str::to_string))
            .collect()
    }

    pub fn shown_count(&self) -> usize {
        self.presented.lock().unwrap().len() + self.scheduled.lock().unwrap().len()
    }

    pub fn set_denied(&self, denied: bool) {
        self.denied.store(denied, Ordering::SeqCst);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl PushPlatform for RecordingPlatform {
    async fn permission_status(&self) -> AppResult<PermissionStatus> {
        Ok(if self.denied.load(Ordering::SeqCst) {
            PermissionStatus::Denied
        } else {
            PermissionStatus::Granted
        })
    }

    async fn request_permission(&self) -> AppResult<PermissionStatus> {
        self.permission_status().await
    }

    async fn present(&self, payload: PushPayload) -> AppResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::push("device unreachable"));
        }
        self.presented.lock().unwrap().push(payload);
        Ok(())
    }

    async fn schedule(&self, payload: PushPayload, delay: Duration) -> AppResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::push("device unreachable"));
        }
        self.scheduled.lock().unwrap().push((payload, delay));
        Ok(())
    }
}

/// Delivery store whose writes can be made to fail, standing in for a
/// process that dies between showing a notification and recording it.
#[derive(Debug)]
pub struct FlakyDeliveries {
    inner: Arc<MemoryBackend>,
    fail_writes: AtomicBool,
}

impl FlakyDeliveries {
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl DeliveryStore for FlakyDeliveries {
    async fn exists(&self, notification_id: NotificationId, user_id: UserId) -> AppResult<bool> {
        self.inner.exists(notification_id, user_id).await
    }

    async fn insert_if_absent(
        &self,
        notification_id: NotificationId,
        user_id: UserId,
    ) -> AppResult<bool> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::database("connection lost"));
        }
        self.inner.insert_if_absent(notification_id, user_id).await
    }
}

/// One "device": a notifier over a shared in-memory backend.
pub struct TestApp {
    pub backend: Arc<MemoryBackend>,
    pub deliveries: Arc<FlakyDeliveries>,
    pub platform: Arc<RecordingPlatform>,
    pub notifier: Notifier,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_backend(Arc::new(MemoryBackend::new(64)))
    }

    /// A second device sharing `backend`.
    pub fn with_backend(backend: Arc<MemoryBackend>) -> Self {
        let deliveries = Arc::new(FlakyDeliveries {
            inner: backend.clone(),
            fail_writes: AtomicBool::new(false),
        });
        let platform = Arc::new(RecordingPlatform::default());
        let wired = Backend {
            deliveries: deliveries.clone(),
            ..Backend::from_memory(backend.clone())
        };
        let config = NotificationsConfig {
            scheduled_delay_ms: 50,
            ..Default::default()
        };
        let notifier = Notifier::new(wired, platform.clone(), &config);
        Self {
            backend,
            deliveries,
            platform,
            notifier,
        }
    }

    pub fn create_user(&self, email: &str, role: UserRole) -> SessionUser {
        self.backend.add_user(email, role).to_session_user()
    }

    pub fn sign_in(&self, user: &SessionUser) {
        self.notifier.service().set_current_user(Some(user.clone()));
    }
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually<F>(mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

/// Wait for a runtime's listener to reach `expected`.
pub async fn wait_for_state(
    rx: &mut tokio::sync::watch::Receiver<ListenerState>,
    expected: ListenerState,
) {
    tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|s| *s == expected))
        .await
        .expect("listener state timeout")
        .expect("runtime dropped");
}
