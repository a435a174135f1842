//! Notification lifecycle driver.
//!
//! Reacts to sign-in/sign-out by attaching or detaching the change
//! listener and running poll-on-resume, and re-polls whenever the app
//! returns to the foreground.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use storefront_entity::user::SessionUser;

use crate::listener::{ChangeListener, ListenerHandle, ListenerState};
use crate::platform::{AppState, ForegroundSignal, PushPlatform};
use crate::poll::UnreadSync;
use crate::session::SessionContext;

/// Drives the listener and poller from session and foreground changes.
#[derive(Debug, Clone)]
pub struct NotificationRuntime {
    session: SessionContext,
    foreground: ForegroundSignal,
    listener: ChangeListener,
    sync: UnreadSync,
    platform: Arc<dyn PushPlatform>,
    state: Arc<watch::Sender<ListenerState>>,
}

/// A running [`NotificationRuntime`].
#[derive(Debug)]
pub struct RuntimeHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl RuntimeHandle {
    /// Stop the runtime and wait for the listener to detach.
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.task.await {
            warn!("Notification runtime task failed: {}", e);
        }
    }

    /// Whether the runtime loop is still running.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl NotificationRuntime {
    /// Create a runtime.
    pub fn new(
        session: SessionContext,
        foreground: ForegroundSignal,
        listener: ChangeListener,
        sync: UnreadSync,
        platform: Arc<dyn PushPlatform>,
    ) -> Self {
        let (state, _) = watch::channel(ListenerState::Detached);
        Self {
            session,
            foreground,
            listener,
            sync,
            platform,
            state: Arc::new(state),
        }
    }

    /// Receiver tracking whether the listener is attached.
    pub fn state_receiver(&self) -> watch::Receiver<ListenerState> {
        self.state.subscribe()
    }

    /// Current listener state.
    pub fn state(&self) -> ListenerState {
        *self.state.borrow()
    }

    /// Start the runtime loop on the current tokio runtime.
    pub fn spawn(&self) -> RuntimeHandle {
        let token = CancellationToken::new();
        let task = tokio::spawn(self.clone().run(token.clone()));
        RuntimeHandle { token, task }
    }

    async fn run(self, token: CancellationToken) {
        let mut sessions = self.session.subscribe();
        let mut app_states = self.foreground.subscribe();
        let mut attached: Option<ListenerHandle> = None;

        let initial = sessions.borrow_and_update().clone();
        app_states.borrow_and_update();
        self.on_session(initial, &mut attached).await;

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                changed = sessions.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let user = sessions.borrow_and_update().clone();
                    self.on_session(user, &mut attached).await;
                }
                changed = app_states.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let app_state = *app_states.borrow_and_update();
                    self.on_app_state(app_state).await;
                }
            }
        }

        if let Some(handle) = attached.take() {
            self.listener.detach(handle).await;
            self.state.send_replace(ListenerState::Detached);
        }
        info!("Notification runtime stopped");
    }

    async fn on_session(&self, user: Option<SessionUser>, attached: &mut Option<ListenerHandle>) {
        // A sign-out and sign-in of the same user can coalesce into one
        // observed change. The subscription is kept but the poll still runs.
        if let (Some(handle), Some(user)) = (attached.as_ref(), user.as_ref()) {
            if handle.user_id() == user.id {
                debug!(user_id = %user.id, "Session unchanged, keeping listener");
                self.sync.sync_unread(user.id).await;
                return;
            }
        }

        if let Some(handle) = attached.take() {
            self.listener.detach(handle).await;
            self.state.send_replace(ListenerState::Detached);
        }

        let Some(user) = user else {
            return;
        };

        match self.platform.request_permission().await {
            Ok(status) if status.is_granted() => debug!("Notification permission granted"),
            Ok(status) => info!(?status, "Notification permission not granted"),
            Err(e) => warn!("Failed to request notification permission: {}", e),
        }

        match self.listener.attach(user.clone()).await {
            Ok(handle) => {
                self.state
                    .send_replace(ListenerState::Attached { user_id: user.id });
                *attached = Some(handle);
            }
            Err(e) => warn!(
                user_id = %user.id,
                "Failed to attach change listener, relying on polling: {}",
                e
            ),
        }

        self.sync.sync_unread(user.id).await;
    }

    async fn on_app_state(&self, app_state: AppState) {
        if app_state != AppState::Foreground {
            debug!("App moved to background");
            return;
        }
        if let Some(user) = self.session.current() {
            debug!(user_id = %user.id, "App resumed, syncing unread notifications");
            self.sync.sync_unread(user.id).await;
        }
    }
}
