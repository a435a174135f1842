//! Wiring of the notification components around one backend and platform.

use std::sync::Arc;
use std::time::Duration;

use storefront_core::config::notifications::NotificationsConfig;

use crate::backend::Backend;
use crate::dispatcher::Dispatcher;
use crate::filter::{NotificationFilter, RoutingTable};
use crate::ledger::DeliveryLedger;
use crate::listener::ChangeListener;
use crate::platform::{ForegroundSignal, PushPlatform};
use crate::poll::UnreadSync;
use crate::publisher::NotificationPublisher;
use crate::runtime::NotificationRuntime;
use crate::service::NotificationService;
use crate::session::SessionContext;

/// Every notification component, sharing one session and one claim set.
#[derive(Debug, Clone)]
pub struct Notifier {
    session: SessionContext,
    foreground: ForegroundSignal,
    ledger: DeliveryLedger,
    dispatcher: Dispatcher,
    sync: UnreadSync,
    listener: ChangeListener,
    service: NotificationService,
    publisher: NotificationPublisher,
    platform: Arc<dyn PushPlatform>,
}

impl Notifier {
    /// Wire the components with the default routing table.
    pub fn new(
        backend: Backend,
        platform: Arc<dyn PushPlatform>,
        config: &NotificationsConfig,
    ) -> Self {
        Self::with_routing(backend, platform, config, RoutingTable::default())
    }

    /// Wire the components with a custom routing table.
    pub fn with_routing(
        backend: Backend,
        platform: Arc<dyn PushPlatform>,
        config: &NotificationsConfig,
        routing: RoutingTable,
    ) -> Self {
        let session = SessionContext::new();
        let foreground = ForegroundSignal::default();
        let ledger = DeliveryLedger::new(backend.deliveries.clone());
        let filter = NotificationFilter::new(session.clone(), routing);
        let dispatcher = Dispatcher::new(
            session.clone(),
            platform.clone(),
            ledger.clone(),
            foreground.clone(),
            Duration::from_millis(config.scheduled_delay_ms),
        );
        let sync = UnreadSync::new(
            backend.notifications.clone(),
            filter.clone(),
            dispatcher.clone(),
            session.clone(),
        );
        let listener = ChangeListener::new(
            backend.feed.clone(),
            session.clone(),
            ledger.clone(),
            filter.clone(),
            dispatcher.clone(),
            sync.clone(),
            config.listener_channel_prefix.clone(),
        );
        let service = NotificationService::new(
            backend.notifications.clone(),
            backend.users.clone(),
            session.clone(),
            filter,
            dispatcher.clone(),
            sync.clone(),
        );
        let publisher = NotificationPublisher::new(backend.notifications, backend.users);

        Self {
            session,
            foreground,
            ledger,
            dispatcher,
            sync,
            listener,
            service,
            publisher,
            platform,
        }
    }

    /// The app-facing notification operations.
    pub fn service(&self) -> &NotificationService {
        &self.service
    }

    /// Writes notifications and order status logs for other users to receive.
    pub fn publisher(&self) -> &NotificationPublisher {
        &self.publisher
    }

    /// The signed-in user.
    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Foreground/background signal. Report lifecycle transitions here.
    pub fn foreground(&self) -> &ForegroundSignal {
        &self.foreground
    }

    /// The change listener. Usually driven by [`runtime`](Self::runtime).
    pub fn listener(&self) -> &ChangeListener {
        &self.listener
    }

    /// Poll-on-resume.
    pub fn sync(&self) -> &UnreadSync {
        &self.sync
    }

    /// The dispatcher and its in-process claim set.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Persistent record of which notifications each user has been shown.
    pub fn ledger(&self) -> &DeliveryLedger {
        &self.ledger
    }

    /// A lifecycle driver over these components.
    pub fn runtime(&self) -> NotificationRuntime {
        NotificationRuntime::new(
            self.session.clone(),
            self.foreground.clone(),
            self.listener.clone(),
            self.sync.clone(),
            self.platform.clone(),
        )
    }
}
