//! # storefront-notify
//!
//! Push notification delivery for the storefront app. Provides:
//!
//! - A delivery ledger that records which notification was shown to whom
//! - A role-based filter routing notification kinds to admins or customers
//! - A change listener attached to realtime inserts for the signed-in user
//! - A dispatcher rendering push payloads and recording deliveries
//! - Poll-on-resume catching up on anything the listener missed
//! - The UI-facing notification service and the write-path publisher

pub mod backend;
pub mod dispatcher;
pub mod filter;
pub mod ledger;
pub mod listener;
pub mod notifier;
pub mod platform;
pub mod poll;
pub mod publisher;
pub mod runtime;
pub mod service;
pub mod session;

pub use backend::Backend;
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use filter::{NotificationFilter, RoutingTable};
pub use ledger::DeliveryLedger;
pub use listener::{ChangeListener, ListenerHandle, ListenerState};
pub use notifier::Notifier;
pub use platform::{AppState, ForegroundSignal, PermissionStatus, PushPayload, PushPlatform};
pub use poll::UnreadSync;
pub use publisher::NotificationPublisher;
pub use runtime::{NotificationRuntime, RuntimeHandle};
pub use service::NotificationService;
pub use session::SessionContext;
