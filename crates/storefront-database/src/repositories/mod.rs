//! One repository per storefront table.

pub mod delivery;
pub mod notification;
pub mod order_status;
pub mod user;

pub use delivery::DeliveryRepository;
pub use notification::NotificationRepository;
pub use order_status::OrderStatusRepository;
pub use user::UserRepository;
