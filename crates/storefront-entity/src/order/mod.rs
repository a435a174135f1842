//! Order status history entities.

pub mod status_log;

pub use status_log::{NewOrderStatusLog, OrderStatusLog};
