//! Delivery ledger entities.

pub mod model;

pub use model::DeliveryRecord;
