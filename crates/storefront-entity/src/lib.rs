//! # storefront-entity
//!
//! Row models for the storefront tables the notifier reads and writes.
//! Every struct here is either a table row (deriving `sqlx::FromRow`) or a
//! domain value object.

pub mod delivery;
pub mod notification;
pub mod order;
pub mod user;
