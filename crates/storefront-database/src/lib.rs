//! # storefront-database
//!
//! PostgreSQL access for the storefront notifier: the connection pool,
//! migrations, one repository per table, and the `LISTEN`-based change
//! stream fed by the insert triggers.

pub mod change;
pub mod connection;
pub mod migration;
pub mod repositories;

pub use connection::DatabasePool;
