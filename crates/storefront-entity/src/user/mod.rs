//! User domain entities.

pub mod model;
pub mod role;
pub mod session;

pub use model::User;
pub use role::UserRole;
pub use session::SessionUser;
