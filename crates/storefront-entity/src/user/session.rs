//! Signed-in user identity.

use serde::{Deserialize, Serialize};

use storefront_core::types::id::UserId;

use super::role::UserRole;

/// The user a device is currently notifying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    /// User id.
    pub id: UserId,
    /// Role at sign-in time.
    pub role: UserRole,
    /// Display name, if known.
    pub display_name: Option<String>,
}

impl SessionUser {
    /// Create a session identity.
    pub fn new(id: UserId, role: UserRole) -> Self {
        Self {
            id,
            role,
            display_name: None,
        }
    }

    /// Whether the user is an admin.
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}
