//! User entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use storefront_core::types::id::UserId;

use super::role::UserRole;
use super::session::SessionUser;

/// A row of the `users` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    /// Unique user identifier.
    pub id: Uuid,
    /// Login email.
    pub email: String,
    /// Display name.
    pub full_name: Option<String>,
    /// Raw role column.
    pub role: String,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Parsed role; unknown values are treated as regular users.
    pub fn role(&self) -> UserRole {
        self.role.parse().unwrap_or(UserRole::User)
    }

    /// Build the session identity for this user.
    pub fn to_session_user(&self) -> SessionUser {
        SessionUser {
            id: UserId::from_uuid(self.id),
            role: self.role(),
            display_name: self.full_name.clone(),
        }
    }
}
