//! Role-based notification routing.
//!
//! Admins hear about new orders and customer messages from every mailbox;
//! customers hear about their own orders, products and admin replies.

use std::collections::HashSet;

use tracing::debug;

use storefront_entity::notification::{Notification, NotificationKind};
use storefront_entity::user::{SessionUser, UserRole};

use crate::session::SessionContext;

/// Which kinds each role receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingTable {
    admin: HashSet<NotificationKind>,
    user: HashSet<NotificationKind>,
}

impl RoutingTable {
    /// Build a table from explicit kind sets.
    pub fn new(
        admin: impl IntoIterator<Item = NotificationKind>,
        user: impl IntoIterator<Item = NotificationKind>,
    ) -> Self {
        Self {
            admin: admin.into_iter().collect(),
            user: user.into_iter().collect(),
        }
    }

    /// Kinds routed to `role`.
    pub fn kinds_for(&self, role: UserRole) -> &HashSet<NotificationKind> {
        match role {
            UserRole::Admin => &self.admin,
            UserRole::User => &self.user,
        }
    }

    /// Whether `role` receives `kind`.
    pub fn routes(&self, role: UserRole, kind: NotificationKind) -> bool {
        self.kinds_for(role).contains(&kind)
    }
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self::new(
            [NotificationKind::NewOrder, NotificationKind::UserMessage],
            [
                NotificationKind::ProductUpdate,
                NotificationKind::OrderConfirmed,
                NotificationKind::OrderStatusChanged,
                NotificationKind::AdminMessage,
            ],
        )
    }
}

/// Decides whether a notification concerns a recipient.
#[derive(Debug, Clone)]
pub struct NotificationFilter {
    session: SessionContext,
    routing: RoutingTable,
}

impl NotificationFilter {
    /// Create a filter reading the given session.
    pub fn new(session: SessionContext, routing: RoutingTable) -> Self {
        Self { session, routing }
    }

    /// The routing table in use.
    pub fn routing(&self) -> &RoutingTable {
        &self.routing
    }

    /// Whether `notification` should reach `recipient`.
    ///
    /// Admins ignore ownership; customers only see their own rows.
    pub fn is_relevant(&self, notification: &Notification, recipient: &SessionUser) -> bool {
        let kind = notification.kind();
        if !self.routing.routes(recipient.role, kind) {
            debug!(
                notification_id = %notification.id,
                recipient = %recipient.id,
                kind = kind.as_str(),
                "Notification kind not routed to recipient role"
            );
            return false;
        }
        if !recipient.is_admin() && notification.owner() != recipient.id {
            debug!(
                notification_id = %notification.id,
                recipient = %recipient.id,
                "Notification belongs to another user"
            );
            return false;
        }
        true
    }

    /// [`is_relevant`](Self::is_relevant) against the signed-in user.
    /// Nothing is relevant without a session.
    pub fn should_deliver(&self, notification: &Notification) -> bool {
        self.session
            .current()
            .is_some_and(|user| self.is_relevant(notification, &user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use storefront_core::types::id::UserId;
    use uuid::Uuid;

    fn row(owner: UserId, kind: NotificationKind) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            user_id: owner.into_uuid(),
            title: kind.display_title().to_string(),
            message: "body".to_string(),
            notification_type: kind.as_str().to_string(),
            data: serde_json::json!({}),
            read: false,
            created_at: Utc::now(),
        }
    }

    fn filter() -> NotificationFilter {
        NotificationFilter::new(SessionContext::new(), RoutingTable::default())
    }

    #[test]
    fn test_admin_sees_orders_and_messages_from_any_mailbox() {
        let filter = filter();
        let admin = SessionUser::new(UserId::new(), UserRole::Admin);
        let other = UserId::new();

        assert!(filter.is_relevant(&row(other, NotificationKind::NewOrder), &admin));
        assert!(filter.is_relevant(&row(other, NotificationKind::UserMessage), &admin));
        for kind in [
            NotificationKind::ProductUpdate,
            NotificationKind::OrderConfirmed,
            NotificationKind::OrderStatusChanged,
            NotificationKind::AdminMessage,
            NotificationKind::Unknown,
        ] {
            assert!(!filter.is_relevant(&row(admin.id, kind), &admin), "{kind:?}");
        }
    }

    #[test]
    fn test_user_sees_only_own_rows() {
        let filter = filter();
        let user = SessionUser::new(UserId::new(), UserRole::User);

        assert!(filter.is_relevant(&row(user.id, NotificationKind::ProductUpdate), &user));
        assert!(filter.is_relevant(&row(user.id, NotificationKind::AdminMessage), &user));
        assert!(!filter.is_relevant(&row(UserId::new(), NotificationKind::ProductUpdate), &user));
        assert!(!filter.is_relevant(&row(user.id, NotificationKind::NewOrder), &user));
        assert!(!filter.is_relevant(&row(user.id, NotificationKind::UserMessage), &user));
    }

    #[test]
    fn test_title_only_rows_are_routed() {
        let filter = filter();
        let admin = SessionUser::new(UserId::new(), UserRole::Admin);
        let mut n = row(UserId::new(), NotificationKind::NewOrder);
        n.notification_type = String::new();
        assert!(filter.is_relevant(&n, &admin));
    }

    #[test]
    fn test_should_deliver_requires_session() {
        let filter = filter();
        let user = SessionUser::new(UserId::new(), UserRole::User);
        let n = row(user.id, NotificationKind::OrderConfirmed);

        assert!(!filter.should_deliver(&n));
        filter.session.set_session(user);
        assert!(filter.should_deliver(&n));
    }
}
