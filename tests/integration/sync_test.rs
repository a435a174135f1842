//! Integration tests for poll-on-resume and the notification service.

mod helpers;

use storefront_core::types::id::{NotificationId, OrderId};
use storefront_entity::user::UserRole;

use helpers::TestApp;

#[tokio::test]
async fn test_sync_unread_is_idempotent() {
    let app = TestApp::new();
    let user = app.create_user("buyer@shop.test", UserRole::User);
    app.sign_in(&user);

    let publisher = app.notifier.publisher();
    let older = publisher
        .order_confirmed(user.id, OrderId::new())
        .await
        .unwrap();
    let newer = publisher
        .admin_message(user.id, "شكرا لطلبك")
        .await
        .unwrap();

    let first = app.notifier.service().sync_unread(user.id).await;
    let ids: Vec<_> = first.iter().map(|n| n.id).collect();
    assert_eq!(ids.len(), 2);
    assert!(first[0].created_at >= first[1].created_at);
    assert!(ids.contains(&older.id) && ids.contains(&newer.id));

    assert!(app.notifier.service().sync_unread(user.id).await.is_empty());
    assert_eq!(app.platform.shown_count(), 2);
}

#[tokio::test]
async fn test_crash_before_record_is_redelivered_after_restart() {
    let device = TestApp::new();
    let user = device.create_user("buyer@shop.test", UserRole::User);
    device.sign_in(&user);

    let n = device
        .notifier
        .publisher()
        .order_confirmed(user.id, OrderId::new())
        .await
        .unwrap();

    device.deliveries.set_fail_writes(true);
    assert_eq!(device.notifier.service().sync_unread(user.id).await, vec![n.clone()]);
    assert_eq!(device.platform.shown_count(), 1);
    assert_eq!(device.backend.delivery_count(n.notification_id(), user.id), 0);

    // A fresh process over the same tables.
    let restarted = TestApp::with_backend(device.backend.clone());
    restarted.sign_in(&user);
    assert_eq!(restarted.notifier.service().sync_unread(user.id).await, vec![n.clone()]);
    assert_eq!(restarted.backend.delivery_count(n.notification_id(), user.id), 1);
    assert!(restarted.notifier.service().sync_unread(user.id).await.is_empty());
}

#[tokio::test]
async fn test_admin_sync_reads_every_mailbox() {
    let app = TestApp::new();
    let owner = app.create_user("owner@shop.test", UserRole::Admin);
    let helper = app.create_user("helper@shop.test", UserRole::Admin);
    let customer = app.create_user("buyer@shop.test", UserRole::User);

    let publisher = app.notifier.publisher();
    let order = publisher
        .order_placed(customer.id, OrderId::new())
        .await
        .unwrap()
        .expect("admin exists");
    publisher
        .product_update(customer.id, "sku-3", "منتج")
        .await
        .unwrap();
    assert_eq!(order.user_id, owner.id.into_uuid());

    app.sign_in(&helper);
    let synced = app.notifier.service().sync_unread(helper.id).await;
    assert_eq!(synced, vec![order.clone()]);
    assert_eq!(app.backend.delivery_count(order.notification_id(), helper.id), 1);
    assert_eq!(app.backend.delivery_count(order.notification_id(), owner.id), 0);
}

#[tokio::test]
async fn test_sync_without_session_does_nothing() {
    let app = TestApp::new();
    let user = app.create_user("buyer@shop.test", UserRole::User);
    app.notifier
        .publisher()
        .admin_message(user.id, "hello")
        .await
        .unwrap();

    assert!(app.notifier.service().sync_unread(user.id).await.is_empty());
    assert_eq!(app.platform.shown_count(), 0);
}

#[tokio::test]
async fn test_inbox_operations() {
    let app = TestApp::new();
    let admin = app.create_user("admin@shop.test", UserRole::Admin);
    let user = app.create_user("buyer@shop.test", UserRole::User);
    let service = app.notifier.service();
    let publisher = app.notifier.publisher();

    let reply = publisher.admin_message(user.id, "أهلا").await.unwrap();
    publisher.user_message(user.id, "سؤال").await.unwrap();
    publisher
        .order_confirmed(user.id, OrderId::new())
        .await
        .unwrap();

    let customer_thread = service.fetch_messages(user.id, false).await;
    assert_eq!(customer_thread, vec![reply.clone()]);
    assert_eq!(service.fetch_messages(admin.id, true).await.len(), 2);

    assert_eq!(service.unread_count(user.id).await, 2);
    assert_eq!(service.fetch_unread_notifications(user.id).await.len(), 2);
    assert_eq!(service.fetch_unread_notifications(admin.id).await.len(), 1);

    assert!(service.mark_notification_as_read(reply.notification_id()).await);
    assert!(!service.mark_notification_as_read(reply.notification_id()).await);
    assert!(!service.mark_notification_as_read(NotificationId::new()).await);
    assert_eq!(service.unread_count(user.id).await, 1);

    assert_eq!(service.mark_all_notifications_as_read(user.id).await, 1);
    assert_eq!(service.unread_count(user.id).await, 0);
    assert!(service.fetch_unread_notifications(user.id).await.is_empty());
}

#[tokio::test]
async fn test_sign_out_clears_processed_set() {
    let app = TestApp::new();
    let user = app.create_user("buyer@shop.test", UserRole::User);
    app.sign_in(&user);
    app.deliveries.set_fail_writes(true);

    app.notifier
        .publisher()
        .admin_message(user.id, "hello")
        .await
        .unwrap();
    app.notifier.service().sync_unread(user.id).await;
    assert_eq!(app.notifier.dispatcher().processed_count(), 1);

    app.notifier.service().set_current_user(None);
    assert_eq!(app.notifier.dispatcher().processed_count(), 0);

    app.sign_in(&user);
    app.notifier.service().clear_processed_notifications();
    assert_eq!(app.notifier.dispatcher().processed_count(), 0);
}
