//! Integration tests for the change listener and notification runtime.

mod helpers;

use storefront_core::types::id::OrderId;
use storefront_entity::notification::NotificationKind;
use storefront_entity::user::UserRole;
use storefront_notify::ListenerState;
use storefront_notify::platform::AppState;

use helpers::{TestApp, eventually, wait_for_state};

#[tokio::test]
async fn test_admin_receives_new_order_from_another_admins_mailbox() {
    let app = TestApp::new();
    let admin1 = app.create_user("admin1@shop.test", UserRole::Admin);
    let admin2 = app.create_user("admin2@shop.test", UserRole::Admin);
    let customer = app.create_user("buyer@shop.test", UserRole::User);

    let runtime = app.notifier.runtime();
    let mut state = runtime.state_receiver();
    let handle = runtime.spawn();
    app.sign_in(&admin2);
    wait_for_state(&mut state, ListenerState::Attached { user_id: admin2.id }).await;

    let n = app
        .notifier
        .publisher()
        .order_placed(customer.id, OrderId::new())
        .await
        .unwrap()
        .expect("admins exist");
    assert_eq!(n.user_id, admin1.id.into_uuid());
    assert_eq!(n.title, "طلب جديد");

    assert!(eventually(|| app.backend.delivery_count(n.notification_id(), admin2.id) == 1).await);
    assert_eq!(app.backend.delivery_count(n.notification_id(), admin1.id), 0);
    assert_eq!(app.platform.shown_ids(), vec![n.id.to_string()]);

    handle.shutdown().await;
}

#[tokio::test]
async fn test_user_never_receives_another_users_product_update() {
    let app = TestApp::new();
    let user_a = app.create_user("a@shop.test", UserRole::User);
    let user_b = app.create_user("b@shop.test", UserRole::User);

    let runtime = app.notifier.runtime();
    let mut state = runtime.state_receiver();
    let handle = runtime.spawn();
    app.sign_in(&user_b);
    wait_for_state(&mut state, ListenerState::Attached { user_id: user_b.id }).await;

    let publisher = app.notifier.publisher();
    let foreign = publisher
        .product_update(user_a.id, "sku-9", "منتج جديد")
        .await
        .unwrap();
    let own = publisher
        .product_update(user_b.id, "sku-9", "منتج جديد")
        .await
        .unwrap();

    assert!(eventually(|| app.backend.delivery_count(own.notification_id(), user_b.id) == 1).await);
    assert_eq!(app.backend.delivery_count(foreign.notification_id(), user_b.id), 0);
    assert_eq!(app.platform.shown_ids(), vec![own.id.to_string()]);

    handle.shutdown().await;
}

#[tokio::test]
async fn test_admin_only_sees_orders_and_user_messages() {
    let app = TestApp::new();
    let admin = app.create_user("admin@shop.test", UserRole::Admin);
    let customer = app.create_user("buyer@shop.test", UserRole::User);

    let runtime = app.notifier.runtime();
    let mut state = runtime.state_receiver();
    let handle = runtime.spawn();
    app.sign_in(&admin);
    wait_for_state(&mut state, ListenerState::Attached { user_id: admin.id }).await;

    let publisher = app.notifier.publisher();
    publisher
        .order_confirmed(customer.id, OrderId::new())
        .await
        .unwrap();
    publisher
        .admin_message(customer.id, "تم الشحن")
        .await
        .unwrap();
    publisher
        .notify_user(
            admin.id,
            NotificationKind::ProductUpdate,
            "منتج",
            serde_json::json!({}),
        )
        .await
        .unwrap();
    publisher
        .order_placed(customer.id, OrderId::new())
        .await
        .unwrap();
    let last = publisher
        .user_message(customer.id, "متى يصل طلبي؟")
        .await
        .unwrap()
        .expect("admin exists");

    assert!(eventually(|| app.backend.delivery_count(last.notification_id(), admin.id) == 1).await);
    let titles: Vec<String> = app.platform.presented().into_iter().map(|p| p.title).collect();
    assert_eq!(titles.len(), 2);
    assert!(titles.iter().all(|t| t == "طلب جديد" || t == "رسالة جديدة"));

    handle.shutdown().await;
}

#[tokio::test]
async fn test_order_status_change_is_delivered_once() {
    let app = TestApp::new();
    let customer = app.create_user("buyer@shop.test", UserRole::User);

    let runtime = app.notifier.runtime();
    let mut state = runtime.state_receiver();
    let handle = runtime.spawn();
    app.sign_in(&customer);
    wait_for_state(&mut state, ListenerState::Attached { user_id: customer.id }).await;

    let n = app
        .notifier
        .publisher()
        .order_status_changed(customer.id, OrderId::new(), "shipped", Some("DHL".into()))
        .await
        .unwrap();

    assert!(eventually(|| app.backend.delivery_count(n.notification_id(), customer.id) == 1).await);
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(app.platform.shown_count(), 1);

    handle.shutdown().await;
}

#[tokio::test]
async fn test_sign_out_detaches_listener() {
    let app = TestApp::new();
    let customer = app.create_user("buyer@shop.test", UserRole::User);

    let runtime = app.notifier.runtime();
    let mut state = runtime.state_receiver();
    let handle = runtime.spawn();
    app.sign_in(&customer);
    wait_for_state(&mut state, ListenerState::Attached { user_id: customer.id }).await;
    assert_eq!(app.backend.open_channels(), 1);

    app.notifier.service().set_current_user(None);
    wait_for_state(&mut state, ListenerState::Detached).await;
    assert_eq!(app.backend.open_channels(), 0);

    app.notifier
        .publisher()
        .admin_message(customer.id, "hello")
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(app.platform.shown_count(), 0);

    handle.shutdown().await;
}

#[tokio::test]
async fn test_dropped_handle_releases_channel() {
    let app = TestApp::new();
    let customer = app.create_user("buyer@shop.test", UserRole::User);
    app.sign_in(&customer);

    let handle = app.notifier.listener().attach(customer.clone()).await.unwrap();
    assert_eq!(handle.user_id(), customer.id);
    assert!(handle.channel().starts_with(&format!("notifications:{}:", customer.id)));
    assert_eq!(app.backend.open_channels(), 1);

    drop(handle);
    assert!(eventually(|| app.backend.open_channels() == 0).await);
}

#[tokio::test]
async fn test_reattaching_same_user_keeps_new_subscription() {
    let app = TestApp::new();
    let customer = app.create_user("buyer@shop.test", UserRole::User);
    app.sign_in(&customer);

    let listener = app.notifier.listener();
    let first = listener.attach(customer.clone()).await.unwrap();
    let second = listener.attach(customer.clone()).await.unwrap();
    assert_ne!(first.channel(), second.channel());

    drop(first);
    assert!(eventually(|| app.backend.open_channels() == 1).await);

    let n = app
        .notifier
        .publisher()
        .admin_message(customer.id, "still listening")
        .await
        .unwrap();
    assert!(eventually(|| app.backend.delivery_count(n.notification_id(), customer.id) == 1).await);
    assert!(second.is_active());
    assert_eq!(app.backend.open_channels(), 1);

    listener.detach(second).await;
    assert_eq!(app.backend.open_channels(), 0);
}

#[tokio::test]
async fn test_feed_outage_falls_back_to_polling() {
    let app = TestApp::new();
    let customer = app.create_user("buyer@shop.test", UserRole::User);
    app.backend.set_feed_down(true);

    let waiting = app
        .notifier
        .publisher()
        .admin_message(customer.id, "قبل تسجيل الدخول")
        .await
        .unwrap();

    let runtime = app.notifier.runtime();
    let handle = runtime.spawn();
    app.sign_in(&customer);

    assert!(eventually(|| app.backend.delivery_count(waiting.notification_id(), customer.id) == 1).await);
    assert_eq!(runtime.state(), ListenerState::Detached);

    app.notifier.foreground().set(AppState::Background);
    let missed = app
        .notifier
        .publisher()
        .product_update(customer.id, "sku-2", "منتج")
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(app.backend.delivery_count(missed.notification_id(), customer.id), 0);

    app.notifier.foreground().set(AppState::Foreground);
    assert!(eventually(|| app.backend.delivery_count(missed.notification_id(), customer.id) == 1).await);

    handle.shutdown().await;
}

#[tokio::test]
async fn test_quick_relogin_of_same_user_still_polls() {
    let app = TestApp::new();
    let customer = app.create_user("buyer@shop.test", UserRole::User);

    let runtime = app.notifier.runtime();
    let mut state = runtime.state_receiver();
    let handle = runtime.spawn();
    app.sign_in(&customer);
    wait_for_state(&mut state, ListenerState::Attached { user_id: customer.id }).await;

    app.platform.set_failing(true);
    let missed = app
        .notifier
        .publisher()
        .admin_message(customer.id, "sent while unreachable")
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(app.backend.delivery_count(missed.notification_id(), customer.id), 0);
    app.platform.set_failing(false);

    // Both changes land before the runtime observes either.
    app.notifier.service().set_current_user(None);
    app.sign_in(&customer);

    assert!(
        eventually(|| app.backend.delivery_count(missed.notification_id(), customer.id) == 1)
            .await
    );
    assert_eq!(runtime.state(), ListenerState::Attached { user_id: customer.id });
    assert_eq!(app.backend.open_channels(), 1);

    handle.shutdown().await;
}
