//! Integration tests for dispatch and the delivery ledger.

mod helpers;

use futures::future::join_all;

use storefront_entity::notification::NotificationKind;
use storefront_entity::user::UserRole;
use storefront_notify::DispatchOutcome;
use storefront_notify::platform::AppState;

use helpers::TestApp;

#[tokio::test]
async fn test_dispatch_records_delivery() {
    let app = TestApp::new();
    let user = app.create_user("buyer@shop.test", UserRole::User);
    app.sign_in(&user);

    let n = app
        .notifier
        .publisher()
        .order_confirmed(user.id, Default::default())
        .await
        .unwrap();

    let outcome = app.notifier.dispatcher().dispatch(&n, &user).await;
    assert_eq!(outcome, DispatchOutcome::Delivered);
    assert!(
        app.notifier
            .ledger()
            .has_been_delivered(n.notification_id(), user.id)
            .await
    );

    let shown = app.platform.presented();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].title, "تم تأكيد الطلب");
    assert_eq!(shown[0].body, n.message);
    assert_eq!(shown[0].data["notificationId"], n.id.to_string());
    assert_eq!(shown[0].data["type"], "order_confirmed");
    assert!(shown[0].data["orderId"].is_string());
    assert!(shown[0].sound);
}

#[tokio::test]
async fn test_background_dispatch_is_scheduled() {
    let app = TestApp::new();
    let user = app.create_user("buyer@shop.test", UserRole::User);
    app.sign_in(&user);
    app.notifier.foreground().set(AppState::Background);

    let n = app
        .notifier
        .publisher()
        .admin_message(user.id, "مرحبا")
        .await
        .unwrap();

    let outcome = app.notifier.dispatcher().dispatch(&n, &user).await;
    assert_eq!(outcome, DispatchOutcome::Delivered);
    assert!(app.platform.presented().is_empty());
    let scheduled = app.platform.scheduled();
    assert_eq!(scheduled.len(), 1);
    assert_eq!(scheduled[0].1.as_millis(), 50);
}

#[tokio::test]
async fn test_concurrent_dispatch_in_one_process_shows_once() {
    let app = TestApp::new();
    let user = app.create_user("buyer@shop.test", UserRole::User);
    app.sign_in(&user);

    let n = app
        .notifier
        .publisher()
        .product_update(user.id, "sku-1", "منتج جديد متوفر")
        .await
        .unwrap();

    let dispatcher = app.notifier.dispatcher();
    let outcomes = join_all((0..8).map(|_| dispatcher.dispatch(&n, &user))).await;

    let delivered = outcomes
        .iter()
        .filter(|o| **o == DispatchOutcome::Delivered)
        .count();
    assert_eq!(delivered, 1);
    assert!(
        outcomes
            .iter()
            .all(|o| matches!(o, DispatchOutcome::Delivered | DispatchOutcome::AlreadyProcessed))
    );
    assert_eq!(app.platform.shown_count(), 1);
    assert_eq!(app.backend.delivery_count(n.notification_id(), user.id), 1);
}

#[tokio::test]
async fn test_concurrent_dispatch_across_processes_records_once() {
    let first = TestApp::new();
    let second = TestApp::with_backend(first.backend.clone());
    let user = first.create_user("buyer@shop.test", UserRole::User);
    first.sign_in(&user);
    second.sign_in(&user);

    let n = first
        .notifier
        .publisher()
        .order_confirmed(user.id, Default::default())
        .await
        .unwrap();

    let (a, b) = tokio::join!(
        first.notifier.dispatcher().dispatch(&n, &user),
        second.notifier.dispatcher().dispatch(&n, &user),
    );
    assert!(a.was_shown() && b.was_shown());
    assert!(
        [a, b].contains(&DispatchOutcome::Delivered),
        "one of the two must have written the record"
    );
    assert_eq!(first.backend.delivery_count(n.notification_id(), user.id), 1);
    assert_eq!(first.backend.total_deliveries(), 1);
}

#[tokio::test]
async fn test_permission_denied_keeps_notification_in_inbox() {
    let app = TestApp::new();
    let user = app.create_user("buyer@shop.test", UserRole::User);
    app.sign_in(&user);
    app.platform.set_denied(true);

    let n = app
        .notifier
        .publisher()
        .notify_user(
            user.id,
            NotificationKind::ProductUpdate,
            "تخفيضات",
            serde_json::json!({}),
        )
        .await
        .unwrap();

    assert!(app.notifier.service().sync_unread(user.id).await.contains(&n));
    assert_eq!(app.platform.shown_count(), 0);
    assert_eq!(app.backend.total_deliveries(), 0);
    assert_eq!(app.notifier.service().unread_count(user.id).await, 1);

    app.platform.set_denied(false);
    assert_eq!(app.notifier.service().sync_unread(user.id).await, vec![n]);
    assert_eq!(app.platform.shown_count(), 1);
}

#[tokio::test]
async fn test_display_failure_is_retried_by_next_poll() {
    let app = TestApp::new();
    let user = app.create_user("buyer@shop.test", UserRole::User);
    app.sign_in(&user);
    app.platform.set_failing(true);

    let n = app
        .notifier
        .publisher()
        .admin_message(user.id, "هل وصلك الطلب؟")
        .await
        .unwrap();

    assert_eq!(
        app.notifier.dispatcher().dispatch(&n, &user).await,
        DispatchOutcome::Failed
    );
    assert_eq!(app.backend.total_deliveries(), 0);

    app.platform.set_failing(false);
    assert_eq!(app.notifier.service().sync_unread(user.id).await, vec![n.clone()]);
    assert_eq!(app.backend.delivery_count(n.notification_id(), user.id), 1);
}
