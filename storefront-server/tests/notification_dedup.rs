//! 通知去重集成测试

use shared::models::NotificationKind;
use storefront_server::core::{Config, ServerState};
use storefront_server::db::DbService;

async fn test_state() -> ServerState {
    let db = DbService::memory().await.expect("in-memory db");
    let config = Config::with_overrides("/tmp/storefront-test", 0);
    ServerState::with_db(config, db.db)
}

#[tokio::test]
async fn test_duplicate_within_window_is_suppressed() {
    let state = test_state().await;

    let first = state
        .notifier
        .dispatch(
            "u1",
            NotificationKind::OrderCreated,
            "Order created",
            "Order ord-1 was created",
            Some("ord-1"),
            None,
        )
        .await
        .unwrap();

    // Same (recipient, kind, order) inside the window: the existing row wins
    let second = state
        .notifier
        .dispatch(
            "u1",
            NotificationKind::OrderCreated,
            "Order created",
            "Order ord-1 was created",
            Some("ord-1"),
            None,
        )
        .await
        .unwrap();

    assert_eq!(first.notification_id, second.notification_id);
    assert_eq!(state.notifier.list("u1", 50).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_concurrent_duplicates_collapse_to_one_row() {
    let state = test_state().await;

    // Both dispatches can pass the window lookup; the unique dedup index
    // leaves exactly one row and both callers see it
    let n1 = state.notifier.clone();
    let n2 = state.notifier.clone();
    let (a, b) = tokio::join!(
        n1.dispatch(
            "u1",
            NotificationKind::OrderConfirmed,
            "Order confirmed",
            "Order ord-9 is confirmed",
            Some("ord-9"),
            None,
        ),
        n2.dispatch(
            "u1",
            NotificationKind::OrderConfirmed,
            "Order confirmed",
            "Order ord-9 is confirmed",
            Some("ord-9"),
            None,
        )
    );

    let a = a.unwrap();
    let b = b.unwrap();
    assert_eq!(a.notification_id, b.notification_id);
    assert_eq!(state.notifier.list("u1", 50).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_different_kind_or_order_is_not_deduped() {
    let state = test_state().await;

    state
        .notifier
        .dispatch(
            "u1",
            NotificationKind::OrderCreated,
            "Order created",
            "Order ord-1 was created",
            Some("ord-1"),
            None,
        )
        .await
        .unwrap();
    state
        .notifier
        .dispatch(
            "u1",
            NotificationKind::OrderConfirmed,
            "Order confirmed",
            "Order ord-1 is confirmed",
            Some("ord-1"),
            None,
        )
        .await
        .unwrap();
    state
        .notifier
        .dispatch(
            "u1",
            NotificationKind::OrderCreated,
            "Order created",
            "Order ord-2 was created",
            Some("ord-2"),
            None,
        )
        .await
        .unwrap();

    assert_eq!(state.notifier.list("u1", 50).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_inboxes_are_per_recipient() {
    let state = test_state().await;

    state
        .notifier
        .dispatch(
            "u1",
            NotificationKind::OrderCreated,
            "Order created",
            "Order ord-1 was created",
            Some("ord-1"),
            None,
        )
        .await
        .unwrap();
    state
        .notifier
        .dispatch(
            "admin",
            NotificationKind::OrderConfirmed,
            "Order confirmed",
            "Order ord-1 was paid and confirmed",
            Some("ord-1"),
            None,
        )
        .await
        .unwrap();

    assert_eq!(state.notifier.list("u1", 50).await.unwrap().len(), 1);
    assert_eq!(state.notifier.list("admin", 50).await.unwrap().len(), 1);
    assert!(state.notifier.list("u2", 50).await.unwrap().is_empty());
}
