//! 结账与订单生命周期集成测试
//!
//! 使用内存引擎，走 OrderService 完整路径：预留、定价、优惠券、
//! 状态机、取消补偿、清除。

use std::time::Duration;

use shared::error::ErrorCode;
use shared::models::{
    DiscountType, NotificationKind, OrderPaymentState, OrderStatus, PaymentMethod, PaymentStatus,
    Product, ShippingAddress, StockState,
};
use shared::util::now_millis;
use storefront_server::auth::{Actor, Role};
use storefront_server::core::{Config, ServerState};
use storefront_server::coupons::{CouponCreate, CouponEngine};
use storefront_server::db::DbService;
use storefront_server::db::repository::ProductRepository;
use storefront_server::inventory::InventoryLedger;
use storefront_server::orders::{CreateOrderRequest, OrderItemRequest, OrderService};
use storefront_server::payments::PaymentService;

async fn test_state() -> ServerState {
    let db = DbService::memory().await.expect("in-memory db");
    let mut config = Config::with_overrides("/tmp/storefront-test", 0);
    config.gateway.merchant_code = "TEST01".into();
    config.gateway.secret = "topsecret".into();
    ServerState::with_db(config, db.db)
}

async fn seed_product(state: &ServerState, product_id: &str, price: f64, stock: i64) {
    let now = now_millis();
    let repo = ProductRepository::new(state.db.clone());
    repo.create(Product {
        product_id: product_id.into(),
        name: format!("Product {product_id}"),
        price,
        image: None,
        is_active: true,
        created_at: now,
        updated_at: now,
    })
    .await
    .expect("seed product");
    InventoryLedger::new(state.db.clone())
        .ensure(product_id, stock, "admin")
        .await
        .expect("seed inventory");
}

fn address() -> ShippingAddress {
    ShippingAddress {
        recipient: "Nguyen Van A".into(),
        phone: "0900000001".into(),
        line1: "1 Le Loi".into(),
        line2: None,
        city: "Ho Chi Minh City".into(),
        postal_code: "70000".into(),
        country: "VN".into(),
    }
}

fn order_request(items: Vec<(&str, i64)>, method: PaymentMethod) -> CreateOrderRequest {
    CreateOrderRequest {
        items: items
            .into_iter()
            .map(|(product_id, quantity)| OrderItemRequest {
                product_id: product_id.into(),
                quantity,
            })
            .collect(),
        coupon_code: None,
        shipping_fee: 30.0,
        shipping_address: address(),
        payment_method: method,
        note: None,
    }
}

fn customer(id: &str) -> Actor {
    Actor::new(id, Role::Customer)
}

fn admin() -> Actor {
    Actor::new("ops", Role::Admin)
}

#[tokio::test]
async fn test_initialize_creates_database_under_work_dir() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::with_overrides(dir.path().to_string_lossy(), 0);
    let state = ServerState::initialize(&config).await;

    assert!(config.database_path().exists());
    // Schema applied; reads against the fresh store work
    let ledger = InventoryLedger::new(state.db.clone());
    assert!(ledger.low_stock().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cod_checkout_confirms_and_commits_stock() {
    let state = test_state().await;
    seed_product(&state, "p1", 100.0, 5).await;

    let service = OrderService::new(&state);
    let resp = service
        .create(&customer("u1"), order_request(vec![("p1", 2)], PaymentMethod::Cod))
        .await
        .expect("cod checkout");

    assert_eq!(resp.order.status, OrderStatus::Confirmed);
    assert_eq!(resp.order.stock_state, StockState::Committed);
    assert_eq!(resp.order.payment_state, OrderPaymentState::Pending);
    assert_eq!(resp.order.total, 230.0);
    assert!(resp.redirect_url.is_none());
    assert_eq!(resp.payment.unwrap().method, PaymentMethod::Cod);

    let record = InventoryLedger::new(state.db.clone()).get("p1").await.unwrap();
    assert_eq!(record.quantity, 3);
    assert_eq!(record.reserved, 0);
}

#[tokio::test]
async fn test_cod_checkout_notifies_confirmation() {
    let state = test_state().await;
    seed_product(&state, "p1", 100.0, 5).await;

    let service = OrderService::new(&state);
    service
        .create(&customer("u1"), order_request(vec![("p1", 1)], PaymentMethod::Cod))
        .await
        .unwrap();

    // Dispatch is fire-and-forget; let the spawned tasks land
    tokio::time::sleep(Duration::from_millis(300)).await;

    let inbox = state.notifier.list("u1", 10).await.unwrap();
    assert!(inbox.iter().any(|n| n.kind == NotificationKind::OrderCreated));
    assert!(inbox.iter().any(|n| n.kind == NotificationKind::OrderConfirmed));

    let admin_inbox = state.notifier.list("admin", 10).await.unwrap();
    assert!(
        admin_inbox.iter().any(|n| n.kind == NotificationKind::OrderConfirmed),
        "admin inbox missing the confirmation: {admin_inbox:?}"
    );
}

#[tokio::test]
async fn test_empty_item_list_rejected() {
    let state = test_state().await;

    let service = OrderService::new(&state);
    let err = service
        .create(&customer("u1"), order_request(vec![], PaymentMethod::Cod))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationFailed);
}

#[tokio::test]
async fn test_zero_quantity_rejected() {
    let state = test_state().await;
    seed_product(&state, "p1", 100.0, 5).await;

    let service = OrderService::new(&state);
    let err = service
        .create(&customer("u1"), order_request(vec![("p1", 0)], PaymentMethod::Cod))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationFailed);
}

#[tokio::test]
async fn test_online_checkout_reserves_and_redirects() {
    let state = test_state().await;
    seed_product(&state, "p1", 100.0, 5).await;

    let service = OrderService::new(&state);
    let resp = service
        .create(&customer("u1"), order_request(vec![("p1", 2)], PaymentMethod::Online))
        .await
        .expect("online checkout");

    assert_eq!(resp.order.status, OrderStatus::PaymentPending);
    assert_eq!(resp.order.stock_state, StockState::Reserved);
    let url = resp.redirect_url.expect("gateway redirect");
    assert!(url.contains("signature="));
    assert!(url.contains("reference="));

    let record = InventoryLedger::new(state.db.clone()).get("p1").await.unwrap();
    assert_eq!(record.quantity, 5);
    assert_eq!(record.reserved, 2);
}

#[tokio::test]
async fn test_checkout_totals() {
    let state = test_state().await;
    seed_product(&state, "p1", 100.0, 10).await;
    seed_product(&state, "p2", 75.0, 10).await;

    let service = OrderService::new(&state);
    let resp = service
        .create(
            &customer("u1"),
            order_request(vec![("p1", 2), ("p2", 2)], PaymentMethod::Cod),
        )
        .await
        .unwrap();

    assert_eq!(resp.order.subtotal, 350.0);
    assert_eq!(resp.order.discount, 0.0);
    assert_eq!(resp.order.shipping_fee, 30.0);
    assert_eq!(resp.order.total, 380.0);

    // 行项目快照带下单时的名称与单价
    assert_eq!(resp.order.items.len(), 2);
    assert_eq!(resp.order.items[0].price, 100.0);
    assert_eq!(resp.order.items[1].price, 75.0);
}

#[tokio::test]
async fn test_coupon_discount_capped_and_redeemed_once() {
    let state = test_state().await;
    seed_product(&state, "p1", 100.0, 10).await;
    seed_product(&state, "p2", 75.0, 10).await;

    let engine = CouponEngine::new(state.db.clone());
    engine
        .create(CouponCreate {
            code: "percent10".into(),
            discount_type: DiscountType::Percent,
            value: 10.0,
            min_order_value: 100.0,
            max_discount_amount: Some(20.0),
            max_uses: Some(5),
            usage_limit_per_user: 1,
            expires_at: None,
            allowed_users: None,
            allowed_products: None,
        })
        .await
        .expect("create coupon");

    let mut req = order_request(vec![("p1", 2), ("p2", 2)], PaymentMethod::Cod);
    req.coupon_code = Some("percent10".into());

    let service = OrderService::new(&state);
    let resp = service.create(&customer("u1"), req).await.unwrap();

    // 10% of 350 = 35, capped at 20
    assert_eq!(resp.order.discount, 20.0);
    assert_eq!(resp.order.total, 360.0);
    assert_eq!(resp.order.coupon_code.as_deref(), Some("PERCENT10"));

    let coupon = engine.get("percent10").await.unwrap();
    assert_eq!(coupon.used_count, 1);

    // Re-applying for the same order is a no-op, not a second use
    engine
        .mark_used(
            "percent10",
            "u1",
            &resp.order.order_id,
            resp.order.subtotal,
            &["p1".into(), "p2".into()],
        )
        .await
        .expect("idempotent redemption");
    assert_eq!(engine.get("percent10").await.unwrap().used_count, 1);
}

#[tokio::test]
async fn test_per_user_limit_blocks_second_order() {
    let state = test_state().await;
    seed_product(&state, "p1", 100.0, 10).await;

    let engine = CouponEngine::new(state.db.clone());
    engine
        .create(CouponCreate {
            code: "once".into(),
            discount_type: DiscountType::Amount,
            value: 15.0,
            min_order_value: 0.0,
            max_discount_amount: None,
            max_uses: None,
            usage_limit_per_user: 1,
            expires_at: None,
            allowed_users: None,
            allowed_products: None,
        })
        .await
        .unwrap();

    let service = OrderService::new(&state);
    let mut req = order_request(vec![("p1", 1)], PaymentMethod::Cod);
    req.coupon_code = Some("once".into());
    service.create(&customer("u1"), req.clone()).await.unwrap();

    let err = service.create(&customer("u1"), req).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::CouponUsageLimitReached);
}

#[tokio::test]
async fn test_insufficient_stock_rolls_back_reservations() {
    let state = test_state().await;
    seed_product(&state, "p1", 100.0, 5).await;
    seed_product(&state, "p2", 50.0, 1).await;

    let service = OrderService::new(&state);
    let err = service
        .create(
            &customer("u1"),
            order_request(vec![("p1", 2), ("p2", 3)], PaymentMethod::Cod),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InsufficientStock);

    // p1 was reserved before p2 failed; the hold must be gone
    let ledger = InventoryLedger::new(state.db.clone());
    let p1 = ledger.get("p1").await.unwrap();
    assert_eq!(p1.reserved, 0);
    assert_eq!(p1.quantity, 5);
    let p2 = ledger.get("p2").await.unwrap();
    assert_eq!(p2.reserved, 0);
}

#[tokio::test]
async fn test_inactive_product_rejected() {
    let state = test_state().await;
    seed_product(&state, "p1", 100.0, 5).await;
    ProductRepository::new(state.db.clone())
        .set_active("p1", false, now_millis())
        .await
        .unwrap();

    let service = OrderService::new(&state);
    let err = service
        .create(&customer("u1"), order_request(vec![("p1", 1)], PaymentMethod::Cod))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ProductInactive);
}

#[tokio::test]
async fn test_unknown_product_rejected() {
    let state = test_state().await;

    let service = OrderService::new(&state);
    let err = service
        .create(&customer("u1"), order_request(vec![("ghost", 1)], PaymentMethod::Cod))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ProductNotFound);
}

#[tokio::test]
async fn test_blank_address_field_rejected() {
    let state = test_state().await;
    seed_product(&state, "p1", 100.0, 5).await;

    let mut req = order_request(vec![("p1", 1)], PaymentMethod::Cod);
    req.shipping_address.city = "   ".into();

    let service = OrderService::new(&state);
    let err = service.create(&customer("u1"), req).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::RequiredField);
}

#[tokio::test]
async fn test_customer_cancel_confirmed_restocks() {
    let state = test_state().await;
    seed_product(&state, "p1", 100.0, 5).await;

    let service = OrderService::new(&state);
    let resp = service
        .create(&customer("u1"), order_request(vec![("p1", 2)], PaymentMethod::Cod))
        .await
        .unwrap();
    assert_eq!(resp.order.status, OrderStatus::Confirmed);

    let cancelled = service
        .cancel(&customer("u1"), &resp.order.order_id)
        .await
        .expect("customer cancel");
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.stock_state, StockState::Released);

    // Committed stock comes back on-hand
    let record = InventoryLedger::new(state.db.clone()).get("p1").await.unwrap();
    assert_eq!(record.quantity, 5);
    assert_eq!(record.reserved, 0);
}

#[tokio::test]
async fn test_admin_cancel_payment_pending_releases_reservation() {
    let state = test_state().await;
    seed_product(&state, "p1", 100.0, 5).await;

    let service = OrderService::new(&state);
    let resp = service
        .create(&customer("u1"), order_request(vec![("p1", 2)], PaymentMethod::Online))
        .await
        .unwrap();
    assert_eq!(resp.order.status, OrderStatus::PaymentPending);

    let cancelled = service
        .transition(&admin(), &resp.order.order_id, OrderStatus::Cancelled, None)
        .await
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.stock_state, StockState::Released);

    let record = InventoryLedger::new(state.db.clone()).get("p1").await.unwrap();
    assert_eq!(record.quantity, 5);
    assert_eq!(record.reserved, 0);
}

#[tokio::test]
async fn test_customer_cannot_cancel_payment_pending() {
    let state = test_state().await;
    seed_product(&state, "p1", 100.0, 5).await;

    let service = OrderService::new(&state);
    let resp = service
        .create(&customer("u1"), order_request(vec![("p1", 1)], PaymentMethod::Online))
        .await
        .unwrap();

    // PAYMENT_PENDING -> CANCELLED is a legal edge, but not for the customer
    let err = service
        .cancel(&customer("u1"), &resp.order.order_id)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::OrderNotCancellable);
}

#[tokio::test]
async fn test_customer_cannot_cancel_shipping_order() {
    let state = test_state().await;
    seed_product(&state, "p1", 100.0, 5).await;

    let service = OrderService::new(&state);
    let resp = service
        .create(&customer("u1"), order_request(vec![("p1", 1)], PaymentMethod::Cod))
        .await
        .unwrap();

    let ops = admin();
    service
        .transition(&ops, &resp.order.order_id, OrderStatus::Processing, None)
        .await
        .unwrap();
    service
        .transition(&ops, &resp.order.order_id, OrderStatus::Shipping, None)
        .await
        .unwrap();

    // SHIPPING has no edge to CANCELLED at all
    let err = service
        .cancel(&customer("u1"), &resp.order.order_id)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidTransition);
}

#[tokio::test]
async fn test_illegal_edge_rejected_for_admin_too() {
    let state = test_state().await;
    seed_product(&state, "p1", 100.0, 5).await;

    let service = OrderService::new(&state);
    let resp = service
        .create(&customer("u1"), order_request(vec![("p1", 1)], PaymentMethod::Cod))
        .await
        .unwrap();

    // CONFIRMED -> DELIVERED skips the fulfillment steps
    let err = service
        .transition(&admin(), &resp.order.order_id, OrderStatus::Delivered, None)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidTransition);
}

#[tokio::test]
async fn test_cod_delivery_marks_order_paid() {
    let state = test_state().await;
    seed_product(&state, "p1", 100.0, 5).await;

    let service = OrderService::new(&state);
    let resp = service
        .create(&customer("u1"), order_request(vec![("p1", 1)], PaymentMethod::Cod))
        .await
        .unwrap();

    let ops = admin();
    let order_id = resp.order.order_id;
    service.transition(&ops, &order_id, OrderStatus::Processing, None).await.unwrap();
    service.transition(&ops, &order_id, OrderStatus::Shipping, None).await.unwrap();
    let delivered = service
        .transition(&ops, &order_id, OrderStatus::Delivered, None)
        .await
        .unwrap();

    assert_eq!(delivered.status, OrderStatus::Delivered);
    assert_eq!(delivered.payment_state, OrderPaymentState::Paid);

    // The payment sub-ledger settles with the order
    let payments = PaymentService::new(&state)
        .list_by_order(&ops, &order_id)
        .await
        .unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].status, PaymentStatus::Success);
}

#[tokio::test]
async fn test_confirm_fails_closed_when_reservation_is_gone() {
    let state = test_state().await;
    seed_product(&state, "p1", 100.0, 5).await;

    let service = OrderService::new(&state);
    let resp = service
        .create(&customer("u1"), order_request(vec![("p1", 1)], PaymentMethod::Online))
        .await
        .unwrap();
    let order_id = resp.order.order_id;

    // The hold disappears out from under the order
    let ledger = InventoryLedger::new(state.db.clone());
    ledger.release("p1", 1, &order_id).await.unwrap();

    let err = service
        .transition(&admin(), &order_id, OrderStatus::Confirmed, None)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InsufficientStock);

    // The failed confirm rolled back whole: no status flip, no phantom OUT
    let order = service.get(&admin(), &order_id).await.unwrap();
    assert_eq!(order.status, OrderStatus::PaymentPending);
    assert_eq!(order.stock_state, StockState::Reserved);
    let record = ledger.get("p1").await.unwrap();
    assert_eq!(record.quantity, 5);
    assert_eq!(record.reserved, 0);

    // A later cancel cannot mint stock from the vanished hold either
    let err = service
        .transition(&admin(), &order_id, OrderStatus::Cancelled, None)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::TransitionConflict);
    assert_eq!(ledger.get("p1").await.unwrap().quantity, 5);
}

#[tokio::test]
async fn test_customers_cannot_see_each_others_orders() {
    let state = test_state().await;
    seed_product(&state, "p1", 100.0, 5).await;

    let service = OrderService::new(&state);
    let resp = service
        .create(&customer("u1"), order_request(vec![("p1", 1)], PaymentMethod::Cod))
        .await
        .unwrap();

    let err = service
        .get(&customer("u2"), &resp.order.order_id)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::PermissionDenied);

    // Admin sees everything
    assert!(service.get(&admin(), &resp.order.order_id).await.is_ok());
}

#[tokio::test]
async fn test_list_scopes_customers_to_own_orders() {
    let state = test_state().await;
    seed_product(&state, "p1", 100.0, 10).await;

    let service = OrderService::new(&state);
    service
        .create(&customer("u1"), order_request(vec![("p1", 1)], PaymentMethod::Cod))
        .await
        .unwrap();
    service
        .create(&customer("u2"), order_request(vec![("p1", 1)], PaymentMethod::Cod))
        .await
        .unwrap();

    let query = storefront_server::orders::OrderListQuery {
        user_id: None,
        status: None,
        limit: None,
        offset: None,
    };
    let own = service.list(&customer("u1"), query.clone()).await.unwrap();
    assert_eq!(own.len(), 1);
    assert_eq!(own[0].user_id, "u1");

    let all = service.list(&admin(), query).await.unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn test_purge_rules() {
    let state = test_state().await;
    seed_product(&state, "p1", 100.0, 5).await;

    let service = OrderService::new(&state);
    let resp = service
        .create(&customer("u1"), order_request(vec![("p1", 1)], PaymentMethod::Cod))
        .await
        .unwrap();
    let order_id = resp.order.order_id;

    // Confirmed orders are not purgeable
    let err = service.purge(&admin(), &order_id).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::OrderNotPurgeable);

    // Customers cannot purge at all
    service.cancel(&customer("u1"), &order_id).await.unwrap();
    let err = service.purge(&customer("u1"), &order_id).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::AdminRequired);

    service.purge(&admin(), &order_id).await.expect("purge cancelled order");
    let err = service.get(&admin(), &order_id).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::OrderNotFound);
}
