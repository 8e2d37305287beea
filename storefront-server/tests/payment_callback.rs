//! 网关回调集成测试
//!
//! 在线支付全链路：签名回调确认订单、重放幂等、篡改拒绝、
//! 失败释放预留、失败后重试、退款。

use std::collections::BTreeMap;

use ring::hmac;
use shared::error::ErrorCode;
use shared::models::{
    OrderPaymentState, OrderStatus, PaymentMethod, PaymentStatus, Product, ShippingAddress,
    StockState,
};
use shared::util::now_millis;
use storefront_server::auth::{Actor, Role};
use storefront_server::core::{Config, ServerState};
use storefront_server::db::DbService;
use storefront_server::db::repository::ProductRepository;
use storefront_server::inventory::InventoryLedger;
use storefront_server::orders::{CreateOrderRequest, OrderItemRequest, OrderService};
use storefront_server::payments::{CallbackAck, PaymentService, RefundRequest};

const SECRET: &str = "topsecret";

async fn test_state() -> ServerState {
    let db = DbService::memory().await.expect("in-memory db");
    let mut config = Config::with_overrides("/tmp/storefront-test", 0);
    config.gateway.merchant_code = "TEST01".into();
    config.gateway.secret = SECRET.into();
    ServerState::with_db(config, db.db)
}

async fn seed_product(state: &ServerState, product_id: &str, price: f64, stock: i64) {
    let now = now_millis();
    ProductRepository::new(state.db.clone())
        .create(Product {
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

fn customer(id: &str) -> Actor {
    Actor::new(id, Role::Customer)
}

/// 在线下单：返回 (order_id, payment_id)
async fn checkout_online(state: &ServerState, user: &str, qty: i64) -> (String, String) {
    let service = OrderService::new(state);
    let resp = service
        .create(
            &customer(user),
            CreateOrderRequest {
                items: vec![OrderItemRequest {
                    product_id: "p1".into(),
                    quantity: qty,
                }],
                coupon_code: None,
                shipping_fee: 30.0,
                shipping_address: ShippingAddress {
                    recipient: "Nguyen Van A".into(),
                    phone: "0900000001".into(),
                    line1: "1 Le Loi".into(),
                    line2: None,
                    city: "Ho Chi Minh City".into(),
                    postal_code: "70000".into(),
                    country: "VN".into(),
                },
                payment_method: PaymentMethod::Online,
                note: None,
            },
        )
        .await
        .expect("online checkout");
    let payment_id = resp.payment.expect("payment record").payment_id;
    (resp.order.order_id, payment_id)
}

/// 按网关协议签名：去掉 signature 与空值，字典序 key=value&，HMAC-SHA512 hex
fn signed_callback(payment_id: &str, response_code: &str) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    params.insert("bank_code".to_string(), "NCB".to_string());
    params.insert("pay_date".to_string(), "20260830120000".to_string());
    params.insert("reference".to_string(), payment_id.to_string());
    params.insert("response_code".to_string(), response_code.to_string());
    params.insert("txn_id".to_string(), "14422574".to_string());

    let canonical = params
        .iter()
        .filter(|(k, v)| k.as_str() != "signature" && !v.is_empty())
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    let key = hmac::Key::new(hmac::HMAC_SHA512, SECRET.as_bytes());
    let tag = hmac::sign(&key, canonical.as_bytes());
    params.insert("signature".to_string(), hex::encode(tag.as_ref()));
    params
}

#[tokio::test]
async fn test_success_callback_confirms_order() {
    let state = test_state().await;
    seed_product(&state, "p1", 100.0, 5).await;
    let (order_id, payment_id) = checkout_online(&state, "u1", 2).await;

    let payments = PaymentService::new(&state);
    let payment = payments
        .apply_callback(&signed_callback(&payment_id, "00"))
        .await
        .expect("success callback");

    assert_eq!(payment.status, PaymentStatus::Success);
    assert!(payment.callback_verified);
    assert_eq!(payment.response_code.as_deref(), Some("00"));
    assert_eq!(payment.gateway_txn_id.as_deref(), Some("14422574"));

    let order = OrderService::new(&state)
        .get(&customer("u1"), &order_id)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Confirmed);
    assert_eq!(order.payment_state, OrderPaymentState::Paid);
    assert_eq!(order.stock_state, StockState::Committed);

    let record = InventoryLedger::new(state.db.clone()).get("p1").await.unwrap();
    assert_eq!(record.quantity, 3);
    assert_eq!(record.reserved, 0);
}

#[tokio::test]
async fn test_replayed_callback_is_idempotent() {
    let state = test_state().await;
    seed_product(&state, "p1", 100.0, 5).await;
    let (order_id, payment_id) = checkout_online(&state, "u1", 2).await;

    let payments = PaymentService::new(&state);
    let params = signed_callback(&payment_id, "00");
    payments.apply_callback(&params).await.unwrap();

    // Same IPN delivered twice: acknowledge, change nothing
    let replay = payments.apply_callback(&params).await;
    let err = replay.as_ref().unwrap_err();
    assert_eq!(err.code, ErrorCode::AlreadyProcessed);
    assert_eq!(PaymentService::ack_for(&replay), CallbackAck::AlreadyProcessed);
    assert_eq!(PaymentService::ack_for(&replay).code(), "02");

    let order = OrderService::new(&state)
        .get(&customer("u1"), &order_id)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Confirmed);
    let record = InventoryLedger::new(state.db.clone()).get("p1").await.unwrap();
    assert_eq!(record.quantity, 3);
    assert_eq!(record.reserved, 0);
}

#[tokio::test]
async fn test_tampered_callback_changes_nothing() {
    let state = test_state().await;
    seed_product(&state, "p1", 100.0, 5).await;
    let (order_id, payment_id) = checkout_online(&state, "u1", 2).await;

    let mut params = signed_callback(&payment_id, "00");
    params.insert("txn_id".to_string(), "99999999".to_string());

    let payments = PaymentService::new(&state);
    let result = payments.apply_callback(&params).await;
    let err = result.as_ref().unwrap_err();
    assert_eq!(err.code, ErrorCode::SignatureMismatch);
    assert_eq!(PaymentService::ack_for(&result).code(), "97");

    // Hard fail: payment and order untouched
    let payment = payments
        .get(&customer("u1"), &payment_id)
        .await
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert!(!payment.callback_verified);

    let order = OrderService::new(&state)
        .get(&customer("u1"), &order_id)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::PaymentPending);
    assert_eq!(order.stock_state, StockState::Reserved);
    let record = InventoryLedger::new(state.db.clone()).get("p1").await.unwrap();
    assert_eq!(record.reserved, 2);
}

#[tokio::test]
async fn test_success_callback_fails_closed_when_reservation_is_gone() {
    let state = test_state().await;
    seed_product(&state, "p1", 100.0, 5).await;
    let (order_id, payment_id) = checkout_online(&state, "u1", 2).await;

    // The hold disappears out from under the order before the IPN lands
    InventoryLedger::new(state.db.clone())
        .release("p1", 2, &order_id)
        .await
        .unwrap();

    let payments = PaymentService::new(&state);
    let result = payments.apply_callback(&signed_callback(&payment_id, "00")).await;
    assert_eq!(result.unwrap_err().code, ErrorCode::InsufficientStock);

    // The order did not confirm and no stock left the books
    let order = OrderService::new(&state)
        .get(&customer("u1"), &order_id)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::PaymentPending);
    let record = InventoryLedger::new(state.db.clone()).get("p1").await.unwrap();
    assert_eq!(record.quantity, 5);
    assert_eq!(record.reserved, 0);
}

#[tokio::test]
async fn test_failure_code_releases_reservation() {
    let state = test_state().await;
    seed_product(&state, "p1", 100.0, 5).await;
    let (order_id, payment_id) = checkout_online(&state, "u1", 2).await;

    let payments = PaymentService::new(&state);
    let payment = payments
        .apply_callback(&signed_callback(&payment_id, "51"))
        .await
        .expect("failure callback still applies");

    assert_eq!(payment.status, PaymentStatus::Failed);
    assert_eq!(payment.response_code.as_deref(), Some("51"));

    let order = OrderService::new(&state)
        .get(&customer("u1"), &order_id)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::PaymentFailed);
    assert_eq!(order.payment_state, OrderPaymentState::Failed);
    assert_eq!(order.stock_state, StockState::Released);

    let record = InventoryLedger::new(state.db.clone()).get("p1").await.unwrap();
    assert_eq!(record.quantity, 5);
    assert_eq!(record.reserved, 0);
}

#[tokio::test]
async fn test_retry_after_failure_re_reserves() {
    let state = test_state().await;
    seed_product(&state, "p1", 100.0, 5).await;
    let (order_id, payment_id) = checkout_online(&state, "u1", 2).await;

    let payments = PaymentService::new(&state);
    payments
        .apply_callback(&signed_callback(&payment_id, "24"))
        .await
        .unwrap();

    let orders = OrderService::new(&state);
    let retried = orders
        .transition(
            &Actor::new("ops", Role::Admin),
            &order_id,
            OrderStatus::Pending,
            None,
        )
        .await
        .expect("retry to pending");

    assert_eq!(retried.status, OrderStatus::Pending);
    assert_eq!(retried.payment_state, OrderPaymentState::Pending);
    assert_eq!(retried.stock_state, StockState::Reserved);

    let record = InventoryLedger::new(state.db.clone()).get("p1").await.unwrap();
    assert_eq!(record.reserved, 2);
}

#[tokio::test]
async fn test_missing_reference_acks_not_found() {
    let state = test_state().await;

    let payments = PaymentService::new(&state);
    let result = payments.apply_callback(&BTreeMap::new()).await;
    assert_eq!(result.as_ref().unwrap_err().code, ErrorCode::PaymentNotFound);
    assert_eq!(PaymentService::ack_for(&result).code(), "01");

    let params = signed_callback("no-such-payment", "00");
    let result = payments.apply_callback(&params).await;
    assert_eq!(PaymentService::ack_for(&result), CallbackAck::NotFound);
}

#[tokio::test]
async fn test_cod_payment_rejects_callbacks() {
    let state = test_state().await;
    seed_product(&state, "p1", 100.0, 5).await;

    let orders = OrderService::new(&state);
    let resp = orders
        .create(
            &customer("u1"),
            CreateOrderRequest {
                items: vec![OrderItemRequest {
                    product_id: "p1".into(),
                    quantity: 1,
                }],
                coupon_code: None,
                shipping_fee: 0.0,
                shipping_address: ShippingAddress {
                    recipient: "A".into(),
                    phone: "1".into(),
                    line1: "street".into(),
                    line2: None,
                    city: "city".into(),
                    postal_code: "70000".into(),
                    country: "VN".into(),
                },
                payment_method: PaymentMethod::Cod,
                note: None,
            },
        )
        .await
        .unwrap();
    let payment_id = resp.payment.unwrap().payment_id;

    let payments = PaymentService::new(&state);
    let err = payments
        .apply_callback(&signed_callback(&payment_id, "00"))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::PaymentInvalidMethod);
}

#[tokio::test]
async fn test_refund_flow() {
    let state = test_state().await;
    seed_product(&state, "p1", 100.0, 5).await;
    let (_, payment_id) = checkout_online(&state, "u1", 2).await;

    let payments = PaymentService::new(&state);
    payments
        .apply_callback(&signed_callback(&payment_id, "00"))
        .await
        .unwrap();

    let ops = Actor::new("ops", Role::Admin);

    // Customers cannot refund
    let err = payments
        .refund(
            &customer("u1"),
            &payment_id,
            RefundRequest {
                amount: 10.0,
                reason: "damaged item".into(),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::AdminRequired);

    // Partial refund of the 230.00 payment
    let partial = payments
        .refund(
            &ops,
            &payment_id,
            RefundRequest {
                amount: 100.0,
                reason: "damaged item".into(),
            },
        )
        .await
        .unwrap();
    assert_eq!(partial.status, PaymentStatus::PartiallyRefunded);
    assert_eq!(partial.refunded_amount(), 100.0);

    let full = payments
        .refund(
            &ops,
            &payment_id,
            RefundRequest {
                amount: 130.0,
                reason: "order cancelled after payment".into(),
            },
        )
        .await
        .unwrap();
    assert_eq!(full.status, PaymentStatus::Refunded);
    assert_eq!(full.refunded_amount(), 230.0);

    // Over-refund is rejected
    let err = payments
        .refund(
            &ops,
            &payment_id,
            RefundRequest {
                amount: 1.0,
                reason: "extra".into(),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::RefundExceedsAmount);
}

#[tokio::test]
async fn test_refund_requires_successful_payment() {
    let state = test_state().await;
    seed_product(&state, "p1", 100.0, 5).await;
    let (_, payment_id) = checkout_online(&state, "u1", 1).await;

    let payments = PaymentService::new(&state);
    let err = payments
        .refund(
            &Actor::new("ops", Role::Admin),
            &payment_id,
            RefundRequest {
                amount: 10.0,
                reason: "too early".into(),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::PaymentStateInvalid);
}
