//! Payment API Handlers

use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde_json::json;
use shared::models::Payment;

use crate::auth::Actor;
use crate::core::ServerState;
use crate::payments::{PaymentService, RefundRequest};
use crate::utils::AppResult;

/// GET /api/payments/:payment_id
pub async fn get_by_id(
    State(state): State<ServerState>,
    actor: Actor,
    Path(payment_id): Path<String>,
) -> AppResult<Json<Payment>> {
    let service = PaymentService::new(&state);
    Ok(Json(service.get(&actor, &payment_id).await?))
}

/// GET /api/payments/by-order/:order_id
pub async fn list_by_order(
    State(state): State<ServerState>,
    actor: Actor,
    Path(order_id): Path<String>,
) -> AppResult<Json<Vec<Payment>>> {
    let service = PaymentService::new(&state);
    Ok(Json(service.list_by_order(&actor, &order_id).await?))
}

/// GET /api/payments/callback/return - 浏览器回跳
///
/// 不要求登录头：用户从网关跳回时只带查询参数。
pub async fn callback_return(
    State(state): State<ServerState>,
    Query(params): Query<BTreeMap<String, String>>,
) -> AppResult<Json<Payment>> {
    let service = PaymentService::new(&state);
    Ok(Json(service.apply_callback(&params).await?))
}

/// GET /api/payments/callback/ipn - 网关服务器通知
///
/// 始终 200；结果折叠成网关协议的应答码。
pub async fn callback_ipn(
    State(state): State<ServerState>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Json<serde_json::Value> {
    let service = PaymentService::new(&state);
    let result = service.apply_callback(&params).await;
    let ack = PaymentService::ack_for(&result);
    Json(json!({ "code": ack.code(), "message": ack.message() }))
}

/// POST /api/payments/:payment_id/refund (管理端)
pub async fn refund(
    State(state): State<ServerState>,
    actor: Actor,
    Path(payment_id): Path<String>,
    Json(req): Json<RefundRequest>,
) -> AppResult<Json<Payment>> {
    let service = PaymentService::new(&state);
    Ok(Json(service.refund(&actor, &payment_id, req).await?))
}
