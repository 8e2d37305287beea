//! Order API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};
use shared::error::ApiResponse;
use shared::models::Order;

use crate::auth::Actor;
use crate::core::ServerState;
use crate::orders::{
    CreateOrderRequest, CreateOrderResponse, OrderListQuery, OrderService, TransitionRequest,
};
use crate::utils::AppResult;

/// POST /api/orders - 结账下单
pub async fn create(
    State(state): State<ServerState>,
    actor: Actor,
    Json(req): Json<CreateOrderRequest>,
) -> AppResult<Json<CreateOrderResponse>> {
    let service = OrderService::new(&state);
    Ok(Json(service.create(&actor, req).await?))
}

/// GET /api/orders - 订单列表 (客户只能看自己的)
pub async fn list(
    State(state): State<ServerState>,
    actor: Actor,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<Vec<Order>>> {
    let service = OrderService::new(&state);
    Ok(Json(service.list(&actor, query).await?))
}

/// GET /api/orders/:order_id
pub async fn get_by_id(
    State(state): State<ServerState>,
    actor: Actor,
    Path(order_id): Path<String>,
) -> AppResult<Json<Order>> {
    let service = OrderService::new(&state);
    Ok(Json(service.get(&actor, &order_id).await?))
}

/// POST /api/orders/:order_id/transition - 状态流转
pub async fn transition(
    State(state): State<ServerState>,
    actor: Actor,
    Path(order_id): Path<String>,
    Json(req): Json<TransitionRequest>,
) -> AppResult<Json<Order>> {
    let service = OrderService::new(&state);
    Ok(Json(
        service
            .transition(&actor, &order_id, req.target, req.note)
            .await?,
    ))
}

/// POST /api/orders/:order_id/cancel - 客户取消
pub async fn cancel(
    State(state): State<ServerState>,
    actor: Actor,
    Path(order_id): Path<String>,
) -> AppResult<Json<Order>> {
    let service = OrderService::new(&state);
    Ok(Json(service.cancel(&actor, &order_id).await?))
}

/// DELETE /api/orders/:order_id - 清除订单 (管理端)
pub async fn purge(
    State(state): State<ServerState>,
    actor: Actor,
    Path(order_id): Path<String>,
) -> AppResult<Json<ApiResponse<()>>> {
    let service = OrderService::new(&state);
    service.purge(&actor, &order_id).await?;
    Ok(Json(ApiResponse::ok()))
}
