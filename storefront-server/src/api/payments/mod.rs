//! Payment API 模块
//!
//! 回调有两个通道：浏览器回跳 (`/callback/return`) 走正常的
//! 错误语义，服务器 IPN (`/callback/ipn`) 始终 200 并按网关
//! 协议应答码返回，防止网关无限重试。

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/payments", payment_routes())
}

fn payment_routes() -> Router<ServerState> {
    Router::new()
        .route("/callback/return", get(handler::callback_return))
        .route("/callback/ipn", get(handler::callback_ipn))
        .route("/by-order/{order_id}", get(handler::list_by_order))
        .route("/{payment_id}", get(handler::get_by_id))
        .route("/{payment_id}/refund", post(handler::refund))
}
