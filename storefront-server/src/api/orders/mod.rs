//! Order API 模块

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/orders", order_routes())
}

fn order_routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::list).post(handler::create))
        .route("/{order_id}", get(handler::get_by_id).delete(handler::purge))
        .route("/{order_id}/transition", post(handler::transition))
        .route("/{order_id}/cancel", post(handler::cancel))
}
