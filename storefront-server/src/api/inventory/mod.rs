//! Inventory API 模块

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/inventory", inventory_routes())
}

fn inventory_routes() -> Router<ServerState> {
    Router::new()
        .route("/low-stock", get(handler::low_stock))
        .route("/{product_id}", get(handler::get_by_product))
        .route("/{product_id}/movements", get(handler::movements))
        .route("/{product_id}/receive", post(handler::receive))
        .route("/{product_id}/adjust", post(handler::adjust))
}
