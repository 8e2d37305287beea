//! Coupon API 模块

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/coupons", coupon_routes())
}

fn coupon_routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::list).post(handler::create))
        .route("/validate", post(handler::validate))
        .route("/{code}", get(handler::get_by_code))
        .route("/{code}/deactivate", post(handler::deactivate))
        .route("/{code}/reactivate", post(handler::reactivate))
}
