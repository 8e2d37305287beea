//! Coupon API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use shared::models::Coupon;
use shared::util::now_millis;

use crate::auth::Actor;
use crate::core::ServerState;
use crate::coupons::{CouponCreate, CouponEngine};
use crate::utils::AppResult;

/// POST /api/coupons - 创建优惠券 (管理端)
pub async fn create(
    State(state): State<ServerState>,
    actor: Actor,
    Json(req): Json<CouponCreate>,
) -> AppResult<Json<Coupon>> {
    actor.require_admin()?;
    let engine = CouponEngine::new(state.db.clone());
    Ok(Json(engine.create(req).await?))
}

/// GET /api/coupons - 所有优惠券 (管理端)
pub async fn list(State(state): State<ServerState>, actor: Actor) -> AppResult<Json<Vec<Coupon>>> {
    actor.require_admin()?;
    let engine = CouponEngine::new(state.db.clone());
    Ok(Json(engine.list().await?))
}

/// GET /api/coupons/:code - 单个优惠券 (管理端)
pub async fn get_by_code(
    State(state): State<ServerState>,
    actor: Actor,
    Path(code): Path<String>,
) -> AppResult<Json<Coupon>> {
    actor.require_admin()?;
    let engine = CouponEngine::new(state.db.clone());
    Ok(Json(engine.get(&code).await?))
}

#[derive(Deserialize)]
pub struct ValidateRequest {
    pub code: String,
    pub order_value: f64,
    #[serde(default)]
    pub product_ids: Vec<String>,
}

#[derive(Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    pub discount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// POST /api/coupons/validate - 校验 + 试算折扣 (下单前预览)
pub async fn validate(
    State(state): State<ServerState>,
    actor: Actor,
    Json(req): Json<ValidateRequest>,
) -> AppResult<Json<ValidateResponse>> {
    let engine = CouponEngine::new(state.db.clone());
    let coupon = engine.get(&req.code).await?;
    match engine.validate(
        &coupon,
        &actor.user_id,
        req.order_value,
        &req.product_ids,
        now_millis(),
    ) {
        Ok(()) => Ok(Json(ValidateResponse {
            valid: true,
            discount: engine.calculate_discount(&coupon, req.order_value),
            reason: None,
        })),
        Err(e) => Ok(Json(ValidateResponse {
            valid: false,
            discount: 0.0,
            reason: Some(e.message.clone()),
        })),
    }
}

/// POST /api/coupons/:code/deactivate (管理端)
pub async fn deactivate(
    State(state): State<ServerState>,
    actor: Actor,
    Path(code): Path<String>,
) -> AppResult<Json<Coupon>> {
    actor.require_admin()?;
    let engine = CouponEngine::new(state.db.clone());
    Ok(Json(engine.deactivate(&code).await?))
}

/// POST /api/coupons/:code/reactivate (管理端)
pub async fn reactivate(
    State(state): State<ServerState>,
    actor: Actor,
    Path(code): Path<String>,
) -> AppResult<Json<Coupon>> {
    actor.require_admin()?;
    let engine = CouponEngine::new(state.db.clone());
    Ok(Json(engine.reactivate(&code).await?))
}
