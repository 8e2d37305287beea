//! Inventory API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use shared::models::{InventoryRecord, StockMovement};
use validator::Validate;

use crate::auth::Actor;
use crate::core::ServerState;
use crate::inventory::InventoryLedger;
use crate::utils::{AppError, AppResult};

/// GET /api/inventory/:product_id - 库存详情
pub async fn get_by_product(
    State(state): State<ServerState>,
    actor: Actor,
    Path(product_id): Path<String>,
) -> AppResult<Json<InventoryRecord>> {
    actor.require_admin()?;
    let ledger = InventoryLedger::new(state.db.clone());
    Ok(Json(ledger.get(&product_id).await?))
}

/// GET /api/inventory/:product_id/movements - 流水账
pub async fn movements(
    State(state): State<ServerState>,
    actor: Actor,
    Path(product_id): Path<String>,
) -> AppResult<Json<Vec<StockMovement>>> {
    actor.require_admin()?;
    let ledger = InventoryLedger::new(state.db.clone());
    let record = ledger.get(&product_id).await?;
    Ok(Json(record.movements))
}

#[derive(Deserialize, Validate)]
pub struct ReceiveRequest {
    #[validate(range(min = 1))]
    pub quantity: i64,
}

/// POST /api/inventory/:product_id/receive - 收货入库 (管理端)
pub async fn receive(
    State(state): State<ServerState>,
    actor: Actor,
    Path(product_id): Path<String>,
    Json(req): Json<ReceiveRequest>,
) -> AppResult<Json<InventoryRecord>> {
    actor.require_admin()?;
    req.validate()
        .map_err(|e| AppError::validation(e.to_string()))?;
    let ledger = InventoryLedger::new(state.db.clone());
    let record = ledger
        .receive(&product_id, req.quantity, &actor.user_id)
        .await?;
    Ok(Json(record))
}

#[derive(Deserialize, Validate)]
pub struct AdjustRequest {
    pub delta: i64,
    #[validate(length(min = 1, max = 255))]
    pub reason: String,
}

/// POST /api/inventory/:product_id/adjust - 人工调整 (管理端)
pub async fn adjust(
    State(state): State<ServerState>,
    actor: Actor,
    Path(product_id): Path<String>,
    Json(req): Json<AdjustRequest>,
) -> AppResult<Json<InventoryRecord>> {
    actor.require_admin()?;
    req.validate()
        .map_err(|e| AppError::validation(e.to_string()))?;
    let ledger = InventoryLedger::new(state.db.clone());
    let record = ledger
        .adjust(&product_id, req.delta, &req.reason, &actor.user_id)
        .await?;
    Ok(Json(record))
}

/// GET /api/inventory/low-stock - 低于再订购点的商品 (管理端)
pub async fn low_stock(
    State(state): State<ServerState>,
    actor: Actor,
) -> AppResult<Json<Vec<InventoryRecord>>> {
    actor.require_admin()?;
    let ledger = InventoryLedger::new(state.db.clone());
    Ok(Json(ledger.low_stock().await?))
}
