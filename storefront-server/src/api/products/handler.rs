//! Product API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use shared::models::{Product, ProductCreate};
use shared::util::now_millis;

use crate::auth::Actor;
use crate::core::ServerState;
use crate::db::repository::{ProductRepository, RepoError};
use crate::inventory::InventoryLedger;
use crate::orders::money;
use crate::utils::{AppError, AppResult, ErrorCode};

/// POST /api/products - 创建商品 (管理端)，附带初始库存
pub async fn create(
    State(state): State<ServerState>,
    actor: Actor,
    Json(req): Json<ProductCreate>,
) -> AppResult<Json<Product>> {
    actor.require_admin()?;
    if req.product_id.trim().is_empty() || req.name.trim().is_empty() {
        return Err(AppError::validation("product_id and name are required"));
    }
    money::validate_amount(req.price, "price")?;
    if let Some(stock) = req.initial_stock
        && stock < 0
    {
        return Err(AppError::validation("initial_stock must not be negative"));
    }

    let now = now_millis();
    let product = Product {
        product_id: req.product_id.trim().to_string(),
        name: req.name,
        price: money::round2(req.price),
        image: req.image,
        is_active: true,
        created_at: now,
        updated_at: now,
    };

    let repo = ProductRepository::new(state.db.clone());
    let created = match repo.create(product).await {
        Ok(p) => p,
        Err(RepoError::Duplicate(msg)) => return Err(AppError::already_exists(msg)),
        Err(e) => return Err(AppError::database(e.to_string())),
    };

    // 懒创建库存记录
    let ledger = InventoryLedger::new(state.db.clone());
    ledger
        .ensure(
            &created.product_id,
            req.initial_stock.unwrap_or(0),
            &actor.user_id,
        )
        .await?;

    Ok(Json(created))
}

/// GET /api/products - 获取所有商品
pub async fn list(State(state): State<ServerState>) -> AppResult<Json<Vec<Product>>> {
    let repo = ProductRepository::new(state.db.clone());
    let products = repo
        .find_all()
        .await
        .map_err(|e| AppError::database(e.to_string()))?;
    Ok(Json(products))
}

/// GET /api/products/:id - 获取单个商品
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<Product>> {
    let repo = ProductRepository::new(state.db.clone());
    let product = repo
        .find_by_product_id(&id)
        .await
        .map_err(|e| AppError::database(e.to_string()))?
        .ok_or_else(|| AppError::new(ErrorCode::ProductNotFound))?;
    Ok(Json(product))
}

#[derive(Deserialize)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

/// PUT /api/products/:id/active - 上/下架 (管理端)
pub async fn set_active(
    State(state): State<ServerState>,
    actor: Actor,
    Path(id): Path<String>,
    Json(req): Json<SetActiveRequest>,
) -> AppResult<Json<Product>> {
    actor.require_admin()?;
    let repo = ProductRepository::new(state.db.clone());
    let product = repo
        .set_active(&id, req.is_active, now_millis())
        .await
        .map_err(|e| AppError::database(e.to_string()))?
        .ok_or_else(|| AppError::new(ErrorCode::ProductNotFound))?;
    Ok(Json(product))
}
