//! Inventory Ledger
//!
//! 仓储层守卫更新之上的业务封装：把"守卫不满足"翻译成
//! `InsufficientStock` / `InventoryNotFound`，瞬态冲突有界重试。

use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::InventoryRecord;
use shared::util::now_millis;
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

use crate::db::repository::{InventoryRepository, RepoError};

/// 瞬态写冲突的最大重试次数
const MAX_RETRIES: u32 = 3;

fn is_transient(err: &RepoError) -> bool {
    match err {
        RepoError::Database(msg) => {
            let msg = msg.to_lowercase();
            msg.contains("retry") || msg.contains("conflict") || msg.contains("resource busy")
        }
        _ => false,
    }
}

#[derive(Clone)]
pub struct InventoryLedger {
    repo: InventoryRepository,
}

impl InventoryLedger {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            repo: InventoryRepository::new(db),
        }
    }

    /// 懒创建库存记录 (商品创建时调用)
    pub async fn ensure(
        &self,
        product_id: &str,
        initial_quantity: i64,
        actor: &str,
    ) -> AppResult<InventoryRecord> {
        self.repo
            .ensure(product_id, initial_quantity, actor, now_millis())
            .await
            .map_err(|e| AppError::database(e.to_string()))
    }

    pub async fn get(&self, product_id: &str) -> AppResult<InventoryRecord> {
        self.repo
            .find_by_product_id(product_id)
            .await
            .map_err(|e| AppError::database(e.to_string()))?
            .ok_or_else(|| {
                AppError::with_message(
                    ErrorCode::InventoryNotFound,
                    format!("No inventory record for product {product_id}"),
                )
            })
    }

    /// 可用量是否覆盖请求数量
    pub async fn check_stock(&self, product_id: &str, qty: i64) -> AppResult<bool> {
        Ok(self.get(product_id).await?.available() >= qty)
    }

    /// 预留：失败返回 `InsufficientStock`
    pub async fn reserve(
        &self,
        product_id: &str,
        qty: i64,
        order_id: &str,
    ) -> AppResult<InventoryRecord> {
        self.guarded(product_id, qty, |now| {
            self.repo.reserve(product_id, qty, order_id, now)
        })
        .await
    }

    /// 释放预留
    pub async fn release(
        &self,
        product_id: &str,
        qty: i64,
        order_id: &str,
    ) -> AppResult<InventoryRecord> {
        self.guarded(product_id, qty, |now| {
            self.repo.release(product_id, qty, order_id, now)
        })
        .await
    }

    /// 出库后巡检再订购点，低于时记警告 (尽力而为)
    pub async fn check_reorder_levels(&self, product_ids: &[String]) {
        for product_id in product_ids {
            match self.repo.find_by_product_id(product_id).await {
                Ok(Some(record)) => self.warn_if_low(&record),
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!(product_id, error = %e, "Reorder level check failed");
                }
            }
        }
    }

    /// 回补已出库数量 (已确认订单取消)
    pub async fn restock(
        &self,
        product_id: &str,
        qty: i64,
        order_id: &str,
    ) -> AppResult<InventoryRecord> {
        self.guarded(product_id, qty, |now| {
            self.repo.restock(product_id, qty, order_id, now)
        })
        .await
    }

    /// 收货入库
    pub async fn receive(&self, product_id: &str, qty: i64, actor: &str) -> AppResult<InventoryRecord> {
        if qty <= 0 {
            return Err(AppError::validation("Quantity must be positive"));
        }
        let record = self
            .guarded(product_id, qty, |now| {
                self.repo.receive(product_id, qty, actor, now)
            })
            .await?;
        Ok(record)
    }

    /// 人工调整 (正负皆可)，不得击穿预留量
    pub async fn adjust(
        &self,
        product_id: &str,
        delta: i64,
        reason: &str,
        actor: &str,
    ) -> AppResult<InventoryRecord> {
        if delta == 0 {
            return Err(AppError::validation("Adjustment delta must be non-zero"));
        }
        let mut attempt = 0;
        loop {
            match self.repo.adjust(product_id, delta, reason, actor, now_millis()).await {
                Ok(Some(record)) => return Ok(record),
                Ok(None) => return Err(self.guard_failure(product_id, delta.unsigned_abs() as i64).await),
                Err(e) if is_transient(&e) && attempt < MAX_RETRIES => {
                    attempt += 1;
                    tracing::debug!(product_id, attempt, "Transient inventory conflict, retrying");
                }
                Err(e) => return Err(AppError::database(e.to_string())),
            }
        }
    }

    /// 低于再订购点的库存记录
    pub async fn low_stock(&self) -> AppResult<Vec<InventoryRecord>> {
        self.repo
            .find_low_stock()
            .await
            .map_err(|e| AppError::database(e.to_string()))
    }

    fn warn_if_low(&self, record: &InventoryRecord) {
        if record.needs_reorder() {
            tracing::warn!(
                product_id = %record.product_id,
                quantity = record.quantity,
                reorder_point = record.reorder_point,
                "Stock at or below reorder point"
            );
        }
    }

    async fn guarded<F, Fut>(&self, product_id: &str, qty: i64, op: F) -> AppResult<InventoryRecord>
    where
        F: Fn(i64) -> Fut,
        Fut: Future<Output = Result<Option<InventoryRecord>, RepoError>>,
    {
        let mut attempt = 0;
        loop {
            match op(now_millis()).await {
                Ok(Some(record)) => return Ok(record),
                Ok(None) => return Err(self.guard_failure(product_id, qty).await),
                Err(e) if is_transient(&e) && attempt < MAX_RETRIES => {
                    attempt += 1;
                    tracing::debug!(product_id, attempt, "Transient inventory conflict, retrying");
                }
                Err(e) => return Err(AppError::database(e.to_string())),
            }
        }
    }

    /// 守卫未命中：区分记录缺失和数量不足
    async fn guard_failure(&self, product_id: &str, qty: i64) -> AppError {
        match self.repo.find_by_product_id(product_id).await {
            Ok(Some(record)) => {
                AppError::insufficient_stock(product_id, qty, record.available())
            }
            Ok(None) => AppError::with_message(
                ErrorCode::InventoryNotFound,
                format!("No inventory record for product {product_id}"),
            ),
            Err(e) => AppError::database(e.to_string()),
        }
    }
}
