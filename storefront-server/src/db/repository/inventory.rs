//! Inventory Repository
//!
//! 库存的全部写入都是带守卫的单条条件更新：守卫不满足时更新零行，
//! 返回 `None`，由服务层映射为 `InsufficientStock` 等业务错误。
//! `available = quantity - reserved` 的非负性由守卫在存储层保证，
//! 并发下不会超卖。

use super::{BaseRepository, RepoError, RepoResult};
use shared::models::{InventoryRecord, MovementType, StockMovement};
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

#[derive(Clone)]
pub struct InventoryRepository {
    base: BaseRepository,
}

impl InventoryRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// 懒创建库存记录；已存在时返回现有记录
    pub async fn ensure(
        &self,
        product_id: &str,
        initial_quantity: i64,
        actor: &str,
        now: i64,
    ) -> RepoResult<InventoryRecord> {
        if let Some(existing) = self.find_by_product_id(product_id).await? {
            return Ok(existing);
        }

        let movements = if initial_quantity > 0 {
            vec![StockMovement {
                movement_type: MovementType::In,
                delta: initial_quantity,
                reason: "initial stock".into(),
                reference: None,
                actor: actor.to_string(),
                at: now,
            }]
        } else {
            vec![]
        };

        let record = InventoryRecord {
            product_id: product_id.to_string(),
            quantity: initial_quantity,
            reserved: 0,
            min_stock: 0,
            max_stock: None,
            reorder_point: 0,
            movements,
            created_at: now,
            updated_at: now,
        };

        let result: Result<Vec<InventoryRecord>, surrealdb::Error> = async {
            let created = self
                .base
                .db()
                .query("CREATE inventory CONTENT $record RETURN AFTER")
                .bind(("record", record))
                .await?
                .check()?
                .take(0)?;
            Ok(created)
        }
        .await;

        match result {
            Ok(mut rows) => rows
                .pop()
                .ok_or_else(|| RepoError::Database("Create returned no row".into())),
            Err(e) => {
                let msg = e.to_string();
                if RepoError::is_duplicate_violation(&msg) {
                    // Lost a creation race; the other writer's record wins
                    self.find_by_product_id(product_id)
                        .await?
                        .ok_or_else(|| RepoError::Database(msg))
                } else {
                    Err(RepoError::Database(msg))
                }
            }
        }
    }

    pub async fn find_by_product_id(&self, product_id: &str) -> RepoResult<Option<InventoryRecord>> {
        let mut rows: Vec<InventoryRecord> = self
            .base
            .db()
            .query("SELECT * FROM inventory WHERE product_id = $product_id LIMIT 1")
            .bind(("product_id", product_id.to_string()))
            .await
            .map_err(RepoError::from)?
            .take(0)
            .map_err(RepoError::from)?;
        Ok(rows.pop())
    }

    /// 预留库存：守卫 `(quantity - reserved) >= qty`
    ///
    /// 返回 `None` 表示可用量不足 (或记录不存在)
    pub async fn reserve(
        &self,
        product_id: &str,
        qty: i64,
        order_id: &str,
        now: i64,
    ) -> RepoResult<Option<InventoryRecord>> {
        let movement = StockMovement {
            movement_type: MovementType::Reserved,
            delta: qty,
            reason: "order reservation".into(),
            reference: Some(order_id.to_string()),
            actor: "system".into(),
            at: now,
        };
        let mut rows: Vec<InventoryRecord> = self
            .base
            .db()
            .query(
                "UPDATE inventory SET \
                     reserved += $qty, \
                     movements += $movement, \
                     updated_at = $now \
                 WHERE product_id = $product_id AND (quantity - reserved) >= $qty \
                 RETURN AFTER",
            )
            .bind(("product_id", product_id.to_string()))
            .bind(("qty", qty))
            .bind(("movement", movement))
            .bind(("now", now))
            .await
            .map_err(RepoError::from)?
            .take(0)
            .map_err(RepoError::from)?;
        Ok(rows.pop())
    }

    /// 释放预留：守卫 `reserved >= qty`
    pub async fn release(
        &self,
        product_id: &str,
        qty: i64,
        order_id: &str,
        now: i64,
    ) -> RepoResult<Option<InventoryRecord>> {
        let movement = StockMovement {
            movement_type: MovementType::Released,
            delta: -qty,
            reason: "reservation released".into(),
            reference: Some(order_id.to_string()),
            actor: "system".into(),
            at: now,
        };
        let mut rows: Vec<InventoryRecord> = self
            .base
            .db()
            .query(
                "UPDATE inventory SET \
                     reserved -= $qty, \
                     movements += $movement, \
                     updated_at = $now \
                 WHERE product_id = $product_id AND reserved >= $qty \
                 RETURN AFTER",
            )
            .bind(("product_id", product_id.to_string()))
            .bind(("qty", qty))
            .bind(("movement", movement))
            .bind(("now", now))
            .await
            .map_err(RepoError::from)?
            .take(0)
            .map_err(RepoError::from)?;
        Ok(rows.pop())
    }

    /// 回补已出库的数量 (已提交订单取消时)
    pub async fn restock(
        &self,
        product_id: &str,
        qty: i64,
        order_id: &str,
        now: i64,
    ) -> RepoResult<Option<InventoryRecord>> {
        let movement = StockMovement {
            movement_type: MovementType::In,
            delta: qty,
            reason: "cancelled order restock".into(),
            reference: Some(order_id.to_string()),
            actor: "system".into(),
            at: now,
        };
        let mut rows: Vec<InventoryRecord> = self
            .base
            .db()
            .query(
                "UPDATE inventory SET \
                     quantity += $qty, \
                     movements += $movement, \
                     updated_at = $now \
                 WHERE product_id = $product_id \
                 RETURN AFTER",
            )
            .bind(("product_id", product_id.to_string()))
            .bind(("qty", qty))
            .bind(("movement", movement))
            .bind(("now", now))
            .await
            .map_err(RepoError::from)?
            .take(0)
            .map_err(RepoError::from)?;
        Ok(rows.pop())
    }

    /// 收货入库：守卫可选的 max_stock 上限
    pub async fn receive(
        &self,
        product_id: &str,
        qty: i64,
        actor: &str,
        now: i64,
    ) -> RepoResult<Option<InventoryRecord>> {
        let movement = StockMovement {
            movement_type: MovementType::In,
            delta: qty,
            reason: "goods received".into(),
            reference: None,
            actor: actor.to_string(),
            at: now,
        };
        let mut rows: Vec<InventoryRecord> = self
            .base
            .db()
            .query(
                "UPDATE inventory SET \
                     quantity += $qty, \
                     movements += $movement, \
                     updated_at = $now \
                 WHERE product_id = $product_id \
                   AND (max_stock = NONE OR (quantity + $qty) <= max_stock) \
                 RETURN AFTER",
            )
            .bind(("product_id", product_id.to_string()))
            .bind(("qty", qty))
            .bind(("movement", movement))
            .bind(("now", now))
            .await
            .map_err(RepoError::from)?
            .take(0)
            .map_err(RepoError::from)?;
        Ok(rows.pop())
    }

    /// 人工调整：守卫调整后仍覆盖预留且非负
    pub async fn adjust(
        &self,
        product_id: &str,
        delta: i64,
        reason: &str,
        actor: &str,
        now: i64,
    ) -> RepoResult<Option<InventoryRecord>> {
        let movement = StockMovement {
            movement_type: MovementType::Adjustment,
            delta,
            reason: reason.to_string(),
            reference: None,
            actor: actor.to_string(),
            at: now,
        };
        let mut rows: Vec<InventoryRecord> = self
            .base
            .db()
            .query(
                "UPDATE inventory SET \
                     quantity += $delta, \
                     movements += $movement, \
                     updated_at = $now \
                 WHERE product_id = $product_id \
                   AND (quantity + $delta) >= reserved \
                   AND (quantity + $delta) >= 0 \
                 RETURN AFTER",
            )
            .bind(("product_id", product_id.to_string()))
            .bind(("delta", delta))
            .bind(("movement", movement))
            .bind(("now", now))
            .await
            .map_err(RepoError::from)?
            .take(0)
            .map_err(RepoError::from)?;
        Ok(rows.pop())
    }

    /// 低于再订购点的库存记录
    pub async fn find_low_stock(&self) -> RepoResult<Vec<InventoryRecord>> {
        let rows: Vec<InventoryRecord> = self
            .base
            .db()
            .query("SELECT * FROM inventory WHERE quantity <= reorder_point AND reorder_point > 0")
            .await
            .map_err(RepoError::from)?
            .take(0)
            .map_err(RepoError::from)?;
        Ok(rows)
    }
}
