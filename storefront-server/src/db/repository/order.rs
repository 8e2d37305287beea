//! Order Repository
//!
//! 每个订单的状态流转走 `WHERE status = $from` 条件更新，
//! 同一订单的并发流转天然线性化：输掉竞争的一方更新零行。
//! 确认/取消/清除需要库存联动时，状态翻转和库存变更在同一个
//! `BEGIN TRANSACTION ... COMMIT` 块里，要么全部生效要么全部回滚。

use super::{BaseRepository, RepoError, RepoResult};
use shared::models::{Order, OrderPaymentState, OrderStatus, StatusStamp, StockState};
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

/// 取消时的库存补偿方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compensation {
    /// 预留未提交：释放预留 (reserved -= qty)
    Release,
    /// 预留已提交出库：回补在手量 (quantity += qty)
    Restock,
    /// 无补偿 (预留已释放过)
    None,
}

/// 流转时一并更新的可选字段
#[derive(Debug, Clone, Default)]
pub struct TransitionFields {
    pub payment_state: Option<OrderPaymentState>,
    pub stock_state: Option<StockState>,
}

#[derive(Clone)]
pub struct OrderRepository {
    base: BaseRepository,
}

impl OrderRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    pub async fn create(&self, order: Order) -> RepoResult<Order> {
        let mut rows: Vec<Order> = self
            .base
            .db()
            .query("CREATE orders CONTENT $order RETURN AFTER")
            .bind(("order", order))
            .await
            .map_err(RepoError::from)?
            .check()
            .map_err(RepoError::from)?
            .take(0)
            .map_err(RepoError::from)?;
        rows.pop()
            .ok_or_else(|| RepoError::Database("Create returned no row".into()))
    }

    pub async fn find_by_order_id(&self, order_id: &str) -> RepoResult<Option<Order>> {
        let mut rows: Vec<Order> = self
            .base
            .db()
            .query("SELECT * FROM orders WHERE order_id = $order_id LIMIT 1")
            .bind(("order_id", order_id.to_string()))
            .await
            .map_err(RepoError::from)?
            .take(0)
            .map_err(RepoError::from)?;
        Ok(rows.pop())
    }

    /// 列表查询：可选用户/状态过滤 + 分页
    pub async fn list(
        &self,
        user_id: Option<&str>,
        status: Option<OrderStatus>,
        limit: i64,
        offset: i64,
    ) -> RepoResult<Vec<Order>> {
        let mut sql = String::from("SELECT * FROM orders");
        let mut clauses: Vec<&str> = Vec::new();
        if user_id.is_some() {
            clauses.push("user_id = $user_id");
        }
        if status.is_some() {
            clauses.push("status = $status");
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY created_at DESC LIMIT $limit START $offset");

        let mut query = self.base.db().query(sql);
        if let Some(uid) = user_id {
            query = query.bind(("user_id", uid.to_string()));
        }
        if let Some(st) = status {
            query = query.bind(("status", st));
        }
        let rows: Vec<Order> = query
            .bind(("limit", limit))
            .bind(("offset", offset))
            .await
            .map_err(RepoError::from)?
            .take(0)
            .map_err(RepoError::from)?;
        Ok(rows)
    }

    /// 条件流转：`WHERE status = $from`，竞争失败返回 `None`
    pub async fn transition(
        &self,
        order_id: &str,
        from: OrderStatus,
        to: OrderStatus,
        stamp: StatusStamp,
        fields: TransitionFields,
        now: i64,
    ) -> RepoResult<Option<Order>> {
        let mut sets = String::from(
            "status = $to, status_history += $stamp, updated_at = $now",
        );
        if fields.payment_state.is_some() {
            sets.push_str(", payment_state = $payment_state");
        }
        if fields.stock_state.is_some() {
            sets.push_str(", stock_state = $stock_state");
        }
        let sql = format!(
            "UPDATE orders SET {sets} WHERE order_id = $order_id AND status = $from RETURN AFTER"
        );

        let mut query = self
            .base
            .db()
            .query(sql)
            .bind(("order_id", order_id.to_string()))
            .bind(("from", from))
            .bind(("to", to))
            .bind(("stamp", stamp))
            .bind(("now", now));
        if let Some(ps) = fields.payment_state {
            query = query.bind(("payment_state", ps));
        }
        if let Some(ss) = fields.stock_state {
            query = query.bind(("stock_state", ss));
        }

        let mut rows: Vec<Order> = query
            .await
            .map_err(RepoError::from)?
            .take(0)
            .map_err(RepoError::from)?;
        Ok(rows.pop())
    }

    /// 确认 + 预留提交，单事务
    ///
    /// 订单守卫不满足时 `THROW "transition_conflict"`；任一行的预留
    /// 守卫不满足时 `THROW "stock_conflict"`。两者都整体回滚，订单
    /// 停留在原状态，出库永不落单边账。成功后调用方重新读取订单。
    pub async fn confirm_with_commit(
        &self,
        order_id: &str,
        from: OrderStatus,
        stamp: StatusStamp,
        items: &[(String, i64)],
        payment_state: Option<OrderPaymentState>,
        now: i64,
    ) -> RepoResult<()> {
        let mut sets = String::from(
            "status = $to, \
             stock_state = $stock_state, \
             status_history += $stamp, \
             updated_at = $now",
        );
        if payment_state.is_some() {
            sets.push_str(", payment_state = $payment_state");
        }
        let mut sql = format!(
            "BEGIN TRANSACTION; \
             LET $updated = (UPDATE orders SET {sets} \
              WHERE order_id = $order_id AND status = $from RETURN AFTER); \
             IF array::len($updated) = 0 {{ THROW \"transition_conflict\" }}; "
        );
        for (i, _) in items.iter().enumerate() {
            sql.push_str(&format!(
                "LET $inv{i} = (UPDATE inventory SET \
                     quantity -= $qty{i}, \
                     reserved -= $qty{i}, \
                     movements += $mov{i}, \
                     updated_at = $now \
                 WHERE product_id = $pid{i} AND reserved >= $qty{i} AND quantity >= $qty{i} \
                 RETURN AFTER); \
                 IF array::len($inv{i}) = 0 {{ THROW \"stock_conflict\" }}; "
            ));
        }
        sql.push_str("COMMIT TRANSACTION;");

        let mut query = self
            .base
            .db()
            .query(sql)
            .bind(("order_id", order_id.to_string()))
            .bind(("from", from))
            .bind(("to", OrderStatus::Confirmed))
            .bind(("stock_state", StockState::Committed))
            .bind(("stamp", stamp))
            .bind(("now", now));
        if let Some(ps) = payment_state {
            query = query.bind(("payment_state", ps));
        }
        for (i, (product_id, qty)) in items.iter().enumerate() {
            let movement = shared::models::StockMovement {
                movement_type: shared::models::MovementType::Out,
                delta: -qty,
                reason: "reservation committed".into(),
                reference: Some(order_id.to_string()),
                actor: "system".into(),
                at: now,
            };
            query = query
                .bind((format!("pid{i}"), product_id.clone()))
                .bind((format!("qty{i}"), *qty))
                .bind((format!("mov{i}"), movement));
        }

        let response = query.await.map_err(RepoError::from)?;
        if let Err(e) = response.check() {
            let msg = e.to_string();
            if msg.contains("transition_conflict") || msg.contains("stock_conflict") {
                return Err(RepoError::Validation(msg));
            }
            return Err(RepoError::Database(msg));
        }
        Ok(())
    }

    /// 取消 + 库存补偿，单事务
    ///
    /// 订单守卫不满足时 `THROW "transition_conflict"` 回滚整个事务；
    /// 释放守卫不满足时 `THROW "stock_conflict"` 同理。
    /// 成功后调用方重新读取订单。
    pub async fn cancel_with_compensation(
        &self,
        order_id: &str,
        from: OrderStatus,
        stamp: StatusStamp,
        items: &[(String, i64)],
        compensation: Compensation,
        now: i64,
    ) -> RepoResult<()> {
        let mut sql = String::from(
            "BEGIN TRANSACTION; \
             LET $updated = (UPDATE orders SET \
                 status = $to, \
                 stock_state = $stock_state, \
                 status_history += $stamp, \
                 updated_at = $now \
              WHERE order_id = $order_id AND status = $from RETURN AFTER); \
             IF array::len($updated) = 0 { THROW \"transition_conflict\" }; ",
        );

        for (i, _) in items.iter().enumerate() {
            match compensation {
                Compensation::Release => {
                    sql.push_str(&format!(
                        "LET $inv{i} = (UPDATE inventory SET \
                             reserved -= $qty{i}, \
                             movements += $mov{i}, \
                             updated_at = $now \
                         WHERE product_id = $pid{i} AND reserved >= $qty{i} RETURN AFTER); \
                         IF array::len($inv{i}) = 0 {{ THROW \"stock_conflict\" }}; "
                    ));
                }
                Compensation::Restock => {
                    sql.push_str(&format!(
                        "UPDATE inventory SET \
                             quantity += $qty{i}, \
                             movements += $mov{i}, \
                             updated_at = $now \
                         WHERE product_id = $pid{i}; "
                    ));
                }
                Compensation::None => {}
            }
        }
        sql.push_str("COMMIT TRANSACTION;");

        let stock_state = match compensation {
            Compensation::Release | Compensation::None => StockState::Released,
            Compensation::Restock => StockState::Released,
        };

        let mut query = self
            .base
            .db()
            .query(sql)
            .bind(("order_id", order_id.to_string()))
            .bind(("from", from))
            .bind(("to", OrderStatus::Cancelled))
            .bind(("stock_state", stock_state))
            .bind(("stamp", stamp))
            .bind(("now", now));

        if compensation != Compensation::None {
            for (i, (product_id, qty)) in items.iter().enumerate() {
                let movement = match compensation {
                    Compensation::Release => shared::models::StockMovement {
                        movement_type: shared::models::MovementType::Released,
                        delta: -qty,
                        reason: "order cancelled".into(),
                        reference: Some(order_id.to_string()),
                        actor: "system".into(),
                        at: now,
                    },
                    _ => shared::models::StockMovement {
                        movement_type: shared::models::MovementType::In,
                        delta: *qty,
                        reason: "cancelled order restock".into(),
                        reference: Some(order_id.to_string()),
                        actor: "system".into(),
                        at: now,
                    },
                };
                query = query
                    .bind((format!("pid{i}"), product_id.clone()))
                    .bind((format!("qty{i}"), *qty))
                    .bind((format!("mov{i}"), movement));
            }
        }

        let response = query.await.map_err(RepoError::from)?;
        if let Err(e) = response.check() {
            let msg = e.to_string();
            if msg.contains("transition_conflict") || msg.contains("stock_conflict") {
                return Err(RepoError::Validation(msg));
            }
            return Err(RepoError::Database(msg));
        }
        Ok(())
    }

    /// 清除订单 + 释放存活预留，单事务 (管理端)
    pub async fn purge_with_release(
        &self,
        order_id: &str,
        allowed_from: Vec<OrderStatus>,
        items_to_release: &[(String, i64)],
        now: i64,
    ) -> RepoResult<()> {
        let mut sql = String::from(
            "BEGIN TRANSACTION; \
             LET $deleted = (DELETE orders \
              WHERE order_id = $order_id AND status IN $allowed RETURN BEFORE); \
             IF array::len($deleted) = 0 { THROW \"purge_conflict\" }; ",
        );
        for (i, _) in items_to_release.iter().enumerate() {
            sql.push_str(&format!(
                "UPDATE inventory SET \
                     reserved -= $qty{i}, \
                     movements += $mov{i}, \
                     updated_at = $now \
                 WHERE product_id = $pid{i} AND reserved >= $qty{i}; "
            ));
        }
        sql.push_str("COMMIT TRANSACTION;");

        let mut query = self
            .base
            .db()
            .query(sql)
            .bind(("order_id", order_id.to_string()))
            .bind(("allowed", allowed_from))
            .bind(("now", now));
        for (i, (product_id, qty)) in items_to_release.iter().enumerate() {
            let movement = shared::models::StockMovement {
                movement_type: shared::models::MovementType::Released,
                delta: -qty,
                reason: "order purged".into(),
                reference: Some(order_id.to_string()),
                actor: "admin".into(),
                at: now,
            };
            query = query
                .bind((format!("pid{i}"), product_id.clone()))
                .bind((format!("qty{i}"), *qty))
                .bind((format!("mov{i}"), movement));
        }

        let response = query.await.map_err(RepoError::from)?;
        if let Err(e) = response.check() {
            let msg = e.to_string();
            if msg.contains("purge_conflict") {
                return Err(RepoError::Validation(msg));
            }
            return Err(RepoError::Database(msg));
        }
        Ok(())
    }

    /// 更新订单支付状态 (回调路径，不触碰主状态)
    pub async fn set_payment_state(
        &self,
        order_id: &str,
        payment_state: OrderPaymentState,
        now: i64,
    ) -> RepoResult<Option<Order>> {
        let mut rows: Vec<Order> = self
            .base
            .db()
            .query(
                "UPDATE orders SET payment_state = $payment_state, updated_at = $now \
                 WHERE order_id = $order_id RETURN AFTER",
            )
            .bind(("order_id", order_id.to_string()))
            .bind(("payment_state", payment_state))
            .bind(("now", now))
            .await
            .map_err(RepoError::from)?
            .take(0)
            .map_err(RepoError::from)?;
        Ok(rows.pop())
    }
}
