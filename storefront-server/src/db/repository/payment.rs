//! Payment Repository
//!
//! payment_id UNIQUE 索引保证幂等。状态流转走 `WHERE status IN $from`
//! 条件更新：并发回调只有一个写入者能把 PENDING 翻成终态。

use super::{BaseRepository, RepoError, RepoResult};
use shared::models::{Payment, PaymentStatus, Refund};
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

/// 回调成功/失败时一并写入的网关字段
#[derive(Debug, Clone, Default)]
pub struct CallbackFields {
    pub gateway_txn_id: Option<String>,
    pub bank_code: Option<String>,
    pub pay_date: Option<String>,
    pub response_code: Option<String>,
}

#[derive(Clone)]
pub struct PaymentRepository {
    base: BaseRepository,
}

impl PaymentRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    pub async fn create(&self, payment: Payment) -> RepoResult<Payment> {
        let payment_id = payment.payment_id.clone();
        let result: Result<Vec<Payment>, surrealdb::Error> = async {
            let created = self
                .base
                .db()
                .query("CREATE payment CONTENT $payment RETURN AFTER")
                .bind(("payment", payment))
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
                    Err(RepoError::Duplicate(format!("Payment {payment_id}")))
                } else {
                    Err(RepoError::Database(msg))
                }
            }
        }
    }

    pub async fn find_by_payment_id(&self, payment_id: &str) -> RepoResult<Option<Payment>> {
        let mut rows: Vec<Payment> = self
            .base
            .db()
            .query("SELECT * FROM payment WHERE payment_id = $payment_id LIMIT 1")
            .bind(("payment_id", payment_id.to_string()))
            .await
            .map_err(RepoError::from)?
            .take(0)
            .map_err(RepoError::from)?;
        Ok(rows.pop())
    }

    /// 按订单查询支付记录 (新在前)
    pub async fn list_by_order(&self, order_id: &str) -> RepoResult<Vec<Payment>> {
        let rows: Vec<Payment> = self
            .base
            .db()
            .query("SELECT * FROM payment WHERE order_id = $order_id ORDER BY created_at DESC")
            .bind(("order_id", order_id.to_string()))
            .await
            .map_err(RepoError::from)?
            .take(0)
            .map_err(RepoError::from)?;
        Ok(rows)
    }

    /// 条件流转：`WHERE status IN $from`，竞争失败返回 `None`
    pub async fn transition(
        &self,
        payment_id: &str,
        from: Vec<PaymentStatus>,
        to: PaymentStatus,
        fields: CallbackFields,
        verified: bool,
        now: i64,
    ) -> RepoResult<Option<Payment>> {
        let mut rows: Vec<Payment> = self
            .base
            .db()
            .query(
                "UPDATE payment SET \
                     status = $to, \
                     gateway_txn_id = $gateway_txn_id ?? gateway_txn_id, \
                     bank_code = $bank_code ?? bank_code, \
                     pay_date = $pay_date ?? pay_date, \
                     response_code = $response_code ?? response_code, \
                     callback_verified = callback_verified OR $verified, \
                     updated_at = $now \
                 WHERE payment_id = $payment_id AND status IN $from \
                 RETURN AFTER",
            )
            .bind(("payment_id", payment_id.to_string()))
            .bind(("from", from))
            .bind(("to", to))
            .bind(("gateway_txn_id", fields.gateway_txn_id))
            .bind(("bank_code", fields.bank_code))
            .bind(("pay_date", fields.pay_date))
            .bind(("response_code", fields.response_code))
            .bind(("verified", verified))
            .bind(("now", now))
            .await
            .map_err(RepoError::from)?
            .take(0)
            .map_err(RepoError::from)?;
        Ok(rows.pop())
    }

    /// 追加退款并流转到 REFUNDED / PARTIALLY_REFUNDED
    pub async fn add_refund(
        &self,
        payment_id: &str,
        refund: Refund,
        to: PaymentStatus,
        now: i64,
    ) -> RepoResult<Option<Payment>> {
        let mut rows: Vec<Payment> = self
            .base
            .db()
            .query(
                "UPDATE payment SET \
                     refunds += $refund, \
                     status = $to, \
                     updated_at = $now \
                 WHERE payment_id = $payment_id \
                   AND status IN ['SUCCESS', 'PARTIALLY_REFUNDED'] \
                 RETURN AFTER",
            )
            .bind(("payment_id", payment_id.to_string()))
            .bind(("refund", refund))
            .bind(("to", to))
            .bind(("now", now))
            .await
            .map_err(RepoError::from)?
            .take(0)
            .map_err(RepoError::from)?;
        Ok(rows.pop())
    }
}
