//! Coupon Repository
//!
//! code UNIQUE 索引保证券码唯一。`mark_used` 是单条条件更新：
//! 守卫同时覆盖状态、有效期、全局/单用户限额和按订单幂等，
//! 并发重复核销只有一个写入者能通过守卫。

use super::{BaseRepository, RepoError, RepoResult};
use shared::models::{Coupon, CouponStatus, CouponUsage};
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

#[derive(Clone)]
pub struct CouponRepository {
    base: BaseRepository,
}

impl CouponRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    pub async fn create(&self, coupon: Coupon) -> RepoResult<Coupon> {
        let code = coupon.code.clone();
        let result: Result<Vec<Coupon>, surrealdb::Error> = async {
            let created = self
                .base
                .db()
                .query("CREATE coupon CONTENT $coupon RETURN AFTER")
                .bind(("coupon", coupon))
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
                    Err(RepoError::Duplicate(format!("Coupon {code}")))
                } else {
                    Err(RepoError::Database(msg))
                }
            }
        }
    }

    pub async fn find_by_code(&self, code: &str) -> RepoResult<Option<Coupon>> {
        let mut rows: Vec<Coupon> = self
            .base
            .db()
            .query("SELECT * FROM coupon WHERE code = $code LIMIT 1")
            .bind(("code", code.to_string()))
            .await
            .map_err(RepoError::from)?
            .take(0)
            .map_err(RepoError::from)?;
        Ok(rows.pop())
    }

    pub async fn find_all(&self) -> RepoResult<Vec<Coupon>> {
        let rows: Vec<Coupon> = self
            .base
            .db()
            .query("SELECT * FROM coupon ORDER BY created_at DESC")
            .await
            .map_err(RepoError::from)?
            .take(0)
            .map_err(RepoError::from)?;
        Ok(rows)
    }

    pub async fn set_status(
        &self,
        code: &str,
        status: CouponStatus,
        now: i64,
    ) -> RepoResult<Option<Coupon>> {
        let mut rows: Vec<Coupon> = self
            .base
            .db()
            .query(
                "UPDATE coupon SET status = $status, updated_at = $now \
                 WHERE code = $code RETURN AFTER",
            )
            .bind(("code", code.to_string()))
            .bind(("status", status))
            .bind(("now", now))
            .await
            .map_err(RepoError::from)?
            .take(0)
            .map_err(RepoError::from)?;
        Ok(rows.pop())
    }

    /// 核销：全部校验都在守卫里，返回 `None` 表示守卫不满足
    ///
    /// 守卫覆盖：ACTIVE 状态、未过期、全局限额、单用户限额、
    /// 以及按 order_id 的幂等 (同一订单重复核销更新零行)。
    pub async fn mark_used(
        &self,
        code: &str,
        user_id: &str,
        order_id: &str,
        now: i64,
    ) -> RepoResult<Option<Coupon>> {
        let entry = CouponUsage {
            user_id: user_id.to_string(),
            order_id: order_id.to_string(),
            used_at: now,
        };
        let mut rows: Vec<Coupon> = self
            .base
            .db()
            .query(
                "UPDATE coupon SET \
                     used_count += 1, \
                     usage += $entry, \
                     updated_at = $now \
                 WHERE code = $code \
                   AND status = 'ACTIVE' \
                   AND (expires_at = NONE OR expires_at > $now) \
                   AND (max_uses = NONE OR used_count < max_uses) \
                   AND array::len(usage[WHERE order_id = $order_id]) = 0 \
                   AND array::len(usage[WHERE user_id = $user_id]) < usage_limit_per_user \
                 RETURN AFTER",
            )
            .bind(("code", code.to_string()))
            .bind(("user_id", user_id.to_string()))
            .bind(("order_id", order_id.to_string()))
            .bind(("entry", entry))
            .bind(("now", now))
            .await
            .map_err(RepoError::from)?
            .take(0)
            .map_err(RepoError::from)?;
        Ok(rows.pop())
    }

    /// 券用尽后自动置为 EXPIRED (尽力而为，非关键路径)
    pub async fn expire_if_exhausted(&self, code: &str, now: i64) -> RepoResult<()> {
        self.base
            .db()
            .query(
                "UPDATE coupon SET status = 'EXPIRED', updated_at = $now \
                 WHERE code = $code AND max_uses != NONE AND used_count >= max_uses",
            )
            .bind(("code", code.to_string()))
            .bind(("now", now))
            .await
            .map_err(RepoError::from)?;
        Ok(())
    }
}
