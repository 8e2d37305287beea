//! Coupon Engine
//!
//! 校验是纯函数，短路顺序固定；核销是一条带守卫的条件更新，
//! 按 order_id 幂等。

use serde::Deserialize;
use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::{Coupon, CouponStatus, DiscountType};
use shared::util::now_millis;
use surrealdb::Surreal;
use surrealdb::engine::local::Db;
use validator::Validate;

use crate::db::repository::{CouponRepository, RepoError};
use crate::orders::money;

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

/// 创建优惠券请求 (管理端)
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CouponCreate {
    #[validate(length(min = 1, max = 32))]
    pub code: String,
    pub discount_type: DiscountType,
    #[validate(range(min = 0.0))]
    pub value: f64,
    #[validate(range(min = 0.0))]
    pub min_order_value: f64,
    pub max_discount_amount: Option<f64>,
    pub max_uses: Option<i64>,
    #[validate(range(min = 1))]
    pub usage_limit_per_user: i64,
    pub expires_at: Option<i64>,
    pub allowed_users: Option<Vec<String>>,
    pub allowed_products: Option<Vec<String>>,
}

#[derive(Clone)]
pub struct CouponEngine {
    repo: CouponRepository,
}

impl CouponEngine {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            repo: CouponRepository::new(db),
        }
    }

    pub async fn get(&self, code: &str) -> AppResult<Coupon> {
        let code = Coupon::normalize_code(code);
        self.repo
            .find_by_code(&code)
            .await
            .map_err(|e| AppError::database(e.to_string()))?
            .ok_or_else(|| {
                AppError::with_message(ErrorCode::CouponNotFound, format!("Coupon {code} not found"))
            })
    }

    pub async fn list(&self) -> AppResult<Vec<Coupon>> {
        self.repo
            .find_all()
            .await
            .map_err(|e| AppError::database(e.to_string()))
    }

    /// 校验，短路顺序：状态 → 有效期 → 全局限额 → 用户白名单 →
    /// 单用户限额 → 商品白名单 → 最低订单金额。
    /// 第一个不满足的检查决定返回的错误。
    pub fn validate(
        &self,
        coupon: &Coupon,
        user_id: &str,
        order_value: f64,
        product_ids: &[String],
        now: i64,
    ) -> AppResult<()> {
        match coupon.status {
            CouponStatus::Active => {}
            CouponStatus::Inactive => return Err(AppError::new(ErrorCode::CouponInactive)),
            CouponStatus::Expired => return Err(AppError::new(ErrorCode::CouponExpired)),
        }
        if coupon.is_expired_at(now) {
            return Err(AppError::new(ErrorCode::CouponExpired));
        }
        if coupon.is_exhausted() {
            return Err(AppError::new(ErrorCode::CouponExhausted));
        }
        if let Some(allowed) = &coupon.allowed_users
            && !allowed.iter().any(|u| u == user_id)
        {
            return Err(AppError::new(ErrorCode::CouponUserNotEligible));
        }
        if coupon.uses_by(user_id) >= coupon.usage_limit_per_user {
            return Err(AppError::new(ErrorCode::CouponUsageLimitReached));
        }
        if let Some(allowed) = &coupon.allowed_products
            && !product_ids.iter().any(|p| allowed.contains(p))
        {
            return Err(AppError::new(ErrorCode::CouponProductNotEligible));
        }
        if order_value < coupon.min_order_value {
            return Err(AppError::with_message(
                ErrorCode::CouponMinOrderNotMet,
                format!(
                    "Order value {order_value} below minimum {}",
                    coupon.min_order_value
                ),
            ));
        }
        Ok(())
    }

    /// 折扣金额：百分比可封顶，结果钳制到 [0, order_value]
    pub fn calculate_discount(&self, coupon: &Coupon, order_value: f64) -> f64 {
        let raw = match coupon.discount_type {
            DiscountType::Percent => {
                money::percent_discount(order_value, coupon.value, coupon.max_discount_amount)
            }
            DiscountType::Amount => coupon.value,
        };
        money::clamp_discount(raw, order_value)
    }

    /// 核销：按 order_id 幂等
    ///
    /// 守卫更新零行时重新读取判因：同订单已核销则静默成功，
    /// 否则用订单的实际金额和商品重新校验还原失败原因。
    /// 用尽后自动置 EXPIRED。
    pub async fn mark_used(
        &self,
        code: &str,
        user_id: &str,
        order_id: &str,
        order_value: f64,
        product_ids: &[String],
    ) -> AppResult<Coupon> {
        let code = Coupon::normalize_code(code);
        let now = now_millis();

        let mut attempt = 0;
        let updated = loop {
            match self.repo.mark_used(&code, user_id, order_id, now_millis()).await {
                Ok(result) => break result,
                Err(e) if is_transient(&e) && attempt < MAX_RETRIES => {
                    attempt += 1;
                    tracing::debug!(code = %code, attempt, "Transient coupon conflict, retrying");
                }
                Err(e) => return Err(AppError::database(e.to_string())),
            }
        };

        match updated {
            Some(coupon) => {
                if coupon.is_exhausted() {
                    if let Err(e) = self.repo.expire_if_exhausted(&code, now).await {
                        tracing::warn!(code = %code, error = %e, "Failed to auto-expire coupon");
                    }
                }
                Ok(coupon)
            }
            None => {
                let coupon = self.get(&code).await?;
                if coupon.used_for_order(order_id) {
                    // Retried checkout: usage already recorded for this order
                    return Ok(coupon);
                }
                self.validate(&coupon, user_id, order_value, product_ids, now)?;
                // Validation passes but the guard refused: lost a concurrent race
                Err(AppError::new(ErrorCode::CouponExhausted))
            }
        }
    }

    // ====== 管理端操作 ======

    pub async fn create(&self, req: CouponCreate) -> AppResult<Coupon> {
        req.validate()
            .map_err(|e| AppError::validation(e.to_string()))?;
        money::validate_amount(req.value, "value")?;
        money::validate_amount(req.min_order_value, "min_order_value")?;
        if let Some(cap) = req.max_discount_amount {
            money::validate_amount(cap, "max_discount_amount")?;
        }
        if req.discount_type == DiscountType::Percent && req.value > 100.0 {
            return Err(AppError::validation("Percent value must not exceed 100"));
        }

        let now = now_millis();
        let coupon = Coupon {
            code: Coupon::normalize_code(&req.code),
            discount_type: req.discount_type,
            value: req.value,
            min_order_value: req.min_order_value,
            max_discount_amount: req.max_discount_amount,
            max_uses: req.max_uses,
            used_count: 0,
            usage: vec![],
            usage_limit_per_user: req.usage_limit_per_user,
            expires_at: req.expires_at,
            status: CouponStatus::Active,
            allowed_users: req.allowed_users,
            allowed_products: req.allowed_products,
            created_at: now,
            updated_at: now,
        };

        match self.repo.create(coupon).await {
            Ok(created) => Ok(created),
            Err(RepoError::Duplicate(_)) => Err(AppError::new(ErrorCode::CouponCodeExists)),
            Err(e) => Err(AppError::database(e.to_string())),
        }
    }

    pub async fn deactivate(&self, code: &str) -> AppResult<Coupon> {
        let coupon = self.get(code).await?;
        if coupon.status == CouponStatus::Expired {
            return Err(AppError::new(ErrorCode::CouponExpired));
        }
        self.set_status(&coupon.code, CouponStatus::Inactive).await
    }

    /// 重新启用：已过期/已用尽的券不可复活
    pub async fn reactivate(&self, code: &str) -> AppResult<Coupon> {
        let coupon = self.get(code).await?;
        let now = now_millis();
        if coupon.status == CouponStatus::Expired
            || coupon.is_expired_at(now)
            || coupon.is_exhausted()
        {
            return Err(AppError::new(ErrorCode::CouponExpired));
        }
        self.set_status(&coupon.code, CouponStatus::Active).await
    }

    async fn set_status(&self, code: &str, status: CouponStatus) -> AppResult<Coupon> {
        self.repo
            .set_status(code, status, now_millis())
            .await
            .map_err(|e| AppError::database(e.to_string()))?
            .ok_or_else(|| AppError::new(ErrorCode::CouponNotFound))
    }
}
