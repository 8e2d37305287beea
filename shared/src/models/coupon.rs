//! Coupon Model

use serde::{Deserialize, Serialize};

/// Discount type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountType {
    /// Percentage of the order value, optionally capped
    Percent,
    /// Flat amount in currency unit
    Amount,
}

/// Coupon status
///
/// `Expired` is reached automatically once the coupon is exhausted or past
/// its expiry date; `Inactive` is an admin toggle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CouponStatus {
    #[default]
    Active,
    Inactive,
    Expired,
}

/// One redemption in the per-user usage ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouponUsage {
    pub user_id: String,
    pub order_id: String,
    /// UTC millis
    pub used_at: i64,
}

/// Coupon entity
///
/// Codes are case-insensitive ASCII tokens stored upper-case; the code is
/// also the storage record key, which makes uniqueness structural.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coupon {
    pub code: String,
    pub discount_type: DiscountType,
    /// Percent value (0-100) or flat amount, depending on `discount_type`
    pub value: f64,
    pub min_order_value: f64,
    /// Cap for percent discounts; ignored for flat amounts
    pub max_discount_amount: Option<f64>,
    /// Global usage limit; `None` = unlimited
    pub max_uses: Option<i64>,
    pub used_count: i64,
    pub usage: Vec<CouponUsage>,
    pub usage_limit_per_user: i64,
    /// UTC millis; `None` = never expires
    pub expires_at: Option<i64>,
    pub status: CouponStatus,
    /// Restrict redemption to these users, when set
    pub allowed_users: Option<Vec<String>>,
    /// Restrict redemption to orders containing at least one of these products
    pub allowed_products: Option<Vec<String>>,
    /// UTC millis
    pub created_at: i64,
    pub updated_at: i64,
}

impl Coupon {
    /// Normalize a code for lookup/storage (upper-case ASCII)
    pub fn normalize_code(code: &str) -> String {
        code.trim().to_ascii_uppercase()
    }

    /// How many times `user_id` has redeemed this coupon
    pub fn uses_by(&self, user_id: &str) -> i64 {
        self.usage.iter().filter(|u| u.user_id == user_id).count() as i64
    }

    /// Whether this coupon was already redeemed for `order_id`
    pub fn used_for_order(&self, order_id: &str) -> bool {
        self.usage.iter().any(|u| u.order_id == order_id)
    }

    /// Whether the global usage limit has been reached
    pub fn is_exhausted(&self) -> bool {
        self.max_uses.is_some_and(|max| self.used_count >= max)
    }

    /// Whether the coupon is past its expiry date at `now` (UTC millis)
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|exp| now >= exp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coupon() -> Coupon {
        Coupon {
            code: "WELCOME10".into(),
            discount_type: DiscountType::Percent,
            value: 10.0,
            min_order_value: 0.0,
            max_discount_amount: None,
            max_uses: Some(2),
            used_count: 0,
            usage: vec![],
            usage_limit_per_user: 1,
            expires_at: None,
            status: CouponStatus::Active,
            allowed_users: None,
            allowed_products: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(Coupon::normalize_code("  welcome10 "), "WELCOME10");
        assert_eq!(Coupon::normalize_code("Percent10"), "PERCENT10");
    }

    #[test]
    fn test_usage_ledger_lookups() {
        let mut c = coupon();
        c.usage.push(CouponUsage {
            user_id: "u1".into(),
            order_id: "o1".into(),
            used_at: 1,
        });
        c.usage.push(CouponUsage {
            user_id: "u1".into(),
            order_id: "o2".into(),
            used_at: 2,
        });

        assert_eq!(c.uses_by("u1"), 2);
        assert_eq!(c.uses_by("u2"), 0);
        assert!(c.used_for_order("o1"));
        assert!(!c.used_for_order("o3"));
    }

    #[test]
    fn test_exhaustion() {
        let mut c = coupon();
        assert!(!c.is_exhausted());
        c.used_count = 2;
        assert!(c.is_exhausted());
        c.max_uses = None;
        assert!(!c.is_exhausted());
    }

    #[test]
    fn test_expiry() {
        let mut c = coupon();
        assert!(!c.is_expired_at(1_000));
        c.expires_at = Some(500);
        assert!(c.is_expired_at(1_000));
        assert!(!c.is_expired_at(499));
    }
}
