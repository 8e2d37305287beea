//! Money Arithmetic
//!
//! 金额以 f64 存储，所有运算经过 `rust_decimal`，2 位小数四舍五入
//! (half-up)。网关侧金额为最小货币单位整数。

use rust_decimal::prelude::*;
use rust_decimal::{Decimal, RoundingStrategy};
use shared::error::{AppError, AppResult};
use shared::models::OrderLineItem;

fn dec(value: f64) -> Decimal {
    // from_f64 reconstructs the intended decimal; from_f64_retain would keep
    // binary noise like 10.004999... and break half-up rounding
    Decimal::from_f64(value).unwrap_or_default()
}

/// 2 位小数，四舍五入
pub fn round2(value: f64) -> f64 {
    dec(value)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .unwrap_or(0.0)
}

/// 单行金额：price * quantity
pub fn line_total(price: f64, quantity: i64) -> f64 {
    (dec(price) * Decimal::from(quantity))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .unwrap_or(0.0)
}

/// 行项目小计
pub fn subtotal(items: &[OrderLineItem]) -> f64 {
    let sum = items
        .iter()
        .map(|item| dec(item.price) * Decimal::from(item.quantity))
        .sum::<Decimal>();
    sum.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .unwrap_or(0.0)
}

/// 订单总额：round(subtotal - discount + shipping_fee)，不为负
pub fn order_total(subtotal: f64, discount: f64, shipping_fee: f64) -> f64 {
    let total = dec(subtotal) - dec(discount) + dec(shipping_fee);
    let total = total.max(Decimal::ZERO);
    total
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .unwrap_or(0.0)
}

/// 百分比折扣：order_value * percent / 100，可选封顶
pub fn percent_discount(order_value: f64, percent: f64, cap: Option<f64>) -> f64 {
    let mut discount = dec(order_value) * dec(percent) / Decimal::from(100);
    if let Some(cap) = cap {
        discount = discount.min(dec(cap));
    }
    discount
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .unwrap_or(0.0)
}

/// 折扣钳制到 [0, order_value]
pub fn clamp_discount(discount: f64, order_value: f64) -> f64 {
    round2(discount.clamp(0.0, order_value.max(0.0)))
}

/// 最小货币单位整数 (网关侧金额)
pub fn to_minor_units(amount: f64) -> i64 {
    (dec(amount) * Decimal::from(100))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(0)
}

/// 金额有效性：有限且非负
pub fn validate_amount(value: f64, field: &str) -> AppResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(AppError::validation(format!(
            "{field} must be a non-negative finite number"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(price: f64, quantity: i64) -> OrderLineItem {
        OrderLineItem {
            product_id: "p".into(),
            name: "item".into(),
            price,
            quantity,
            image: None,
        }
    }

    #[test]
    fn test_order_totals() {
        // qty 3 @ 100 + qty 1 @ 50, shipping 30
        let items = vec![item(100.0, 3), item(50.0, 1)];
        let sub = subtotal(&items);
        assert_eq!(sub, 350.0);
        assert_eq!(order_total(sub, 0.0, 30.0), 380.0);
    }

    #[test]
    fn test_total_never_negative() {
        assert_eq!(order_total(50.0, 100.0, 0.0), 0.0);
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(round2(10.005), 10.01);
        assert_eq!(round2(10.004), 10.0);
    }

    #[test]
    fn test_percent_discount_capped() {
        // 10% of 300 = 30, capped at 20
        assert_eq!(percent_discount(300.0, 10.0, Some(20.0)), 20.0);
        assert_eq!(percent_discount(300.0, 10.0, None), 30.0);
    }

    #[test]
    fn test_clamp_discount() {
        assert_eq!(clamp_discount(120.0, 100.0), 100.0);
        assert_eq!(clamp_discount(-5.0, 100.0), 0.0);
    }

    #[test]
    fn test_minor_units() {
        assert_eq!(to_minor_units(380.0), 38000);
        assert_eq!(to_minor_units(19.99), 1999);
        assert_eq!(to_minor_units(0.005), 1);
    }

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount(10.0, "price").is_ok());
        assert!(validate_amount(-1.0, "price").is_err());
        assert!(validate_amount(f64::NAN, "price").is_err());
    }
}
