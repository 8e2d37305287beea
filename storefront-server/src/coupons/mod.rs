//! 优惠券模块

mod engine;

pub use engine::{CouponCreate, CouponEngine};
