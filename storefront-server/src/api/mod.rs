//! API 路由模块
//!
//! # 结构
//!
//! - [`health`] - 健康检查
//! - [`products`] - 商品管理接口
//! - [`inventory`] - 库存接口
//! - [`coupons`] - 优惠券接口
//! - [`orders`] - 订单接口
//! - [`payments`] - 支付与网关回调接口
//! - [`notifications`] - 通知收件箱接口

pub mod health;

// Data model APIs
pub mod coupons;
pub mod inventory;
pub mod notifications;
pub mod orders;
pub mod payments;
pub mod products;

// Re-export common types for handlers
pub use shared::error::{ApiResponse, AppError, AppResult};
