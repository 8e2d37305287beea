//! Shared Domain Models
//!
//! Serde-serializable entities shared by the server crates. Records are
//! keyed by business ids (order_id, product_id, ...) rather than storage
//! record handles; timestamps are UTC millis (i64).

pub mod coupon;
pub mod inventory;
pub mod notification;
pub mod order;
pub mod payment;
pub mod product;

pub use coupon::{Coupon, CouponStatus, CouponUsage, DiscountType};
pub use inventory::{InventoryRecord, MovementType, StockMovement};
pub use notification::{Notification, NotificationKind};
pub use order::{
    Order, OrderLineItem, OrderPaymentState, OrderStatus, PaymentMethod, ShippingAddress,
    StatusStamp, StockState,
};
pub use payment::{Payment, PaymentStatus, Refund};
pub use product::{Product, ProductCreate};
