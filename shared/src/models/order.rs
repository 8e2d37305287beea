//! Order Model

use serde::{Deserialize, Serialize};

/// Order fulfillment status
///
/// The full lifecycle from checkout to delivery. `Cancelled` and `Returned`
/// are terminal. Legal edges are encoded in [`OrderStatus::allowed_targets`];
/// every other edge is rejected.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Pending,
    PaymentPending,
    PaymentFailed,
    Confirmed,
    Processing,
    ReadyToShip,
    Shipping,
    Delivered,
    Cancelled,
    Returned,
}

impl OrderStatus {
    /// Outgoing edges of the transition table
    ///
    /// `Processing -> Shipping` is kept alongside the `ReadyToShip`
    /// intermediate; some fulfillment flows skip the staging step.
    pub const fn allowed_targets(&self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Pending => &[PaymentPending, Confirmed, Cancelled],
            PaymentPending => &[PaymentFailed, Confirmed, Cancelled],
            PaymentFailed => &[Pending, Cancelled],
            Confirmed => &[Processing, Cancelled],
            Processing => &[ReadyToShip, Shipping, Cancelled],
            ReadyToShip => &[Shipping, Cancelled],
            Shipping => &[Delivered, Returned],
            Delivered => &[Returned],
            Cancelled | Returned => &[],
        }
    }

    /// Whether `target` is a legal next status
    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        self.allowed_targets().contains(&target)
    }

    /// Terminal statuses have no outgoing edges
    pub const fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Returned)
    }

    /// Statuses from which the owning customer may cancel
    pub const fn is_customer_cancellable(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Confirmed)
    }

    /// Wire representation (SCREAMING_SNAKE_CASE)
    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::PaymentPending => "PAYMENT_PENDING",
            OrderStatus::PaymentFailed => "PAYMENT_FAILED",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::ReadyToShip => "READY_TO_SHIP",
            OrderStatus::Shipping => "SHIPPING",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Returned => "RETURNED",
        }
    }
}

/// Payment settlement state of the order as a whole
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderPaymentState {
    #[default]
    Pending,
    Paid,
    Failed,
}

/// How the customer pays
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Hosted gateway page (redirect + signed callbacks)
    Online,
    /// Cash on delivery
    Cod,
}

/// Where the order's stock accounting currently sits
///
/// Checkout reserves; entering `CONFIRMED` commits the reservation to an
/// on-hand decrement; cancellation releases or restores depending on which
/// of the two happened first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockState {
    #[default]
    Reserved,
    Committed,
    Released,
}

/// Order line item
///
/// Name/price/image are snapshots taken at order time and never re-read
/// from the live product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLineItem {
    /// Product reference (String ID)
    pub product_id: String,
    pub name: String,
    /// Unit price in currency unit
    pub price: f64,
    pub quantity: i64,
    pub image: Option<String>,
}

/// Shipping address snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub recipient: String,
    pub phone: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

/// One entry in the order's transition history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusStamp {
    pub status: OrderStatus,
    /// Actor user id, or "system" for gateway-driven transitions
    pub actor: String,
    /// UTC millis
    pub at: i64,
}

/// Order entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Business id, also the storage record key
    pub order_id: String,
    pub user_id: String,
    pub items: Vec<OrderLineItem>,
    /// Sum of line totals in currency unit
    pub subtotal: f64,
    /// Coupon discount in currency unit
    pub discount: f64,
    pub shipping_fee: f64,
    /// `round(subtotal - discount + shipping_fee)`
    pub total: f64,
    /// Upper-cased coupon code, if one was applied
    pub coupon_code: Option<String>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub payment_state: OrderPaymentState,
    pub status: OrderStatus,
    pub stock_state: StockState,
    pub status_history: Vec<StatusStamp>,
    pub note: Option<String>,
    /// UTC millis
    pub created_at: i64,
    pub updated_at: i64,
}
