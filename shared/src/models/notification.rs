//! Notification Model
//!
//! Stored event rows handed to the external delivery collaborator.
//! Delivery is best-effort; creation is deduplicated per
//! `(recipient, order, kind)` within a short window.

use serde::{Deserialize, Serialize};

/// Notification kind
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    OrderCreated,
    OrderConfirmed,
    OrderCancelled,
    OrderStatusChanged,
    PaymentReceived,
    PaymentFailed,
}

impl NotificationKind {
    /// Wire representation (SCREAMING_SNAKE_CASE)
    pub const fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::OrderCreated => "ORDER_CREATED",
            NotificationKind::OrderConfirmed => "ORDER_CONFIRMED",
            NotificationKind::OrderCancelled => "ORDER_CANCELLED",
            NotificationKind::OrderStatusChanged => "ORDER_STATUS_CHANGED",
            NotificationKind::PaymentReceived => "PAYMENT_RECEIVED",
            NotificationKind::PaymentFailed => "PAYMENT_FAILED",
        }
    }
}

/// Notification entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Business id, also the storage record key
    pub notification_id: String,
    /// `(recipient, kind, order, window bucket)` key; unique-indexed so
    /// concurrent dispatches of the same event collapse to one row
    pub dedup_key: String,
    /// Recipient user id, or the literal "admin" inbox
    pub recipient: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub order_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
    /// UTC millis
    pub created_at: i64,
}
