//! Inventory Model
//!
//! Authoritative stock bookkeeping per product. One record per product,
//! created lazily, with an embedded append-only movement log.

use serde::{Deserialize, Serialize};

/// Stock movement type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    /// Goods received / restock
    In,
    /// On-hand decrement (sale commit)
    Out,
    /// Manual correction
    Adjustment,
    /// Hold placed for an accepted order
    Reserved,
    /// Hold released
    Released,
}

/// One entry in the append-only movement log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockMovement {
    pub movement_type: MovementType,
    /// Signed change applied to the affected counter
    pub delta: i64,
    pub reason: String,
    /// Order id / payment id this movement traces back to
    pub reference: Option<String>,
    pub actor: String,
    /// UTC millis
    pub at: i64,
}

/// Inventory record (1:1 with product)
///
/// Invariant: `available = quantity - reserved >= 0` and
/// `reserved <= quantity`, including under concurrent writers. Every
/// mutation goes through a guarded conditional update at the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryRecord {
    /// Product reference, also the storage record key
    pub product_id: String,
    /// On-hand quantity
    pub quantity: i64,
    /// Quantity held for accepted-but-unsettled orders
    pub reserved: i64,
    pub min_stock: i64,
    pub max_stock: Option<i64>,
    pub reorder_point: i64,
    pub movements: Vec<StockMovement>,
    /// UTC millis
    pub created_at: i64,
    pub updated_at: i64,
}

impl InventoryRecord {
    /// Shopper-visible availability
    pub fn available(&self) -> i64 {
        self.quantity - self.reserved
    }

    /// Whether on-hand stock has fallen to the reorder point
    pub fn needs_reorder(&self) -> bool {
        self.quantity <= self.reorder_point
    }
}
