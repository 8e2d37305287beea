//! Product Model
//!
//! Minimal catalog entry: just enough to snapshot name/price/image onto
//! order line items. Full catalog/search lives elsewhere.

use serde::{Deserialize, Serialize};

/// Product entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Business id, also the storage record key
    pub product_id: String,
    pub name: String,
    /// Unit price in currency unit
    pub price: f64,
    pub image: Option<String>,
    pub is_active: bool,
    /// UTC millis
    pub created_at: i64,
    pub updated_at: i64,
}

/// Create product payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductCreate {
    pub product_id: String,
    pub name: String,
    pub price: f64,
    pub image: Option<String>,
    /// Initial on-hand stock for the lazily created inventory record
    pub initial_stock: Option<i64>,
}
