//! Shared types for the Storefront platform
//!
//! Common types used across crates: error codes and the unified
//! [`ApiResponse`](error::ApiResponse) envelope, the domain models
//! (orders, inventory, coupons, payments, notifications), and small
//! utility helpers.

pub mod error;
pub mod models;
pub mod util;

// Re-exports
pub use axum::{Json, body};
pub use http;
pub use serde::{Deserialize, Serialize};

pub use error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};
