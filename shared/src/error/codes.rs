//! Unified error codes for the Storefront platform
//!
//! This module defines all error codes used across the server and clients.
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 2xxx: Permission errors
//! - 4xxx: Order errors
//! - 5xxx: Payment errors
//! - 6xxx: Catalog errors (products, inventory, coupons)
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility (Rust, TypeScript, etc.)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,
    /// Invalid format
    InvalidFormat = 6,
    /// Required field missing
    RequiredField = 7,
    /// Value out of range
    ValueOutOfRange = 8,

    // ==================== 1xxx: Auth ====================
    /// Caller identity missing (upstream auth layer did not resolve a user)
    NotAuthenticated = 1001,

    // ==================== 2xxx: Permission ====================
    /// Permission denied
    PermissionDenied = 2001,
    /// Admin role required
    AdminRequired = 2002,

    // ==================== 4xxx: Order ====================
    /// Order not found
    OrderNotFound = 4001,
    /// Requested status change is not an edge of the transition table
    InvalidTransition = 4002,
    /// Customer may only cancel from pending/confirmed
    OrderNotCancellable = 4003,
    /// Order has no line items
    OrderEmpty = 4004,
    /// Only cancelled or stale pending orders may be purged
    OrderNotPurgeable = 4005,
    /// A concurrent transition won the race from the same source status
    TransitionConflict = 4006,

    // ==================== 5xxx: Payment ====================
    /// Payment processing failed
    PaymentFailed = 5001,
    /// Payment not found
    PaymentNotFound = 5002,
    /// Gateway callback signature did not match
    SignatureMismatch = 5003,
    /// Callback already applied; replay is a no-op
    AlreadyProcessed = 5004,
    /// Invalid payment method
    PaymentInvalidMethod = 5005,
    /// Payment is not in a state that allows this operation
    PaymentStateInvalid = 5006,
    /// Refund amount exceeds the remaining refundable amount
    RefundExceedsAmount = 5007,

    // ==================== 6xxx: Catalog ====================
    /// Product not found
    ProductNotFound = 6001,
    /// Product is not available for ordering
    ProductInactive = 6002,

    // ==================== 61xx: Inventory ====================
    /// Available stock is less than the requested quantity
    InsufficientStock = 6101,
    /// No inventory record for the product
    InventoryNotFound = 6102,

    // ==================== 65xx: Coupon ====================
    /// Coupon not found
    CouponNotFound = 6501,
    /// Coupon is inactive
    CouponInactive = 6502,
    /// Coupon has expired
    CouponExpired = 6503,
    /// Coupon global usage limit reached
    CouponExhausted = 6504,
    /// User is not in the coupon's eligible set
    CouponUserNotEligible = 6505,
    /// User has reached the per-user usage limit
    CouponUsageLimitReached = 6506,
    /// No ordered product is eligible for the coupon
    CouponProductNotEligible = 6507,
    /// Order value is below the coupon's minimum
    CouponMinOrderNotMet = 6508,
    /// Coupon code already exists
    CouponCodeExists = 6509,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// Network error
    NetworkError = 9003,
    /// Operation timeout
    TimeoutError = 9004,
    /// Configuration error (e.g. missing gateway merchant credentials)
    ConfigurationError = 9005,
    /// System busy (transient write conflict, retry later)
    SystemBusy = 9404,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::InvalidFormat => "Invalid format",
            ErrorCode::RequiredField => "Required field is missing",
            ErrorCode::ValueOutOfRange => "Value is out of range",

            // Auth
            ErrorCode::NotAuthenticated => "Caller identity is missing",

            // Permission
            ErrorCode::PermissionDenied => "Permission denied",
            ErrorCode::AdminRequired => "Administrator role is required",

            // Order
            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::InvalidTransition => "Invalid order status transition",
            ErrorCode::OrderNotCancellable => "Order can no longer be cancelled by the customer",
            ErrorCode::OrderEmpty => "Order has no line items",
            ErrorCode::OrderNotPurgeable => "Only cancelled or stale pending orders can be purged",
            ErrorCode::TransitionConflict => "Order was modified concurrently, transition lost",

            // Payment
            ErrorCode::PaymentFailed => "Payment processing failed",
            ErrorCode::PaymentNotFound => "Payment not found",
            ErrorCode::SignatureMismatch => "Gateway callback signature mismatch",
            ErrorCode::AlreadyProcessed => "Callback already processed",
            ErrorCode::PaymentInvalidMethod => "Invalid payment method",
            ErrorCode::PaymentStateInvalid => "Payment state does not allow this operation",
            ErrorCode::RefundExceedsAmount => "Refund amount exceeds refundable amount",

            // Catalog
            ErrorCode::ProductNotFound => "Product not found",
            ErrorCode::ProductInactive => "Product is not available",

            // Inventory
            ErrorCode::InsufficientStock => "Insufficient stock",
            ErrorCode::InventoryNotFound => "No inventory record for product",

            // Coupon
            ErrorCode::CouponNotFound => "Coupon not found",
            ErrorCode::CouponInactive => "Coupon is inactive",
            ErrorCode::CouponExpired => "Coupon has expired",
            ErrorCode::CouponExhausted => "Coupon usage limit reached",
            ErrorCode::CouponUserNotEligible => "Coupon is not available for this user",
            ErrorCode::CouponUsageLimitReached => "Per-user coupon usage limit reached",
            ErrorCode::CouponProductNotEligible => "Coupon does not apply to the ordered products",
            ErrorCode::CouponMinOrderNotMet => "Order value is below the coupon minimum",
            ErrorCode::CouponCodeExists => "Coupon code already exists",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::NetworkError => "Network error",
            ErrorCode::TimeoutError => "Operation timed out",
            ErrorCode::ConfigurationError => "Configuration error",
            ErrorCode::SystemBusy => "System busy, please retry later",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            4 => Ok(ErrorCode::AlreadyExists),
            5 => Ok(ErrorCode::InvalidRequest),
            6 => Ok(ErrorCode::InvalidFormat),
            7 => Ok(ErrorCode::RequiredField),
            8 => Ok(ErrorCode::ValueOutOfRange),

            // Auth
            1001 => Ok(ErrorCode::NotAuthenticated),

            // Permission
            2001 => Ok(ErrorCode::PermissionDenied),
            2002 => Ok(ErrorCode::AdminRequired),

            // Order
            4001 => Ok(ErrorCode::OrderNotFound),
            4002 => Ok(ErrorCode::InvalidTransition),
            4003 => Ok(ErrorCode::OrderNotCancellable),
            4004 => Ok(ErrorCode::OrderEmpty),
            4005 => Ok(ErrorCode::OrderNotPurgeable),
            4006 => Ok(ErrorCode::TransitionConflict),

            // Payment
            5001 => Ok(ErrorCode::PaymentFailed),
            5002 => Ok(ErrorCode::PaymentNotFound),
            5003 => Ok(ErrorCode::SignatureMismatch),
            5004 => Ok(ErrorCode::AlreadyProcessed),
            5005 => Ok(ErrorCode::PaymentInvalidMethod),
            5006 => Ok(ErrorCode::PaymentStateInvalid),
            5007 => Ok(ErrorCode::RefundExceedsAmount),

            // Catalog
            6001 => Ok(ErrorCode::ProductNotFound),
            6002 => Ok(ErrorCode::ProductInactive),

            // Inventory
            6101 => Ok(ErrorCode::InsufficientStock),
            6102 => Ok(ErrorCode::InventoryNotFound),

            // Coupon
            6501 => Ok(ErrorCode::CouponNotFound),
            6502 => Ok(ErrorCode::CouponInactive),
            6503 => Ok(ErrorCode::CouponExpired),
            6504 => Ok(ErrorCode::CouponExhausted),
            6505 => Ok(ErrorCode::CouponUserNotEligible),
            6506 => Ok(ErrorCode::CouponUsageLimitReached),
            6507 => Ok(ErrorCode::CouponProductNotEligible),
            6508 => Ok(ErrorCode::CouponMinOrderNotMet),
            6509 => Ok(ErrorCode::CouponCodeExists),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),
            9003 => Ok(ErrorCode::NetworkError),
            9004 => Ok(ErrorCode::TimeoutError),
            9005 => Ok(ErrorCode::ConfigurationError),
            9404 => Ok(ErrorCode::SystemBusy),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_values() {
        // General
        assert_eq!(ErrorCode::Success.code(), 0);
        assert_eq!(ErrorCode::ValidationFailed.code(), 2);
        assert_eq!(ErrorCode::NotFound.code(), 3);
        assert_eq!(ErrorCode::AlreadyExists.code(), 4);

        // Order
        assert_eq!(ErrorCode::OrderNotFound.code(), 4001);
        assert_eq!(ErrorCode::InvalidTransition.code(), 4002);
        assert_eq!(ErrorCode::TransitionConflict.code(), 4006);

        // Payment
        assert_eq!(ErrorCode::SignatureMismatch.code(), 5003);
        assert_eq!(ErrorCode::AlreadyProcessed.code(), 5004);

        // Inventory / coupon
        assert_eq!(ErrorCode::InsufficientStock.code(), 6101);
        assert_eq!(ErrorCode::CouponExhausted.code(), 6504);

        // System
        assert_eq!(ErrorCode::InternalError.code(), 9001);
        assert_eq!(ErrorCode::ConfigurationError.code(), 9005);
    }

    #[test]
    fn test_try_from_valid() {
        assert_eq!(ErrorCode::try_from(0).unwrap(), ErrorCode::Success);
        assert_eq!(ErrorCode::try_from(4002).unwrap(), ErrorCode::InvalidTransition);
        assert_eq!(ErrorCode::try_from(5003).unwrap(), ErrorCode::SignatureMismatch);
        assert_eq!(ErrorCode::try_from(6101).unwrap(), ErrorCode::InsufficientStock);
    }

    #[test]
    fn test_try_from_invalid() {
        assert_eq!(ErrorCode::try_from(12345), Err(InvalidErrorCode(12345)));
        assert_eq!(ErrorCode::try_from(7001), Err(InvalidErrorCode(7001)));
    }

    #[test]
    fn test_roundtrip() {
        let codes = [
            ErrorCode::Success,
            ErrorCode::NotAuthenticated,
            ErrorCode::PermissionDenied,
            ErrorCode::OrderNotFound,
            ErrorCode::InsufficientStock,
            ErrorCode::AlreadyProcessed,
            ErrorCode::InternalError,
        ];

        for code in codes {
            let json = serde_json::to_string(&code).unwrap();
            let parsed: ErrorCode = serde_json::from_str(&json).unwrap();
            assert_eq!(code, parsed);
        }
    }

    #[test]
    fn test_display_is_numeric() {
        assert_eq!(format!("{}", ErrorCode::OrderNotFound), "4001");
        assert_eq!(format!("{}", ErrorCode::Success), "0");
    }

    #[test]
    fn test_message() {
        assert_eq!(ErrorCode::InsufficientStock.message(), "Insufficient stock");
        assert_eq!(
            ErrorCode::SignatureMismatch.message(),
            "Gateway callback signature mismatch"
        );
    }
}
