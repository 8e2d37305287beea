//! Payment Model

use super::order::PaymentMethod;
use serde::{Deserialize, Serialize};

/// Payment status
///
/// Sub-state machine: `Pending -> {Processing, Success, Failed, Cancelled}`,
/// `Processing -> {Success, Failed, Cancelled}`,
/// `Success -> {Refunded, PartiallyRefunded}`; everything else is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Processing,
    Success,
    Failed,
    Cancelled,
    Refunded,
    PartiallyRefunded,
}

impl PaymentStatus {
    /// Outgoing edges of the payment sub-state machine
    pub const fn allowed_targets(&self) -> &'static [PaymentStatus] {
        use PaymentStatus::*;
        match self {
            Pending => &[Processing, Success, Failed, Cancelled],
            Processing => &[Success, Failed, Cancelled],
            Success => &[Refunded, PartiallyRefunded],
            PartiallyRefunded => &[Refunded, PartiallyRefunded],
            Failed | Cancelled | Refunded => &[],
        }
    }

    /// Whether `target` is a legal next status
    pub fn can_transition_to(&self, target: PaymentStatus) -> bool {
        self.allowed_targets().contains(&target)
    }

    /// Wire representation (SCREAMING_SNAKE_CASE)
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Processing => "PROCESSING",
            PaymentStatus::Success => "SUCCESS",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Cancelled => "CANCELLED",
            PaymentStatus::Refunded => "REFUNDED",
            PaymentStatus::PartiallyRefunded => "PARTIALLY_REFUNDED",
        }
    }
}

/// One entry in the refund sub-ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Refund {
    /// Refunded amount in currency unit
    pub amount: f64,
    pub reason: String,
    /// UTC millis
    pub at: i64,
}

/// Payment entity — one record per payment attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    /// Business id, also the gateway reference and the storage record key
    pub payment_id: String,
    pub order_id: String,
    /// Amount snapshot in currency unit, taken from the order total
    pub amount: f64,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    /// Transaction id assigned by the gateway, from the callback
    pub gateway_txn_id: Option<String>,
    pub bank_code: Option<String>,
    /// Gateway-formatted settlement timestamp (yyyyMMddHHmmss)
    pub pay_date: Option<String>,
    /// Last response code received from the gateway
    pub response_code: Option<String>,
    /// Whether a signature-verified callback has been applied
    pub callback_verified: bool,
    pub refunds: Vec<Refund>,
    /// UTC millis
    pub created_at: i64,
    pub updated_at: i64,
}

impl Payment {
    /// Total refunded so far
    pub fn refunded_amount(&self) -> f64 {
        self.refunds.iter().map(|r| r.amount).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_state_machine_edges() {
        use PaymentStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Pending.can_transition_to(Success));
        assert!(Processing.can_transition_to(Failed));
        assert!(Success.can_transition_to(Refunded));
        assert!(Success.can_transition_to(PartiallyRefunded));
        assert!(PartiallyRefunded.can_transition_to(Refunded));
    }

    #[test]
    fn test_payment_terminal_states() {
        use PaymentStatus::*;
        assert!(Failed.allowed_targets().is_empty());
        assert!(Cancelled.allowed_targets().is_empty());
        assert!(Refunded.allowed_targets().is_empty());
        assert!(!Success.can_transition_to(Pending));
        assert!(!Failed.can_transition_to(Success));
    }

    #[test]
    fn test_status_serde_format() {
        let json = serde_json::to_string(&PaymentStatus::PartiallyRefunded).unwrap();
        assert_eq!(json, "\"PARTIALLY_REFUNDED\"");
    }
}
