//! Payment transactions
//!
//! A transaction is the immutable record of one gateway interaction: a
//! capture attempt, a captured payment, or an internal refund reversal.
//! Settlement inserts Success rows directly; the Pending state exists for
//! asynchronous gateway flows that confirm later.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use core_kernel::{InvoiceId, Money, RefundId, TransactionId};

use crate::error::BillingError;

/// Transaction status
///
/// Transitions move strictly forward: `Pending -> Success` or
/// `Pending -> Failed`. Terminal rows are never edited; reversals are
/// recorded as separate negative transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Submitted to the gateway, awaiting confirmation
    Pending,
    /// Funds captured
    Success,
    /// Gateway declined or errored
    Failed,
}

impl TransactionStatus {
    /// Returns true if the transition is allowed
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!((self, next), (Pending, Success) | (Pending, Failed))
    }

    /// Canonical storage name
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Success => "success",
            TransactionStatus::Failed => "failed",
        }
    }

    /// Parses a stored status name
    pub fn parse(value: &str) -> Result<Self, BillingError> {
        match value {
            "pending" => Ok(TransactionStatus::Pending),
            "success" => Ok(TransactionStatus::Success),
            "failed" => Ok(TransactionStatus::Failed),
            other => Err(BillingError::UnknownStatus(other.to_string())),
        }
    }
}

/// A payment transaction against an invoice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentTransaction {
    /// Unique identifier
    pub id: TransactionId,
    /// Invoice this transaction settles
    pub invoice_id: InvoiceId,
    /// Gateway name (e.g. "bkash", "stripe", "Internal Refund")
    pub gateway: String,
    /// Gateway-assigned reference; unique across all transactions
    pub external_ref: String,
    /// Amount moved; negative for refund reversals
    pub amount: Money,
    /// Status
    pub status: TransactionStatus,
    /// Raw gateway response, kept verbatim for dispute handling
    pub raw_payload: Option<serde_json::Value>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Set when the transaction reaches a terminal state
    pub completed_at: Option<DateTime<Utc>>,
}

impl PaymentTransaction {
    /// Gateway name recorded on refund reversal rows
    pub const INTERNAL_REFUND_GATEWAY: &'static str = "Internal Refund";

    /// Creates a pending transaction awaiting gateway confirmation
    pub fn pending(
        invoice_id: InvoiceId,
        gateway: impl Into<String>,
        external_ref: impl Into<String>,
        amount: Money,
    ) -> Self {
        Self {
            id: TransactionId::new_v7(),
            invoice_id,
            gateway: gateway.into(),
            external_ref: external_ref.into(),
            amount,
            status: TransactionStatus::Pending,
            raw_payload: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Creates an already-successful transaction
    ///
    /// Settlement uses this when the gateway has confirmed capture before
    /// the payment reaches us.
    pub fn successful(
        invoice_id: InvoiceId,
        gateway: impl Into<String>,
        external_ref: impl Into<String>,
        amount: Money,
        raw_payload: Option<serde_json::Value>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TransactionId::new_v7(),
            invoice_id,
            gateway: gateway.into(),
            external_ref: external_ref.into(),
            amount,
            status: TransactionStatus::Success,
            raw_payload,
            created_at: now,
            completed_at: Some(now),
        }
    }

    /// Creates the negative reversal row for a completed refund
    ///
    /// The amount passed in is the positive refund amount; the row records
    /// its negation so ledger sums stay truthful.
    pub fn internal_refund(invoice_id: InvoiceId, refund_id: RefundId, amount: Money) -> Self {
        Self::successful(
            invoice_id,
            Self::INTERNAL_REFUND_GATEWAY,
            format!("REFUND-{refund_id}"),
            -amount,
            None,
        )
    }

    /// Synthesizes a reference for manually recorded payments that arrive
    /// without one
    pub fn manual_reference() -> String {
        format!("MANUAL-{}", Uuid::new_v4())
    }

    /// Marks the transaction successful
    ///
    /// # Errors
    ///
    /// Returns an error unless the transaction is pending.
    pub fn succeed(&mut self, raw_payload: Option<serde_json::Value>) -> Result<(), BillingError> {
        self.transition_to(TransactionStatus::Success)?;
        self.raw_payload = raw_payload;
        Ok(())
    }

    /// Marks the transaction failed
    ///
    /// # Errors
    ///
    /// Returns an error unless the transaction is pending.
    pub fn fail(&mut self, raw_payload: Option<serde_json::Value>) -> Result<(), BillingError> {
        self.transition_to(TransactionStatus::Failed)?;
        self.raw_payload = raw_payload;
        Ok(())
    }

    /// True if a refund may be requested against this transaction
    ///
    /// Only captured positive amounts can be refunded; reversal rows are
    /// themselves never refundable.
    pub fn refundable(&self) -> bool {
        self.status == TransactionStatus::Success && self.amount.is_positive()
    }

    fn transition_to(&mut self, next: TransactionStatus) -> Result<(), BillingError> {
        if !self.status.can_transition_to(next) {
            return Err(BillingError::InvalidStatusTransition {
                from: self.status.as_str().to_string(),
                to: next.as_str().to_string(),
            });
        }
        self.status = next;
        self.completed_at = Some(Utc::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::Currency;
    use rust_decimal_macros::dec;

    #[test]
    fn test_pending_transaction_succeeds_once() {
        let mut txn = PaymentTransaction::pending(
            InvoiceId::new(),
            "bkash",
            "TXN-REF-001",
            Money::new(dec!(500.00), Currency::BDT),
        );
        assert_eq!(txn.status, TransactionStatus::Pending);

        txn.succeed(Some(serde_json::json!({"trxID": "TXN-REF-001"})))
            .unwrap();
        assert_eq!(txn.status, TransactionStatus::Success);
        assert!(txn.completed_at.is_some());

        let again = txn.succeed(None);
        assert!(matches!(
            again,
            Err(BillingError::InvalidStatusTransition { .. })
        ));
    }

    #[test]
    fn test_internal_refund_is_negative_and_not_refundable() {
        let refund_id = RefundId::new();
        let txn = PaymentTransaction::internal_refund(
            InvoiceId::new(),
            refund_id,
            Money::new(dec!(30.00), Currency::BDT),
        );

        assert_eq!(txn.amount.amount(), dec!(-30.00));
        assert_eq!(txn.gateway, PaymentTransaction::INTERNAL_REFUND_GATEWAY);
        assert_eq!(txn.external_ref, format!("REFUND-{refund_id}"));
        assert_eq!(txn.status, TransactionStatus::Success);
        assert!(!txn.refundable());
    }

    #[test]
    fn test_manual_reference_is_unique() {
        let a = PaymentTransaction::manual_reference();
        let b = PaymentTransaction::manual_reference();
        assert!(a.starts_with("MANUAL-"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_failed_transaction_is_terminal() {
        let mut txn = PaymentTransaction::pending(
            InvoiceId::new(),
            "stripe",
            "ch_123",
            Money::new(dec!(10.00), Currency::USD),
        );
        txn.fail(None).unwrap();
        assert!(txn.succeed(None).is_err());
        assert!(!txn.refundable());
    }
}
