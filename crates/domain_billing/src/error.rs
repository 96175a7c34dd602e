//! Billing domain errors

use thiserror::Error;

use core_kernel::MoneyError;

/// Errors that can occur in the billing domain
#[derive(Debug, Error)]
pub enum BillingError {
    /// Money arithmetic failed
    #[error(transparent)]
    Money(#[from] MoneyError),

    /// Invoice not found
    #[error("Invoice not found: {0}")]
    InvoiceNotFound(String),

    /// Transaction not found
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    /// Refund not found
    #[error("Refund not found: {0}")]
    RefundNotFound(String),

    /// Status transition not in the allowed lifecycle
    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition { from: String, to: String },

    /// Unknown stored status name
    #[error("Unknown status: {0}")]
    UnknownStatus(String),

    /// Amount fails validation
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Invalid operation
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}
