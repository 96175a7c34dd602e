//! Settlement engine error types

use core_kernel::PortError;
use domain_billing::BillingError;
use domain_provisioning::ProvisioningError;
use thiserror::Error;

/// Errors surfaced by the settlement, consolidation, refund, and
/// recurring-charge engines.
#[derive(Debug, Error)]
pub enum SettlementError {
    #[error(transparent)]
    Billing(#[from] BillingError),

    #[error(transparent)]
    Provisioning(#[from] ProvisioningError),

    #[error(transparent)]
    Port(#[from] PortError),

    #[error("Refund ceiling exceeded: {requested} requested but only {available} of transaction {transaction_id} remains refundable")]
    RefundCeilingExceeded {
        transaction_id: String,
        requested: String,
        available: String,
    },

    #[error("Insufficient authority: {actor} may not {action}")]
    InsufficientAuthority { actor: String, action: String },

    #[error("Validation error: {0}")]
    Validation(String),
}

impl SettlementError {
    pub fn validation(message: impl Into<String>) -> Self {
        SettlementError::Validation(message.into())
    }

    /// True when retrying the whole operation against fresh state could
    /// succeed. Only storage-level contention qualifies; domain rule
    /// violations never do.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SettlementError::Port(e) if e.is_transient())
    }
}
