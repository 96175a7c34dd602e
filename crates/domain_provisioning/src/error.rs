//! Provisioning domain errors

use thiserror::Error;

/// Errors that can occur in the provisioning domain
#[derive(Debug, Error)]
pub enum ProvisioningError {
    /// Service not found
    #[error("Service not found: {0}")]
    ServiceNotFound(String),

    /// Domain not found
    #[error("Domain not found: {0}")]
    DomainNotFound(String),

    /// Order not found
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Status transition not in the allowed lifecycle
    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition { from: String, to: String },

    /// Unknown stored status name
    #[error("Unknown status: {0}")]
    UnknownStatus(String),

    /// Invalid operation
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}
