//! Core Kernel - Foundational types and utilities for the billing system
//!
//! This crate provides the fundamental building blocks used across all domain modules:
//! - Money types with precise decimal arithmetic
//! - Billing cycle date arithmetic
//! - Common identifiers and value objects
//! - Port error taxonomy shared by all adapters

pub mod cycle;
pub mod error;
pub mod identifiers;
pub mod money;
pub mod ports;

pub use cycle::BillingCycle;
pub use error::CoreError;
pub use identifiers::{
    BillableItemId, ClientId, CommissionEntryId, DomainId, InvestorId, InvoiceId, InvoiceItemId,
    OperatorId, OrderId, OrderItemId, ProductId, RefundId, ServiceId, TransactionId,
};
pub use money::{Currency, Money, MoneyError, Rate};
pub use ports::{ConflictKind, DomainPort, PortError};
