//! Provisioning Domain - Services, Domains, and Orders
//!
//! This crate models what the platform delivers once invoices are paid:
//! hosted services with recurring due dates, domain registrations with
//! expiry dates, and the orders that group them at checkout.
//!
//! # Lifecycle Rules
//!
//! - Services: `Pending -> Active -> Suspended/Terminated`, activation
//!   happens exactly once and only settlement drives it
//! - Domains: `Pending -> Active -> Expired`, renewals reactivate
//! - Orders: `Pending -> Completed | Fraud | Cancelled`, with every
//!   transition appended to an audit history
//!
//! Renewals are additive: extending a service or domain whose paid-through
//! date is still ahead extends from that date, never from today.

pub mod domain_name;
pub mod error;
pub mod order;
pub mod service;

pub use domain_name::{DomainName, DomainStatus};
pub use error::ProvisioningError;
pub use order::{Order, OrderItem, OrderStatus, OrderStatusChange};
pub use service::{Service, ServiceStatus};
