//! Billing Domain - Invoices, Transactions, and Refunds
//!
//! This crate holds the billing ledger of the platform: invoices and their
//! line items, payment transactions, refund requests, ad-hoc billable
//! items, and investor commissions. All money movement is expressed as
//! guarded mutations on these types; orchestration lives one layer up in
//! the settlement engines.
//!
//! # Lifecycle Rules
//!
//! - Invoices move `Unpaid -> PartiallyPaid -> Paid`, and only refunds can
//!   take them to `Refunded` or back down to `PartiallyPaid`
//! - Transactions are immutable once terminal; reversals are separate
//!   negative rows
//! - Refunds walk `PendingAuthorization -> PendingApproval -> Completed`
//!   with rejection possible at either pending step
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_billing::{Invoice, InvoiceItem, PaymentTransaction};
//!
//! let mut invoice = Invoice::new(client_id, due_date, currency, tax_rate);
//! invoice.add_item(InvoiceItem::for_service("Web hosting", price, service_id))?;
//!
//! let txn = PaymentTransaction::successful(
//!     invoice.id, "bkash", external_ref, amount, None,
//! );
//! invoice.record_payment(txn.amount, Utc::now())?;
//! ```

pub mod billable;
pub mod commission;
pub mod error;
pub mod events;
pub mod invoice;
pub mod refund;
pub mod transaction;

pub use billable::BillableItem;
pub use commission::{CommissionBasis, CommissionEntry, Investor};
pub use error::BillingError;
pub use events::BillingEvent;
pub use invoice::{
    Invoice, InvoiceItem, InvoiceParts, InvoiceStatus, LineTarget, PaymentApplication,
    RefundApplication, RenewalKind, RenewalMeta,
};
pub use refund::{Refund, RefundAuthority, RefundStatus};
pub use transaction::{PaymentTransaction, TransactionStatus};
