//! Domain events for the billing aggregates
//!
//! Events record significant billing occurrences for:
//! - Audit trails
//! - Event-driven integrations
//! - Triggering downstream processes

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{ClientId, InvoiceId, InvoiceItemId, Money, RefundId, TransactionId};

use crate::invoice::InvoiceStatus;

/// Domain events emitted by billing aggregates
///
/// Each variant captures one state change together with the data an audit
/// reader needs to reconstruct what happened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BillingEvent {
    /// A new invoice was created
    InvoiceCreated {
        invoice_id: InvoiceId,
        client_id: ClientId,
        timestamp: DateTime<Utc>,
    },

    /// A line item was appended to an invoice
    ItemAppended {
        invoice_id: InvoiceId,
        item_id: InvoiceItemId,
        timestamp: DateTime<Utc>,
    },

    /// A payment was applied to an invoice
    PaymentApplied {
        invoice_id: InvoiceId,
        amount: Money,
        new_status: InvoiceStatus,
        timestamp: DateTime<Utc>,
    },

    /// An invoice became fully paid
    InvoicePaid {
        invoice_id: InvoiceId,
        client_id: ClientId,
        total: Money,
        timestamp: DateTime<Utc>,
    },

    /// A completed refund lowered the amount paid
    RefundApplied {
        invoice_id: InvoiceId,
        amount: Money,
        new_status: InvoiceStatus,
        timestamp: DateTime<Utc>,
    },

    /// The due date was pushed later
    DueDateExtended {
        invoice_id: InvoiceId,
        old_due_date: NaiveDate,
        new_due_date: NaiveDate,
        timestamp: DateTime<Utc>,
    },

    /// An invoice was folded into a consolidation hub
    InvoiceFolded {
        invoice_id: InvoiceId,
        hub_invoice_id: InvoiceId,
        timestamp: DateTime<Utc>,
    },

    /// A refund request moved through its workflow
    RefundStatusChanged {
        refund_id: RefundId,
        transaction_id: TransactionId,
        from: String,
        to: String,
        timestamp: DateTime<Utc>,
    },
}

impl BillingEvent {
    /// Returns the timestamp of this event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            BillingEvent::InvoiceCreated { timestamp, .. } => *timestamp,
            BillingEvent::ItemAppended { timestamp, .. } => *timestamp,
            BillingEvent::PaymentApplied { timestamp, .. } => *timestamp,
            BillingEvent::InvoicePaid { timestamp, .. } => *timestamp,
            BillingEvent::RefundApplied { timestamp, .. } => *timestamp,
            BillingEvent::DueDateExtended { timestamp, .. } => *timestamp,
            BillingEvent::InvoiceFolded { timestamp, .. } => *timestamp,
            BillingEvent::RefundStatusChanged { timestamp, .. } => *timestamp,
        }
    }

    /// Returns the event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            BillingEvent::InvoiceCreated { .. } => "InvoiceCreated",
            BillingEvent::ItemAppended { .. } => "ItemAppended",
            BillingEvent::PaymentApplied { .. } => "PaymentApplied",
            BillingEvent::InvoicePaid { .. } => "InvoicePaid",
            BillingEvent::RefundApplied { .. } => "RefundApplied",
            BillingEvent::DueDateExtended { .. } => "DueDateExtended",
            BillingEvent::InvoiceFolded { .. } => "InvoiceFolded",
            BillingEvent::RefundStatusChanged { .. } => "RefundStatusChanged",
        }
    }
}
