//! Invoice aggregate
//!
//! The invoice is the main consistency boundary of the billing domain. All
//! money movement flows through it: payments raise `amount_paid`, refunds
//! lower it, and consolidation appends or adopts renewal lines. Status never
//! changes except through the guarded mutators here.
//!
//! # Invariants
//!
//! - `amount_paid <= total` except transiently while a refund is applied
//! - status follows `Unpaid -> PartiallyPaid -> Paid`, with
//!   `Paid/PartiallyPaid -> Refunded` reachable only through refund
//!   application
//! - line items share the invoice currency
//! - the due date only ever moves later, never earlier
//! - invoices are soft-deleted, never removed

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{
    BillableItemId, ClientId, Currency, DomainId, InvoiceId, InvoiceItemId, Money, OrderId, Rate,
    ServiceId,
};

use crate::error::BillingError;
use crate::events::BillingEvent;

/// Invoice lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// No payment received yet
    Unpaid,
    /// Some payment received, balance outstanding
    PartiallyPaid,
    /// Fully paid
    Paid,
    /// Payments reversed down to zero or below via refunds
    Refunded,
}

impl InvoiceStatus {
    /// Returns true if the transition is part of the allowed lifecycle
    ///
    /// Refund-driven transitions (`Paid -> PartiallyPaid`,
    /// `* -> Refunded`) only happen through [`Invoice::apply_refund`];
    /// the matrix admits them so that mutator can share the same guard.
    pub fn can_transition_to(&self, next: InvoiceStatus) -> bool {
        use InvoiceStatus::*;
        matches!(
            (self, next),
            (Unpaid, PartiallyPaid)
                | (Unpaid, Paid)
                | (PartiallyPaid, Paid)
                | (PartiallyPaid, Refunded)
                | (Paid, PartiallyPaid)
                | (Paid, Refunded)
        )
    }

    /// Canonical storage name
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Unpaid => "unpaid",
            InvoiceStatus::PartiallyPaid => "partially_paid",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Refunded => "refunded",
        }
    }

    /// Parses a stored status name
    pub fn parse(value: &str) -> Result<Self, BillingError> {
        match value {
            "unpaid" => Ok(InvoiceStatus::Unpaid),
            "partially_paid" => Ok(InvoiceStatus::PartiallyPaid),
            "paid" => Ok(InvoiceStatus::Paid),
            "refunded" => Ok(InvoiceStatus::Refunded),
            other => Err(BillingError::UnknownStatus(other.to_string())),
        }
    }
}

/// What kind of provisioning a paid line item implies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenewalKind {
    NewService,
    ServiceRenewal,
    NewDomain,
    DomainRenewal,
}

impl RenewalKind {
    /// True for the `*_renewal` kinds, which extend additively from the
    /// target's current expiry when that expiry is still in the future
    pub fn is_renewal(&self) -> bool {
        matches!(self, RenewalKind::ServiceRenewal | RenewalKind::DomainRenewal)
    }
}

/// Renewal metadata carried by a line item
///
/// This is the closed tagged payload the settlement engine reads to decide
/// what to activate or extend. It is validated here, where it is written,
/// and must survive invoice merges verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenewalMeta {
    pub kind: RenewalKind,
    pub period_count: u32,
}

impl RenewalMeta {
    /// Creates validated renewal metadata
    ///
    /// # Errors
    ///
    /// Returns an error if `period_count` is zero: a line that grants no
    /// billing periods must not carry renewal semantics.
    pub fn new(kind: RenewalKind, period_count: u32) -> Result<Self, BillingError> {
        if period_count == 0 {
            return Err(BillingError::InvalidAmount(
                "renewal period count must be at least 1".to_string(),
            ));
        }
        Ok(Self { kind, period_count })
    }
}

/// The provisioned object a line item points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LineTarget {
    Service(ServiceId),
    Domain(DomainId),
}

/// A line item on an invoice
///
/// Owned exclusively by one invoice. The service/domain/billable
/// references are non-owning back-pointers used to locate the object to
/// mutate at settlement time and to detect already-billed sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub id: InvoiceItemId,
    pub description: String,
    pub amount: Money,
    pub service_id: Option<ServiceId>,
    pub domain_id: Option<DomainId>,
    pub billable_id: Option<BillableItemId>,
    pub renewal: Option<RenewalMeta>,
}

impl InvoiceItem {
    /// Creates a plain line item with no provisioning reference
    pub fn new(description: impl Into<String>, amount: Money) -> Self {
        Self {
            id: InvoiceItemId::new_v7(),
            description: description.into(),
            amount,
            service_id: None,
            domain_id: None,
            billable_id: None,
            renewal: None,
        }
    }

    /// Creates a line item referencing a service
    pub fn for_service(
        description: impl Into<String>,
        amount: Money,
        service_id: ServiceId,
    ) -> Self {
        Self {
            service_id: Some(service_id),
            ..Self::new(description, amount)
        }
    }

    /// Creates a line item referencing a domain
    pub fn for_domain(description: impl Into<String>, amount: Money, domain_id: DomainId) -> Self {
        Self {
            domain_id: Some(domain_id),
            ..Self::new(description, amount)
        }
    }

    /// Creates a line item billing an ad-hoc billable item
    pub fn for_billable(
        description: impl Into<String>,
        amount: Money,
        billable_id: BillableItemId,
    ) -> Self {
        Self {
            billable_id: Some(billable_id),
            ..Self::new(description, amount)
        }
    }

    /// Attaches renewal metadata
    pub fn with_renewal(mut self, renewal: RenewalMeta) -> Self {
        self.renewal = Some(renewal);
        self
    }

    /// Returns the provisioning target, if any
    ///
    /// A service reference wins if both are somehow set; writes through the
    /// constructors keep them mutually exclusive.
    pub fn target(&self) -> Option<LineTarget> {
        if let Some(service_id) = self.service_id {
            Some(LineTarget::Service(service_id))
        } else {
            self.domain_id.map(LineTarget::Domain)
        }
    }

    /// True if this line points at the given target
    pub fn targets(&self, target: LineTarget) -> bool {
        self.target() == Some(target)
    }
}

/// Outcome of applying one payment to an invoice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentApplication {
    pub previous_status: InvoiceStatus,
    pub new_status: InvoiceStatus,
    /// True exactly when this payment moved the invoice to Paid
    pub newly_paid: bool,
}

/// Outcome of applying one refund to an invoice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefundApplication {
    pub previous_status: InvoiceStatus,
    pub new_status: InvoiceStatus,
}

/// Persisted invoice state, as read back by a storage adapter
///
/// Carries every stored field of an [`Invoice`]; [`Invoice::from_parts`]
/// turns it back into the aggregate with an empty event buffer.
#[derive(Debug, Clone)]
pub struct InvoiceParts {
    pub id: InvoiceId,
    pub number: String,
    pub client_id: ClientId,
    pub order_id: Option<OrderId>,
    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
    pub currency: Currency,
    pub items: Vec<InvoiceItem>,
    pub subtotal: Money,
    pub tax_rate: Rate,
    pub tax: Money,
    pub total: Money,
    pub amount_paid: Money,
    pub status: InvoiceStatus,
    pub paid_date: Option<DateTime<Utc>>,
    pub deleted: bool,
    pub deleted_note: Option<String>,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An invoice for services, domains, and ad-hoc charges
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    /// Unique identifier
    pub id: InvoiceId,
    /// Invoice number (human-readable)
    pub number: String,
    /// Client being billed
    pub client_id: ClientId,
    /// Order this invoice bills, if any; order-less invoices are
    /// consolidation/sweep products and hub candidates
    pub order_id: Option<OrderId>,
    /// Issue date
    pub invoice_date: NaiveDate,
    /// Due date; only ever extended, never shortened
    pub due_date: NaiveDate,
    /// Currency
    pub currency: Currency,
    /// Line items
    pub items: Vec<InvoiceItem>,
    /// Sum of line amounts
    pub subtotal: Money,
    /// Tax rate snapshot applied to the subtotal
    pub tax_rate: Rate,
    /// Tax amount
    pub tax: Money,
    /// Subtotal plus tax
    pub total: Money,
    /// Amount paid so far
    pub amount_paid: Money,
    /// Status
    pub status: InvoiceStatus,
    /// Set when the invoice first reaches Paid
    pub paid_date: Option<DateTime<Utc>>,
    /// Soft-delete flag
    pub deleted: bool,
    /// Audit note recorded at soft-delete time
    pub deleted_note: Option<String>,
    /// Domain events to be published
    #[serde(skip)]
    events: Vec<BillingEvent>,
    /// Version for optimistic concurrency
    pub version: u32,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Creates a new empty invoice
    pub fn new(client_id: ClientId, due_date: NaiveDate, currency: Currency, tax_rate: Rate) -> Self {
        let now = Utc::now();
        let id = InvoiceId::new_v7();

        let mut invoice = Self {
            id,
            number: generate_invoice_number(),
            client_id,
            order_id: None,
            invoice_date: now.date_naive(),
            due_date,
            currency,
            items: Vec::new(),
            subtotal: Money::zero(currency),
            tax_rate,
            tax: Money::zero(currency),
            total: Money::zero(currency),
            amount_paid: Money::zero(currency),
            status: InvoiceStatus::Unpaid,
            paid_date: None,
            deleted: false,
            deleted_note: None,
            events: Vec::new(),
            version: 1,
            created_at: now,
            updated_at: now,
        };

        invoice.events.push(BillingEvent::InvoiceCreated {
            invoice_id: id,
            client_id,
            timestamp: now,
        });

        invoice
    }

    /// Rebuilds an invoice from its persisted state
    ///
    /// For storage adapters only. The data already passed validation when
    /// it was written; no events are replayed.
    pub fn from_parts(parts: InvoiceParts) -> Self {
        Self {
            id: parts.id,
            number: parts.number,
            client_id: parts.client_id,
            order_id: parts.order_id,
            invoice_date: parts.invoice_date,
            due_date: parts.due_date,
            currency: parts.currency,
            items: parts.items,
            subtotal: parts.subtotal,
            tax_rate: parts.tax_rate,
            tax: parts.tax,
            total: parts.total,
            amount_paid: parts.amount_paid,
            status: parts.status,
            paid_date: parts.paid_date,
            deleted: parts.deleted,
            deleted_note: parts.deleted_note,
            events: Vec::new(),
            version: parts.version,
            created_at: parts.created_at,
            updated_at: parts.updated_at,
        }
    }

    /// Links the invoice to the order it bills
    pub fn with_order(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    /// Returns accumulated domain events and clears them
    pub fn take_events(&mut self) -> Vec<BillingEvent> {
        std::mem::take(&mut self.events)
    }

    /// Returns the outstanding balance
    pub fn balance_due(&self) -> Money {
        self.total - self.amount_paid
    }

    /// True if this invoice can serve as the client's open renewal hub
    pub fn is_hub_candidate(&self) -> bool {
        self.status == InvoiceStatus::Unpaid && self.order_id.is_none() && !self.deleted
    }

    /// True if any line references the given service
    pub fn has_line_for_service(&self, service_id: ServiceId) -> bool {
        self.has_line_for(LineTarget::Service(service_id))
    }

    /// True if any line references the given domain
    pub fn has_line_for_domain(&self, domain_id: DomainId) -> bool {
        self.has_line_for(LineTarget::Domain(domain_id))
    }

    /// True if any line points at the given target
    pub fn has_line_for(&self, target: LineTarget) -> bool {
        self.items.iter().any(|item| item.targets(target))
    }

    /// Appends a line item and recalculates totals
    ///
    /// # Errors
    ///
    /// Returns an error if the item's currency differs from the invoice's.
    pub fn add_item(&mut self, item: InvoiceItem) -> Result<(), BillingError> {
        if item.amount.currency() != self.currency {
            return Err(BillingError::Money(core_kernel::MoneyError::CurrencyMismatch(
                self.currency.to_string(),
                item.amount.currency().to_string(),
            )));
        }

        let item_id = item.id;
        self.items.push(item);
        self.recalculate_totals();
        self.updated_at = Utc::now();

        self.events.push(BillingEvent::ItemAppended {
            invoice_id: self.id,
            item_id,
            timestamp: self.updated_at,
        });

        Ok(())
    }

    /// Recomputes subtotal, tax, and total from the current lines
    ///
    /// Tax is the stored rate applied to the whole subtotal, rounded to
    /// currency scale. Consolidation calls this after every merge so the hub
    /// is always re-taxed over old and new lines together.
    pub fn recalculate_totals(&mut self) {
        self.subtotal = self
            .items
            .iter()
            .fold(Money::zero(self.currency), |acc, item| acc + item.amount);
        self.tax = self.tax_rate.apply(&self.subtotal).round_to_currency();
        self.total = self.subtotal + self.tax;
    }

    /// Re-taxes the invoice with a fresh settings rate
    pub fn retax(&mut self, tax_rate: Rate) {
        self.tax_rate = tax_rate;
        self.recalculate_totals();
        self.updated_at = Utc::now();
    }

    /// Applies a successful payment
    ///
    /// Raises `amount_paid` and moves the status to Paid when the invoice is
    /// covered, else PartiallyPaid. `paid_date` is set only on the
    /// transition to Paid.
    ///
    /// # Errors
    ///
    /// Returns an error if the amount is not positive, the currency differs,
    /// or the invoice is not in a payable state (already Refunded, deleted).
    pub fn record_payment(&mut self, amount: Money, now: DateTime<Utc>) -> Result<PaymentApplication, BillingError> {
        if self.deleted {
            return Err(BillingError::InvalidOperation(format!(
                "invoice {} is deleted",
                self.number
            )));
        }
        if !amount.is_positive() {
            return Err(BillingError::InvalidAmount(
                "payment amount must be positive".to_string(),
            ));
        }

        let previous_status = self.status;
        let new_amount_paid = self.amount_paid.checked_add(&amount)?;
        let new_status = if new_amount_paid >= self.total {
            InvoiceStatus::Paid
        } else {
            InvoiceStatus::PartiallyPaid
        };

        if new_status != previous_status && !previous_status.can_transition_to(new_status) {
            return Err(BillingError::InvalidStatusTransition {
                from: previous_status.as_str().to_string(),
                to: new_status.as_str().to_string(),
            });
        }

        self.amount_paid = new_amount_paid;
        self.status = new_status;
        self.updated_at = now;

        let newly_paid = new_status == InvoiceStatus::Paid && previous_status != InvoiceStatus::Paid;
        if newly_paid {
            self.paid_date = Some(now);
        }

        self.events.push(BillingEvent::PaymentApplied {
            invoice_id: self.id,
            amount,
            new_status,
            timestamp: now,
        });
        if newly_paid {
            self.events.push(BillingEvent::InvoicePaid {
                invoice_id: self.id,
                client_id: self.client_id,
                total: self.total,
                timestamp: now,
            });
        }

        Ok(PaymentApplication {
            previous_status,
            new_status,
            newly_paid,
        })
    }

    /// Applies a completed refund
    ///
    /// Lowers `amount_paid` and recomputes the status: at or below zero the
    /// invoice becomes Refunded, below total it becomes PartiallyPaid,
    /// otherwise the status is left unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the amount is not positive or the invoice has
    /// collected nothing to refund.
    pub fn apply_refund(&mut self, amount: Money, now: DateTime<Utc>) -> Result<RefundApplication, BillingError> {
        if !amount.is_positive() {
            return Err(BillingError::InvalidAmount(
                "refund amount must be positive".to_string(),
            ));
        }
        if !matches!(
            self.status,
            InvoiceStatus::Paid | InvoiceStatus::PartiallyPaid
        ) {
            return Err(BillingError::InvalidOperation(format!(
                "invoice {} has no collected payments to refund",
                self.number
            )));
        }

        let previous_status = self.status;
        self.amount_paid = self.amount_paid.checked_sub(&amount)?;

        let new_status = if !self.amount_paid.is_positive() {
            InvoiceStatus::Refunded
        } else if self.amount_paid < self.total {
            InvoiceStatus::PartiallyPaid
        } else {
            previous_status
        };

        if new_status != previous_status && !previous_status.can_transition_to(new_status) {
            return Err(BillingError::InvalidStatusTransition {
                from: previous_status.as_str().to_string(),
                to: new_status.as_str().to_string(),
            });
        }

        self.status = new_status;
        self.updated_at = now;

        self.events.push(BillingEvent::RefundApplied {
            invoice_id: self.id,
            amount,
            new_status,
            timestamp: now,
        });

        Ok(RefundApplication {
            previous_status,
            new_status,
        })
    }

    /// Extends the due date, never shortening it
    ///
    /// Returns true if the date moved.
    pub fn extend_due_date(&mut self, candidate: NaiveDate) -> bool {
        if candidate <= self.due_date {
            return false;
        }
        let old = self.due_date;
        self.due_date = candidate;
        self.updated_at = Utc::now();
        self.events.push(BillingEvent::DueDateExtended {
            invoice_id: self.id,
            old_due_date: old,
            new_due_date: candidate,
            timestamp: self.updated_at,
        });
        true
    }

    /// Soft-deletes the invoice with an audit note
    pub fn soft_delete(&mut self, note: impl Into<String>) {
        self.deleted = true;
        self.deleted_note = Some(note.into());
        self.updated_at = Utc::now();
    }

    /// Folds this invoice into a hub: marks it deleted with a standard
    /// audit note and records the merge event
    ///
    /// The caller moves the surviving lines onto the hub; this invoice only
    /// records where its charges went.
    pub fn fold_into(&mut self, hub_id: InvoiceId, hub_number: &str) {
        self.soft_delete(format!("Consolidated into invoice {hub_number}"));
        self.events.push(BillingEvent::InvoiceFolded {
            invoice_id: self.id,
            hub_invoice_id: hub_id,
            timestamp: self.updated_at,
        });
    }

    /// Removes a line item, returning it for adoption by another invoice
    ///
    /// Totals are recalculated. Used only by consolidation when moving
    /// lines from a folded invoice onto the hub.
    pub fn take_item(&mut self, item_id: InvoiceItemId) -> Option<InvoiceItem> {
        let index = self.items.iter().position(|item| item.id == item_id)?;
        let item = self.items.remove(index);
        self.recalculate_totals();
        self.updated_at = Utc::now();
        Some(item)
    }

    /// Removes and returns every remaining line item, zeroing the totals
    ///
    /// Consolidation calls this just before folding a donor so that no
    /// charge is voided along with it.
    pub fn drain_items(&mut self) -> Vec<InvoiceItem> {
        let items = std::mem::take(&mut self.items);
        self.recalculate_totals();
        self.updated_at = Utc::now();
        items
    }
}

/// Generates a unique invoice number
///
/// The millisecond component keeps numbers roughly sortable; the random
/// suffix keeps two invoices created in the same millisecond apart, since
/// `number` carries a unique constraint.
fn generate_invoice_number() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let entropy = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "INV-{}-{}",
        duration.as_millis() % 10_000_000_000,
        &entropy[..6]
    )
}
