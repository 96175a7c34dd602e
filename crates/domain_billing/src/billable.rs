//! Billable items
//!
//! Ad-hoc charges raised against a client outside the product catalog:
//! setup work, consulting hours, one-off adjustments. One-time items are
//! invoiced once; recurring items re-enter the sweep each cycle.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{BillableItemId, BillingCycle, ClientId, Money};

/// An ad-hoc charge to include in the next generated invoice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillableItem {
    /// Unique identifier
    pub id: BillableItemId,
    /// Client to bill
    pub client_id: ClientId,
    /// Line description carried onto the invoice
    pub description: String,
    /// Charge amount
    pub amount: Money,
    /// Next date this item should be invoiced; None once a one-time item
    /// has been billed
    pub next_invoice_date: Option<NaiveDate>,
    /// Recurrence; None for one-time charges
    pub cycle: Option<BillingCycle>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl BillableItem {
    /// Creates a one-time charge due on the given date
    pub fn one_time(
        client_id: ClientId,
        description: impl Into<String>,
        amount: Money,
        invoice_date: NaiveDate,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: BillableItemId::new_v7(),
            client_id,
            description: description.into(),
            amount,
            next_invoice_date: Some(invoice_date),
            cycle: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Creates a recurring charge starting on the given date
    pub fn recurring(
        client_id: ClientId,
        description: impl Into<String>,
        amount: Money,
        first_invoice_date: NaiveDate,
        cycle: BillingCycle,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: BillableItemId::new_v7(),
            client_id,
            description: description.into(),
            amount,
            next_invoice_date: Some(first_invoice_date),
            cycle: Some(cycle),
            created_at: now,
            updated_at: now,
        }
    }

    /// True if this item should appear on an invoice generated today
    pub fn is_due(&self, today: NaiveDate) -> bool {
        matches!(self.next_invoice_date, Some(due) if due <= today)
    }

    /// Advances the item past the invoice that just billed it
    ///
    /// Recurring items move one cycle forward from their due date;
    /// one-time items clear their date and never come due again.
    pub fn mark_invoiced(&mut self) {
        self.next_invoice_date = match (self.cycle, self.next_invoice_date) {
            (Some(cycle), Some(due)) => Some(cycle.next(due)),
            _ => None,
        };
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::Currency;
    use rust_decimal_macros::dec;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 15).unwrap()
    }

    #[test]
    fn test_one_time_item_billed_once() {
        let mut item = BillableItem::one_time(
            ClientId::new(),
            "Migration assistance",
            Money::new(dec!(1500.00), Currency::BDT),
            today(),
        );
        assert!(item.is_due(today()));

        item.mark_invoiced();
        assert_eq!(item.next_invoice_date, None);
        assert!(!item.is_due(today() + chrono::Duration::days(400)));
    }

    #[test]
    fn test_recurring_item_advances_one_cycle() {
        let mut item = BillableItem::recurring(
            ClientId::new(),
            "Managed backups",
            Money::new(dec!(300.00), Currency::BDT),
            today(),
            BillingCycle::Quarterly,
        );
        assert!(item.is_due(today()));

        item.mark_invoiced();
        assert_eq!(
            item.next_invoice_date,
            Some(NaiveDate::from_ymd_opt(2025, 6, 15).unwrap())
        );
        assert!(!item.is_due(today()));
    }

    #[test]
    fn test_overdue_item_is_due() {
        let item = BillableItem::one_time(
            ClientId::new(),
            "Setup fee",
            Money::new(dec!(100.00), Currency::BDT),
            today() - chrono::Duration::days(30),
        );
        assert!(item.is_due(today()));
    }
}
