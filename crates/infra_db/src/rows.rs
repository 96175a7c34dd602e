//! Row structs and domain mapping
//!
//! One `FromRow` struct per table, each with an `into_domain` conversion.
//! Stored strings (statuses, currencies, cycles) are parsed through the
//! domain types' own parsers; anything they reject surfaces as a
//! [`DatabaseError::RowMapping`] rather than a panic.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

use core_kernel::{BillingCycle, Currency, Money, Rate};
use domain_billing::{
    BillableItem, CommissionBasis, Invoice, InvoiceItem, InvoiceParts, InvoiceStatus, Investor,
    PaymentTransaction, Refund, RefundStatus, RenewalMeta, TransactionStatus,
};
use domain_provisioning::{
    DomainName, DomainStatus, Order, OrderItem, OrderStatus, OrderStatusChange, Service,
    ServiceStatus,
};
use domain_settlement::ClientSummary;

use crate::error::DatabaseError;

/// Parses a stored ISO 4217 code
pub(crate) fn parse_currency(code: &str) -> Result<Currency, DatabaseError> {
    Currency::parse(code.trim())
        .ok_or_else(|| DatabaseError::mapping(format!("unknown currency '{code}'")))
}

fn money(amount: Decimal, currency: &str) -> Result<Money, DatabaseError> {
    Ok(Money::new(amount, parse_currency(currency)?))
}

#[derive(Debug, FromRow)]
pub struct ClientRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl ClientRow {
    pub fn into_domain(self) -> ClientSummary {
        ClientSummary {
            id: self.id.into(),
            name: self.name,
            email: self.email,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct InvoiceRow {
    pub id: Uuid,
    pub number: String,
    pub client_id: Uuid,
    pub order_id: Option<Uuid>,
    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
    pub currency: String,
    pub subtotal: Decimal,
    pub tax_rate: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub amount_paid: Decimal,
    pub status: String,
    pub paid_date: Option<DateTime<Utc>>,
    pub deleted: bool,
    pub deleted_note: Option<String>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InvoiceRow {
    /// Rebuilds the invoice aggregate around its already-loaded lines
    pub fn into_domain(self, items: Vec<InvoiceItem>) -> Result<Invoice, DatabaseError> {
        let currency = parse_currency(&self.currency)?;
        let status = InvoiceStatus::parse(&self.status)
            .map_err(|e| DatabaseError::mapping(e.to_string()))?;
        Ok(Invoice::from_parts(InvoiceParts {
            id: self.id.into(),
            number: self.number,
            client_id: self.client_id.into(),
            order_id: self.order_id.map(Into::into),
            invoice_date: self.invoice_date,
            due_date: self.due_date,
            currency,
            items,
            subtotal: Money::new(self.subtotal, currency),
            tax_rate: Rate::new(self.tax_rate),
            tax: Money::new(self.tax, currency),
            total: Money::new(self.total, currency),
            amount_paid: Money::new(self.amount_paid, currency),
            status,
            paid_date: self.paid_date,
            deleted: self.deleted,
            deleted_note: self.deleted_note,
            version: self.version as u32,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }))
    }
}

#[derive(Debug, FromRow)]
pub struct InvoiceItemRow {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub description: String,
    pub amount: Decimal,
    pub currency: String,
    pub service_id: Option<Uuid>,
    pub domain_id: Option<Uuid>,
    pub billable_id: Option<Uuid>,
    pub renewal: Option<serde_json::Value>,
}

impl InvoiceItemRow {
    pub fn into_domain(self) -> Result<InvoiceItem, DatabaseError> {
        let renewal = self
            .renewal
            .map(serde_json::from_value::<RenewalMeta>)
            .transpose()
            .map_err(|e| DatabaseError::mapping(format!("renewal metadata: {e}")))?;
        Ok(InvoiceItem {
            id: self.id.into(),
            description: self.description,
            amount: money(self.amount, &self.currency)?,
            service_id: self.service_id.map(Into::into),
            domain_id: self.domain_id.map(Into::into),
            billable_id: self.billable_id.map(Into::into),
            renewal,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct TransactionRow {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub gateway: String,
    pub external_ref: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: String,
    pub raw_payload: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TransactionRow {
    pub fn into_domain(self) -> Result<PaymentTransaction, DatabaseError> {
        Ok(PaymentTransaction {
            id: self.id.into(),
            invoice_id: self.invoice_id.into(),
            gateway: self.gateway,
            external_ref: self.external_ref,
            amount: money(self.amount, &self.currency)?,
            status: TransactionStatus::parse(&self.status)
                .map_err(|e| DatabaseError::mapping(e.to_string()))?,
            raw_payload: self.raw_payload,
            created_at: self.created_at,
            completed_at: self.completed_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct RefundRow {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub reason: String,
    pub status: String,
    pub requested_by: Uuid,
    pub authorized_by: Option<Uuid>,
    pub decided_by: Option<Uuid>,
    pub decision_note: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub authorized_at: Option<DateTime<Utc>>,
    pub decided_at: Option<DateTime<Utc>>,
}

impl RefundRow {
    pub fn into_domain(self) -> Result<Refund, DatabaseError> {
        Ok(Refund {
            id: self.id.into(),
            transaction_id: self.transaction_id.into(),
            amount: money(self.amount, &self.currency)?,
            reason: self.reason,
            status: RefundStatus::parse(&self.status)
                .map_err(|e| DatabaseError::mapping(e.to_string()))?,
            requested_by: self.requested_by.into(),
            authorized_by: self.authorized_by.map(Into::into),
            decided_by: self.decided_by.map(Into::into),
            decision_note: self.decision_note,
            requested_at: self.requested_at,
            authorized_at: self.authorized_at,
            decided_at: self.decided_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct ServiceRow {
    pub id: Uuid,
    pub client_id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub status: String,
    pub billing_cycle: String,
    pub recurring_amount: Decimal,
    pub currency: String,
    pub next_due_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ServiceRow {
    pub fn into_domain(self) -> Result<Service, DatabaseError> {
        Ok(Service {
            id: self.id.into(),
            client_id: self.client_id.into(),
            product_id: self.product_id.into(),
            name: self.name,
            status: ServiceStatus::parse(&self.status)
                .map_err(|e| DatabaseError::mapping(e.to_string()))?,
            billing_cycle: BillingCycle::parse(&self.billing_cycle),
            recurring_amount: money(self.recurring_amount, &self.currency)?,
            next_due_date: self.next_due_date,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct DomainRow {
    pub id: Uuid,
    pub client_id: Uuid,
    pub name: String,
    pub status: String,
    pub registration_years: i32,
    pub expiry_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DomainRow {
    pub fn into_domain(self) -> Result<DomainName, DatabaseError> {
        Ok(DomainName {
            id: self.id.into(),
            client_id: self.client_id.into(),
            name: self.name,
            status: DomainStatus::parse(&self.status)
                .map_err(|e| DatabaseError::mapping(e.to_string()))?,
            registration_years: self.registration_years as u32,
            expiry_date: self.expiry_date,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct OrderRow {
    pub id: Uuid,
    pub number: String,
    pub client_id: Uuid,
    pub status: String,
    pub total: Decimal,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderRow {
    pub fn into_domain(
        self,
        items: Vec<OrderItem>,
        history: Vec<OrderStatusChange>,
    ) -> Result<Order, DatabaseError> {
        Ok(Order {
            id: self.id.into(),
            number: self.number,
            client_id: self.client_id.into(),
            status: OrderStatus::parse(&self.status)
                .map_err(|e| DatabaseError::mapping(e.to_string()))?,
            items,
            total: money(self.total, &self.currency)?,
            history,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct OrderItemRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub description: String,
    pub amount: Decimal,
    pub currency: String,
    pub service_id: Option<Uuid>,
    pub domain_id: Option<Uuid>,
    pub domain_years: Option<i32>,
}

impl OrderItemRow {
    pub fn into_domain(self) -> Result<OrderItem, DatabaseError> {
        Ok(OrderItem {
            id: self.id.into(),
            description: self.description,
            amount: money(self.amount, &self.currency)?,
            service_id: self.service_id.map(Into::into),
            domain_id: self.domain_id.map(Into::into),
            domain_years: self.domain_years.map(|y| y as u32),
        })
    }
}

#[derive(Debug, FromRow)]
pub struct OrderHistoryRow {
    pub order_id: Uuid,
    pub from_status: String,
    pub to_status: String,
    pub note: Option<String>,
    pub changed_at: DateTime<Utc>,
}

impl OrderHistoryRow {
    pub fn into_domain(self) -> Result<OrderStatusChange, DatabaseError> {
        Ok(OrderStatusChange {
            from: OrderStatus::parse(&self.from_status)
                .map_err(|e| DatabaseError::mapping(e.to_string()))?,
            to: OrderStatus::parse(&self.to_status)
                .map_err(|e| DatabaseError::mapping(e.to_string()))?,
            note: self.note,
            changed_at: self.changed_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct BillableItemRow {
    pub id: Uuid,
    pub client_id: Uuid,
    pub description: String,
    pub amount: Decimal,
    pub currency: String,
    pub next_invoice_date: Option<NaiveDate>,
    pub cycle: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BillableItemRow {
    pub fn into_domain(self) -> Result<BillableItem, DatabaseError> {
        Ok(BillableItem {
            id: self.id.into(),
            client_id: self.client_id.into(),
            description: self.description,
            amount: money(self.amount, &self.currency)?,
            next_invoice_date: self.next_invoice_date,
            cycle: self.cycle.as_deref().map(BillingCycle::parse),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct InvestorRow {
    pub id: Uuid,
    pub name: String,
    pub basis: String,
    pub rate: Option<Decimal>,
    pub flat_amount: Option<Decimal>,
    pub currency: String,
    pub active: bool,
    pub balance: Decimal,
    pub total_earned: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InvestorRow {
    pub fn into_domain(self) -> Result<Investor, DatabaseError> {
        let currency = parse_currency(&self.currency)?;
        let basis = match self.basis.as_str() {
            "percentage" => CommissionBasis::Percentage {
                rate: Rate::new(self.rate.ok_or_else(|| {
                    DatabaseError::mapping("percentage investor without a rate")
                })?),
            },
            "flat" => CommissionBasis::Flat {
                amount: Money::new(
                    self.flat_amount.ok_or_else(|| {
                        DatabaseError::mapping("flat investor without an amount")
                    })?,
                    currency,
                ),
            },
            other => {
                return Err(DatabaseError::mapping(format!(
                    "unknown commission basis '{other}'"
                )))
            }
        };
        Ok(Investor {
            id: self.id.into(),
            name: self.name,
            basis,
            active: self.active,
            balance: Money::new(self.balance, currency),
            total_earned: Money::new(self.total_earned, currency),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Splits an investor's basis back into its stored columns
pub(crate) fn basis_columns(basis: &CommissionBasis) -> (&'static str, Option<Decimal>, Option<Decimal>) {
    match basis {
        CommissionBasis::Percentage { rate } => ("percentage", Some(rate.as_decimal()), None),
        CommissionBasis::Flat { amount } => ("flat", None, Some(amount.amount())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_currency_parsing_trims_char_padding() {
        // CHAR(3) columns come back space-padded when shorter codes sneak in
        assert_eq!(parse_currency("BDT").unwrap(), Currency::BDT);
        assert_eq!(parse_currency("USD ").unwrap(), Currency::USD);
        assert!(parse_currency("XXX").is_err());
    }

    #[test]
    fn test_invoice_item_row_round_trips_renewal_meta() {
        let meta = RenewalMeta::new(domain_billing::RenewalKind::ServiceRenewal, 2).unwrap();
        let row = InvoiceItemRow {
            id: Uuid::now_v7(),
            invoice_id: Uuid::now_v7(),
            description: "Hosting renewal".to_string(),
            amount: dec!(500.00),
            currency: "BDT".to_string(),
            service_id: Some(Uuid::now_v7()),
            domain_id: None,
            billable_id: None,
            renewal: Some(serde_json::to_value(meta).unwrap()),
        };

        let item = row.into_domain().unwrap();
        assert_eq!(item.renewal, Some(meta));
        assert_eq!(item.amount.amount(), dec!(500.00));
    }

    #[test]
    fn test_unknown_status_is_a_mapping_error() {
        let row = TransactionRow {
            id: Uuid::now_v7(),
            invoice_id: Uuid::now_v7(),
            gateway: "bkash".to_string(),
            external_ref: "TRX1".to_string(),
            amount: dec!(10),
            currency: "BDT".to_string(),
            status: "charged".to_string(),
            raw_payload: None,
            created_at: Utc::now(),
            completed_at: None,
        };
        assert!(matches!(
            row.into_domain(),
            Err(DatabaseError::RowMapping(_))
        ));
    }

    #[test]
    fn test_basis_columns_split() {
        let (kind, rate, flat) = basis_columns(&CommissionBasis::Percentage {
            rate: Rate::from_percentage(dec!(5)),
        });
        assert_eq!(kind, "percentage");
        assert_eq!(rate, Some(dec!(0.05)));
        assert_eq!(flat, None);
    }
}
