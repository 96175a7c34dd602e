//! Test Data Builders
//!
//! Provides builder patterns for constructing test aggregates with sensible
//! defaults. These builders allow tests to specify only the relevant fields
//! while using defaults for everything else.

use chrono::{NaiveDate, Utc};
use core_kernel::{
    BillingCycle, ClientId, Currency, Money, OperatorId, OrderId, ProductId, Rate, TransactionId,
};
use domain_billing::{
    Invoice, InvoiceItem, PaymentTransaction, Refund, RefundStatus,
};
use domain_provisioning::{DomainName, DomainStatus, Service, ServiceStatus};
use domain_settlement::ClientSummary;
use fake::faker::company::en::CompanyName;
use fake::faker::internet::en::SafeEmail;
use fake::Fake;

use crate::fixtures::{DateFixtures, IdFixtures, MoneyFixtures, RateFixtures, StringFixtures};

/// Builder for constructing test invoices
pub struct InvoiceBuilder {
    client_id: ClientId,
    due_date: NaiveDate,
    currency: Currency,
    tax_rate: Rate,
    order_id: Option<OrderId>,
    items: Vec<InvoiceItem>,
}

impl Default for InvoiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl InvoiceBuilder {
    /// Creates a new builder with default values
    pub fn new() -> Self {
        Self {
            client_id: IdFixtures::client_id(),
            due_date: DateFixtures::due_date(),
            currency: Currency::BDT,
            tax_rate: RateFixtures::vat(),
            order_id: None,
            items: Vec::new(),
        }
    }

    /// Sets the client
    pub fn with_client(mut self, client_id: ClientId) -> Self {
        self.client_id = client_id;
        self
    }

    /// Sets the due date
    pub fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = due_date;
        self
    }

    /// Sets the currency
    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    /// Sets the tax rate snapshot
    pub fn with_tax_rate(mut self, tax_rate: Rate) -> Self {
        self.tax_rate = tax_rate;
        self
    }

    /// Links the invoice to an order
    pub fn with_order(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    /// Adds a line item
    pub fn with_item(mut self, item: InvoiceItem) -> Self {
        self.items.push(item);
        self
    }

    /// Adds a plain line with the given description and amount
    pub fn with_line(self, description: &str, amount: Money) -> Self {
        self.with_item(InvoiceItem::new(description, amount))
    }

    /// Builds the invoice
    ///
    /// # Panics
    ///
    /// Panics if a line item's currency does not match the invoice currency.
    pub fn build(self) -> Invoice {
        let mut invoice = Invoice::new(self.client_id, self.due_date, self.currency, self.tax_rate);
        if let Some(order_id) = self.order_id {
            invoice = invoice.with_order(order_id);
        }
        for item in self.items {
            invoice
                .add_item(item)
                .expect("Line item currency mismatch in InvoiceBuilder");
        }
        invoice
    }

    /// Builds an invoice already settled in full
    ///
    /// # Panics
    ///
    /// Panics if the built invoice rejects the settling payment.
    pub fn build_paid(self) -> Invoice {
        let mut invoice = self.build();
        let total = invoice.total;
        invoice
            .record_payment(total, Utc::now())
            .expect("Failed to settle invoice in InvoiceBuilder");
        invoice
    }
}

/// Builder for constructing test services
pub struct ServiceBuilder {
    client_id: ClientId,
    product_id: ProductId,
    name: String,
    billing_cycle: BillingCycle,
    recurring_amount: Money,
    next_due_date: NaiveDate,
    status: ServiceStatus,
}

impl Default for ServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceBuilder {
    /// Creates a new builder defaulting to an active monthly service
    pub fn new() -> Self {
        Self {
            client_id: IdFixtures::client_id(),
            product_id: ProductId::new(),
            name: StringFixtures::service_name().to_string(),
            billing_cycle: BillingCycle::Monthly,
            recurring_amount: MoneyFixtures::bdt_hosting(),
            next_due_date: DateFixtures::due_within_horizon(),
            status: ServiceStatus::Active,
        }
    }

    /// Sets the client
    pub fn with_client(mut self, client_id: ClientId) -> Self {
        self.client_id = client_id;
        self
    }

    /// Sets the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the billing cycle
    pub fn with_cycle(mut self, cycle: BillingCycle) -> Self {
        self.billing_cycle = cycle;
        self
    }

    /// Sets the recurring amount
    pub fn with_amount(mut self, amount: Money) -> Self {
        self.recurring_amount = amount;
        self
    }

    /// Sets the next due date
    pub fn with_next_due_date(mut self, date: NaiveDate) -> Self {
        self.next_due_date = date;
        self
    }

    /// Sets the status
    pub fn with_status(mut self, status: ServiceStatus) -> Self {
        self.status = status;
        self
    }

    /// Shorthand for a service already past its due date
    pub fn lapsed(self) -> Self {
        self.with_next_due_date(DateFixtures::lapsed())
    }

    /// Builds the service
    pub fn build(self) -> Service {
        let mut service = Service::new(
            self.client_id,
            self.product_id,
            self.name,
            self.billing_cycle,
            self.recurring_amount,
            self.next_due_date,
        );
        service.status = self.status;
        service
    }
}

/// Builder for constructing test domain registrations
pub struct DomainBuilder {
    client_id: ClientId,
    name: String,
    registration_years: u32,
    status: DomainStatus,
    expiry_date: Option<NaiveDate>,
}

impl Default for DomainBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DomainBuilder {
    /// Creates a new builder defaulting to an active one-year registration
    pub fn new() -> Self {
        Self {
            client_id: IdFixtures::client_id(),
            name: StringFixtures::domain_name().to_string(),
            registration_years: 1,
            status: DomainStatus::Active,
            expiry_date: Some(DateFixtures::due_within_horizon()),
        }
    }

    /// Sets the client
    pub fn with_client(mut self, client_id: ClientId) -> Self {
        self.client_id = client_id;
        self
    }

    /// Sets the domain name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the registration term in years
    pub fn with_years(mut self, years: u32) -> Self {
        self.registration_years = years;
        self
    }

    /// Sets the status
    pub fn with_status(mut self, status: DomainStatus) -> Self {
        self.status = status;
        self
    }

    /// Sets the expiry date
    pub fn with_expiry(mut self, date: NaiveDate) -> Self {
        self.expiry_date = Some(date);
        self
    }

    /// Builds the domain
    pub fn build(self) -> DomainName {
        let mut domain = DomainName::new(self.client_id, self.name, self.registration_years);
        domain.status = self.status;
        domain.expiry_date = self.expiry_date;
        domain
    }
}

/// Builder for constructing test refund requests
pub struct RefundBuilder {
    transaction_id: TransactionId,
    amount: Money,
    reason: String,
    requested_by: OperatorId,
    status: RefundStatus,
}

impl Default for RefundBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RefundBuilder {
    /// Creates a new builder defaulting to a pending-authorization request
    pub fn new() -> Self {
        Self {
            transaction_id: IdFixtures::transaction_id(),
            amount: MoneyFixtures::bdt_100(),
            reason: StringFixtures::refund_reason().to_string(),
            requested_by: OperatorId::new(),
            status: RefundStatus::PendingAuthorization,
        }
    }

    /// Sets the target transaction
    pub fn with_transaction(mut self, transaction_id: TransactionId) -> Self {
        self.transaction_id = transaction_id;
        self
    }

    /// Sets the refund amount
    pub fn with_amount(mut self, amount: Money) -> Self {
        self.amount = amount;
        self
    }

    /// Sets the reason
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    /// Shorthand for a refund already past first-step authorization
    pub fn authorized(mut self) -> Self {
        self.status = RefundStatus::PendingApproval;
        self
    }

    /// Builds the refund
    ///
    /// # Panics
    ///
    /// Panics if the amount is not positive or a requested status
    /// transition is rejected.
    pub fn build(self) -> Refund {
        let mut refund = Refund::request(
            self.transaction_id,
            self.amount,
            self.reason,
            self.requested_by,
        )
        .expect("Invalid refund amount in RefundBuilder");

        if self.status == RefundStatus::PendingApproval {
            refund
                .authorize(OperatorId::new(), Utc::now())
                .expect("Failed to authorize refund in RefundBuilder");
        }
        refund
    }
}

/// Builder for constructing captured test transactions
pub struct TransactionBuilder {
    invoice_id: core_kernel::InvoiceId,
    gateway: String,
    external_ref: String,
    amount: Money,
}

impl Default for TransactionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionBuilder {
    /// Creates a new builder defaulting to a captured bkash payment
    pub fn new() -> Self {
        Self {
            invoice_id: IdFixtures::invoice_id(),
            gateway: StringFixtures::gateway().to_string(),
            external_ref: StringFixtures::external_ref().to_string(),
            amount: MoneyFixtures::bdt_100(),
        }
    }

    /// Sets the invoice
    pub fn with_invoice(mut self, invoice_id: core_kernel::InvoiceId) -> Self {
        self.invoice_id = invoice_id;
        self
    }

    /// Sets the gateway name
    pub fn with_gateway(mut self, gateway: impl Into<String>) -> Self {
        self.gateway = gateway.into();
        self
    }

    /// Sets the gateway reference
    pub fn with_external_ref(mut self, external_ref: impl Into<String>) -> Self {
        self.external_ref = external_ref.into();
        self
    }

    /// Sets the amount
    pub fn with_amount(mut self, amount: Money) -> Self {
        self.amount = amount;
        self
    }

    /// Builds a successful transaction
    pub fn build(self) -> PaymentTransaction {
        PaymentTransaction::successful(
            self.invoice_id,
            self.gateway,
            self.external_ref,
            self.amount,
            None,
        )
    }

    /// Builds a pending transaction awaiting gateway confirmation
    pub fn build_pending(self) -> PaymentTransaction {
        PaymentTransaction::pending(self.invoice_id, self.gateway, self.external_ref, self.amount)
    }
}

/// Builder for constructing client summaries
///
/// Name and email default to realistic fake values so bulk test data
/// stays distinguishable in failure output.
pub struct ClientBuilder {
    id: ClientId,
    name: Option<String>,
    email: Option<String>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientBuilder {
    /// Creates a new builder with a random client ID
    pub fn new() -> Self {
        Self {
            id: ClientId::new_v7(),
            name: None,
            email: None,
        }
    }

    /// Sets the client ID
    pub fn with_id(mut self, id: ClientId) -> Self {
        self.id = id;
        self
    }

    /// Sets the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the email address
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Builds the client summary
    pub fn build(self) -> ClientSummary {
        ClientSummary {
            id: self.id,
            name: self.name.unwrap_or_else(|| CompanyName().fake()),
            email: self.email.unwrap_or_else(|| SafeEmail().fake()),
        }
    }
}
