//! Ports required by the settlement engines
//!
//! Two kinds of ports live here. The [`SettlementStore`] is the storage
//! facade: it loads everything an engine run needs in one consistent view
//! and persists the whole outcome in one transaction. The collaborator
//! ports ([`NotificationSink`], [`Mailer`], [`GatewayClient`], ...) carry
//! post-commit side effects and are always dispatched fire-and-forget.
//!
//! Adapters: `infra_db` implements the store against PostgreSQL; the
//! interface layer implements the collaborators; tests use in-memory
//! doubles for both.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use core_kernel::{
    BillableItemId, ClientId, DomainPort, InvoiceId, Money, PortError, RefundId, ServiceId,
    TransactionId,
};
use domain_billing::{
    BillableItem, CommissionEntry, Investor, Invoice, LineTarget, PaymentTransaction, Refund,
};
use domain_provisioning::{DomainName, Order, Service};

/// The client fields settlement needs for receipts and notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSummary {
    pub id: ClientId,
    pub name: String,
    pub email: String,
}

/// Severity attached to client notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationSeverity {
    Info,
    Success,
    Warning,
}

/// An attachment carried by an outgoing mail.
#[derive(Debug, Clone)]
pub struct MailAttachment {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Delivers in-app notifications to clients.
#[async_trait]
pub trait NotificationSink: DomainPort {
    async fn notify(
        &self,
        client_id: ClientId,
        subject: &str,
        body: &str,
        severity: NotificationSeverity,
    ) -> Result<(), PortError>;
}

/// Renders billing documents (receipts) to bytes.
#[async_trait]
pub trait DocumentRenderer: DomainPort {
    async fn render_receipt(
        &self,
        invoice: &Invoice,
        transaction: &PaymentTransaction,
        client: &ClientSummary,
    ) -> Result<Vec<u8>, PortError>;
}

/// Sends outbound mail.
#[async_trait]
pub trait Mailer: DomainPort {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        attachment: Option<MailAttachment>,
    ) -> Result<(), PortError>;
}

/// Fans events out to registered webhook endpoints.
#[async_trait]
pub trait WebhookFanout: DomainPort {
    async fn emit(&self, event: &str, payload: serde_json::Value) -> Result<(), PortError>;
}

/// A payment gateway integration.
#[async_trait]
pub trait GatewayClient: DomainPort {
    /// Gateway name as recorded on transactions.
    fn name(&self) -> &str;

    /// True if the gateway can push money back to the payer.
    fn supports_refunds(&self) -> bool;

    /// Starts a checkout for the invoice, returning the redirect URL.
    async fn init_payment(
        &self,
        invoice: &Invoice,
        client: &ClientSummary,
    ) -> Result<String, PortError>;

    /// Pushes a completed refund back through the gateway.
    async fn refund(&self, external_ref: &str, amount: &Money) -> Result<(), PortError>;
}

/// Everything `record_payment` reads, loaded under lock in one storage
/// transaction.
#[derive(Debug, Clone)]
pub struct SettlementView {
    pub invoice: Invoice,
    pub client: ClientSummary,
    /// The order this invoice bills, if any.
    pub order: Option<Order>,
    /// Services referenced by the invoice lines or the order items.
    pub services: Vec<Service>,
    /// Domains referenced by the invoice lines or the order items.
    pub domains: Vec<DomainName>,
    /// Every investor on file; the engine skips inactive ones.
    pub investors: Vec<Investor>,
}

/// Everything `record_payment` writes. Persisted atomically; the adapter
/// enforces the invoice version and the external reference uniqueness
/// inside the same transaction.
#[derive(Debug, Clone)]
pub struct SettlementBatch {
    pub invoice: Invoice,
    pub transaction: PaymentTransaction,
    /// Present only when the order changed (completed this settlement).
    pub order: Option<Order>,
    /// Only services that changed.
    pub services: Vec<Service>,
    /// Only domains that changed.
    pub domains: Vec<DomainName>,
    /// Only investors whose balances moved.
    pub investors: Vec<Investor>,
    pub commission_entries: Vec<CommissionEntry>,
}

/// Everything one consolidation run reads for a client.
#[derive(Debug, Clone)]
pub struct ConsolidationView {
    pub client: ClientSummary,
    /// Unpaid, non-deleted invoices for the client, oldest first.
    /// Includes order-backed invoices so already-billed renewals can be
    /// detected; the first order-less one is the hub candidate.
    pub open_invoices: Vec<Invoice>,
    /// The requested service targets.
    pub services: Vec<Service>,
    /// The requested domain targets.
    pub domains: Vec<DomainName>,
}

/// Everything one consolidation run writes.
#[derive(Debug, Clone)]
pub struct ConsolidationBatch {
    pub hub: Invoice,
    /// True when the hub was created by this run and must be inserted.
    pub hub_created: bool,
    /// Donor invoices folded into the hub; persisted soft-deleted with
    /// every line moved onto the hub.
    pub folded: Vec<Invoice>,
}

/// Everything the refund workflow reads about one transaction.
#[derive(Debug, Clone)]
pub struct RefundView {
    pub transaction: PaymentTransaction,
    pub invoice: Invoice,
    pub client: ClientSummary,
    /// Every refund ever requested against the transaction.
    pub refunds: Vec<Refund>,
}

/// Everything a completed refund writes.
#[derive(Debug, Clone)]
pub struct RefundCompletionBatch {
    pub refund: Refund,
    /// The negative reversal transaction.
    pub reversal: PaymentTransaction,
    pub invoice: Invoice,
}

/// The billing source a generated invoice advances.
#[derive(Debug, Clone)]
pub enum GeneratorSource {
    Service(Service),
    Billable(BillableItem),
}

/// One generated invoice plus its advanced source, persisted atomically.
#[derive(Debug, Clone)]
pub struct GeneratedInvoiceBatch {
    pub invoice: Invoice,
    pub source: GeneratorSource,
}

/// Storage facade for the settlement engines.
///
/// `load_*` methods read a consistent snapshot, locking the rows the
/// matching `commit_*` will write. `commit_*` methods persist a whole
/// engine outcome in one transaction and surface conflicts through
/// [`PortError::Conflict`]: duplicate entries mean the work was already
/// done, concurrent updates mean the caller should reload and retry.
#[async_trait]
pub trait SettlementStore: DomainPort {
    async fn load_settlement_view(&self, invoice_id: InvoiceId)
        -> Result<SettlementView, PortError>;

    async fn commit_settlement(&self, batch: SettlementBatch) -> Result<(), PortError>;

    async fn load_consolidation_view(
        &self,
        client_id: ClientId,
        targets: &[LineTarget],
    ) -> Result<ConsolidationView, PortError>;

    async fn commit_consolidation(&self, batch: ConsolidationBatch) -> Result<(), PortError>;

    async fn get_refund(&self, refund_id: RefundId) -> Result<Refund, PortError>;

    async fn load_refund_view(
        &self,
        transaction_id: TransactionId,
    ) -> Result<RefundView, PortError>;

    async fn insert_refund(&self, refund: &Refund) -> Result<(), PortError>;

    async fn update_refund(&self, refund: &Refund) -> Result<(), PortError>;

    async fn commit_refund_completion(
        &self,
        batch: RefundCompletionBatch,
    ) -> Result<(), PortError>;

    /// Active services whose next due date is on or before `today`.
    async fn due_services(&self, today: NaiveDate) -> Result<Vec<Service>, PortError>;

    /// Billable items due for invoicing on or before `today`.
    async fn due_billable_items(&self, today: NaiveDate) -> Result<Vec<BillableItem>, PortError>;

    /// Active services due within `horizon_days` of `today`.
    async fn expiring_services(
        &self,
        today: NaiveDate,
        horizon_days: i64,
    ) -> Result<Vec<Service>, PortError>;

    /// Active domains expiring within `horizon_days` of `today`.
    async fn expiring_domains(
        &self,
        today: NaiveDate,
        horizon_days: i64,
    ) -> Result<Vec<DomainName>, PortError>;

    /// True if an unpaid or partially paid invoice already bills the
    /// service.
    async fn has_open_invoice_for_service(
        &self,
        service_id: ServiceId,
    ) -> Result<bool, PortError>;

    /// True if an unpaid or partially paid invoice already bills the
    /// billable item.
    async fn has_open_invoice_for_billable(
        &self,
        billable_id: BillableItemId,
    ) -> Result<bool, PortError>;

    async fn get_client(&self, client_id: ClientId) -> Result<ClientSummary, PortError>;

    async fn commit_generated_invoice(
        &self,
        batch: GeneratedInvoiceBatch,
    ) -> Result<(), PortError>;
}
