//! Shared in-memory doubles for the settlement engine tests.
//!
//! `InMemoryStore` mimics the PostgreSQL adapter's contract: commits are
//! atomic against the held state, a reused external reference surfaces
//! as a duplicate conflict, and injected conflicts simulate concurrent
//! writers for the retry paths. The recorder ports capture side effect
//! deliveries for assertions.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;

use core_kernel::{
    BillableItemId, ClientId, Currency, DomainId, DomainPort, InvoiceId, Money, PortError, Rate,
    RefundId, ServiceId, TransactionId,
};
use domain_billing::{
    BillableItem, CommissionEntry, Investor, Invoice, InvoiceStatus, LineTarget,
    PaymentTransaction, Refund,
};
use domain_provisioning::{DomainName, Order, Service};
use domain_settlement::{
    CatalogPricing, ClientSummary, ConsolidationBatch, ConsolidationView, DocumentRenderer,
    GatewayClient, GeneratedInvoiceBatch, GeneratorSource, MailAttachment, Mailer,
    NotificationSeverity, NotificationSink, RefundCompletionBatch, RefundView, SettlementBatch,
    SettlementStore, SettlementView, StaticSettings, WebhookFanout,
};

pub fn bdt(amount: Decimal) -> Money {
    Money::new(amount, Currency::BDT)
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// Installation settings used across the engine tests: 15% VAT in BDT.
pub fn settings() -> Arc<StaticSettings> {
    Arc::new(StaticSettings::default())
}

/// Pricing catalog with a couple of TLDs; anything else prices at zero.
pub fn pricing() -> Arc<CatalogPricing> {
    Arc::new(
        CatalogPricing::new(Currency::BDT)
            .with_tld("com", dec!(1200))
            .with_tld("com.bd", dec!(1800)),
    )
}

/// An invoice with a single plain line and no tax, for settlement math
/// that should stay readable.
pub fn flat_invoice(client_id: ClientId, amount: Money) -> Invoice {
    let mut invoice = Invoice::new(
        client_id,
        chrono::Utc::now().date_naive(),
        amount.currency(),
        Rate::from_percentage(dec!(0)),
    );
    invoice
        .add_item(domain_billing::InvoiceItem::new("Service charge", amount))
        .unwrap();
    invoice.take_events();
    invoice
}

#[derive(Default)]
pub struct StoreState {
    pub clients: HashMap<ClientId, ClientSummary>,
    pub invoices: HashMap<InvoiceId, Invoice>,
    pub transactions: HashMap<TransactionId, PaymentTransaction>,
    pub refunds: HashMap<RefundId, Refund>,
    pub orders: HashMap<core_kernel::OrderId, Order>,
    pub services: HashMap<ServiceId, Service>,
    pub domains: HashMap<DomainId, DomainName>,
    pub billables: HashMap<BillableItemId, BillableItem>,
    pub investors: Vec<Investor>,
    pub commission_entries: Vec<CommissionEntry>,
}

#[derive(Default)]
pub struct InMemoryStore {
    pub state: Mutex<StoreState>,
    conflicts_to_inject: Mutex<u32>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_client(&self, name: &str, email: &str) -> ClientId {
        let id = ClientId::new();
        self.state.lock().unwrap().clients.insert(
            id,
            ClientSummary {
                id,
                name: name.to_string(),
                email: email.to_string(),
            },
        );
        id
    }

    pub fn insert_invoice(&self, invoice: Invoice) {
        self.state.lock().unwrap().invoices.insert(invoice.id, invoice);
    }

    pub fn insert_transaction(&self, transaction: PaymentTransaction) {
        self.state
            .lock()
            .unwrap()
            .transactions
            .insert(transaction.id, transaction);
    }

    pub fn insert_refund_row(&self, refund: Refund) {
        self.state.lock().unwrap().refunds.insert(refund.id, refund);
    }

    pub fn insert_order(&self, order: Order) {
        self.state.lock().unwrap().orders.insert(order.id, order);
    }

    pub fn insert_service(&self, service: Service) {
        self.state.lock().unwrap().services.insert(service.id, service);
    }

    pub fn insert_domain(&self, domain: DomainName) {
        self.state.lock().unwrap().domains.insert(domain.id, domain);
    }

    pub fn insert_billable(&self, item: BillableItem) {
        self.state.lock().unwrap().billables.insert(item.id, item);
    }

    pub fn insert_investor(&self, investor: Investor) {
        self.state.lock().unwrap().investors.push(investor);
    }

    /// The next `count` commits fail with a concurrent-update conflict.
    pub fn inject_conflicts(&self, count: u32) {
        *self.conflicts_to_inject.lock().unwrap() = count;
    }

    pub fn invoice(&self, id: InvoiceId) -> Invoice {
        self.state.lock().unwrap().invoices[&id].clone()
    }

    pub fn service(&self, id: ServiceId) -> Service {
        self.state.lock().unwrap().services[&id].clone()
    }

    pub fn domain(&self, id: DomainId) -> DomainName {
        self.state.lock().unwrap().domains[&id].clone()
    }

    pub fn order(&self, id: core_kernel::OrderId) -> Order {
        self.state.lock().unwrap().orders[&id].clone()
    }

    pub fn billable(&self, id: BillableItemId) -> BillableItem {
        self.state.lock().unwrap().billables[&id].clone()
    }

    pub fn refund(&self, id: RefundId) -> Refund {
        self.state.lock().unwrap().refunds[&id].clone()
    }

    pub fn refunds_for(&self, transaction_id: TransactionId) -> Vec<Refund> {
        self.state
            .lock()
            .unwrap()
            .refunds
            .values()
            .filter(|refund| refund.transaction_id == transaction_id)
            .cloned()
            .collect()
    }

    pub fn transaction_count(&self) -> usize {
        self.state.lock().unwrap().transactions.len()
    }

    pub fn invoice_count(&self) -> usize {
        self.state.lock().unwrap().invoices.len()
    }

    pub fn commission_entries(&self) -> Vec<CommissionEntry> {
        self.state.lock().unwrap().commission_entries.clone()
    }

    pub fn investors(&self) -> Vec<Investor> {
        self.state.lock().unwrap().investors.clone()
    }

    fn take_injected_conflict(&self) -> bool {
        let mut remaining = self.conflicts_to_inject.lock().unwrap();
        if *remaining > 0 {
            *remaining -= 1;
            true
        } else {
            false
        }
    }

    fn client_of(state: &StoreState, client_id: ClientId) -> Result<ClientSummary, PortError> {
        state
            .clients
            .get(&client_id)
            .cloned()
            .ok_or_else(|| PortError::not_found("Client", client_id))
    }
}

impl DomainPort for InMemoryStore {}

#[async_trait]
impl SettlementStore for InMemoryStore {
    async fn load_settlement_view(
        &self,
        invoice_id: InvoiceId,
    ) -> Result<SettlementView, PortError> {
        let state = self.state.lock().unwrap();
        let invoice = state
            .invoices
            .get(&invoice_id)
            .cloned()
            .ok_or_else(|| PortError::not_found("Invoice", invoice_id))?;
        let client = Self::client_of(&state, invoice.client_id)?;
        let order = invoice
            .order_id
            .and_then(|order_id| state.orders.get(&order_id).cloned());

        let mut service_ids: Vec<ServiceId> =
            invoice.items.iter().filter_map(|item| item.service_id).collect();
        let mut domain_ids: Vec<DomainId> =
            invoice.items.iter().filter_map(|item| item.domain_id).collect();
        if let Some(order) = &order {
            service_ids.extend(order.items.iter().filter_map(|item| item.service_id));
            domain_ids.extend(order.items.iter().filter_map(|item| item.domain_id));
        }

        let services = service_ids
            .iter()
            .filter_map(|id| state.services.get(id).cloned())
            .collect();
        let domains = domain_ids
            .iter()
            .filter_map(|id| state.domains.get(id).cloned())
            .collect();

        Ok(SettlementView {
            invoice,
            client,
            order,
            services,
            domains,
            investors: state.investors.clone(),
        })
    }

    async fn commit_settlement(&self, batch: SettlementBatch) -> Result<(), PortError> {
        if self.take_injected_conflict() {
            return Err(PortError::concurrent("invoice version changed"));
        }
        let mut state = self.state.lock().unwrap();
        if state
            .transactions
            .values()
            .any(|txn| txn.external_ref == batch.transaction.external_ref)
        {
            return Err(PortError::duplicate(format!(
                "external reference {} already recorded",
                batch.transaction.external_ref
            )));
        }

        state
            .transactions
            .insert(batch.transaction.id, batch.transaction);
        state.invoices.insert(batch.invoice.id, batch.invoice);
        if let Some(order) = batch.order {
            state.orders.insert(order.id, order);
        }
        for service in batch.services {
            state.services.insert(service.id, service);
        }
        for domain in batch.domains {
            state.domains.insert(domain.id, domain);
        }
        for investor in batch.investors {
            if let Some(existing) = state
                .investors
                .iter_mut()
                .find(|row| row.id == investor.id)
            {
                *existing = investor;
            }
        }
        state.commission_entries.extend(batch.commission_entries);
        Ok(())
    }

    async fn load_consolidation_view(
        &self,
        client_id: ClientId,
        targets: &[LineTarget],
    ) -> Result<ConsolidationView, PortError> {
        let state = self.state.lock().unwrap();
        let client = Self::client_of(&state, client_id)?;

        let mut open_invoices: Vec<Invoice> = state
            .invoices
            .values()
            .filter(|invoice| {
                invoice.client_id == client_id
                    && !invoice.deleted
                    && invoice.status == InvoiceStatus::Unpaid
            })
            .cloned()
            .collect();
        open_invoices.sort_by_key(|invoice| invoice.created_at);

        let mut services = Vec::new();
        let mut domains = Vec::new();
        for target in targets {
            match target {
                LineTarget::Service(id) => {
                    let service = state
                        .services
                        .get(id)
                        .cloned()
                        .ok_or_else(|| PortError::not_found("Service", id))?;
                    services.push(service);
                }
                LineTarget::Domain(id) => {
                    let domain = state
                        .domains
                        .get(id)
                        .cloned()
                        .ok_or_else(|| PortError::not_found("Domain", id))?;
                    domains.push(domain);
                }
            }
        }

        Ok(ConsolidationView {
            client,
            open_invoices,
            services,
            domains,
        })
    }

    async fn commit_consolidation(&self, batch: ConsolidationBatch) -> Result<(), PortError> {
        if self.take_injected_conflict() {
            return Err(PortError::concurrent("invoice version changed"));
        }
        let mut state = self.state.lock().unwrap();
        state.invoices.insert(batch.hub.id, batch.hub);
        for folded in batch.folded {
            state.invoices.insert(folded.id, folded);
        }
        Ok(())
    }

    async fn get_refund(&self, refund_id: RefundId) -> Result<Refund, PortError> {
        self.state
            .lock()
            .unwrap()
            .refunds
            .get(&refund_id)
            .cloned()
            .ok_or_else(|| PortError::not_found("Refund", refund_id))
    }

    async fn load_refund_view(
        &self,
        transaction_id: TransactionId,
    ) -> Result<RefundView, PortError> {
        let state = self.state.lock().unwrap();
        let transaction = state
            .transactions
            .get(&transaction_id)
            .cloned()
            .ok_or_else(|| PortError::not_found("Transaction", transaction_id))?;
        let invoice = state
            .invoices
            .get(&transaction.invoice_id)
            .cloned()
            .ok_or_else(|| PortError::not_found("Invoice", transaction.invoice_id))?;
        let client = Self::client_of(&state, invoice.client_id)?;
        let refunds = state
            .refunds
            .values()
            .filter(|refund| refund.transaction_id == transaction_id)
            .cloned()
            .collect();

        Ok(RefundView {
            transaction,
            invoice,
            client,
            refunds,
        })
    }

    async fn insert_refund(&self, refund: &Refund) -> Result<(), PortError> {
        let mut state = self.state.lock().unwrap();
        if state.refunds.contains_key(&refund.id) {
            return Err(PortError::duplicate(format!(
                "refund {} already exists",
                refund.id
            )));
        }
        state.refunds.insert(refund.id, refund.clone());
        Ok(())
    }

    async fn update_refund(&self, refund: &Refund) -> Result<(), PortError> {
        let mut state = self.state.lock().unwrap();
        if !state.refunds.contains_key(&refund.id) {
            return Err(PortError::not_found("Refund", refund.id));
        }
        state.refunds.insert(refund.id, refund.clone());
        Ok(())
    }

    async fn commit_refund_completion(
        &self,
        batch: RefundCompletionBatch,
    ) -> Result<(), PortError> {
        if self.take_injected_conflict() {
            return Err(PortError::concurrent("invoice version changed"));
        }
        let mut state = self.state.lock().unwrap();
        // The production adapter updates the refund row in place and
        // re-verifies the ceiling under its sibling lock; mirror both.
        if !state.refunds.contains_key(&batch.refund.id) {
            return Err(PortError::not_found("Refund", batch.refund.id));
        }
        let captured = state
            .transactions
            .get(&batch.refund.transaction_id)
            .cloned()
            .ok_or_else(|| PortError::not_found("Transaction", batch.refund.transaction_id))?;
        let committed: Decimal = state
            .refunds
            .values()
            .filter(|sibling| {
                sibling.transaction_id == batch.refund.transaction_id
                    && sibling.id != batch.refund.id
                    && sibling.counts_against_ceiling()
            })
            .map(|sibling| sibling.amount.amount())
            .sum();
        if committed + batch.refund.amount.amount() > captured.amount.amount() {
            return Err(PortError::concurrent(format!(
                "refund ceiling for transaction {} consumed by a concurrent refund",
                batch.refund.transaction_id
            )));
        }
        if state
            .transactions
            .values()
            .any(|txn| txn.external_ref == batch.reversal.external_ref)
        {
            return Err(PortError::duplicate(format!(
                "external reference {} already recorded",
                batch.reversal.external_ref
            )));
        }
        state.refunds.insert(batch.refund.id, batch.refund);
        state.transactions.insert(batch.reversal.id, batch.reversal);
        state.invoices.insert(batch.invoice.id, batch.invoice);
        Ok(())
    }

    async fn due_services(&self, today: NaiveDate) -> Result<Vec<Service>, PortError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .services
            .values()
            .filter(|service| service.is_due(today))
            .cloned()
            .collect())
    }

    async fn due_billable_items(&self, today: NaiveDate) -> Result<Vec<BillableItem>, PortError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .billables
            .values()
            .filter(|item| item.is_due(today))
            .cloned()
            .collect())
    }

    async fn expiring_services(
        &self,
        today: NaiveDate,
        horizon_days: i64,
    ) -> Result<Vec<Service>, PortError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .services
            .values()
            .filter(|service| service.due_within(today, horizon_days))
            .cloned()
            .collect())
    }

    async fn expiring_domains(
        &self,
        today: NaiveDate,
        horizon_days: i64,
    ) -> Result<Vec<DomainName>, PortError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .domains
            .values()
            .filter(|domain| domain.expires_within(today, horizon_days))
            .cloned()
            .collect())
    }

    async fn has_open_invoice_for_service(
        &self,
        service_id: ServiceId,
    ) -> Result<bool, PortError> {
        Ok(self.state.lock().unwrap().invoices.values().any(|invoice| {
            !invoice.deleted
                && matches!(
                    invoice.status,
                    InvoiceStatus::Unpaid | InvoiceStatus::PartiallyPaid
                )
                && invoice.has_line_for_service(service_id)
        }))
    }

    async fn has_open_invoice_for_billable(
        &self,
        billable_id: BillableItemId,
    ) -> Result<bool, PortError> {
        Ok(self.state.lock().unwrap().invoices.values().any(|invoice| {
            !invoice.deleted
                && matches!(
                    invoice.status,
                    InvoiceStatus::Unpaid | InvoiceStatus::PartiallyPaid
                )
                && invoice
                    .items
                    .iter()
                    .any(|item| item.billable_id == Some(billable_id))
        }))
    }

    async fn get_client(&self, client_id: ClientId) -> Result<ClientSummary, PortError> {
        let state = self.state.lock().unwrap();
        Self::client_of(&state, client_id)
    }

    async fn commit_generated_invoice(
        &self,
        batch: GeneratedInvoiceBatch,
    ) -> Result<(), PortError> {
        if self.take_injected_conflict() {
            return Err(PortError::concurrent("source row changed"));
        }
        let mut state = self.state.lock().unwrap();
        state.invoices.insert(batch.invoice.id, batch.invoice);
        match batch.source {
            GeneratorSource::Service(service) => {
                state.services.insert(service.id, service);
            }
            GeneratorSource::Billable(item) => {
                state.billables.insert(item.id, item);
            }
        }
        Ok(())
    }
}

// ==================== Recorder collaborator ports ====================

#[derive(Default)]
pub struct RecordingSink {
    pub notifications: Mutex<Vec<(ClientId, String, NotificationSeverity)>>,
}

impl DomainPort for RecordingSink {}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(
        &self,
        client_id: ClientId,
        subject: &str,
        _body: &str,
        severity: NotificationSeverity,
    ) -> Result<(), PortError> {
        self.notifications
            .lock()
            .unwrap()
            .push((client_id, subject.to_string(), severity));
        Ok(())
    }
}

pub struct StubRenderer;

impl DomainPort for StubRenderer {}

#[async_trait]
impl DocumentRenderer for StubRenderer {
    async fn render_receipt(
        &self,
        _invoice: &Invoice,
        _transaction: &PaymentTransaction,
        _client: &ClientSummary,
    ) -> Result<Vec<u8>, PortError> {
        Ok(b"%PDF-1.7 receipt".to_vec())
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<(String, String, bool)>>,
}

impl DomainPort for RecordingMailer {}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        _body: &str,
        attachment: Option<MailAttachment>,
    ) -> Result<(), PortError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), subject.to_string(), attachment.is_some()));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingWebhooks {
    pub events: Mutex<Vec<(String, serde_json::Value)>>,
}

impl DomainPort for RecordingWebhooks {}

#[async_trait]
impl WebhookFanout for RecordingWebhooks {
    async fn emit(&self, event: &str, payload: serde_json::Value) -> Result<(), PortError> {
        self.events
            .lock()
            .unwrap()
            .push((event.to_string(), payload));
        Ok(())
    }
}

pub struct StubGateway {
    pub gateway_name: String,
    pub refunds_supported: bool,
    pub refunds: Mutex<Vec<(String, Money)>>,
}

impl StubGateway {
    pub fn new(name: &str, refunds_supported: bool) -> Self {
        Self {
            gateway_name: name.to_string(),
            refunds_supported,
            refunds: Mutex::new(Vec::new()),
        }
    }
}

impl DomainPort for StubGateway {}

#[async_trait]
impl GatewayClient for StubGateway {
    fn name(&self) -> &str {
        &self.gateway_name
    }

    fn supports_refunds(&self) -> bool {
        self.refunds_supported
    }

    async fn init_payment(
        &self,
        invoice: &Invoice,
        _client: &ClientSummary,
    ) -> Result<String, PortError> {
        Ok(format!("https://pay.example/{}", invoice.number))
    }

    async fn refund(&self, external_ref: &str, amount: &Money) -> Result<(), PortError> {
        self.refunds
            .lock()
            .unwrap()
            .push((external_ref.to_string(), *amount));
        Ok(())
    }
}
