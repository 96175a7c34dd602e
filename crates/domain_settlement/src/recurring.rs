//! Recurring charge generation and renewal sweeps
//!
//! Two scheduled entry points live here. The recurring sweep turns due
//! services and billable items into fresh invoices, advancing each
//! source one cycle so the next sweep picks it up again a period later.
//! The renewal sweep looks ahead instead: it collects services and
//! domains approaching expiry and hands them, grouped per client, to the
//! consolidation engine.
//!
//! Generated recurring lines carry no renewal metadata: the billing date
//! moves at generation time, so settling the invoice later must not move
//! it again. One failing source never aborts a sweep; it is recorded and
//! the sweep moves on.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use tracing::{debug, info, instrument, warn};

use core_kernel::{BillableItemId, ClientId, InvoiceId, Money, ServiceId};
use domain_billing::{BillableItem, Invoice, InvoiceItem};
use domain_provisioning::Service;
use serde_json::json;

use crate::consolidation::{ConsolidationEngine, ConsolidationOutcome, RenewalItem};
use crate::effects::SideEffect;
use crate::error::SettlementError;
use crate::ports::{
    GeneratedInvoiceBatch, GeneratorSource, NotificationSeverity, SettlementStore,
};
use crate::settings::SettingsLookup;

/// Summary of one invoice produced by the recurring sweep.
#[derive(Debug, Clone)]
pub struct GeneratedInvoice {
    pub invoice_id: InvoiceId,
    pub number: String,
    pub client_id: ClientId,
    pub total: Money,
    pub due_date: NaiveDate,
}

/// What one recurring sweep did.
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    pub generated: Vec<GeneratedInvoice>,
    /// Services left alone because an open invoice already bills them.
    pub skipped_services: Vec<ServiceId>,
    /// Billable items left alone for the same reason.
    pub skipped_billables: Vec<BillableItemId>,
    /// Sources that could not be invoiced; the sweep continued past
    /// them.
    pub failures: Vec<String>,
    side_effects: Vec<SideEffect>,
}

impl SweepReport {
    /// Hands over the accumulated side effects for one dispatch pass.
    pub fn take_side_effects(&mut self) -> Vec<SideEffect> {
        std::mem::take(&mut self.side_effects)
    }
}

/// One client's consolidation outcome from a renewal sweep.
#[derive(Debug, Clone)]
pub struct ClientRenewals {
    pub client_id: ClientId,
    pub outcome: ConsolidationOutcome,
}

/// What one renewal sweep did.
#[derive(Debug, Clone, Default)]
pub struct RenewalSweepReport {
    pub clients: Vec<ClientRenewals>,
    pub failures: Vec<String>,
}

impl RenewalSweepReport {
    /// Hands over every per-client side effect for one dispatch pass.
    pub fn take_side_effects(&mut self) -> Vec<SideEffect> {
        self.clients
            .iter_mut()
            .flat_map(|client| std::mem::take(&mut client.outcome.side_effects))
            .collect()
    }
}

/// Generates recurring invoices and drives renewal consolidation.
pub struct RecurringChargeGenerator {
    store: Arc<dyn SettlementStore>,
    settings: Arc<dyn SettingsLookup>,
    consolidation: Arc<ConsolidationEngine>,
}

impl RecurringChargeGenerator {
    pub fn new(
        store: Arc<dyn SettlementStore>,
        settings: Arc<dyn SettingsLookup>,
        consolidation: Arc<ConsolidationEngine>,
    ) -> Self {
        Self {
            store,
            settings,
            consolidation,
        }
    }

    /// Invoices every due service and billable item.
    ///
    /// A source already referenced by an unpaid invoice is skipped;
    /// generating again would double-bill the same period.
    #[instrument(skip(self), fields(%today))]
    pub async fn run_recurring_sweep(
        &self,
        today: NaiveDate,
    ) -> Result<SweepReport, SettlementError> {
        let mut report = SweepReport::default();

        for mut service in self.store.due_services(today).await? {
            if self.store.has_open_invoice_for_service(service.id).await? {
                debug!(service_id = %service.id, "open invoice already bills service, skipping");
                report.skipped_services.push(service.id);
                continue;
            }
            match self.invoice_service(&mut service).await {
                Ok((generated, side_effects)) => {
                    report.generated.push(generated);
                    report.side_effects.extend(side_effects);
                }
                Err(error) => {
                    warn!(service_id = %service.id, %error, "could not invoice service");
                    report.failures.push(format!("service {}: {error}", service.id));
                }
            }
        }

        for mut item in self.store.due_billable_items(today).await? {
            if self.store.has_open_invoice_for_billable(item.id).await? {
                debug!(billable_id = %item.id, "open invoice already bills item, skipping");
                report.skipped_billables.push(item.id);
                continue;
            }
            match self.invoice_billable(&mut item, today).await {
                Ok((generated, side_effects)) => {
                    report.generated.push(generated);
                    report.side_effects.extend(side_effects);
                }
                Err(error) => {
                    warn!(billable_id = %item.id, %error, "could not invoice billable item");
                    report.failures.push(format!("billable {}: {error}", item.id));
                }
            }
        }

        info!(
            generated = report.generated.len(),
            skipped = report.skipped_services.len() + report.skipped_billables.len(),
            failures = report.failures.len(),
            "recurring sweep finished"
        );
        Ok(report)
    }

    /// Consolidates everything expiring within `horizon_days` onto each
    /// client's hub invoice.
    ///
    /// Services renew for one billing cycle; domains renew for their
    /// registered term. One failing client never aborts the sweep.
    #[instrument(skip(self), fields(%today, horizon_days))]
    pub async fn run_renewal_sweep(
        &self,
        today: NaiveDate,
        horizon_days: i64,
    ) -> Result<RenewalSweepReport, SettlementError> {
        let mut per_client: HashMap<ClientId, Vec<RenewalItem>> = HashMap::new();

        for service in self.store.expiring_services(today, horizon_days).await? {
            per_client
                .entry(service.client_id)
                .or_default()
                .push(RenewalItem::service(service.id, 1));
        }
        for domain in self.store.expiring_domains(today, horizon_days).await? {
            per_client
                .entry(domain.client_id)
                .or_default()
                .push(RenewalItem::domain(domain.id, domain.registration_years.max(1)));
        }

        let mut report = RenewalSweepReport::default();
        for (client_id, items) in per_client {
            match self.consolidation.consolidate(client_id, &items, today).await {
                Ok(outcome) => {
                    report.clients.push(ClientRenewals { client_id, outcome });
                }
                Err(error) => {
                    warn!(%client_id, %error, "renewal consolidation failed for client");
                    report.failures.push(format!("client {client_id}: {error}"));
                }
            }
        }

        info!(
            clients = report.clients.len(),
            failures = report.failures.len(),
            "renewal sweep finished"
        );
        Ok(report)
    }

    async fn invoice_service(
        &self,
        service: &mut Service,
    ) -> Result<(GeneratedInvoice, Vec<SideEffect>), SettlementError> {
        let period_start = service.next_due_date;
        let period_end = service.billing_cycle.next(period_start) - Duration::days(1);

        let mut invoice = Invoice::new(
            service.client_id,
            period_start,
            self.settings.currency(),
            self.settings.tax_rate(),
        );
        invoice.add_item(InvoiceItem::for_service(
            format!("{} ({} - {})", service.name, period_start, period_end),
            service.recurring_amount,
            service.id,
        ))?;

        service.advance_billing_date();

        for event in invoice.take_events() {
            debug!(event = event.event_type(), invoice_id = %invoice.id, "billing event");
        }
        let batch = GeneratedInvoiceBatch {
            invoice: invoice.clone(),
            source: GeneratorSource::Service(service.clone()),
        };
        self.store.commit_generated_invoice(batch).await?;

        info!(
            invoice = %invoice.number,
            service_id = %service.id,
            total = %invoice.total,
            due = %invoice.due_date,
            "recurring invoice generated"
        );
        Ok(self.generated(invoice))
    }

    async fn invoice_billable(
        &self,
        item: &mut BillableItem,
        today: NaiveDate,
    ) -> Result<(GeneratedInvoice, Vec<SideEffect>), SettlementError> {
        let due_date = item.next_invoice_date.unwrap_or(today);

        let mut invoice = Invoice::new(
            item.client_id,
            due_date,
            self.settings.currency(),
            self.settings.tax_rate(),
        );
        invoice.add_item(InvoiceItem::for_billable(
            item.description.clone(),
            item.amount,
            item.id,
        ))?;

        item.mark_invoiced();

        for event in invoice.take_events() {
            debug!(event = event.event_type(), invoice_id = %invoice.id, "billing event");
        }
        let batch = GeneratedInvoiceBatch {
            invoice: invoice.clone(),
            source: GeneratorSource::Billable(item.clone()),
        };
        self.store.commit_generated_invoice(batch).await?;

        info!(
            invoice = %invoice.number,
            billable_id = %item.id,
            total = %invoice.total,
            due = %invoice.due_date,
            "billable item invoiced"
        );
        Ok(self.generated(invoice))
    }

    fn generated(&self, invoice: Invoice) -> (GeneratedInvoice, Vec<SideEffect>) {
        let client_id = invoice.client_id;
        let side_effects = vec![
            SideEffect::Notify {
                client_id,
                subject: format!("New invoice {}", invoice.number),
                body: format!(
                    "{} has issued invoice {} for {}, due {}.",
                    self.settings.app_name(),
                    invoice.number,
                    invoice.total,
                    invoice.due_date
                ),
                severity: NotificationSeverity::Info,
            },
            SideEffect::EmitWebhook {
                event: "invoice.generated".to_string(),
                payload: json!({
                    "invoice_id": invoice.id,
                    "invoice_number": invoice.number,
                    "client_id": client_id,
                    "total": invoice.total,
                    "due_date": invoice.due_date,
                }),
            },
        ];
        let generated = GeneratedInvoice {
            invoice_id: invoice.id,
            number: invoice.number,
            client_id,
            total: invoice.total,
            due_date: invoice.due_date,
        };
        (generated, side_effects)
    }
}
