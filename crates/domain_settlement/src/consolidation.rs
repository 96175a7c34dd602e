//! Renewal consolidation engine
//!
//! Gathers a client's upcoming renewals onto one open invoice (the hub)
//! instead of raising a separate invoice per item. The hub is the
//! client's oldest unpaid order-less invoice; one is created only when a
//! run actually lands a new line. Renewal lines already billed elsewhere
//! are adopted or skipped so repeated runs never bill the same renewal
//! twice. Folding a donor carries every charge still on it over to the
//! hub; soft-deletion never voids a receivable.

use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use core_kernel::{ClientId, DomainId, InvoiceId, Money, PortError, ServiceId};
use domain_billing::{Invoice, InvoiceItem, LineTarget, RenewalKind, RenewalMeta};
use domain_provisioning::{DomainName, Service};

use crate::effects::SideEffect;
use crate::error::SettlementError;
use crate::ports::{
    ConsolidationBatch, ConsolidationView, NotificationSeverity, SettlementStore,
};
use crate::pricing::RenewalPricing;
use crate::settings::SettingsLookup;

/// Attempts made against retryable storage conflicts before giving up.
const MAX_ATTEMPTS: u32 = 3;

/// One renewal to land on the client's hub invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenewalItem {
    pub target: LineTarget,
    /// Billing cycles for a service, registration years for a domain.
    pub periods: u32,
}

impl RenewalItem {
    pub fn service(service_id: ServiceId, periods: u32) -> Self {
        Self {
            target: LineTarget::Service(service_id),
            periods,
        }
    }

    pub fn domain(domain_id: DomainId, years: u32) -> Self {
        Self {
            target: LineTarget::Domain(domain_id),
            periods: years,
        }
    }
}

/// Why a requested renewal produced no new hub line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The hub already carries a line for this target.
    AlreadyOnHub,
    /// An unpaid order invoice already bills this target; order invoices
    /// are never folded.
    BilledOnOrderInvoice,
    /// Pricing resolved to zero, so there is nothing to bill.
    ZeroPriced,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::AlreadyOnHub => "already_on_hub",
            SkipReason::BilledOnOrderInvoice => "billed_on_order_invoice",
            SkipReason::ZeroPriced => "zero_priced",
        }
    }
}

/// A requested renewal that was skipped, and why.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkippedItem {
    pub target: LineTarget,
    pub reason: SkipReason,
}

/// What one consolidation run did for a client.
#[derive(Debug, Clone, Default)]
pub struct ConsolidationOutcome {
    /// The hub invoice after the run; None when no hub exists and no
    /// line landed.
    pub hub: Option<Invoice>,
    /// Targets billed as fresh renewal lines.
    pub appended: Vec<LineTarget>,
    /// Targets whose existing lines were adopted from folded invoices.
    pub moved: Vec<LineTarget>,
    /// Targets that produced no new line.
    pub skipped: Vec<SkippedItem>,
    /// Invoices soft-deleted after their lines moved to the hub.
    pub folded: Vec<InvoiceId>,
    /// Post-commit work; empty when nothing landed.
    pub side_effects: Vec<SideEffect>,
}

impl ConsolidationOutcome {
    /// Lines this run added to the hub, by either path.
    pub fn landed(&self) -> usize {
        self.appended.len() + self.moved.len()
    }
}

/// Consolidates a client's renewals onto their hub invoice.
pub struct ConsolidationEngine {
    store: Arc<dyn SettlementStore>,
    settings: Arc<dyn SettingsLookup>,
    pricing: Arc<dyn RenewalPricing>,
}

impl ConsolidationEngine {
    pub fn new(
        store: Arc<dyn SettlementStore>,
        settings: Arc<dyn SettingsLookup>,
        pricing: Arc<dyn RenewalPricing>,
    ) -> Self {
        Self {
            store,
            settings,
            pricing,
        }
    }

    /// Lands the requested renewals on the client's hub invoice.
    ///
    /// Nothing is persisted and no notification goes out unless at least
    /// one line actually lands. Storage conflicts (a concurrent run won
    /// the hub, an invoice version moved) are retried against a fresh
    /// view.
    #[instrument(skip(self, items), fields(client_id = %client_id, requested = items.len()))]
    pub async fn consolidate(
        &self,
        client_id: ClientId,
        items: &[RenewalItem],
        today: NaiveDate,
    ) -> Result<ConsolidationOutcome, SettlementError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.consolidate_once(client_id, items, today).await {
                Err(error) if error.is_retryable() && attempt < MAX_ATTEMPTS => {
                    warn!(attempt, %error, "consolidation hit a storage conflict, retrying");
                }
                other => return other,
            }
        }
    }

    async fn consolidate_once(
        &self,
        client_id: ClientId,
        items: &[RenewalItem],
        today: NaiveDate,
    ) -> Result<ConsolidationOutcome, SettlementError> {
        if items.is_empty() {
            return Ok(ConsolidationOutcome::default());
        }
        if let Some(item) = items.iter().find(|item| item.periods == 0) {
            return Err(SettlementError::validation(format!(
                "renewal for {:?} requests zero periods",
                item.target
            )));
        }

        let targets: Vec<LineTarget> = items.iter().map(|item| item.target).collect();
        let ConsolidationView {
            client,
            open_invoices,
            services,
            domains,
        } = self
            .store
            .load_consolidation_view(client_id, &targets)
            .await?;

        let mut open_invoices = open_invoices;
        let hub_position = open_invoices.iter().position(Invoice::is_hub_candidate);
        let mut hub: Option<Invoice> = hub_position.map(|index| open_invoices.remove(index));
        let hub_preexisting = hub.is_some();

        let mut outcome = ConsolidationOutcome::default();
        let mut latest_expiry: Option<NaiveDate> = None;

        for item in items {
            let resolved = self.resolve(item, &services, &domains)?;

            if let Some(existing) = &hub {
                if existing.has_line_for(item.target) {
                    debug!(target = ?item.target, "already on hub, skipping");
                    outcome.skipped.push(SkippedItem {
                        target: item.target,
                        reason: SkipReason::AlreadyOnHub,
                    });
                    continue;
                }
            }

            // A line for this target on another open invoice is either
            // adopted (order-less donors fold into the hub) or left
            // where the order flow billed it.
            let billed_elsewhere = open_invoices
                .iter()
                .position(|invoice| !invoice.deleted && invoice.has_line_for(item.target));
            if let Some(index) = billed_elsewhere {
                if open_invoices[index].order_id.is_some() {
                    debug!(target = ?item.target, invoice = %open_invoices[index].number, "billed on order invoice, skipping");
                    outcome.skipped.push(SkippedItem {
                        target: item.target,
                        reason: SkipReason::BilledOnOrderInvoice,
                    });
                    continue;
                }

                let donor = &mut open_invoices[index];
                let line_id = donor
                    .items
                    .iter()
                    .find(|line| line.targets(item.target))
                    .map(|line| line.id);
                if let Some(line_id) = line_id {
                    let adopted = donor.take_item(line_id).ok_or_else(|| {
                        PortError::internal(format!("line {line_id} vanished during adoption"))
                    })?;
                    let hub_invoice = ensure_hub(&mut hub, client_id, today, &*self.settings);
                    hub_invoice.add_item(adopted)?;
                    // Folding soft-deletes the donor, so every charge
                    // still on it rides along to the hub first.
                    for line in donor.drain_items() {
                        hub_invoice.add_item(line)?;
                    }
                    let hub_id = hub_invoice.id;
                    let hub_number = hub_invoice.number.clone();
                    donor.fold_into(hub_id, &hub_number);
                    info!(donor = %donor.number, hub = %hub_number, target = ?item.target, "adopted renewal line, folded donor");
                    outcome.moved.push(item.target);
                    latest_expiry = max_date(latest_expiry, resolved.expiry);
                    continue;
                }
            }

            // Fresh line.
            if resolved.price.is_zero() {
                warn!(target = ?item.target, "renewal priced at zero, skipping");
                outcome.skipped.push(SkippedItem {
                    target: item.target,
                    reason: SkipReason::ZeroPriced,
                });
                continue;
            }
            let meta = RenewalMeta::new(resolved.kind, item.periods)?;
            let line = match item.target {
                LineTarget::Service(service_id) => {
                    InvoiceItem::for_service(resolved.description, resolved.price, service_id)
                }
                LineTarget::Domain(domain_id) => {
                    InvoiceItem::for_domain(resolved.description, resolved.price, domain_id)
                }
            }
            .with_renewal(meta);
            let hub_invoice = ensure_hub(&mut hub, client_id, today, &*self.settings);
            hub_invoice.add_item(line)?;
            outcome.appended.push(item.target);
            latest_expiry = max_date(latest_expiry, resolved.expiry);
        }

        if outcome.landed() == 0 {
            debug!("no net new lines, leaving hub untouched");
            outcome.hub = hub;
            return Ok(outcome);
        }

        // The hub is guaranteed here: a landed line created it on demand.
        let mut hub_invoice = hub.ok_or_else(|| PortError::internal("hub missing after merge"))?;

        hub_invoice.retax(self.settings.tax_rate());
        if let Some(expiry) = latest_expiry {
            hub_invoice.extend_due_date(expiry);
        }

        for event in hub_invoice.take_events() {
            debug!(event = event.event_type(), invoice_id = %hub_invoice.id, "billing event");
        }
        let mut folded_invoices = Vec::new();
        for donor in open_invoices.iter_mut().filter(|invoice| invoice.deleted) {
            for event in donor.take_events() {
                debug!(event = event.event_type(), invoice_id = %donor.id, "billing event");
            }
            outcome.folded.push(donor.id);
            folded_invoices.push(donor.clone());
        }

        let batch = ConsolidationBatch {
            hub: hub_invoice.clone(),
            hub_created: !hub_preexisting,
            folded: folded_invoices,
        };
        self.store.commit_consolidation(batch).await?;

        info!(
            hub = %hub_invoice.number,
            appended = outcome.appended.len(),
            moved = outcome.moved.len(),
            skipped = outcome.skipped.len(),
            total = %hub_invoice.total,
            "renewals consolidated"
        );

        let landed = outcome.landed();
        outcome.side_effects = vec![
            SideEffect::Notify {
                client_id: client.id,
                subject: "Upcoming renewals consolidated".to_string(),
                body: format!(
                    "{} upcoming renewal{} been added to invoice {}, due {}. Total payable: {}.",
                    landed,
                    if landed == 1 { " has" } else { "s have" },
                    hub_invoice.number,
                    hub_invoice.due_date,
                    hub_invoice.total
                ),
                severity: NotificationSeverity::Info,
            },
            SideEffect::EmitWebhook {
                event: "invoice.renewals_consolidated".to_string(),
                payload: json!({
                    "client_id": client.id,
                    "invoice_id": hub_invoice.id,
                    "invoice_number": hub_invoice.number,
                    "appended": outcome.appended.len(),
                    "moved": outcome.moved.len(),
                    "folded": outcome.folded,
                    "total": hub_invoice.total,
                    "due_date": hub_invoice.due_date,
                }),
            },
        ];
        outcome.hub = Some(hub_invoice);
        Ok(outcome)
    }

    fn resolve(
        &self,
        item: &RenewalItem,
        services: &[Service],
        domains: &[DomainName],
    ) -> Result<ResolvedRenewal, SettlementError> {
        match item.target {
            LineTarget::Service(service_id) => {
                let service = services
                    .iter()
                    .find(|service| service.id == service_id)
                    .ok_or_else(|| PortError::not_found("Service", service_id))?;
                Ok(ResolvedRenewal {
                    kind: RenewalKind::ServiceRenewal,
                    description: format!(
                        "Renewal: {} ({} x {})",
                        service.name,
                        item.periods,
                        service.billing_cycle.as_str()
                    ),
                    price: self.pricing.price_service_renewal(service, item.periods),
                    expiry: Some(service.next_due_date),
                })
            }
            LineTarget::Domain(domain_id) => {
                let domain = domains
                    .iter()
                    .find(|domain| domain.id == domain_id)
                    .ok_or_else(|| PortError::not_found("Domain", domain_id))?;
                Ok(ResolvedRenewal {
                    kind: RenewalKind::DomainRenewal,
                    description: format!(
                        "Renewal: {} ({} year{})",
                        domain.name,
                        item.periods,
                        if item.periods == 1 { "" } else { "s" }
                    ),
                    price: self.pricing.price_domain_renewal(domain, item.periods),
                    expiry: domain.expiry_date,
                })
            }
        }
    }
}

struct ResolvedRenewal {
    kind: RenewalKind,
    description: String,
    price: Money,
    /// The target's current paid-through date, used to extend the hub's
    /// due date.
    expiry: Option<NaiveDate>,
}

fn ensure_hub<'a>(
    hub: &'a mut Option<Invoice>,
    client_id: ClientId,
    today: NaiveDate,
    settings: &dyn SettingsLookup,
) -> &'a mut Invoice {
    hub.get_or_insert_with(|| {
        info!(%client_id, "creating hub invoice");
        Invoice::new(client_id, today, settings.currency(), settings.tax_rate())
    })
}

fn max_date(current: Option<NaiveDate>, candidate: Option<NaiveDate>) -> Option<NaiveDate> {
    match (current, candidate) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}
