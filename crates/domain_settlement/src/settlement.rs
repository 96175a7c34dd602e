//! Payment settlement engine
//!
//! Applies a captured gateway payment to an invoice and, when the
//! invoice becomes fully paid, performs the whole downstream cascade in
//! one storage transaction: the linked order completes, purchased
//! services and domains activate, renewal lines extend their targets,
//! and investor commissions are distributed from the subtotal. A
//! duplicate external reference is reported as already processed, never
//! as an error, so gateway callbacks can be replayed safely.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use core_kernel::{DomainId, InvoiceId, Money, OrderId, PortError, ServiceId};
use domain_billing::{
    CommissionEntry, Investor, Invoice, PaymentApplication, PaymentTransaction, RenewalMeta,
};
use domain_provisioning::{
    DomainName, DomainStatus, Order, OrderStatus, ProvisioningError, Service, ServiceStatus,
};

use crate::effects::SideEffect;
use crate::error::SettlementError;
use crate::ports::{
    ClientSummary, NotificationSeverity, SettlementBatch, SettlementStore, SettlementView,
};
use crate::settings::SettingsLookup;

/// Attempts made against retryable storage conflicts before giving up.
const MAX_ATTEMPTS: u32 = 3;

/// A payment to apply to an invoice.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub invoice_id: InvoiceId,
    pub amount: Money,
    /// Gateway name recorded on the transaction.
    pub gateway: String,
    /// Gateway-assigned reference; a manual reference is synthesized
    /// when absent.
    pub external_ref: Option<String>,
    /// Raw gateway response, stored verbatim.
    pub raw_payload: Option<serde_json::Value>,
}

/// Provisioning and distribution work performed because the invoice
/// became fully paid. Empty for partial payments.
#[derive(Debug, Clone, Default)]
pub struct SettlementEffects {
    pub order_completed: Option<OrderId>,
    pub services_activated: Vec<ServiceId>,
    pub services_extended: Vec<ServiceId>,
    pub domains_activated: Vec<DomainId>,
    pub domains_extended: Vec<DomainId>,
    pub commissions: Vec<CommissionEntry>,
}

/// The full result of one settled payment.
#[derive(Debug, Clone)]
pub struct SettlementReceipt {
    pub invoice: Invoice,
    pub transaction: PaymentTransaction,
    pub client: ClientSummary,
    pub application: PaymentApplication,
    pub effects: SettlementEffects,
    /// Post-commit work owed to the outside world; hand to the
    /// [`EffectDispatcher`](crate::effects::EffectDispatcher).
    pub side_effects: Vec<SideEffect>,
}

/// What a settlement run produced.
#[derive(Debug, Clone)]
pub enum SettlementOutcome {
    /// The payment was recorded.
    Settled(Box<SettlementReceipt>),
    /// The external reference was seen before; nothing changed.
    AlreadyProcessed { external_ref: String },
}

/// Applies payments to invoices.
pub struct SettlementEngine {
    store: Arc<dyn SettlementStore>,
    settings: Arc<dyn SettingsLookup>,
}

impl SettlementEngine {
    pub fn new(store: Arc<dyn SettlementStore>, settings: Arc<dyn SettingsLookup>) -> Self {
        Self { store, settings }
    }

    /// Records a payment against an invoice.
    ///
    /// Retries up to [`MAX_ATTEMPTS`] times when another writer touches
    /// the same rows. A duplicate external reference short-circuits to
    /// [`SettlementOutcome::AlreadyProcessed`].
    #[instrument(skip(self, request), fields(invoice_id = %request.invoice_id, gateway = %request.gateway))]
    pub async fn record_payment(
        &self,
        request: PaymentRequest,
    ) -> Result<SettlementOutcome, SettlementError> {
        if !request.amount.is_positive() {
            return Err(SettlementError::validation(
                "payment amount must be positive",
            ));
        }
        let external_ref = request
            .external_ref
            .clone()
            .unwrap_or_else(PaymentTransaction::manual_reference);

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.settle_once(&request, &external_ref).await {
                Ok(outcome) => return Ok(outcome),
                Err(SettlementError::Port(error)) if error.is_duplicate() => {
                    info!(%external_ref, "external reference already recorded, skipping");
                    return Ok(SettlementOutcome::AlreadyProcessed { external_ref });
                }
                Err(error) if error.is_retryable() && attempt < MAX_ATTEMPTS => {
                    warn!(attempt, %error, "settlement hit a storage conflict, retrying");
                }
                Err(error) => return Err(error),
            }
        }
    }

    async fn settle_once(
        &self,
        request: &PaymentRequest,
        external_ref: &str,
    ) -> Result<SettlementOutcome, SettlementError> {
        let SettlementView {
            mut invoice,
            client,
            order,
            services,
            domains,
            investors,
        } = self.store.load_settlement_view(request.invoice_id).await?;

        let now = Utc::now();
        let today = now.date_naive();

        let application = invoice.record_payment(request.amount, now)?;
        let transaction = PaymentTransaction::successful(
            invoice.id,
            request.gateway.clone(),
            external_ref,
            request.amount,
            request.raw_payload.clone(),
        );

        let mut services: HashMap<ServiceId, Service> =
            services.into_iter().map(|s| (s.id, s)).collect();
        let mut domains: HashMap<DomainId, DomainName> =
            domains.into_iter().map(|d| (d.id, d)).collect();

        let mut effects = SettlementEffects::default();
        let mut completed_order: Option<Order> = None;
        let mut credited_investors: Vec<Investor> = Vec::new();

        if application.newly_paid {
            // Renewal metadata drives its targets entirely; it runs first
            // so the plain activation passes below see those targets as
            // no longer pending.
            for line in &invoice.items {
                let Some(meta) = line.renewal else { continue };
                if let Some(service_id) = line.service_id {
                    let service = service_mut(&mut services, service_id)?;
                    renew_service(service, meta, today, &mut effects)?;
                }
                if let Some(domain_id) = line.domain_id {
                    let domain = domain_mut(&mut domains, domain_id)?;
                    renew_domain(domain, meta, today, &mut effects)?;
                }
            }

            // Plain lines activate still-pending targets with their
            // default terms: one billing cycle for services, the sold
            // registration years for domains.
            for line in invoice.items.iter().filter(|l| l.renewal.is_none()) {
                if let Some(service_id) = line.service_id {
                    let service = service_mut(&mut services, service_id)?;
                    if service.status == ServiceStatus::Pending {
                        service.activate(today, 1)?;
                        effects.services_activated.push(service_id);
                    }
                }
                if let Some(domain_id) = line.domain_id {
                    let domain = domain_mut(&mut domains, domain_id)?;
                    if domain.status == DomainStatus::Pending {
                        let years = domain.registration_years;
                        domain.activate(today, years)?;
                        effects.domains_activated.push(domain_id);
                    }
                }
            }

            // Complete the linked order and pick up any of its items not
            // billed as invoice lines (zero-priced bundle entries).
            if let Some(mut pending_order) = order {
                if pending_order.status == OrderStatus::Pending {
                    pending_order.complete(format!("Paid by invoice {}", invoice.number))?;
                    for item in &pending_order.items {
                        if let Some(service_id) = item.service_id {
                            let service = service_mut(&mut services, service_id)?;
                            if service.status == ServiceStatus::Pending {
                                service.activate(today, 1)?;
                                effects.services_activated.push(service_id);
                            }
                        }
                        if let Some(domain_id) = item.domain_id {
                            let domain = domain_mut(&mut domains, domain_id)?;
                            if domain.status == DomainStatus::Pending {
                                let years =
                                    item.domain_years.unwrap_or(domain.registration_years);
                                domain.activate(today, years)?;
                                effects.domains_activated.push(domain_id);
                            }
                        }
                    }
                    effects.order_completed = Some(pending_order.id);
                    completed_order = Some(pending_order);
                }
            }

            // Commission distribution from the settled subtotal.
            for mut investor in investors {
                if !investor.active {
                    continue;
                }
                let commission = investor.commission_on(&invoice.subtotal)?;
                if !commission.is_positive() {
                    continue;
                }
                investor.credit(commission)?;
                effects.commissions.push(CommissionEntry::new(
                    investor.id,
                    invoice.id,
                    transaction.id,
                    commission,
                ));
                credited_investors.push(investor);
            }
        }

        for event in invoice.take_events() {
            debug!(event = event.event_type(), invoice_id = %invoice.id, "billing event");
        }

        let changed_services: Vec<Service> = effects
            .services_activated
            .iter()
            .chain(effects.services_extended.iter())
            .filter_map(|id| services.remove(id))
            .collect();
        let changed_domains: Vec<DomainName> = effects
            .domains_activated
            .iter()
            .chain(effects.domains_extended.iter())
            .filter_map(|id| domains.remove(id))
            .collect();

        let batch = SettlementBatch {
            invoice: invoice.clone(),
            transaction: transaction.clone(),
            order: completed_order,
            services: changed_services,
            domains: changed_domains,
            investors: credited_investors,
            commission_entries: effects.commissions.clone(),
        };
        self.store.commit_settlement(batch).await?;

        info!(
            invoice = %invoice.number,
            amount = %request.amount,
            status = invoice.status.as_str(),
            newly_paid = application.newly_paid,
            "payment settled"
        );

        let side_effects = self.build_side_effects(
            &invoice,
            &transaction,
            &client,
            &application,
            external_ref,
        );

        Ok(SettlementOutcome::Settled(Box::new(SettlementReceipt {
            invoice,
            transaction,
            client,
            application,
            effects,
            side_effects,
        })))
    }

    fn build_side_effects(
        &self,
        invoice: &Invoice,
        transaction: &PaymentTransaction,
        client: &ClientSummary,
        application: &PaymentApplication,
        external_ref: &str,
    ) -> Vec<SideEffect> {
        let mut side_effects = vec![
            SideEffect::SendReceipt {
                invoice: invoice.clone(),
                transaction: transaction.clone(),
                client: client.clone(),
            },
            SideEffect::Notify {
                client_id: client.id,
                subject: format!("Payment received for {}", invoice.number),
                body: format!(
                    "{} has recorded your payment of {} against invoice {}.",
                    self.settings.app_name(),
                    transaction.amount,
                    invoice.number
                ),
                severity: NotificationSeverity::Success,
            },
            SideEffect::EmitWebhook {
                event: "invoice.payment_recorded".to_string(),
                payload: json!({
                    "invoice_id": invoice.id,
                    "invoice_number": invoice.number,
                    "transaction_id": transaction.id,
                    "external_ref": external_ref,
                    "amount": transaction.amount,
                    "status": invoice.status.as_str(),
                }),
            },
        ];
        if application.newly_paid {
            side_effects.push(SideEffect::EmitWebhook {
                event: "invoice.paid".to_string(),
                payload: json!({
                    "invoice_id": invoice.id,
                    "invoice_number": invoice.number,
                    "total": invoice.total,
                }),
            });
        }
        side_effects
    }
}

fn service_mut(
    services: &mut HashMap<ServiceId, Service>,
    id: ServiceId,
) -> Result<&mut Service, SettlementError> {
    services
        .get_mut(&id)
        .ok_or_else(|| SettlementError::Port(PortError::not_found("Service", id)))
}

fn domain_mut(
    domains: &mut HashMap<DomainId, DomainName>,
    id: DomainId,
) -> Result<&mut DomainName, SettlementError> {
    domains
        .get_mut(&id)
        .ok_or_else(|| SettlementError::Port(PortError::not_found("Domain", id)))
}

/// Applies one renewal-metadata line to its service.
///
/// Pending targets activate for the sold periods; live targets extend
/// only when the line is a `*_renewal` kind. A `new_service` line whose
/// target is already active was settled before and is left alone.
fn renew_service(
    service: &mut Service,
    meta: RenewalMeta,
    today: NaiveDate,
    effects: &mut SettlementEffects,
) -> Result<(), SettlementError> {
    if service.status == ServiceStatus::Pending {
        service.activate(today, meta.period_count)?;
        effects.services_activated.push(service.id);
        return Ok(());
    }
    if !meta.kind.is_renewal() {
        debug!(service_id = %service.id, "new-service line already provisioned, skipping");
        return Ok(());
    }
    match service.extend(meta.period_count, today) {
        Ok(new_due) => {
            debug!(service_id = %service.id, %new_due, "service extended");
            effects.services_extended.push(service.id);
            Ok(())
        }
        Err(ProvisioningError::InvalidOperation(message)) => {
            warn!(service_id = %service.id, %message, "renewal line left service untouched");
            Ok(())
        }
        Err(error) => Err(error.into()),
    }
}

/// Applies one renewal-metadata line to its domain.
fn renew_domain(
    domain: &mut DomainName,
    meta: RenewalMeta,
    today: NaiveDate,
    effects: &mut SettlementEffects,
) -> Result<(), SettlementError> {
    if domain.status == DomainStatus::Pending {
        domain.activate(today, meta.period_count)?;
        effects.domains_activated.push(domain.id);
        return Ok(());
    }
    if !meta.kind.is_renewal() {
        debug!(domain_id = %domain.id, "new-domain line already provisioned, skipping");
        return Ok(());
    }
    match domain.extend(meta.period_count, today) {
        Ok(new_expiry) => {
            debug!(domain_id = %domain.id, %new_expiry, "domain extended");
            effects.domains_extended.push(domain.id);
            Ok(())
        }
        Err(ProvisioningError::InvalidOperation(message)) => {
            warn!(domain_id = %domain.id, %message, "renewal line left domain untouched");
            Ok(())
        }
        Err(error) => Err(error.into()),
    }
}
