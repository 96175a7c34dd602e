//! PostgreSQL settlement store
//!
//! Implements the engines' storage facade. Loads assemble one consistent
//! view per operation; commits persist a whole engine outcome in a single
//! transaction, relying on the `external_ref` unique index for duplicate
//! payment detection and on version-guarded invoice updates for
//! concurrent writers. Conflicts reach the engines as [`PortError`]
//! values they already know how to retry or absorb.

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::instrument;

use core_kernel::{
    BillableItemId, ClientId, DomainId, DomainPort, InvoiceId, Money, PortError, RefundId,
    ServiceId, TransactionId,
};
use domain_billing::{BillableItem, LineTarget, Refund};
use domain_provisioning::{DomainName, Service};
use domain_settlement::{
    ClientSummary, ConsolidationBatch, ConsolidationView, GeneratedInvoiceBatch, GeneratorSource,
    RefundCompletionBatch, RefundView, SettlementBatch, SettlementStore, SettlementView,
};

use crate::error::DatabaseError;
use crate::pool::DatabasePool;
use crate::repositories::{billing, provisioning};

/// The production [`SettlementStore`] backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgSettlementStore {
    pool: DatabasePool,
}

impl PgSettlementStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

impl DomainPort for PgSettlementStore {}

#[async_trait]
impl SettlementStore for PgSettlementStore {
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    async fn load_settlement_view(
        &self,
        invoice_id: InvoiceId,
    ) -> Result<SettlementView, PortError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from)?;

        let invoice = billing::fetch_invoice(&mut tx, invoice_id, false).await?;
        let client = billing::fetch_client(&mut tx, invoice.client_id).await?;
        let order = match invoice.order_id {
            Some(order_id) => Some(provisioning::fetch_order(&mut tx, order_id, false).await?),
            None => None,
        };

        let mut service_ids: Vec<ServiceId> =
            invoice.items.iter().filter_map(|item| item.service_id).collect();
        let mut domain_ids: Vec<DomainId> =
            invoice.items.iter().filter_map(|item| item.domain_id).collect();
        if let Some(order) = &order {
            service_ids.extend(order.items.iter().filter_map(|item| item.service_id));
            domain_ids.extend(order.items.iter().filter_map(|item| item.domain_id));
        }
        service_ids.dedup();
        domain_ids.dedup();

        let services = provisioning::fetch_services(&mut tx, &service_ids).await?;
        let domains = provisioning::fetch_domains(&mut tx, &domain_ids).await?;
        let investors = billing::fetch_investors(&mut tx).await?;

        tx.commit().await.map_err(DatabaseError::from)?;

        Ok(SettlementView {
            invoice,
            client,
            order,
            services,
            domains,
            investors,
        })
    }

    #[instrument(skip(self, batch), fields(invoice = %batch.invoice.number))]
    async fn commit_settlement(&self, batch: SettlementBatch) -> Result<(), PortError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from)?;

        // Insert first: a retried webhook dies here on the external_ref
        // index before anything else moves.
        billing::insert_transaction(&mut tx, &batch.transaction).await?;
        billing::update_invoice(&mut tx, &batch.invoice).await?;

        if let Some(order) = &batch.order {
            provisioning::update_order(&mut tx, order).await?;
        }
        for service in &batch.services {
            provisioning::update_service(&mut tx, service).await?;
        }
        for domain in &batch.domains {
            provisioning::update_domain(&mut tx, domain).await?;
        }
        for investor in &batch.investors {
            billing::update_investor(&mut tx, investor).await?;
        }
        for entry in &batch.commission_entries {
            billing::insert_commission_entry(&mut tx, entry).await?;
        }

        tx.commit().await.map_err(DatabaseError::from)?;
        Ok(())
    }

    #[instrument(skip(self, targets), fields(client_id = %client_id))]
    async fn load_consolidation_view(
        &self,
        client_id: ClientId,
        targets: &[LineTarget],
    ) -> Result<ConsolidationView, PortError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from)?;

        let client = billing::fetch_client(&mut tx, client_id).await?;
        let open_invoices =
            billing::open_invoices_for_client(&mut tx, client_id, false).await?;

        let service_ids: Vec<ServiceId> = targets
            .iter()
            .filter_map(|target| match target {
                LineTarget::Service(id) => Some(*id),
                LineTarget::Domain(_) => None,
            })
            .collect();
        let domain_ids: Vec<DomainId> = targets
            .iter()
            .filter_map(|target| match target {
                LineTarget::Domain(id) => Some(*id),
                LineTarget::Service(_) => None,
            })
            .collect();

        let services = provisioning::fetch_services(&mut tx, &service_ids).await?;
        let domains = provisioning::fetch_domains(&mut tx, &domain_ids).await?;

        tx.commit().await.map_err(DatabaseError::from)?;

        Ok(ConsolidationView {
            client,
            open_invoices,
            services,
            domains,
        })
    }

    #[instrument(skip(self, batch), fields(hub = %batch.hub.number))]
    async fn commit_consolidation(&self, batch: ConsolidationBatch) -> Result<(), PortError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from)?;

        // Lock the client's open invoices so two concurrent runs cannot
        // both install a fresh hub.
        let open = billing::open_invoices_for_client(&mut tx, batch.hub.client_id, true).await?;
        if batch.hub_created {
            let conflicting_hub = open
                .iter()
                .any(|invoice| invoice.is_hub_candidate() && invoice.id != batch.hub.id);
            if conflicting_hub {
                return Err(PortError::concurrent(
                    "another consolidation created a hub invoice for this client",
                ));
            }
            billing::insert_invoice(&mut tx, &batch.hub).await?;
        } else {
            billing::update_invoice(&mut tx, &batch.hub).await?;
        }

        for folded in &batch.folded {
            billing::update_invoice(&mut tx, folded).await?;
        }

        tx.commit().await.map_err(DatabaseError::from)?;
        Ok(())
    }

    async fn get_refund(&self, refund_id: RefundId) -> Result<Refund, PortError> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from)?;
        Ok(billing::fetch_refund(&mut conn, refund_id).await?)
    }

    #[instrument(skip(self), fields(transaction_id = %transaction_id))]
    async fn load_refund_view(
        &self,
        transaction_id: TransactionId,
    ) -> Result<RefundView, PortError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from)?;

        let transaction = billing::fetch_transaction(&mut tx, transaction_id).await?;
        let invoice = billing::fetch_invoice(&mut tx, transaction.invoice_id, false).await?;
        let client = billing::fetch_client(&mut tx, invoice.client_id).await?;
        let refunds =
            billing::fetch_refunds_for_transaction(&mut tx, transaction_id, false).await?;

        tx.commit().await.map_err(DatabaseError::from)?;

        Ok(RefundView {
            transaction,
            invoice,
            client,
            refunds,
        })
    }

    async fn insert_refund(&self, refund: &Refund) -> Result<(), PortError> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from)?;
        Ok(billing::insert_refund(&mut conn, refund).await?)
    }

    async fn update_refund(&self, refund: &Refund) -> Result<(), PortError> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from)?;
        Ok(billing::update_refund(&mut conn, refund).await?)
    }

    #[instrument(skip(self, batch), fields(refund_id = %batch.refund.id))]
    async fn commit_refund_completion(
        &self,
        batch: RefundCompletionBatch,
    ) -> Result<(), PortError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from)?;

        // Lock the sibling refunds and re-verify the ceiling while the
        // lock is held: two completions racing past the workflow's
        // pre-check serialize here and the loser rolls back.
        let siblings =
            billing::fetch_refunds_for_transaction(&mut tx, batch.refund.transaction_id, true)
                .await?;
        let captured = billing::fetch_transaction(&mut tx, batch.refund.transaction_id).await?;
        let mut committed = Money::zero(captured.amount.currency());
        for sibling in &siblings {
            if sibling.id == batch.refund.id || !sibling.counts_against_ceiling() {
                continue;
            }
            committed = committed
                .checked_add(&sibling.amount)
                .map_err(|e| PortError::internal(e.to_string()))?;
        }
        let would_be = committed
            .checked_add(&batch.refund.amount)
            .map_err(|e| PortError::internal(e.to_string()))?;
        if would_be > captured.amount {
            return Err(PortError::concurrent(format!(
                "refund ceiling for transaction {} consumed by a concurrent refund",
                batch.refund.transaction_id
            )));
        }

        billing::insert_transaction(&mut tx, &batch.reversal).await?;
        billing::update_refund(&mut tx, &batch.refund).await?;
        billing::update_invoice(&mut tx, &batch.invoice).await?;

        tx.commit().await.map_err(DatabaseError::from)?;
        Ok(())
    }

    async fn due_services(&self, today: NaiveDate) -> Result<Vec<Service>, PortError> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from)?;
        Ok(provisioning::due_services(&mut conn, today).await?)
    }

    async fn due_billable_items(
        &self,
        today: NaiveDate,
    ) -> Result<Vec<BillableItem>, PortError> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from)?;
        Ok(billing::due_billable_items(&mut conn, today).await?)
    }

    async fn expiring_services(
        &self,
        today: NaiveDate,
        horizon_days: i64,
    ) -> Result<Vec<Service>, PortError> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from)?;
        Ok(provisioning::expiring_services(&mut conn, today, horizon_days).await?)
    }

    async fn expiring_domains(
        &self,
        today: NaiveDate,
        horizon_days: i64,
    ) -> Result<Vec<DomainName>, PortError> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from)?;
        Ok(provisioning::expiring_domains(&mut conn, today, horizon_days).await?)
    }

    async fn has_open_invoice_for_service(
        &self,
        service_id: ServiceId,
    ) -> Result<bool, PortError> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from)?;
        Ok(billing::open_invoice_for_service(&mut conn, service_id).await?)
    }

    async fn has_open_invoice_for_billable(
        &self,
        billable_id: BillableItemId,
    ) -> Result<bool, PortError> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from)?;
        Ok(billing::open_invoice_for_billable(&mut conn, billable_id).await?)
    }

    async fn get_client(&self, client_id: ClientId) -> Result<ClientSummary, PortError> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from)?;
        Ok(billing::fetch_client(&mut conn, client_id).await?)
    }

    #[instrument(skip(self, batch), fields(invoice = %batch.invoice.number))]
    async fn commit_generated_invoice(
        &self,
        batch: GeneratedInvoiceBatch,
    ) -> Result<(), PortError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from)?;

        billing::insert_invoice(&mut tx, &batch.invoice).await?;
        match &batch.source {
            GeneratorSource::Service(service) => {
                provisioning::update_service(&mut tx, service).await?;
            }
            GeneratorSource::Billable(item) => {
                billing::update_billable_item(&mut tx, item).await?;
            }
        }

        tx.commit().await.map_err(DatabaseError::from)?;
        Ok(())
    }
}
