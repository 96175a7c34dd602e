//! Refund approval workflow
//!
//! Refunds walk a two-step chain: requested, authorized by a supervisor,
//! approved by an administrator. Requests from an administrator collapse
//! the chain and complete in the same call; the pending row still lands
//! first, so the requested amount counts against the ceiling for every
//! concurrent checker. The refundable ceiling (the sum of all
//! non-rejected refunds may never exceed the captured amount) is
//! enforced when a refund is requested and re-checked before execution;
//! a re-check violation rejects the refund rather than erroring, since
//! the competing refund that consumed the headroom already won.
//!
//! Completion moves money in one transaction: a negative reversal row is
//! inserted, the invoice's collected amount drops, and its status is
//! recomputed. Pushing the refund back through the gateway is a
//! post-commit effect; if it fails, the internal reversal stands and the
//! failure is only logged.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use core_kernel::{Money, OperatorId, PortError, RefundId, TransactionId};
use domain_billing::{
    BillingError, Invoice, PaymentTransaction, Refund, RefundAuthority, RefundStatus,
};

use crate::effects::SideEffect;
use crate::error::SettlementError;
use crate::ports::{
    ClientSummary, NotificationSeverity, RefundCompletionBatch, RefundView, SettlementStore,
};
use crate::settings::SettingsLookup;

/// Attempts made against retryable storage conflicts before giving up.
const MAX_ATTEMPTS: u32 = 3;

/// The operator driving a refund step.
#[derive(Debug, Clone, Copy)]
pub struct RefundActor {
    pub operator_id: OperatorId,
    pub authority: RefundAuthority,
}

impl RefundActor {
    pub fn new(operator_id: OperatorId, authority: RefundAuthority) -> Self {
        Self {
            operator_id,
            authority,
        }
    }
}

/// The result of one refund workflow step.
#[derive(Debug, Clone)]
pub struct RefundOutcome {
    pub refund: Refund,
    /// The negative reversal transaction, present once completed.
    pub reversal: Option<PaymentTransaction>,
    /// The invoice as adjusted by a completed refund.
    pub invoice: Option<Invoice>,
    /// Post-commit work; populated only on completion.
    pub side_effects: Vec<SideEffect>,
}

impl RefundOutcome {
    fn pending(refund: Refund) -> Self {
        Self {
            refund,
            reversal: None,
            invoice: None,
            side_effects: Vec::new(),
        }
    }
}

/// Drives refunds through request, authorization, approval, and
/// rejection.
pub struct RefundWorkflow {
    store: Arc<dyn SettlementStore>,
    settings: Arc<dyn SettingsLookup>,
}

impl RefundWorkflow {
    pub fn new(store: Arc<dyn SettlementStore>, settings: Arc<dyn SettingsLookup>) -> Self {
        Self { store, settings }
    }

    /// Requests a refund against a captured transaction.
    ///
    /// Administrator requests complete in the same call; everyone else's
    /// wait in the approval queue. Either way the pending row is
    /// persisted before any money moves.
    #[instrument(skip(self, reason, actor), fields(transaction_id = %transaction_id, operator = %actor.operator_id))]
    pub async fn request_refund(
        &self,
        transaction_id: TransactionId,
        amount: Money,
        reason: &str,
        actor: RefundActor,
    ) -> Result<RefundOutcome, SettlementError> {
        let mut attempt = 0;
        let pending = loop {
            attempt += 1;
            match self
                .request_once(transaction_id, amount, reason, actor)
                .await
            {
                Err(error) if error.is_retryable() && attempt < MAX_ATTEMPTS => {
                    warn!(attempt, %error, "refund request hit a storage conflict, retrying");
                }
                other => break other?,
            }
        };

        if !actor.authority.can_approve() {
            return Ok(pending);
        }

        debug!(refund_id = %pending.refund.id, "administrator request, collapsing approval chain");
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.execute_fresh(pending.refund.id, actor).await {
                Err(error) if error.is_retryable() && attempt < MAX_ATTEMPTS => {
                    warn!(attempt, %error, "refund completion hit a storage conflict, retrying");
                }
                other => return other,
            }
        }
    }

    async fn request_once(
        &self,
        transaction_id: TransactionId,
        amount: Money,
        reason: &str,
        actor: RefundActor,
    ) -> Result<RefundOutcome, SettlementError> {
        let view = self.store.load_refund_view(transaction_id).await?;

        if !view.transaction.refundable() {
            return Err(SettlementError::validation(format!(
                "transaction {} is not refundable",
                view.transaction.id
            )));
        }
        if amount.currency() != view.transaction.amount.currency() {
            return Err(SettlementError::validation(
                "refund currency must match the transaction currency",
            ));
        }
        ensure_within_ceiling(&view.transaction, &view.refunds, &amount, None)?;

        let refund = Refund::request(transaction_id, amount, reason, actor.operator_id)?;
        self.store.insert_refund(&refund).await?;
        info!(refund_id = %refund.id, amount = %amount, "refund requested");
        Ok(RefundOutcome::pending(refund))
    }

    /// Authorizes a pending refund, moving it to the approval queue.
    #[instrument(skip(self, actor), fields(refund_id = %refund_id, operator = %actor.operator_id))]
    pub async fn authorize_refund(
        &self,
        refund_id: RefundId,
        actor: RefundActor,
    ) -> Result<RefundOutcome, SettlementError> {
        if !actor.authority.can_authorize() {
            return Err(SettlementError::InsufficientAuthority {
                actor: actor.operator_id.to_string(),
                action: "authorize a refund".to_string(),
            });
        }

        let mut refund = self.store.get_refund(refund_id).await?;
        let previous = refund.status;
        refund.authorize(actor.operator_id, Utc::now())?;
        self.store.update_refund(&refund).await?;

        info!(
            from = previous.as_str(),
            to = refund.status.as_str(),
            "refund authorized"
        );
        Ok(RefundOutcome::pending(refund))
    }

    /// Approves a refund, executing it if the ceiling still holds.
    ///
    /// The ceiling is re-checked against fresh state: a refund whose
    /// slice was consumed by a competing refund since the request is
    /// rejected here, with the rejection returned as a normal outcome.
    #[instrument(skip(self, actor), fields(refund_id = %refund_id, operator = %actor.operator_id))]
    pub async fn approve_refund(
        &self,
        refund_id: RefundId,
        actor: RefundActor,
    ) -> Result<RefundOutcome, SettlementError> {
        if !actor.authority.can_approve() {
            return Err(SettlementError::InsufficientAuthority {
                actor: actor.operator_id.to_string(),
                action: "approve a refund".to_string(),
            });
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.approve_once(refund_id, actor).await {
                Err(error) if error.is_retryable() && attempt < MAX_ATTEMPTS => {
                    warn!(attempt, %error, "refund approval hit a storage conflict, retrying");
                }
                other => return other,
            }
        }
    }

    async fn approve_once(
        &self,
        refund_id: RefundId,
        actor: RefundActor,
    ) -> Result<RefundOutcome, SettlementError> {
        let refund = self.store.get_refund(refund_id).await?;
        if refund.status != RefundStatus::PendingApproval {
            return Err(BillingError::InvalidStatusTransition {
                from: refund.status.as_str().to_string(),
                to: RefundStatus::Completed.as_str().to_string(),
            }
            .into());
        }

        self.execute_fresh(refund_id, actor).await
    }

    /// Reloads the refund and its transaction, re-checks the ceiling
    /// against fresh state, and executes. A refund whose slice was
    /// consumed by a competing refund is rejected here, with the
    /// rejection returned as a normal outcome.
    async fn execute_fresh(
        &self,
        refund_id: RefundId,
        actor: RefundActor,
    ) -> Result<RefundOutcome, SettlementError> {
        let mut refund = self.store.get_refund(refund_id).await?;
        let view = self.store.load_refund_view(refund.transaction_id).await?;

        let headroom = ensure_within_ceiling(
            &view.transaction,
            &view.refunds,
            &refund.amount,
            Some(refund.id),
        );
        if let Err(SettlementError::RefundCeilingExceeded { available, .. }) = &headroom {
            warn!(refund_id = %refund.id, %available, "ceiling re-check failed, rejecting refund");
            refund.reject(
                actor.operator_id,
                format!("Refundable amount exhausted; only {available} remains"),
                Utc::now(),
            )?;
            self.store.update_refund(&refund).await?;
            return Ok(RefundOutcome::pending(refund));
        }
        headroom?;

        self.complete_refund(refund, view, actor).await
    }

    /// Rejects a refund at either pending step.
    ///
    /// The authority required matches the step being short-circuited:
    /// whoever could have advanced the refund may also decline it.
    #[instrument(skip(self, note, actor), fields(refund_id = %refund_id, operator = %actor.operator_id))]
    pub async fn reject_refund(
        &self,
        refund_id: RefundId,
        note: &str,
        actor: RefundActor,
    ) -> Result<RefundOutcome, SettlementError> {
        let mut refund = self.store.get_refund(refund_id).await?;

        let allowed = match refund.status {
            RefundStatus::PendingAuthorization => actor.authority.can_authorize(),
            RefundStatus::PendingApproval => actor.authority.can_approve(),
            // Terminal states fall through to the transition guard.
            _ => true,
        };
        if !allowed {
            return Err(SettlementError::InsufficientAuthority {
                actor: actor.operator_id.to_string(),
                action: format!("reject a refund in {}", refund.status.as_str()),
            });
        }

        let previous = refund.status;
        refund.reject(actor.operator_id, note, Utc::now())?;
        self.store.update_refund(&refund).await?;

        info!(
            from = previous.as_str(),
            to = refund.status.as_str(),
            "refund rejected"
        );
        Ok(RefundOutcome::pending(refund))
    }

    /// Executes a refund: transitions it to Completed, reverses the
    /// money on the invoice, and persists everything atomically.
    async fn complete_refund(
        &self,
        mut refund: Refund,
        view: RefundView,
        actor: RefundActor,
    ) -> Result<RefundOutcome, SettlementError> {
        let RefundView {
            transaction,
            mut invoice,
            client,
            ..
        } = view;

        let now = Utc::now();
        if refund.status == RefundStatus::PendingAuthorization {
            refund.authorize(actor.operator_id, now)?;
        }
        refund.complete(actor.operator_id, now)?;

        let reversal = PaymentTransaction::internal_refund(invoice.id, refund.id, refund.amount);
        let application = invoice.apply_refund(refund.amount, now)?;

        for event in invoice.take_events() {
            debug!(event = event.event_type(), invoice_id = %invoice.id, "billing event");
        }

        let batch = RefundCompletionBatch {
            refund: refund.clone(),
            reversal: reversal.clone(),
            invoice: invoice.clone(),
        };
        self.store.commit_refund_completion(batch).await?;

        info!(
            refund_id = %refund.id,
            amount = %refund.amount,
            invoice = %invoice.number,
            invoice_status = application.new_status.as_str(),
            "refund completed"
        );

        let side_effects = self.completion_side_effects(&refund, &transaction, &invoice, &client);
        Ok(RefundOutcome {
            refund,
            reversal: Some(reversal),
            invoice: Some(invoice),
            side_effects,
        })
    }

    fn completion_side_effects(
        &self,
        refund: &Refund,
        transaction: &PaymentTransaction,
        invoice: &Invoice,
        client: &ClientSummary,
    ) -> Vec<SideEffect> {
        vec![
            SideEffect::GatewayRefund {
                gateway: transaction.gateway.clone(),
                external_ref: transaction.external_ref.clone(),
                amount: refund.amount,
            },
            SideEffect::Notify {
                client_id: client.id,
                subject: format!("Refund processed for invoice {}", invoice.number),
                body: format!(
                    "{} has refunded {} against invoice {}.",
                    self.settings.app_name(),
                    refund.amount,
                    invoice.number
                ),
                severity: NotificationSeverity::Info,
            },
            SideEffect::EmitWebhook {
                event: "transaction.refunded".to_string(),
                payload: json!({
                    "refund_id": refund.id,
                    "transaction_id": transaction.id,
                    "invoice_id": invoice.id,
                    "amount": refund.amount,
                    "invoice_status": invoice.status.as_str(),
                }),
            },
        ]
    }
}

/// Checks requested headroom against the transaction's refundable
/// ceiling: the sum of all non-rejected refunds plus the candidate
/// amount must not exceed the captured amount. `exclude` drops the
/// candidate's own row from the committed sum during a re-check.
fn ensure_within_ceiling(
    transaction: &PaymentTransaction,
    refunds: &[Refund],
    requested: &Money,
    exclude: Option<RefundId>,
) -> Result<(), SettlementError> {
    let mut committed = Money::zero(transaction.amount.currency());
    for refund in refunds {
        if Some(refund.id) == exclude || !refund.counts_against_ceiling() {
            continue;
        }
        committed = committed
            .checked_add(&refund.amount)
            .map_err(BillingError::from)?;
    }

    let would_be = committed
        .checked_add(requested)
        .map_err(BillingError::from)?;
    if would_be > transaction.amount {
        let available = transaction
            .amount
            .checked_sub(&committed)
            .map_err(BillingError::from)?;
        return Err(SettlementError::RefundCeilingExceeded {
            transaction_id: transaction.id.to_string(),
            requested: requested.to_string(),
            available: available.to_string(),
        });
    }
    Ok(())
}
