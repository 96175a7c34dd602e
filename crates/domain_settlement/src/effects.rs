//! Post-commit side effects
//!
//! Engine outcomes carry a list of side effects describing the receipts,
//! notifications, webhooks, and gateway calls the operation owes the
//! outside world. The dispatcher executes them only after the storage
//! transaction has committed: every effect is fire-and-forget, bounded
//! by a timeout, and failure is logged but never propagated back into
//! the already-settled operation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use core_kernel::{ClientId, Money, PortError};
use domain_billing::{Invoice, PaymentTransaction};

use crate::ports::{
    ClientSummary, DocumentRenderer, GatewayClient, MailAttachment, Mailer, NotificationSeverity,
    NotificationSink, WebhookFanout,
};

/// How long any single side effect may run before it is abandoned.
pub const EFFECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A side effect owed after a committed engine operation.
#[derive(Debug, Clone)]
pub enum SideEffect {
    /// Render the receipt and mail it to the client.
    SendReceipt {
        invoice: Invoice,
        transaction: PaymentTransaction,
        client: ClientSummary,
    },
    /// Deliver an in-app notification.
    Notify {
        client_id: ClientId,
        subject: String,
        body: String,
        severity: NotificationSeverity,
    },
    /// Fan an event out to webhook subscribers.
    EmitWebhook {
        event: String,
        payload: serde_json::Value,
    },
    /// Push a completed refund back through its gateway.
    GatewayRefund {
        gateway: String,
        external_ref: String,
        amount: Money,
    },
}

impl SideEffect {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            SideEffect::SendReceipt { .. } => "send_receipt",
            SideEffect::Notify { .. } => "notify",
            SideEffect::EmitWebhook { .. } => "emit_webhook",
            SideEffect::GatewayRefund { .. } => "gateway_refund",
        }
    }
}

/// Executes side effects against the collaborator ports.
///
/// Gateways are registered by name; a [`SideEffect::GatewayRefund`] whose
/// gateway does not support refunds is skipped quietly, leaving the
/// internal reversal as the only record.
pub struct EffectDispatcher {
    notifications: Arc<dyn NotificationSink>,
    renderer: Arc<dyn DocumentRenderer>,
    mailer: Arc<dyn Mailer>,
    webhooks: Arc<dyn WebhookFanout>,
    gateways: HashMap<String, Arc<dyn GatewayClient>>,
}

impl EffectDispatcher {
    pub fn new(
        notifications: Arc<dyn NotificationSink>,
        renderer: Arc<dyn DocumentRenderer>,
        mailer: Arc<dyn Mailer>,
        webhooks: Arc<dyn WebhookFanout>,
    ) -> Self {
        Self {
            notifications,
            renderer,
            mailer,
            webhooks,
            gateways: HashMap::new(),
        }
    }

    /// Registers a gateway for refund push-back, keyed by its name.
    pub fn register_gateway(mut self, gateway: Arc<dyn GatewayClient>) -> Self {
        self.gateways.insert(gateway.name().to_string(), gateway);
        self
    }

    /// Spawns every effect, each bounded by [`EFFECT_TIMEOUT`].
    ///
    /// The returned handles let batch entry points wait for in-flight
    /// effects before exiting; request-path callers simply drop them.
    pub fn dispatch(self: &Arc<Self>, effects: Vec<SideEffect>) -> Vec<JoinHandle<()>> {
        effects
            .into_iter()
            .map(|effect| {
                let dispatcher = Arc::clone(self);
                tokio::spawn(async move {
                    let kind = effect.kind();
                    match tokio::time::timeout(EFFECT_TIMEOUT, dispatcher.execute(effect)).await {
                        Ok(Ok(())) => debug!(effect = kind, "side effect delivered"),
                        Ok(Err(error)) => warn!(effect = kind, %error, "side effect failed"),
                        Err(_) => warn!(
                            effect = kind,
                            timeout_s = EFFECT_TIMEOUT.as_secs(),
                            "side effect timed out"
                        ),
                    }
                })
            })
            .collect()
    }

    /// Dispatches and awaits completion; sweep binaries use this so they
    /// do not exit with effects still in flight.
    pub async fn drain(self: &Arc<Self>, effects: Vec<SideEffect>) {
        for handle in self.dispatch(effects) {
            let _ = handle.await;
        }
    }

    async fn execute(&self, effect: SideEffect) -> Result<(), PortError> {
        match effect {
            SideEffect::SendReceipt {
                invoice,
                transaction,
                client,
            } => {
                let bytes = self
                    .renderer
                    .render_receipt(&invoice, &transaction, &client)
                    .await?;
                let attachment = MailAttachment {
                    filename: format!("receipt-{}.pdf", invoice.number),
                    content_type: "application/pdf".to_string(),
                    bytes,
                };
                let subject = format!("Payment receipt for {}", invoice.number);
                let body = format!(
                    "We have received your payment of {} against invoice {}. Thank you.",
                    transaction.amount, invoice.number
                );
                self.mailer
                    .send(&client.email, &subject, &body, Some(attachment))
                    .await
            }
            SideEffect::Notify {
                client_id,
                subject,
                body,
                severity,
            } => {
                self.notifications
                    .notify(client_id, &subject, &body, severity)
                    .await
            }
            SideEffect::EmitWebhook { event, payload } => self.webhooks.emit(&event, payload).await,
            SideEffect::GatewayRefund {
                gateway,
                external_ref,
                amount,
            } => match self.gateways.get(&gateway) {
                Some(client) if client.supports_refunds() => {
                    client.refund(&external_ref, &amount).await
                }
                Some(_) => {
                    debug!(%gateway, "gateway does not support refunds, keeping internal reversal only");
                    Ok(())
                }
                None => Err(PortError::not_found("Gateway", gateway)),
            },
        }
    }
}
