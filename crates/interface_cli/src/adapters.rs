//! Log-only collaborator adapters
//!
//! The delivery transports (mail, in-app notification, webhook queues,
//! gateway SDKs) live outside this repository. The CLI still has to hand
//! the engines a full set of collaborator ports, so these adapters record
//! every call through `tracing` and succeed. Swapping one for a real
//! transport is a matter of implementing the same port elsewhere.

use async_trait::async_trait;
use tracing::info;

use core_kernel::{ClientId, DomainPort, Money, PortError};
use domain_billing::{Invoice, PaymentTransaction};
use domain_settlement::{
    ClientSummary, DocumentRenderer, GatewayClient, MailAttachment, Mailer, NotificationSeverity,
    NotificationSink, WebhookFanout,
};

/// Writes notifications to the log instead of a delivery queue
pub struct LogNotificationSink;

impl DomainPort for LogNotificationSink {}

#[async_trait]
impl NotificationSink for LogNotificationSink {
    async fn notify(
        &self,
        client_id: ClientId,
        subject: &str,
        body: &str,
        severity: NotificationSeverity,
    ) -> Result<(), PortError> {
        info!(%client_id, subject, body, ?severity, "notification");
        Ok(())
    }
}

/// Renders a plain-text receipt; a PDF renderer implements the same port
pub struct TextReceiptRenderer;

impl DomainPort for TextReceiptRenderer {}

#[async_trait]
impl DocumentRenderer for TextReceiptRenderer {
    async fn render_receipt(
        &self,
        invoice: &Invoice,
        transaction: &PaymentTransaction,
        client: &ClientSummary,
    ) -> Result<Vec<u8>, PortError> {
        let receipt = format!(
            "Receipt for {}\nInvoice {}\nTransaction {} via {}\nAmount {}\n",
            client.name, invoice.number, transaction.external_ref, transaction.gateway,
            transaction.amount,
        );
        Ok(receipt.into_bytes())
    }
}

/// Logs outgoing mail
pub struct LogMailer;

impl DomainPort for LogMailer {}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        _body: &str,
        attachment: Option<MailAttachment>,
    ) -> Result<(), PortError> {
        info!(
            to,
            subject,
            attachment = attachment.as_ref().map(|a| a.filename.as_str()),
            "mail"
        );
        Ok(())
    }
}

/// Logs webhook emissions
pub struct LogWebhookFanout;

impl DomainPort for LogWebhookFanout {}

#[async_trait]
impl WebhookFanout for LogWebhookFanout {
    async fn emit(&self, event: &str, payload: serde_json::Value) -> Result<(), PortError> {
        info!(event, %payload, "webhook");
        Ok(())
    }
}

/// Gateway stand-in for manually recorded payments; refunds stay internal
pub struct ManualGateway;

impl DomainPort for ManualGateway {}

#[async_trait]
impl GatewayClient for ManualGateway {
    fn name(&self) -> &str {
        "manual"
    }

    fn supports_refunds(&self) -> bool {
        false
    }

    async fn init_payment(
        &self,
        invoice: &Invoice,
        _client: &ClientSummary,
    ) -> Result<String, PortError> {
        Err(PortError::validation(format!(
            "manual gateway cannot start a checkout for invoice {}",
            invoice.number
        )))
    }

    async fn refund(&self, external_ref: &str, amount: &Money) -> Result<(), PortError> {
        info!(external_ref, %amount, "manual gateway refund noted");
        Ok(())
    }
}
