//! Settlement Engines - Payment Application, Consolidation, and Refunds
//!
//! This crate orchestrates the billing and provisioning domains. Four
//! engines cover the money paths of the platform:
//!
//! - [`SettlementEngine`] applies captured payments to invoices and,
//!   when an invoice becomes fully paid, completes its order, activates
//!   or extends the provisioned services and domains, and distributes
//!   investor commissions
//! - [`ConsolidationEngine`] gathers a client's upcoming renewals onto
//!   one open hub invoice without ever billing a renewal twice
//! - [`RefundWorkflow`] drives refunds through their approval chain and
//!   reverses the money when one completes
//! - [`RecurringChargeGenerator`] runs the scheduled sweeps that
//!   generate recurring invoices and feed the consolidation engine
//!
//! Engines reach storage and the outside world only through the ports
//! in [`ports`]; every operation loads one consistent view, mutates
//! domain aggregates, and commits one batch. Side effects (receipts,
//! notifications, webhooks, gateway refunds) are described on the
//! outcome and executed post-commit by the [`EffectDispatcher`].
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_settlement::{PaymentRequest, SettlementEngine, SettlementOutcome};
//!
//! let engine = SettlementEngine::new(store, settings);
//! let outcome = engine
//!     .record_payment(PaymentRequest {
//!         invoice_id,
//!         amount,
//!         gateway: "bkash".into(),
//!         external_ref: Some("TRX9A4F1".into()),
//!         raw_payload: None,
//!     })
//!     .await?;
//!
//! if let SettlementOutcome::Settled(receipt) = outcome {
//!     dispatcher.dispatch(receipt.side_effects);
//! }
//! ```

pub mod consolidation;
pub mod effects;
pub mod error;
pub mod ports;
pub mod pricing;
pub mod recurring;
pub mod refund_flow;
pub mod settings;
pub mod settlement;

pub use consolidation::{
    ConsolidationEngine, ConsolidationOutcome, RenewalItem, SkipReason, SkippedItem,
};
pub use effects::{EffectDispatcher, SideEffect, EFFECT_TIMEOUT};
pub use error::SettlementError;
pub use ports::{
    ClientSummary, ConsolidationBatch, ConsolidationView, DocumentRenderer, GatewayClient,
    GeneratedInvoiceBatch, GeneratorSource, MailAttachment, Mailer, NotificationSeverity,
    NotificationSink, RefundCompletionBatch, RefundView, SettlementBatch, SettlementStore,
    SettlementView, WebhookFanout,
};
pub use pricing::{CatalogPricing, RenewalPricing};
pub use recurring::{
    ClientRenewals, GeneratedInvoice, RecurringChargeGenerator, RenewalSweepReport, SweepReport,
};
pub use refund_flow::{RefundActor, RefundOutcome, RefundWorkflow};
pub use settings::{SettingsLookup, StaticSettings};
pub use settlement::{
    PaymentRequest, SettlementEffects, SettlementEngine, SettlementOutcome, SettlementReceipt,
};
