//! Operational CLI for the billing engines
//!
//! The scheduled entry points of the system: the recurring charge sweep,
//! the renewal consolidation sweep, and a manual consolidation trigger
//! for one client. Everything HTTP-shaped (checkout, webhooks, operator
//! screens) lives outside this repository; this crate only wires the
//! engines to PostgreSQL and log-backed collaborators.

pub mod adapters;
pub mod config;

pub use adapters::{
    LogMailer, LogNotificationSink, LogWebhookFanout, ManualGateway, TextReceiptRenderer,
};
pub use config::AppConfig;
