//! Tenant settings lookup
//!
//! Settlement math needs a handful of installation-wide values: the tax
//! rate applied to invoices, the label printed next to it, and the
//! operating currency. These live in operator configuration, so the
//! engines read them through a port rather than hard-coding them.

use core_kernel::{Currency, Rate};
use rust_decimal::Decimal;

/// Read-only access to installation settings.
///
/// Implementations are expected to be cheap to call; engines read
/// settings on every operation rather than caching them.
pub trait SettingsLookup: Send + Sync + 'static {
    /// Tax rate applied to invoice subtotals.
    fn tax_rate(&self) -> Rate;

    /// Human-readable label for the tax line (e.g. "VAT", "GST").
    fn tax_label(&self) -> String;

    /// Operating currency for all billing documents.
    fn currency(&self) -> Currency;

    /// Symbol rendered in front of amounts.
    fn currency_symbol(&self) -> String {
        self.currency().symbol().to_string()
    }

    /// Installation name used in notifications and documents.
    fn app_name(&self) -> String;
}

/// Fixed settings, used by tests and single-tenant deployments where
/// the values come from configuration at startup.
#[derive(Debug, Clone)]
pub struct StaticSettings {
    pub tax_rate: Rate,
    pub tax_label: String,
    pub currency: Currency,
    pub app_name: String,
}

impl StaticSettings {
    pub fn new(tax_rate: Rate, tax_label: impl Into<String>, currency: Currency) -> Self {
        Self {
            tax_rate,
            tax_label: tax_label.into(),
            currency,
            app_name: "Open Billing".to_string(),
        }
    }

    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }
}

impl Default for StaticSettings {
    fn default() -> Self {
        Self::new(
            Rate::from_percentage(Decimal::from(15)),
            "VAT",
            Currency::BDT,
        )
    }
}

impl SettingsLookup for StaticSettings {
    fn tax_rate(&self) -> Rate {
        self.tax_rate
    }

    fn tax_label(&self) -> String {
        self.tax_label.clone()
    }

    fn currency(&self) -> Currency {
        self.currency
    }

    fn app_name(&self) -> String {
        self.app_name.clone()
    }
}
