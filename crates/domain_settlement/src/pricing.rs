//! Renewal pricing resolution
//!
//! Consolidation needs a price for every renewal line it writes. Service
//! renewals are priced off the service's own recurring amount; domain
//! renewals come from a per-TLD catalog. Both go through [`RenewalPricing`]
//! so deployments can swap in registrar-fed or promotional pricing.

use core_kernel::{Currency, Money};
use domain_provisioning::{DomainName, Service};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Resolves the price of a renewal line before it lands on an invoice.
pub trait RenewalPricing: Send + Sync + 'static {
    /// Price for renewing `service` by `periods` billing cycles.
    fn price_service_renewal(&self, service: &Service, periods: u32) -> Money;

    /// Price for renewing `domain` by `years` registration years.
    fn price_domain_renewal(&self, domain: &DomainName, years: u32) -> Money;
}

/// Catalog-backed pricing: services renew at their recurring amount per
/// cycle, domains at a per-TLD yearly price.
///
/// TLD lookup matches the longest configured suffix, so "co.uk" wins
/// over "uk" for `example.co.uk`. A domain whose TLD is missing from
/// the catalog prices at zero; consolidation skips zero-priced lines
/// rather than billing them.
pub struct CatalogPricing {
    currency: Currency,
    tld_yearly: HashMap<String, Decimal>,
}

impl CatalogPricing {
    pub fn new(currency: Currency) -> Self {
        Self {
            currency,
            tld_yearly: HashMap::new(),
        }
    }

    /// Registers a yearly renewal price for a TLD. The suffix is stored
    /// without a leading dot ("com", "co.uk").
    pub fn with_tld(mut self, tld: impl Into<String>, yearly: Decimal) -> Self {
        self.tld_yearly
            .insert(tld.into().trim_start_matches('.').to_lowercase(), yearly);
        self
    }

    fn yearly_for(&self, fqdn: &str) -> Option<Decimal> {
        let name = fqdn.to_lowercase();
        let mut best: Option<(usize, Decimal)> = None;
        for (tld, price) in &self.tld_yearly {
            let suffix = format!(".{tld}");
            if name.ends_with(&suffix) && best.map_or(true, |(len, _)| tld.len() > len) {
                best = Some((tld.len(), *price));
            }
        }
        best.map(|(_, price)| price)
    }
}

impl RenewalPricing for CatalogPricing {
    fn price_service_renewal(&self, service: &Service, periods: u32) -> Money {
        service.recurring_amount.multiply(Decimal::from(periods))
    }

    fn price_domain_renewal(&self, domain: &DomainName, years: u32) -> Money {
        match self.yearly_for(&domain.name) {
            Some(yearly) => Money::new(yearly * Decimal::from(years), self.currency),
            None => Money::zero(self.currency),
        }
    }
}
