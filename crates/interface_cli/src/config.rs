//! CLI configuration

use core_kernel::Currency;
use rust_decimal::Decimal;
use serde::Deserialize;

/// Billing CLI configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database URL
    pub database_url: String,
    /// Installation name shown in notifications and documents
    pub app_name: String,
    /// Tax rate as a percentage (e.g. 15 for 15%)
    pub tax_percentage: Decimal,
    /// Tax label shown on documents (e.g. "VAT")
    pub tax_label: String,
    /// ISO 4217 billing currency
    pub currency: String,
    /// Renewal sweep horizon in days
    pub renewal_horizon_days: i64,
    /// TLD renewal prices, `tld=price` pairs separated by commas
    /// (e.g. "com=1200,com.bd=1800")
    pub tld_prices: Option<String>,
    /// Log level
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/billing".to_string(),
            app_name: "Open Billing".to_string(),
            tax_percentage: Decimal::from(15),
            tax_label: "VAT".to_string(),
            currency: "BDT".to_string(),
            renewal_horizon_days: 30,
            tld_prices: None,
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from `BILLING_`-prefixed environment variables
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix("BILLING"))
            .build()?
            .try_deserialize()
    }

    /// Parses the configured billing currency
    pub fn parsed_currency(&self) -> anyhow::Result<Currency> {
        Currency::parse(&self.currency)
            .ok_or_else(|| anyhow::anyhow!("unsupported currency '{}'", self.currency))
    }

    /// Parses the `tld=price` pairs into a table
    pub fn parsed_tld_prices(&self) -> anyhow::Result<Vec<(String, Decimal)>> {
        let Some(raw) = &self.tld_prices else {
            return Ok(Vec::new());
        };
        raw.split(',')
            .filter(|pair| !pair.trim().is_empty())
            .map(|pair| {
                let (tld, price) = pair
                    .split_once('=')
                    .ok_or_else(|| anyhow::anyhow!("bad tld price entry '{pair}'"))?;
                let price: Decimal = price
                    .trim()
                    .parse()
                    .map_err(|_| anyhow::anyhow!("bad tld price '{price}'"))?;
                Ok((tld.trim().trim_start_matches('.').to_string(), price))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_tld_price_parsing() {
        let config = AppConfig {
            tld_prices: Some("com=1200, .com.bd=1800".to_string()),
            ..AppConfig::default()
        };
        let prices = config.parsed_tld_prices().unwrap();
        assert_eq!(prices.len(), 2);
        assert_eq!(prices[0], ("com".to_string(), dec!(1200)));
        assert_eq!(prices[1], ("com.bd".to_string(), dec!(1800)));
    }

    #[test]
    fn test_bad_tld_entry_rejected() {
        let config = AppConfig {
            tld_prices: Some("com:1200".to_string()),
            ..AppConfig::default()
        };
        assert!(config.parsed_tld_prices().is_err());
    }

    #[test]
    fn test_default_currency_parses() {
        let config = AppConfig::default();
        assert_eq!(config.parsed_currency().unwrap(), Currency::BDT);
    }
}
