//! Billing CLI binary
//!
//! Runs the scheduled sweeps and manual consolidation against the
//! configured database.
//!
//! # Usage
//!
//! ```bash
//! # Invoice every due service and billable item
//! billing-cli recurring-sweep
//!
//! # Consolidate everything expiring within the horizon
//! billing-cli renewal-sweep
//!
//! # Consolidate one client's renewals now
//! billing-cli consolidate <client-uuid>
//! ```
//!
//! # Environment Variables
//!
//! * `BILLING_DATABASE_URL` - PostgreSQL connection string
//! * `BILLING_APP_NAME` - Installation name (default: Open Billing)
//! * `BILLING_TAX_PERCENTAGE` - Tax percentage (default: 15)
//! * `BILLING_TAX_LABEL` - Tax label (default: VAT)
//! * `BILLING_CURRENCY` - ISO 4217 currency code (default: BDT)
//! * `BILLING_RENEWAL_HORIZON_DAYS` - Renewal sweep horizon (default: 30)
//! * `BILLING_TLD_PRICES` - TLD renewal prices, e.g. "com=1200,com.bd=1800"
//! * `BILLING_LOG_LEVEL` - Log level (default: info)

use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use tracing_subscriber::EnvFilter;

use core_kernel::ClientId;
use domain_settlement::{
    CatalogPricing, ConsolidationEngine, EffectDispatcher, RecurringChargeGenerator, RenewalItem,
    SettlementStore, StaticSettings,
};
use infra_db::{create_pool, DatabaseConfig, PgSettlementStore};
use interface_cli::{
    AppConfig, LogMailer, LogNotificationSink, LogWebhookFanout, ManualGateway,
    TextReceiptRenderer,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    let config = load_config();
    init_tracing(&config.log_level);

    let command = std::env::args().nth(1).unwrap_or_default();
    match command.as_str() {
        "recurring-sweep" => run(config, Command::RecurringSweep).await,
        "renewal-sweep" => run(config, Command::RenewalSweep).await,
        "consolidate" => {
            let raw = std::env::args()
                .nth(2)
                .context("usage: billing-cli consolidate <client-uuid>")?;
            let client_id =
                ClientId::from_str(&raw).with_context(|| format!("bad client id '{raw}'"))?;
            run(config, Command::Consolidate(client_id)).await
        }
        _ => {
            eprintln!("usage: billing-cli <recurring-sweep | renewal-sweep | consolidate <client-uuid>>");
            std::process::exit(2);
        }
    }
}

enum Command {
    RecurringSweep,
    RenewalSweep,
    Consolidate(ClientId),
}

async fn run(config: AppConfig, command: Command) -> anyhow::Result<()> {
    let currency = config.parsed_currency()?;

    tracing::info!(app = %config.app_name, %currency, "Starting billing CLI");

    let pool = create_pool(DatabaseConfig::new(&config.database_url)).await?;
    infra_db::run_migrations(&pool).await?;

    let store: Arc<dyn SettlementStore> = Arc::new(PgSettlementStore::new(pool));
    let settings = Arc::new(
        StaticSettings::new(
            core_kernel::Rate::from_percentage(config.tax_percentage),
            config.tax_label.clone(),
            currency,
        )
        .with_app_name(config.app_name.clone()),
    );

    let mut pricing = CatalogPricing::new(currency);
    for (tld, price) in config.parsed_tld_prices()? {
        pricing = pricing.with_tld(&tld, price);
    }
    let pricing = Arc::new(pricing);

    let consolidation = Arc::new(ConsolidationEngine::new(
        Arc::clone(&store),
        settings.clone(),
        pricing,
    ));
    let generator = RecurringChargeGenerator::new(
        Arc::clone(&store),
        settings.clone(),
        Arc::clone(&consolidation),
    );

    let dispatcher = Arc::new(
        EffectDispatcher::new(
            Arc::new(LogNotificationSink),
            Arc::new(TextReceiptRenderer),
            Arc::new(LogMailer),
            Arc::new(LogWebhookFanout),
        )
        .register_gateway(Arc::new(ManualGateway)),
    );

    let today = Utc::now().date_naive();
    match command {
        Command::RecurringSweep => {
            let mut report = generator.run_recurring_sweep(today).await?;
            dispatcher.drain(report.take_side_effects()).await;
            tracing::info!(
                generated = report.generated.len(),
                skipped_services = report.skipped_services.len(),
                skipped_billables = report.skipped_billables.len(),
                failures = report.failures.len(),
                "recurring sweep done"
            );
            for failure in &report.failures {
                tracing::warn!(failure, "source not invoiced");
            }
        }
        Command::RenewalSweep => {
            let mut report = generator
                .run_renewal_sweep(today, config.renewal_horizon_days)
                .await?;
            dispatcher.drain(report.take_side_effects()).await;
            tracing::info!(
                clients = report.clients.len(),
                failures = report.failures.len(),
                "renewal sweep done"
            );
        }
        Command::Consolidate(client_id) => {
            let mut items = Vec::new();
            for service in store
                .expiring_services(today, config.renewal_horizon_days)
                .await?
            {
                if service.client_id == client_id {
                    items.push(RenewalItem::service(service.id, 1));
                }
            }
            for domain in store
                .expiring_domains(today, config.renewal_horizon_days)
                .await?
            {
                if domain.client_id == client_id {
                    items.push(RenewalItem::domain(domain.id, domain.registration_years.max(1)));
                }
            }

            if items.is_empty() {
                tracing::info!(%client_id, "nothing expiring for client");
                return Ok(());
            }

            let mut outcome = consolidation.consolidate(client_id, &items, today).await?;
            dispatcher
                .drain(std::mem::take(&mut outcome.side_effects))
                .await;
            tracing::info!(
                %client_id,
                landed = outcome.landed(),
                skipped = outcome.skipped.len(),
                folded = outcome.folded.len(),
                hub = outcome.hub.as_ref().map(|hub| hub.number.as_str()),
                "consolidation done"
            );
        }
    }

    Ok(())
}

fn load_config() -> AppConfig {
    AppConfig::from_env().unwrap_or_else(|_| AppConfig {
        database_url: std::env::var("DATABASE_URL")
            .or_else(|_| std::env::var("BILLING_DATABASE_URL"))
            .unwrap_or_else(|_| "postgres://localhost/billing".to_string()),
        log_level: std::env::var("BILLING_LOG_LEVEL")
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or_else(|_| "info".to_string()),
        ..AppConfig::default()
    })
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
