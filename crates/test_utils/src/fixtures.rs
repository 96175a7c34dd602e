//! Pre-built Test Fixtures
//!
//! Provides ready-to-use test data for common entities across the billing
//! system. These fixtures are designed to be consistent and predictable
//! for unit tests.

use chrono::NaiveDate;
use core_kernel::{
    BillableItemId, ClientId, Currency, DomainId, InvestorId, InvoiceId, Money, OrderId, Rate,
    ServiceId, TransactionId,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

/// Fixture for Money test data
pub struct MoneyFixtures;

impl MoneyFixtures {
    /// Creates a standard BDT amount for testing
    pub fn bdt_100() -> Money {
        Money::new(dec!(100.00), Currency::BDT)
    }

    /// Creates a typical hosting renewal price
    pub fn bdt_hosting() -> Money {
        Money::new(dec!(2500.00), Currency::BDT)
    }

    /// Creates a typical domain renewal price
    pub fn bdt_domain() -> Money {
        Money::new(dec!(1200.00), Currency::BDT)
    }

    /// Creates a zero amount
    pub fn bdt_zero() -> Money {
        Money::zero(Currency::BDT)
    }

    /// Creates a USD amount for currency mismatch tests
    pub fn usd_100() -> Money {
        Money::new(dec!(100.00), Currency::USD)
    }

    /// Creates a negative amount for reversal scenarios
    pub fn bdt_reversal() -> Money {
        Money::new(dec!(-50.00), Currency::BDT)
    }
}

/// Fixture for date test data
pub struct DateFixtures;

impl DateFixtures {
    /// Standard "today" used by engine tests (Jun 15, 2024)
    pub fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    /// An invoice due date two weeks out from [`Self::today`]
    pub fn due_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 29).unwrap()
    }

    /// A service due date inside the standard 30-day renewal horizon
    pub fn due_within_horizon() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()
    }

    /// A date safely past the standard 30-day renewal horizon
    pub fn beyond_horizon() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, 1).unwrap()
    }

    /// A lapsed due date before [`Self::today`]
    pub fn lapsed() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }
}

/// Fixture for identifier test data
pub struct IdFixtures;

impl IdFixtures {
    /// Creates a deterministic client ID for testing
    pub fn client_id() -> ClientId {
        ClientId::from_uuid(Uuid::parse_str("550e8400-e29b-41d4-a716-446655440001").unwrap())
    }

    /// Creates a deterministic invoice ID for testing
    pub fn invoice_id() -> InvoiceId {
        InvoiceId::from_uuid(Uuid::parse_str("550e8400-e29b-41d4-a716-446655440002").unwrap())
    }

    /// Creates a deterministic transaction ID for testing
    pub fn transaction_id() -> TransactionId {
        TransactionId::from_uuid(Uuid::parse_str("550e8400-e29b-41d4-a716-446655440003").unwrap())
    }

    /// Creates a deterministic service ID for testing
    pub fn service_id() -> ServiceId {
        ServiceId::from_uuid(Uuid::parse_str("550e8400-e29b-41d4-a716-446655440004").unwrap())
    }

    /// Creates a deterministic domain ID for testing
    pub fn domain_id() -> DomainId {
        DomainId::from_uuid(Uuid::parse_str("550e8400-e29b-41d4-a716-446655440005").unwrap())
    }

    /// Creates a deterministic order ID for testing
    pub fn order_id() -> OrderId {
        OrderId::from_uuid(Uuid::parse_str("550e8400-e29b-41d4-a716-446655440006").unwrap())
    }

    /// Creates a deterministic billable item ID for testing
    pub fn billable_id() -> BillableItemId {
        BillableItemId::from_uuid(Uuid::parse_str("550e8400-e29b-41d4-a716-446655440007").unwrap())
    }

    /// Creates a deterministic investor ID for testing
    pub fn investor_id() -> InvestorId {
        InvestorId::from_uuid(Uuid::parse_str("550e8400-e29b-41d4-a716-446655440008").unwrap())
    }
}

/// Fixture for rate test data
pub struct RateFixtures;

impl RateFixtures {
    /// Standard VAT rate (15%)
    pub fn vat() -> Rate {
        Rate::from_percentage(dec!(15))
    }

    /// Zero tax rate
    pub fn no_tax() -> Rate {
        Rate::from_percentage(Decimal::ZERO)
    }

    /// Standard commission rate (10%)
    pub fn commission() -> Rate {
        Rate::from_percentage(dec!(10))
    }

    /// Small epsilon for decimal comparisons
    pub fn epsilon() -> Decimal {
        dec!(0.0001)
    }
}

/// Fixture for string test data
pub struct StringFixtures;

impl StringFixtures {
    /// Standard gateway name
    pub fn gateway() -> &'static str {
        "bkash"
    }

    /// Standard gateway payment reference
    pub fn external_ref() -> &'static str {
        "TRX-2024-000001"
    }

    /// Standard service name
    pub fn service_name() -> &'static str {
        "Business Hosting - example.com.bd"
    }

    /// Standard domain name
    pub fn domain_name() -> &'static str {
        "example.com.bd"
    }

    /// Standard refund reason
    pub fn refund_reason() -> &'static str {
        "Service cancelled within trial period"
    }

    /// Test client name
    pub fn client_name() -> &'static str {
        "Rahim Traders"
    }

    /// Test email address
    pub fn email() -> &'static str {
        "billing@example.com"
    }
}
