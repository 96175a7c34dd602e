//! Property-Based Test Generators
//!
//! Provides proptest strategies for generating random test data
//! that maintains domain invariants.

use chrono::{Duration, NaiveDate};
use core_kernel::{BillingCycle, ClientId, Currency, InvoiceId, Money, Rate, ServiceId, TransactionId};
use proptest::prelude::*;
use rust_decimal::Decimal;

/// Strategy for generating valid Currency values
pub fn currency_strategy() -> impl Strategy<Value = Currency> {
    prop_oneof![
        Just(Currency::BDT),
        Just(Currency::USD),
        Just(Currency::EUR),
        Just(Currency::GBP),
        Just(Currency::INR),
    ]
}

/// Strategy for generating valid positive amounts in minor units
pub fn positive_amount_minor_strategy() -> impl Strategy<Value = i64> {
    1i64..1_000_000_000i64
}

/// Strategy for generating valid amount ranges
pub fn amount_minor_strategy() -> impl Strategy<Value = i64> {
    -1_000_000_000i64..1_000_000_000i64
}

/// Strategy for generating valid Money values with positive amounts
pub fn positive_money_strategy() -> impl Strategy<Value = Money> {
    (positive_amount_minor_strategy(), currency_strategy())
        .prop_map(|(amount, currency)| Money::from_minor(amount, currency))
}

/// Strategy for generating valid Money values (can be negative)
pub fn money_strategy() -> impl Strategy<Value = Money> {
    (amount_minor_strategy(), currency_strategy())
        .prop_map(|(amount, currency)| Money::from_minor(amount, currency))
}

/// Strategy for generating positive BDT Money values
pub fn bdt_money_strategy() -> impl Strategy<Value = Money> {
    positive_amount_minor_strategy().prop_map(|amount| Money::from_minor(amount, Currency::BDT))
}

/// Strategy for generating tax rates between 0% and 100%
pub fn tax_rate_strategy() -> impl Strategy<Value = Rate> {
    (0u32..10000u32).prop_map(|n| Rate::new(Decimal::new(n as i64, 4)))
}

/// Strategy for generating billing cycles
pub fn billing_cycle_strategy() -> impl Strategy<Value = BillingCycle> {
    prop_oneof![
        Just(BillingCycle::Monthly),
        Just(BillingCycle::Quarterly),
        Just(BillingCycle::SemiAnnually),
        Just(BillingCycle::Annually),
        Just(BillingCycle::Biennially),
        Just(BillingCycle::Triennially),
    ]
}

/// Strategy for generating renewal period counts (1 to 10 cycles)
pub fn period_count_strategy() -> impl Strategy<Value = u32> {
    1u32..=10u32
}

/// Strategy for generating domain registration terms in years (1 to 10)
pub fn registration_years_strategy() -> impl Strategy<Value = u32> {
    1u32..=10u32
}

/// Strategy for generating dates within 2024
pub fn date_2024_strategy() -> impl Strategy<Value = NaiveDate> {
    (0i64..365i64).prop_map(|days| {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(days)
    })
}

/// Strategy for generating a date and a later due date
pub fn date_pair_strategy() -> impl Strategy<Value = (NaiveDate, NaiveDate)> {
    (0i64..365i64, 1i64..365i64).prop_map(|(start_days, gap_days)| {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(start_days);
        (start, start + Duration::days(gap_days))
    })
}

/// Strategy for generating ClientId
pub fn client_id_strategy() -> impl Strategy<Value = ClientId> {
    any::<[u8; 16]>().prop_map(|bytes| ClientId::from_uuid(uuid::Uuid::from_bytes(bytes)))
}

/// Strategy for generating InvoiceId
pub fn invoice_id_strategy() -> impl Strategy<Value = InvoiceId> {
    any::<[u8; 16]>().prop_map(|bytes| InvoiceId::from_uuid(uuid::Uuid::from_bytes(bytes)))
}

/// Strategy for generating ServiceId
pub fn service_id_strategy() -> impl Strategy<Value = ServiceId> {
    any::<[u8; 16]>().prop_map(|bytes| ServiceId::from_uuid(uuid::Uuid::from_bytes(bytes)))
}

/// Strategy for generating TransactionId
pub fn transaction_id_strategy() -> impl Strategy<Value = TransactionId> {
    any::<[u8; 16]>().prop_map(|bytes| TransactionId::from_uuid(uuid::Uuid::from_bytes(bytes)))
}

/// Strategy for generating gateway names
pub fn gateway_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("bkash".to_string()),
        Just("nagad".to_string()),
        Just("rocket".to_string()),
        Just("stripe".to_string()),
        Just("manual".to_string()),
    ]
}

/// Strategy for generating unique-looking gateway references
pub fn external_ref_strategy() -> impl Strategy<Value = String> {
    "[A-Z0-9]{10,16}".prop_map(|s| format!("TRX-{s}"))
}

/// Strategy for generating TLDs the pricing catalog knows about
pub fn tld_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("com".to_string()),
        Just("net".to_string()),
        Just("org".to_string()),
        Just("com.bd".to_string()),
        Just("xyz".to_string()),
    ]
}

/// Strategy for generating registrable domain names
pub fn domain_name_strategy() -> impl Strategy<Value = String> {
    ("[a-z]{3,12}", tld_strategy()).prop_map(|(label, tld)| format!("{label}.{tld}"))
}
