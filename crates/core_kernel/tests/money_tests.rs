//! Comprehensive unit tests for the Money module
//!
//! Tests cover money creation, arithmetic operations, currency handling,
//! rounding, and edge cases.

use core_kernel::{Currency, Money, MoneyError};
use rust_decimal_macros::dec;

mod creation {
    use super::*;

    #[test]
    fn test_new_creates_money_with_correct_amount() {
        let m = Money::new(dec!(100.50), Currency::BDT);
        assert_eq!(m.amount(), dec!(100.50));
        assert_eq!(m.currency(), Currency::BDT);
    }

    #[test]
    fn test_new_rounds_to_four_decimal_places() {
        let m = Money::new(dec!(100.123456789), Currency::BDT);
        assert_eq!(m.amount(), dec!(100.1235));
    }

    #[test]
    fn test_from_minor_converts_paisa_correctly() {
        let m = Money::from_minor(10050, Currency::BDT);
        assert_eq!(m.amount(), dec!(100.50));
    }

    #[test]
    fn test_zero_creates_zero_amount() {
        let m = Money::zero(Currency::USD);
        assert!(m.is_zero());
        assert_eq!(m.currency(), Currency::USD);
    }

    #[test]
    fn test_negative_amount_creation() {
        let m = Money::new(dec!(-100.00), Currency::BDT);
        assert!(m.is_negative());
        assert_eq!(m.amount(), dec!(-100.00));
    }
}

mod predicates {
    use super::*;

    #[test]
    fn test_is_zero_true_for_zero_amount() {
        let m = Money::zero(Currency::BDT);
        assert!(m.is_zero());
    }

    #[test]
    fn test_is_zero_false_for_positive_amount() {
        let m = Money::new(dec!(0.01), Currency::BDT);
        assert!(!m.is_zero());
    }

    #[test]
    fn test_is_positive_false_for_zero() {
        let m = Money::zero(Currency::BDT);
        assert!(!m.is_positive());
    }

    #[test]
    fn test_is_positive_false_for_negative() {
        let m = Money::new(dec!(-100.00), Currency::BDT);
        assert!(!m.is_positive());
    }

    #[test]
    fn test_is_negative_false_for_zero() {
        let m = Money::zero(Currency::BDT);
        assert!(!m.is_negative());
    }
}

mod arithmetic {
    use super::*;

    #[test]
    fn test_checked_add_same_currency() {
        let a = Money::new(dec!(100.00), Currency::BDT);
        let b = Money::new(dec!(50.00), Currency::BDT);
        let result = a.checked_add(&b).unwrap();
        assert_eq!(result.amount(), dec!(150.00));
    }

    #[test]
    fn test_checked_add_currency_mismatch() {
        let a = Money::new(dec!(100.00), Currency::BDT);
        let b = Money::new(dec!(50.00), Currency::USD);
        let result = a.checked_add(&b);
        assert!(matches!(result, Err(MoneyError::CurrencyMismatch(_, _))));
    }

    #[test]
    fn test_checked_sub_can_go_negative() {
        // Refund application may drive amount_paid below zero transiently
        let a = Money::new(dec!(30.00), Currency::BDT);
        let b = Money::new(dec!(100.00), Currency::BDT);
        let result = a.checked_sub(&b).unwrap();
        assert_eq!(result.amount(), dec!(-70.00));
    }

    #[test]
    fn test_add_operator_same_currency() {
        let a = Money::new(dec!(100.00), Currency::BDT);
        let b = Money::new(dec!(50.00), Currency::BDT);
        assert_eq!((a + b).amount(), dec!(150.00));
    }

    #[test]
    fn test_negation() {
        let m = Money::new(dec!(100.00), Currency::BDT);
        assert_eq!((-m).amount(), dec!(-100.00));
    }

    #[test]
    fn test_multiply_by_period_count() {
        let m = Money::new(dec!(1200.00), Currency::BDT);
        let result = m * dec!(3);
        assert_eq!(result.amount(), dec!(3600.00));
    }

    #[test]
    fn test_multiply_by_zero() {
        let m = Money::new(dec!(100.00), Currency::BDT);
        assert!(m.multiply(dec!(0)).is_zero());
    }

    #[test]
    fn test_divide_by_scalar() {
        let m = Money::new(dec!(100.00), Currency::BDT);
        let result = m.divide(dec!(4)).unwrap();
        assert_eq!(result.amount(), dec!(25.00));
    }

    #[test]
    fn test_divide_by_zero_error() {
        let m = Money::new(dec!(100.00), Currency::BDT);
        let result = m.divide(dec!(0));
        assert!(matches!(result, Err(MoneyError::DivisionByZero)));
    }
}

mod abs_and_rounding {
    use super::*;

    #[test]
    fn test_abs_negative() {
        let m = Money::new(dec!(-100.00), Currency::BDT);
        assert_eq!(m.abs().amount(), dec!(100.00));
    }

    #[test]
    fn test_round_to_currency() {
        let m = Money::new(dec!(100.1234), Currency::BDT);
        assert_eq!(m.round_to_currency().amount(), dec!(100.12));
    }

    #[test]
    fn test_round_bankers() {
        let m = Money::new(dec!(100.125), Currency::BDT);
        // Banker's rounding: 100.125 -> 100.12 (round to even)
        assert_eq!(m.round_bankers(2).amount(), dec!(100.12));
    }

    #[test]
    fn test_round_bankers_odd_rounds_up() {
        let m = Money::new(dec!(100.135), Currency::BDT);
        // Banker's rounding: 100.135 -> 100.14 (round to even)
        assert_eq!(m.round_bankers(2).amount(), dec!(100.14));
    }
}

mod currency {
    use super::*;

    #[test]
    fn test_all_currencies_have_symbols() {
        let currencies = [
            Currency::BDT,
            Currency::USD,
            Currency::EUR,
            Currency::GBP,
            Currency::INR,
        ];

        for currency in currencies {
            assert!(!currency.symbol().is_empty());
            assert!(!currency.code().is_empty());
        }
    }

    #[test]
    fn test_currency_codes() {
        assert_eq!(Currency::BDT.code(), "BDT");
        assert_eq!(Currency::USD.code(), "USD");
    }

    #[test]
    fn test_currency_parse_roundtrip() {
        for currency in [
            Currency::BDT,
            Currency::USD,
            Currency::EUR,
            Currency::GBP,
            Currency::INR,
        ] {
            assert_eq!(Currency::parse(currency.code()), Some(currency));
        }
    }

    #[test]
    fn test_currency_display() {
        assert_eq!(format!("{}", Currency::BDT), "BDT");
        assert_eq!(format!("{}", Currency::USD), "USD");
    }
}

mod display {
    use super::*;

    #[test]
    fn test_money_display_bdt() {
        let m = Money::new(dec!(1234.56), Currency::BDT);
        let display = format!("{}", m);
        assert!(display.contains("৳"));
        assert!(display.contains("1234.56"));
    }

    #[test]
    fn test_money_display_usd() {
        let m = Money::new(dec!(1234.56), Currency::USD);
        let display = format!("{}", m);
        assert!(display.contains("$"));
    }
}

mod rate {
    use super::*;
    use core_kernel::money::Rate;

    #[test]
    fn test_rate_from_percentage() {
        let rate = Rate::from_percentage(dec!(15.0));
        assert_eq!(rate.as_decimal(), dec!(0.15));
    }

    #[test]
    fn test_rate_as_percentage() {
        let rate = Rate::new(dec!(0.05));
        assert_eq!(rate.as_percentage(), dec!(5.0));
    }

    #[test]
    fn test_tax_rate_apply() {
        let rate = Rate::from_percentage(dec!(15.0));
        let subtotal = Money::new(dec!(1000.00), Currency::BDT);
        let tax = rate.apply(&subtotal);
        assert_eq!(tax.amount(), dec!(150.00));
    }

    #[test]
    fn test_rate_display() {
        let rate = Rate::from_percentage(dec!(5.0));
        let display = format!("{}", rate);
        assert!(display.contains("5"));
        assert!(display.contains("%"));
    }
}

mod serialization {
    use super::*;

    #[test]
    fn test_money_json_roundtrip() {
        let m = Money::new(dec!(100.50), Currency::BDT);
        let json = serde_json::to_string(&m).unwrap();
        let deserialized: Money = serde_json::from_str(&json).unwrap();
        assert_eq!(m, deserialized);
    }

    #[test]
    fn test_currency_serializes_uppercase() {
        let json = serde_json::to_string(&Currency::BDT).unwrap();
        assert_eq!(json, "\"BDT\"");
    }
}

mod equality {
    use super::*;

    #[test]
    fn test_money_equality_same_values() {
        let a = Money::new(dec!(100.00), Currency::BDT);
        let b = Money::new(dec!(100.00), Currency::BDT);
        assert_eq!(a, b);
    }

    #[test]
    fn test_money_inequality_different_currencies() {
        let a = Money::new(dec!(100.00), Currency::BDT);
        let b = Money::new(dec!(100.00), Currency::USD);
        assert_ne!(a, b);
    }

    #[test]
    fn test_money_hash_equality() {
        use std::collections::HashSet;

        let a = Money::new(dec!(100.00), Currency::BDT);
        let b = Money::new(dec!(100.00), Currency::BDT);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }
}
