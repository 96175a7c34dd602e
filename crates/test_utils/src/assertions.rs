//! Custom Test Assertions
//!
//! Provides specialized assertion helpers for domain types that give
//! more meaningful error messages than standard assertions.

use core_kernel::Money;
use domain_billing::{Invoice, InvoiceStatus};
use rust_decimal::Decimal;

/// Asserts that two Money values are approximately equal within a tolerance
///
/// # Arguments
///
/// * `actual` - The actual Money value
/// * `expected` - The expected Money value
/// * `tolerance` - The allowed difference in the amount
///
/// # Panics
///
/// Panics if the currencies don't match or the amounts differ by more than tolerance
pub fn assert_money_approx_eq(actual: &Money, expected: &Money, tolerance: Decimal) {
    assert_eq!(
        actual.currency(),
        expected.currency(),
        "Currency mismatch: actual={}, expected={}",
        actual.currency(),
        expected.currency()
    );

    let diff = (actual.amount() - expected.amount()).abs();
    assert!(
        diff <= tolerance,
        "Money amounts differ by more than tolerance: actual={}, expected={}, diff={}, tolerance={}",
        actual.amount(),
        expected.amount(),
        diff,
        tolerance
    );
}

/// Asserts that a Money value is positive
pub fn assert_money_positive(money: &Money) {
    assert!(
        money.is_positive(),
        "Expected positive money, got {} {}",
        money.currency().symbol(),
        money.amount()
    );
}

/// Asserts that a Money value is zero
pub fn assert_money_zero(money: &Money) {
    assert!(
        money.is_zero(),
        "Expected zero money, got {} {}",
        money.currency().symbol(),
        money.amount()
    );
}

/// Asserts that a Money value is negative
pub fn assert_money_negative(money: &Money) {
    assert!(
        money.is_negative(),
        "Expected negative money, got {} {}",
        money.currency().symbol(),
        money.amount()
    );
}

/// Asserts that money values sum to a total
///
/// # Panics
///
/// Panics if the sum doesn't equal the total or a currency differs
pub fn assert_money_sum_equals(parts: &[Money], total: &Money) {
    let sum = parts.iter().fold(Money::zero(total.currency()), |acc, m| {
        acc.checked_add(m).expect("Currency mismatch in sum")
    });

    assert_eq!(
        sum.amount(),
        total.amount(),
        "Sum of parts ({}) doesn't equal total ({})",
        sum.amount(),
        total.amount()
    );
}

/// Asserts that an invoice's stored aggregates agree with its lines
///
/// Checks subtotal against the line sum, tax against the snapshot rate,
/// total against subtotal plus tax, and that the status is consistent
/// with the amount paid.
///
/// # Panics
///
/// Panics if any stored aggregate disagrees with its recomputation
pub fn assert_invoice_consistent(invoice: &Invoice) {
    let line_sum = invoice
        .items
        .iter()
        .fold(Money::zero(invoice.currency), |acc, item| {
            acc.checked_add(&item.amount)
                .expect("Line currency mismatch")
        });
    assert_eq!(
        invoice.subtotal.amount(),
        line_sum.amount(),
        "Invoice {} subtotal {} disagrees with line sum {}",
        invoice.number,
        invoice.subtotal.amount(),
        line_sum.amount()
    );

    let expected_tax = invoice
        .tax_rate
        .apply(&invoice.subtotal)
        .round_to_currency();
    assert_eq!(
        invoice.tax.amount(),
        expected_tax.amount(),
        "Invoice {} tax {} disagrees with rate application {}",
        invoice.number,
        invoice.tax.amount(),
        expected_tax.amount()
    );

    let expected_total = invoice
        .subtotal
        .checked_add(&invoice.tax)
        .expect("Tax currency mismatch");
    assert_eq!(
        invoice.total.amount(),
        expected_total.amount(),
        "Invoice {} total {} disagrees with subtotal+tax {}",
        invoice.number,
        invoice.total.amount(),
        expected_total.amount()
    );

    match invoice.status {
        InvoiceStatus::Paid => {
            assert!(
                invoice.amount_paid.amount() >= invoice.total.amount(),
                "Invoice {} is Paid but amount_paid {} is below total {}",
                invoice.number,
                invoice.amount_paid.amount(),
                invoice.total.amount()
            );
            assert!(
                invoice.paid_date.is_some(),
                "Invoice {} is Paid without a paid_date",
                invoice.number
            );
        }
        InvoiceStatus::PartiallyPaid => {
            assert!(
                invoice.amount_paid.is_positive()
                    && invoice.amount_paid.amount() < invoice.total.amount(),
                "Invoice {} is PartiallyPaid with amount_paid {} against total {}",
                invoice.number,
                invoice.amount_paid.amount(),
                invoice.total.amount()
            );
        }
        _ => {}
    }
}

/// Asserts that a decimal value is within a range
pub fn assert_decimal_in_range(value: Decimal, min: Decimal, max: Decimal) {
    assert!(
        value >= min && value <= max,
        "Decimal {} is not in range [{}, {}]",
        value,
        min,
        max
    );
}

/// Asserts that a decimal value is approximately equal to another
pub fn assert_decimal_approx_eq(actual: Decimal, expected: Decimal, tolerance: Decimal) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= tolerance,
        "Decimals differ by more than tolerance: actual={}, expected={}, diff={}, tolerance={}",
        actual,
        expected,
        diff,
        tolerance
    );
}

/// Asserts that a result is Ok and returns the value
#[macro_export]
macro_rules! assert_ok {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
    ($result:expr, $msg:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("{}: {:?}", $msg, e),
        }
    };
}

/// Asserts that a result is Err and returns the error
#[macro_export]
macro_rules! assert_err {
    ($result:expr) => {
        match $result {
            Ok(value) => panic!("Expected Err, got Ok: {:?}", value),
            Err(e) => e,
        }
    };
    ($result:expr, $msg:expr) => {
        match $result {
            Ok(value) => panic!("{}: got Ok({:?})", $msg, value),
            Err(e) => e,
        }
    };
}

/// Asserts that an error matches a specific variant
#[macro_export]
macro_rules! assert_err_variant {
    ($result:expr, $pattern:pat) => {
        match $result {
            Ok(value) => panic!("Expected Err matching {}, got Ok({:?})", stringify!($pattern), value),
            Err(ref e) => {
                assert!(
                    matches!(e, $pattern),
                    "Error {:?} does not match pattern {}",
                    e,
                    stringify!($pattern)
                );
            }
        }
    };
}
