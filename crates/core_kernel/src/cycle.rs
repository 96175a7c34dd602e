//! Billing cycle arithmetic
//!
//! A billing cycle describes how far one paid period moves a service's due
//! date or a domain's expiry date. All date math lives here so settlement,
//! consolidation, and the recurring sweep advance dates identically.

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Recurrence interval for a service or billable item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BillingCycle {
    Monthly,
    Quarterly,
    SemiAnnually,
    Annually,
    Biennially,
    Triennially,
}

impl BillingCycle {
    /// Returns the cycle length in calendar months
    pub fn months(&self) -> u32 {
        match self {
            BillingCycle::Monthly => 1,
            BillingCycle::Quarterly => 3,
            BillingCycle::SemiAnnually => 6,
            BillingCycle::Annually => 12,
            BillingCycle::Biennially => 24,
            BillingCycle::Triennially => 36,
        }
    }

    /// Advances a date by `periods` billing cycles
    ///
    /// Month arithmetic clamps to the last valid day (Jan 31 + 1 month =
    /// Feb 28/29). Falls back to 30-day months only if the calendar result
    /// is unrepresentable.
    pub fn advance(&self, from: NaiveDate, periods: u32) -> NaiveDate {
        let months = self.months().saturating_mul(periods);
        from.checked_add_months(Months::new(months))
            .unwrap_or_else(|| from + chrono::Duration::days(30 * months as i64))
    }

    /// Advances a date by one billing cycle
    pub fn next(&self, from: NaiveDate) -> NaiveDate {
        self.advance(from, 1)
    }

    /// Returns the canonical lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingCycle::Monthly => "monthly",
            BillingCycle::Quarterly => "quarterly",
            BillingCycle::SemiAnnually => "semi-annually",
            BillingCycle::Annually => "annually",
            BillingCycle::Biennially => "biennially",
            BillingCycle::Triennially => "triennially",
        }
    }

    /// Parses a stored cycle name leniently
    ///
    /// Unknown or legacy spellings fall back to `Monthly`, the safest
    /// (shortest) interval: an unrecognized cycle must never grant more
    /// paid time than was charged.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "monthly" => BillingCycle::Monthly,
            "quarterly" => BillingCycle::Quarterly,
            "semi-annually" | "semiannually" | "semiannual" => BillingCycle::SemiAnnually,
            "annually" | "annual" | "yearly" => BillingCycle::Annually,
            "biennially" | "biennial" => BillingCycle::Biennially,
            "triennially" | "triennial" => BillingCycle::Triennially,
            _ => BillingCycle::Monthly,
        }
    }
}

impl Default for BillingCycle {
    fn default() -> Self {
        BillingCycle::Monthly
    }
}

impl fmt::Display for BillingCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_cycle_months() {
        assert_eq!(BillingCycle::Monthly.months(), 1);
        assert_eq!(BillingCycle::Quarterly.months(), 3);
        assert_eq!(BillingCycle::SemiAnnually.months(), 6);
        assert_eq!(BillingCycle::Annually.months(), 12);
        assert_eq!(BillingCycle::Biennially.months(), 24);
        assert_eq!(BillingCycle::Triennially.months(), 36);
    }

    #[test]
    fn test_advance_across_year_boundary() {
        let from = date(2024, 11, 15);
        assert_eq!(BillingCycle::Quarterly.next(from), date(2025, 2, 15));
        assert_eq!(BillingCycle::Annually.next(from), date(2025, 11, 15));
    }

    #[test]
    fn test_advance_clamps_month_end() {
        // Jan 31 + 1 month lands on the last day of February
        assert_eq!(BillingCycle::Monthly.next(date(2024, 1, 31)), date(2024, 2, 29));
        assert_eq!(BillingCycle::Monthly.next(date(2025, 1, 31)), date(2025, 2, 28));
    }

    #[test]
    fn test_advance_multiple_periods() {
        let from = date(2024, 3, 10);
        assert_eq!(BillingCycle::Monthly.advance(from, 5), date(2024, 8, 10));
        assert_eq!(BillingCycle::Triennially.advance(from, 2), date(2030, 3, 10));
    }

    #[test]
    fn test_parse_known_cycles() {
        assert_eq!(BillingCycle::parse("Quarterly"), BillingCycle::Quarterly);
        assert_eq!(BillingCycle::parse("semiannually"), BillingCycle::SemiAnnually);
        assert_eq!(BillingCycle::parse("yearly"), BillingCycle::Annually);
        assert_eq!(BillingCycle::parse("biennial"), BillingCycle::Biennially);
    }

    #[test]
    fn test_parse_unknown_defaults_to_monthly() {
        assert_eq!(BillingCycle::parse("fortnightly"), BillingCycle::Monthly);
        assert_eq!(BillingCycle::parse(""), BillingCycle::Monthly);
    }

    #[test]
    fn test_as_str_parse_roundtrip() {
        for cycle in [
            BillingCycle::Monthly,
            BillingCycle::Quarterly,
            BillingCycle::SemiAnnually,
            BillingCycle::Annually,
            BillingCycle::Biennially,
            BillingCycle::Triennially,
        ] {
            assert_eq!(BillingCycle::parse(cycle.as_str()), cycle);
        }
    }
}
