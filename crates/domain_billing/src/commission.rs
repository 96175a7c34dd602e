//! Investor commissions
//!
//! Each settled invoice distributes commission to every active investor.
//! The basis is either a percentage of the invoice subtotal or a flat
//! amount per settlement; both produce one ledger entry and move the
//! investor's running balances.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{CommissionEntryId, InvestorId, InvoiceId, Money, Rate, TransactionId};

use crate::error::BillingError;

/// How an investor's commission is computed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "basis", rename_all = "snake_case")]
pub enum CommissionBasis {
    /// Percentage of the settled invoice subtotal
    Percentage { rate: Rate },
    /// Fixed amount per settlement
    Flat { amount: Money },
}

/// An investor participating in revenue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Investor {
    /// Unique identifier
    pub id: InvestorId,
    /// Display name
    pub name: String,
    /// Commission basis
    pub basis: CommissionBasis,
    /// Inactive investors are skipped at distribution time
    pub active: bool,
    /// Undrawn commission balance
    pub balance: Money,
    /// Lifetime commission earned
    pub total_earned: Money,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Investor {
    /// Creates an active investor with zeroed balances
    pub fn new(name: impl Into<String>, basis: CommissionBasis, currency: core_kernel::Currency) -> Self {
        let now = Utc::now();
        Self {
            id: InvestorId::new_v7(),
            name: name.into(),
            basis,
            active: true,
            balance: Money::zero(currency),
            total_earned: Money::zero(currency),
            created_at: now,
            updated_at: now,
        }
    }

    /// Computes this investor's commission on a settled subtotal
    ///
    /// Percentage bases are rounded to currency scale; flat bases must
    /// match the subtotal's currency.
    pub fn commission_on(&self, subtotal: &Money) -> Result<Money, BillingError> {
        match &self.basis {
            CommissionBasis::Percentage { rate } => {
                Ok(rate.apply(subtotal).round_to_currency())
            }
            CommissionBasis::Flat { amount } => {
                if amount.currency() != subtotal.currency() {
                    return Err(BillingError::Money(
                        core_kernel::MoneyError::CurrencyMismatch(
                            subtotal.currency().to_string(),
                            amount.currency().to_string(),
                        ),
                    ));
                }
                Ok(*amount)
            }
        }
    }

    /// Credits earned commission to the running balances
    pub fn credit(&mut self, amount: Money) -> Result<(), BillingError> {
        self.balance = self.balance.checked_add(&amount)?;
        self.total_earned = self.total_earned.checked_add(&amount)?;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// One commission distribution recorded at settlement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionEntry {
    /// Unique identifier
    pub id: CommissionEntryId,
    /// Investor credited
    pub investor_id: InvestorId,
    /// Invoice whose settlement produced this entry
    pub invoice_id: InvoiceId,
    /// Transaction that triggered the distribution
    pub transaction_id: TransactionId,
    /// Amount credited
    pub amount: Money,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl CommissionEntry {
    /// Records a distribution
    pub fn new(
        investor_id: InvestorId,
        invoice_id: InvoiceId,
        transaction_id: TransactionId,
        amount: Money,
    ) -> Self {
        Self {
            id: CommissionEntryId::new_v7(),
            investor_id,
            invoice_id,
            transaction_id,
            amount,
            created_at: Utc::now(),
        }
    }
}
