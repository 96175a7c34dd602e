//! Domain registrations
//!
//! A registered domain name owned by one client. Registrations are priced
//! and extended in whole years; the expiry date drives the renewal sweep
//! the same way a service's due date does.

use chrono::{DateTime, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{ClientId, DomainId};

use crate::error::ProvisioningError;

/// Domain registration states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainStatus {
    /// Registration requested, unpaid
    Pending,
    /// Registered and resolving
    Active,
    /// Registration lapsed; renewable back to Active
    Expired,
}

impl DomainStatus {
    /// Returns true if the transition is allowed
    pub fn can_transition_to(&self, next: DomainStatus) -> bool {
        use DomainStatus::*;
        matches!(
            (self, next),
            (Pending, Active) | (Active, Expired) | (Expired, Active)
        )
    }

    /// Canonical storage name
    pub fn as_str(&self) -> &'static str {
        match self {
            DomainStatus::Pending => "pending",
            DomainStatus::Active => "active",
            DomainStatus::Expired => "expired",
        }
    }

    /// Parses a stored status name
    pub fn parse(value: &str) -> Result<Self, ProvisioningError> {
        match value {
            "pending" => Ok(DomainStatus::Pending),
            "active" => Ok(DomainStatus::Active),
            "expired" => Ok(DomainStatus::Expired),
            other => Err(ProvisioningError::UnknownStatus(other.to_string())),
        }
    }
}

/// A domain name registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainName {
    /// Unique identifier
    pub id: DomainId,
    /// Owning client
    pub client_id: ClientId,
    /// Fully qualified name, e.g. "example.com.bd"
    pub name: String,
    /// Status
    pub status: DomainStatus,
    /// Registration term in years
    pub registration_years: u32,
    /// Current expiry; None until first registration completes
    pub expiry_date: Option<NaiveDate>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl DomainName {
    /// Creates a pending registration
    pub fn new(client_id: ClientId, name: impl Into<String>, registration_years: u32) -> Self {
        let now = Utc::now();
        Self {
            id: DomainId::new_v7(),
            client_id,
            name: name.into(),
            status: DomainStatus::Pending,
            registration_years,
            expiry_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Activates a pending registration for `years` from today
    ///
    /// # Errors
    ///
    /// Returns an error unless the domain is pending.
    pub fn activate(&mut self, today: NaiveDate, years: u32) -> Result<(), ProvisioningError> {
        self.transition_to(DomainStatus::Active)?;
        self.expiry_date = Some(add_years(today, years));
        Ok(())
    }

    /// Extends the registration by `years`
    ///
    /// Additive like service renewal: a future expiry is the base; a past
    /// or missing expiry extends from today. Renewing an expired domain
    /// reactivates it.
    ///
    /// # Errors
    ///
    /// Returns an error for pending domains, which must activate first.
    pub fn extend(&mut self, years: u32, today: NaiveDate) -> Result<NaiveDate, ProvisioningError> {
        match self.status {
            DomainStatus::Active => {}
            DomainStatus::Expired => self.transition_to(DomainStatus::Active)?,
            DomainStatus::Pending => {
                return Err(ProvisioningError::InvalidOperation(format!(
                    "cannot extend unregistered domain {}",
                    self.name
                )))
            }
        }

        let base = match self.expiry_date {
            Some(expiry) if expiry > today => expiry,
            _ => today,
        };
        let new_expiry = add_years(base, years);
        self.expiry_date = Some(new_expiry);
        self.updated_at = Utc::now();
        Ok(new_expiry)
    }

    /// Marks an active domain expired
    pub fn mark_expired(&mut self) -> Result<(), ProvisioningError> {
        self.transition_to(DomainStatus::Expired)
    }

    /// True if the expiry falls within `horizon_days` of today
    pub fn expires_within(&self, today: NaiveDate, horizon_days: i64) -> bool {
        self.status == DomainStatus::Active
            && matches!(
                self.expiry_date,
                Some(expiry) if expiry <= today + chrono::Duration::days(horizon_days)
            )
    }

    fn transition_to(&mut self, next: DomainStatus) -> Result<(), ProvisioningError> {
        if !self.status.can_transition_to(next) {
            return Err(ProvisioningError::InvalidStatusTransition {
                from: self.status.as_str().to_string(),
                to: next.as_str().to_string(),
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Adds whole calendar years, clamping Feb 29 to Feb 28 off leap years
fn add_years(from: NaiveDate, years: u32) -> NaiveDate {
    from.checked_add_months(Months::new(years * 12))
        .unwrap_or(NaiveDate::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn pending_domain() -> DomainName {
        DomainName::new(ClientId::new(), "example.com.bd", 1)
    }

    #[test]
    fn test_activation_sets_expiry() {
        let mut domain = pending_domain();
        domain.activate(date(2025, 3, 10), 2).unwrap();

        assert_eq!(domain.status, DomainStatus::Active);
        assert_eq!(domain.expiry_date, Some(date(2027, 3, 10)));
    }

    #[test]
    fn test_early_renewal_is_additive() {
        let mut domain = pending_domain();
        domain.activate(date(2025, 1, 1), 1).unwrap();

        // renewed 9 months before expiry; the paid year is not lost
        let new_expiry = domain.extend(1, date(2025, 4, 1)).unwrap();
        assert_eq!(new_expiry, date(2027, 1, 1));
    }

    #[test]
    fn test_lapsed_renewal_from_today() {
        let mut domain = pending_domain();
        domain.activate(date(2023, 1, 1), 1).unwrap();
        domain.mark_expired().unwrap();

        let new_expiry = domain.extend(1, date(2025, 6, 1)).unwrap();
        assert_eq!(new_expiry, date(2026, 6, 1));
        assert_eq!(domain.status, DomainStatus::Active);
    }

    #[test]
    fn test_pending_domain_cannot_extend() {
        let mut domain = pending_domain();
        assert!(domain.extend(1, date(2025, 1, 1)).is_err());
    }

    #[test]
    fn test_leap_day_expiry_clamps() {
        let mut domain = pending_domain();
        domain.activate(date(2024, 2, 29), 1).unwrap();
        assert_eq!(domain.expiry_date, Some(date(2025, 2, 28)));
    }

    #[test]
    fn test_expiry_horizon() {
        let mut domain = pending_domain();
        domain.activate(date(2025, 1, 1), 1).unwrap();
        // expires 2026-01-01
        assert!(domain.expires_within(date(2025, 12, 20), 14));
        assert!(!domain.expires_within(date(2025, 11, 1), 14));
    }
}
