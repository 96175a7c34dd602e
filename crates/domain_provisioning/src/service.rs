//! Service entity
//!
//! A provisioned product instance (hosting plan, VPS, support plan) owned
//! by one client. Services start PENDING, come alive on first settled
//! payment, and from then on carry the `next_due_date` the recurring sweep
//! bills against.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{BillingCycle, ClientId, Money, ProductId, ServiceId};

use crate::error::ProvisioningError;

/// Service lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    /// Ordered but not yet paid for
    Pending,
    /// Live and billing
    Active,
    /// Disabled for non-payment; renewable back to Active
    Suspended,
    /// Permanently ended
    Terminated,
}

impl ServiceStatus {
    /// Returns true if the transition is allowed
    pub fn can_transition_to(&self, next: ServiceStatus) -> bool {
        use ServiceStatus::*;
        matches!(
            (self, next),
            (Pending, Active)
                | (Active, Suspended)
                | (Active, Terminated)
                | (Suspended, Active)
                | (Suspended, Terminated)
        )
    }

    /// Canonical storage name
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Pending => "pending",
            ServiceStatus::Active => "active",
            ServiceStatus::Suspended => "suspended",
            ServiceStatus::Terminated => "terminated",
        }
    }

    /// Parses a stored status name
    pub fn parse(value: &str) -> Result<Self, ProvisioningError> {
        match value {
            "pending" => Ok(ServiceStatus::Pending),
            "active" => Ok(ServiceStatus::Active),
            "suspended" => Ok(ServiceStatus::Suspended),
            "terminated" => Ok(ServiceStatus::Terminated),
            other => Err(ProvisioningError::UnknownStatus(other.to_string())),
        }
    }
}

/// A billed product instance belonging to a client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    /// Unique identifier
    pub id: ServiceId,
    /// Owning client
    pub client_id: ClientId,
    /// Catalog product this instantiates
    pub product_id: ProductId,
    /// Display name, e.g. "Business Hosting - example.com.bd"
    pub name: String,
    /// Status
    pub status: ServiceStatus,
    /// Billing recurrence
    pub billing_cycle: BillingCycle,
    /// Amount charged per cycle
    pub recurring_amount: Money,
    /// Date the next invoice for this service falls due
    pub next_due_date: NaiveDate,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Service {
    /// Creates a pending service awaiting first payment
    pub fn new(
        client_id: ClientId,
        product_id: ProductId,
        name: impl Into<String>,
        billing_cycle: BillingCycle,
        recurring_amount: Money,
        requested_start: NaiveDate,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ServiceId::new_v7(),
            client_id,
            product_id,
            name: name.into(),
            status: ServiceStatus::Pending,
            billing_cycle,
            recurring_amount,
            next_due_date: requested_start,
            created_at: now,
            updated_at: now,
        }
    }

    /// Activates a pending service, paid through `periods` cycles from today
    ///
    /// Order lines without renewal metadata activate with one cycle.
    ///
    /// # Errors
    ///
    /// Returns an error unless the service is pending; activation is a
    /// one-time transition and re-running settlement must not repeat it.
    pub fn activate(&mut self, today: NaiveDate, periods: u32) -> Result<(), ProvisioningError> {
        self.transition_to(ServiceStatus::Active)?;
        self.next_due_date = self.billing_cycle.advance(today, periods);
        Ok(())
    }

    /// Extends a live service by `periods` billing cycles
    ///
    /// The extension is additive: a due date still in the future is the
    /// base, so renewing early never forfeits already-paid time. A lapsed
    /// date extends from today instead. Renewing a suspended service
    /// reactivates it.
    ///
    /// # Errors
    ///
    /// Returns an error for pending or terminated services.
    pub fn extend(&mut self, periods: u32, today: NaiveDate) -> Result<NaiveDate, ProvisioningError> {
        match self.status {
            ServiceStatus::Active => {}
            ServiceStatus::Suspended => self.transition_to(ServiceStatus::Active)?,
            _ => {
                return Err(ProvisioningError::InvalidOperation(format!(
                    "cannot extend service {} in status {}",
                    self.id,
                    self.status.as_str()
                )))
            }
        }

        let base = if self.next_due_date > today {
            self.next_due_date
        } else {
            today
        };
        self.next_due_date = self.billing_cycle.advance(base, periods);
        self.updated_at = Utc::now();
        Ok(self.next_due_date)
    }

    /// Suspends an active service
    pub fn suspend(&mut self) -> Result<(), ProvisioningError> {
        self.transition_to(ServiceStatus::Suspended)
    }

    /// Terminates the service permanently
    pub fn terminate(&mut self) -> Result<(), ProvisioningError> {
        self.transition_to(ServiceStatus::Terminated)
    }

    /// Advances the billing date one cycle after an invoice is generated
    ///
    /// Invoicing ahead of payment moves the date at generation time; the
    /// generated invoice therefore carries no renewal metadata and its
    /// settlement leaves the date alone.
    pub fn advance_billing_date(&mut self) {
        self.next_due_date = self.billing_cycle.next(self.next_due_date);
        self.updated_at = Utc::now();
    }

    /// True if the recurring sweep should bill this service today
    pub fn is_due(&self, today: NaiveDate) -> bool {
        self.status == ServiceStatus::Active && self.next_due_date <= today
    }

    /// True if the due date falls within `horizon_days` of today
    pub fn due_within(&self, today: NaiveDate, horizon_days: i64) -> bool {
        self.status == ServiceStatus::Active
            && self.next_due_date <= today + chrono::Duration::days(horizon_days)
    }

    fn transition_to(&mut self, next: ServiceStatus) -> Result<(), ProvisioningError> {
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
