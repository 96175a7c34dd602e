//! Orders
//!
//! An order captures what a client bought in one checkout: the lines to
//! provision and the total billed. Completion is a settlement side effect;
//! once an invoice exists for an order, nothing else may complete it.
//! Every transition is appended to the order's status history for audit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{ClientId, DomainId, Money, OrderId, OrderItemId, ServiceId};

use crate::error::ProvisioningError;

/// Order lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Placed, awaiting payment
    Pending,
    /// Paid and provisioned
    Completed,
    /// Flagged by fraud review
    Fraud,
    /// Cancelled before payment
    Cancelled,
}

impl OrderStatus {
    /// Returns true if the transition is allowed
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Completed) | (Pending, Fraud) | (Pending, Cancelled)
        )
    }

    /// Canonical storage name
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Completed => "completed",
            OrderStatus::Fraud => "fraud",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Parses a stored status name
    pub fn parse(value: &str) -> Result<Self, ProvisioningError> {
        match value {
            "pending" => Ok(OrderStatus::Pending),
            "completed" => Ok(OrderStatus::Completed),
            "fraud" => Ok(OrderStatus::Fraud),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(ProvisioningError::UnknownStatus(other.to_string())),
        }
    }
}

/// One purchased line within an order
///
/// References the pending service or domain the line provisions; for
/// domains it also records the registration term sold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub description: String,
    pub amount: Money,
    pub service_id: Option<ServiceId>,
    pub domain_id: Option<DomainId>,
    pub domain_years: Option<u32>,
}

impl OrderItem {
    /// Creates a line provisioning a service
    pub fn service(description: impl Into<String>, amount: Money, service_id: ServiceId) -> Self {
        Self {
            id: OrderItemId::new_v7(),
            description: description.into(),
            amount,
            service_id: Some(service_id),
            domain_id: None,
            domain_years: None,
        }
    }

    /// Creates a line registering a domain for `years`
    pub fn domain(
        description: impl Into<String>,
        amount: Money,
        domain_id: DomainId,
        years: u32,
    ) -> Self {
        Self {
            id: OrderItemId::new_v7(),
            description: description.into(),
            amount,
            service_id: None,
            domain_id: Some(domain_id),
            domain_years: Some(years),
        }
    }
}

/// One entry in an order's status audit trail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatusChange {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub note: Option<String>,
    pub changed_at: DateTime<Utc>,
}

/// A client's purchase of one or more services/domains
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Unique identifier
    pub id: OrderId,
    /// Order number (human-readable)
    pub number: String,
    /// Purchasing client
    pub client_id: ClientId,
    /// Status
    pub status: OrderStatus,
    /// Purchased lines
    pub items: Vec<OrderItem>,
    /// Order total as billed
    pub total: Money,
    /// Status audit trail, oldest first
    pub history: Vec<OrderStatusChange>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates a pending order
    pub fn new(client_id: ClientId, items: Vec<OrderItem>, total: Money) -> Self {
        let now = Utc::now();
        Self {
            id: OrderId::new_v7(),
            number: generate_order_number(),
            client_id,
            status: OrderStatus::Pending,
            items,
            total,
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Completes the order after its invoice settles
    pub fn complete(&mut self, note: impl Into<String>) -> Result<(), ProvisioningError> {
        self.transition_to(OrderStatus::Completed, Some(note.into()))
    }

    /// Flags the order as fraudulent
    pub fn mark_fraud(&mut self, note: impl Into<String>) -> Result<(), ProvisioningError> {
        self.transition_to(OrderStatus::Fraud, Some(note.into()))
    }

    /// Cancels an unpaid order
    pub fn cancel(&mut self, note: impl Into<String>) -> Result<(), ProvisioningError> {
        self.transition_to(OrderStatus::Cancelled, Some(note.into()))
    }

    fn transition_to(
        &mut self,
        next: OrderStatus,
        note: Option<String>,
    ) -> Result<(), ProvisioningError> {
        if !self.status.can_transition_to(next) {
            return Err(ProvisioningError::InvalidStatusTransition {
                from: self.status.as_str().to_string(),
                to: next.as_str().to_string(),
            });
        }
        let now = Utc::now();
        self.history.push(OrderStatusChange {
            from: self.status,
            to: next,
            note,
            changed_at: now,
        });
        self.status = next;
        self.updated_at = now;
        Ok(())
    }
}

/// Generates a unique order number
fn generate_order_number() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("ORD-{}", duration.as_millis() % 10_000_000_000)
}
