//! Refund requests
//!
//! A refund targets one captured transaction and walks a two-step approval
//! chain before any money moves. The entity owns the state machine; who may
//! drive each transition is decided by the workflow engine using
//! [`RefundAuthority`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{Money, OperatorId, RefundId, TransactionId};

use crate::error::BillingError;

/// Refund workflow status
///
/// `PendingAuthorization -> PendingApproval -> Completed`, with `Rejected`
/// reachable from either pending state. Completed and Rejected are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    /// Requested, awaiting first-level authorization
    PendingAuthorization,
    /// Authorized, awaiting final approval
    PendingApproval,
    /// Approved and executed
    Completed,
    /// Declined at either pending step
    Rejected,
}

impl RefundStatus {
    /// Returns true if the transition is allowed
    pub fn can_transition_to(&self, next: RefundStatus) -> bool {
        use RefundStatus::*;
        matches!(
            (self, next),
            (PendingAuthorization, PendingApproval)
                | (PendingAuthorization, Rejected)
                | (PendingApproval, Completed)
                | (PendingApproval, Rejected)
        )
    }

    /// True while the refund still reserves part of its transaction's
    /// refundable amount
    ///
    /// Everything except Rejected counts against the ceiling: pending
    /// requests hold their slice, completed ones have consumed it.
    pub fn counts_against_ceiling(&self) -> bool {
        !matches!(self, RefundStatus::Rejected)
    }

    /// Canonical storage name
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundStatus::PendingAuthorization => "pending_authorization",
            RefundStatus::PendingApproval => "pending_approval",
            RefundStatus::Completed => "completed",
            RefundStatus::Rejected => "rejected",
        }
    }

    /// Parses a stored status name
    pub fn parse(value: &str) -> Result<Self, BillingError> {
        match value {
            "pending_authorization" => Ok(RefundStatus::PendingAuthorization),
            "pending_approval" => Ok(RefundStatus::PendingApproval),
            "completed" => Ok(RefundStatus::Completed),
            "rejected" => Ok(RefundStatus::Rejected),
            other => Err(BillingError::UnknownStatus(other.to_string())),
        }
    }
}

/// Authority level of the operator driving a refund step
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundAuthority {
    /// May request refunds
    Operator,
    /// May authorize the first step
    Supervisor,
    /// May approve the final step; requests from this level complete in
    /// one call
    Administrator,
}

impl RefundAuthority {
    /// True if this level may move a refund past authorization
    pub fn can_authorize(&self) -> bool {
        matches!(self, RefundAuthority::Supervisor | RefundAuthority::Administrator)
    }

    /// True if this level may give final approval
    pub fn can_approve(&self) -> bool {
        matches!(self, RefundAuthority::Administrator)
    }

    /// Canonical storage name
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundAuthority::Operator => "operator",
            RefundAuthority::Supervisor => "supervisor",
            RefundAuthority::Administrator => "administrator",
        }
    }

    /// Parses a stored authority name
    pub fn parse(value: &str) -> Result<Self, BillingError> {
        match value {
            "operator" => Ok(RefundAuthority::Operator),
            "supervisor" => Ok(RefundAuthority::Supervisor),
            "administrator" => Ok(RefundAuthority::Administrator),
            other => Err(BillingError::UnknownStatus(other.to_string())),
        }
    }
}

/// A refund request against a captured transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Refund {
    /// Unique identifier
    pub id: RefundId,
    /// Transaction being partially or fully reversed
    pub transaction_id: TransactionId,
    /// Positive amount to return
    pub amount: Money,
    /// Reason given by the requester
    pub reason: String,
    /// Status
    pub status: RefundStatus,
    /// Operator who requested the refund
    pub requested_by: OperatorId,
    /// Operator who authorized the first step
    pub authorized_by: Option<OperatorId>,
    /// Operator who completed or rejected the request
    pub decided_by: Option<OperatorId>,
    /// Note recorded on rejection
    pub decision_note: Option<String>,
    /// Request timestamp
    pub requested_at: DateTime<Utc>,
    /// Authorization timestamp
    pub authorized_at: Option<DateTime<Utc>>,
    /// Terminal decision timestamp
    pub decided_at: Option<DateTime<Utc>>,
}

impl Refund {
    /// Creates a new refund request awaiting authorization
    ///
    /// # Errors
    ///
    /// Returns an error if the amount is not positive. The ceiling against
    /// the target transaction is enforced by the workflow engine, which
    /// sees all sibling refunds.
    pub fn request(
        transaction_id: TransactionId,
        amount: Money,
        reason: impl Into<String>,
        requested_by: OperatorId,
    ) -> Result<Self, BillingError> {
        if !amount.is_positive() {
            return Err(BillingError::InvalidAmount(
                "refund amount must be positive".to_string(),
            ));
        }

        Ok(Self {
            id: RefundId::new_v7(),
            transaction_id,
            amount,
            reason: reason.into(),
            status: RefundStatus::PendingAuthorization,
            requested_by,
            authorized_by: None,
            decided_by: None,
            decision_note: None,
            requested_at: Utc::now(),
            authorized_at: None,
            decided_at: None,
        })
    }

    /// Moves the refund to PendingApproval
    pub fn authorize(&mut self, by: OperatorId, now: DateTime<Utc>) -> Result<(), BillingError> {
        self.transition_to(RefundStatus::PendingApproval)?;
        self.authorized_by = Some(by);
        self.authorized_at = Some(now);
        Ok(())
    }

    /// Completes the refund
    pub fn complete(&mut self, by: OperatorId, now: DateTime<Utc>) -> Result<(), BillingError> {
        self.transition_to(RefundStatus::Completed)?;
        self.decided_by = Some(by);
        self.decided_at = Some(now);
        Ok(())
    }

    /// Rejects the refund from either pending state
    pub fn reject(
        &mut self,
        by: OperatorId,
        note: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), BillingError> {
        self.transition_to(RefundStatus::Rejected)?;
        self.decided_by = Some(by);
        self.decision_note = Some(note.into());
        self.decided_at = Some(now);
        Ok(())
    }

    /// True while this refund reserves part of the transaction's amount
    pub fn counts_against_ceiling(&self) -> bool {
        self.status.counts_against_ceiling()
    }

    fn transition_to(&mut self, next: RefundStatus) -> Result<(), BillingError> {
        if !self.status.can_transition_to(next) {
            return Err(BillingError::InvalidStatusTransition {
                from: self.status.as_str().to_string(),
                to: next.as_str().to_string(),
            });
        }
        self.status = next;
        Ok(())
    }
}
