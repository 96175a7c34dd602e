//! Ports and Adapters Infrastructure
//!
//! This module provides the foundational types for implementing the hexagonal
//! architecture (ports and adapters) pattern across all domain modules.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Settlement Engines                        │
//! │   (record_payment / consolidate / refund / sweep logic)      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Port Traits                             │
//! │  (SettlementStore, NotificationSink, GatewayClient, ...)     │
//! │   Defined in the domain, depend only on core_kernel          │
//! └─────────────────────────────────────────────────────────────┘
//!                    ▲                         ▲
//!                    │                         │
//!         ┌─────────┴─────────┐     ┌────────┴─────────┐
//!         │  Internal Adapter │     │  Test Adapter     │
//!         │   (PostgreSQL)    │     │  (in-memory store │
//!         │                   │     │   and recorders)  │
//!         └───────────────────┘     └───────────────────┘
//! ```
//!
//! Each domain defines its own port traits extending the marker trait here.
//! Adapters implement them against PostgreSQL (infra_db) or in-memory doubles
//! (tests).

use std::fmt;
use thiserror::Error;

/// Classifies a conflict so callers can decide between retrying and
/// treating the operation as already applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// A uniqueness constraint was violated (e.g. an external transaction
    /// reference seen before). Treat as "already processed", not a failure.
    DuplicateEntry,
    /// Another writer got there first (version mismatch, lock contention).
    /// Re-fetch and retry.
    ConcurrentUpdate,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictKind::DuplicateEntry => write!(f, "duplicate entry"),
            ConflictKind::ConcurrentUpdate => write!(f, "concurrent update"),
        }
    }
}

/// Error type for port operations
///
/// Provides a unified error type that all port implementations must use,
/// ensuring consistent error handling across database and test adapters.
#[derive(Debug, Error)]
pub enum PortError {
    /// The requested entity was not found
    #[error("Not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    /// A validation error occurred
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// The operation conflicts with existing data
    #[error("Conflict ({kind}): {message}")]
    Conflict { kind: ConflictKind, message: String },

    /// Connection to the underlying system failed
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The operation timed out
    #[error("Timeout after {duration_ms}ms: {operation}")]
    Timeout { operation: String, duration_ms: u64 },

    /// An internal error occurred
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl PortError {
    /// Creates a NotFound error
    pub fn not_found(entity_type: impl Into<String>, id: impl fmt::Display) -> Self {
        PortError::NotFound {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }

    /// Creates a Validation error
    pub fn validation(message: impl Into<String>) -> Self {
        PortError::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Creates a Validation error with field information
    pub fn validation_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        PortError::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a duplicate-entry conflict
    pub fn duplicate(message: impl Into<String>) -> Self {
        PortError::Conflict {
            kind: ConflictKind::DuplicateEntry,
            message: message.into(),
        }
    }

    /// Creates a concurrent-update conflict
    pub fn concurrent(message: impl Into<String>) -> Self {
        PortError::Conflict {
            kind: ConflictKind::ConcurrentUpdate,
            message: message.into(),
        }
    }

    /// Creates a Connection error
    pub fn connection(message: impl Into<String>) -> Self {
        PortError::Connection {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        PortError::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Returns true if this error indicates a transient failure that may
    /// succeed on retry
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PortError::Connection { .. }
                | PortError::Timeout { .. }
                | PortError::Conflict {
                    kind: ConflictKind::ConcurrentUpdate,
                    ..
                }
        )
    }

    /// Returns true if this error is a duplicate-entry conflict
    pub fn is_duplicate(&self) -> bool {
        matches!(
            self,
            PortError::Conflict {
                kind: ConflictKind::DuplicateEntry,
                ..
            }
        )
    }

    /// Returns true if this error indicates the entity was not found
    pub fn is_not_found(&self) -> bool {
        matches!(self, PortError::NotFound { .. })
    }
}

/// Marker trait for all domain ports
///
/// All port traits should extend this marker to ensure they are
/// thread-safe and can be used in async contexts.
pub trait DomainPort: Send + Sync + 'static {}
