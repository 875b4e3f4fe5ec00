//! Ports and Adapters Infrastructure
//!
//! This module provides the foundational types for implementing the hexagonal
//! architecture (ports and adapters) pattern across all domain modules.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Application Services                     │
//! │   (PricingEngine, ClaimWorkflowService, PolicyLifecycle...)  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Repository Port Traits                    │
//! │  (CustomerRepository, PolicyRepository, ClaimRepository...)  │
//! │      Defined in each domain, depend only on core_kernel      │
//! └─────────────────────────────────────────────────────────────┘
//!                    ▲                         ▲
//!                    │                         │
//!         ┌─────────┴─────────┐     ┌────────┴────────┐
//!         │  Internal Adapter │     │  Mock Adapter   │
//!         │   (PostgreSQL)    │     │  (in-memory)    │
//!         └───────────────────┘     └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! // In domain_policy/src/ports.rs
//! #[async_trait]
//! pub trait PolicyRepository: DomainPort + HealthCheckable {
//!     async fn get_by_id(&self, ctx: &Context, id: PolicyId) -> Result<Policy, PortError>;
//! }
//!
//! // In infra_db
//! impl PolicyRepository for PgPolicyRepository { ... }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::context::{CancelReason, Cancelled};
use crate::error::ErrorKind;

/// Error type for port operations
///
/// Provides a unified error type that all repository and adapter
/// implementations use, so services handle storage failures uniformly.
#[derive(Debug, Error)]
pub enum PortError {
    /// The requested entity was not found
    #[error("{entity_type} not found: {id}")]
    NotFound {
        entity_type: String,
        id: String,
    },

    /// A validation error occurred
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// The operation conflicts with existing data (unique key)
    #[error("Conflict: {message}")]
    Conflict {
        message: String,
    },

    /// Connection to the underlying system failed
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The operation timed out
    #[error("Timeout after {duration_ms}ms: {operation}")]
    Timeout {
        operation: String,
        duration_ms: u64,
    },

    /// Authentication or authorization failed
    #[error("Unauthorized: {message}")]
    Unauthorized {
        message: String,
    },

    /// The backing system is unavailable (closed bus, stopped dispatcher)
    #[error("Service unavailable: {service}")]
    ServiceUnavailable {
        service: String,
    },

    /// The caller's context was cancelled before or during the operation
    #[error("Operation cancelled: {reason}")]
    Cancelled {
        reason: CancelReason,
    },

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

    /// Creates a Conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        PortError::Conflict {
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

    /// Creates a ServiceUnavailable error
    pub fn unavailable(service: impl Into<String>) -> Self {
        PortError::ServiceUnavailable {
            service: service.into(),
        }
    }

    /// Returns true if this error indicates a transient failure that may succeed on retry
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PortError::Connection { .. }
                | PortError::Timeout { .. }
                | PortError::ServiceUnavailable { .. }
        )
    }

    /// Returns true if this error indicates the entity was not found
    pub fn is_not_found(&self) -> bool {
        matches!(self, PortError::NotFound { .. })
    }

    /// Returns the coarse error classification
    pub fn kind(&self) -> ErrorKind {
        match self {
            PortError::NotFound { .. } => ErrorKind::NotFound,
            PortError::Validation { .. } => ErrorKind::Validation,
            PortError::Conflict { .. } => ErrorKind::Conflict,
            PortError::Unauthorized { .. } => ErrorKind::Unauthorized,
            PortError::Cancelled { .. } => ErrorKind::Cancelled,
            PortError::Connection { .. }
            | PortError::Timeout { .. }
            | PortError::ServiceUnavailable { .. }
            | PortError::Internal { .. } => ErrorKind::Io,
        }
    }
}

impl From<Cancelled> for PortError {
    fn from(c: Cancelled) -> Self {
        PortError::Cancelled { reason: c.reason() }
    }
}

/// Marker trait for all domain ports
///
/// All port traits extend this marker so they are thread-safe and can be
/// shared behind `Arc<dyn ...>` across request tasks.
pub trait DomainPort: Send + Sync + 'static {}

/// Health status for an adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterHealth {
    /// Adapter is healthy and operational
    Healthy,
    /// Adapter is degraded but operational
    Degraded,
    /// Adapter is unhealthy and not operational
    Unhealthy,
}

impl AdapterHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdapterHealth::Healthy => "healthy",
            AdapterHealth::Degraded => "degraded",
            AdapterHealth::Unhealthy => "unhealthy",
        }
    }
}

/// Health check result for an adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    /// Adapter identifier
    pub adapter_id: String,
    /// Current health status
    pub status: AdapterHealth,
    /// Latency of the health check in milliseconds
    pub latency_ms: u64,
    /// Optional message with additional details
    pub message: Option<String>,
    /// Timestamp of the health check
    pub checked_at: DateTime<Utc>,
}

impl HealthCheckResult {
    /// A healthy result with no message
    pub fn healthy(adapter_id: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            adapter_id: adapter_id.into(),
            status: AdapterHealth::Healthy,
            latency_ms,
            message: None,
            checked_at: Utc::now(),
        }
    }

    /// An unhealthy result carrying the failure message
    pub fn unhealthy(adapter_id: impl Into<String>, latency_ms: u64, message: impl Into<String>) -> Self {
        Self {
            adapter_id: adapter_id.into(),
            status: AdapterHealth::Unhealthy,
            latency_ms,
            message: Some(message.into()),
            checked_at: Utc::now(),
        }
    }
}

/// Trait for adapters that support health checks
#[async_trait::async_trait]
pub trait HealthCheckable: Send + Sync {
    /// Performs a health check on the adapter
    async fn health_check(&self) -> HealthCheckResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_error_not_found() {
        let error = PortError::not_found("Policy", "123");
        assert!(error.is_not_found());
        assert!(!error.is_transient());
        assert_eq!(error.kind(), ErrorKind::NotFound);
        assert!(error.to_string().contains("Policy"));
        assert!(error.to_string().contains("123"));
    }

    #[test]
    fn test_port_error_transient() {
        let timeout = PortError::Timeout {
            operation: "get_policy".to_string(),
            duration_ms: 5000,
        };
        assert!(timeout.is_transient());
        assert_eq!(timeout.kind(), ErrorKind::Io);

        let validation = PortError::validation("Invalid email");
        assert!(!validation.is_transient());
    }

    #[test]
    fn test_cancelled_converts() {
        let err: PortError = Cancelled::new(CancelReason::DeadlineExceeded).into();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn test_conflict_kind() {
        assert_eq!(PortError::conflict("duplicate policy_number").kind(), ErrorKind::Conflict);
    }
}
