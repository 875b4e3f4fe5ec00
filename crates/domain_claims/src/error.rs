//! Claims domain errors

use core_kernel::{Cancelled, CoreError, ErrorKind, PortError};
use domain_billing::BillingError;
use domain_policy::PolicyError;
use domain_rules::RulesError;
use thiserror::Error;

/// Errors that can occur in the claims domain
#[derive(Debug, Error)]
pub enum ClaimError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("Field {0} cannot be changed after creation")]
    Immutable(&'static str),

    /// `fraud_detection.enabled` is off in the live rules
    #[error("Fraud detection is disabled")]
    FraudDetectionDisabled,

    #[error("Rules error: {0}")]
    Rules(#[from] RulesError),

    #[error(transparent)]
    Billing(#[from] BillingError),

    #[error(transparent)]
    Port(PortError),
}

impl ClaimError {
    pub fn validation(message: impl Into<String>) -> Self {
        ClaimError::Validation(message.into())
    }

    pub fn transition(from: impl ToString, to: impl ToString) -> Self {
        ClaimError::InvalidStatusTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ClaimError::NotFound { .. } => ErrorKind::NotFound,
            ClaimError::Validation(_)
            | ClaimError::Duplicate(_)
            | ClaimError::InvalidStatusTransition { .. }
            | ClaimError::Immutable(_)
            | ClaimError::FraudDetectionDisabled => ErrorKind::Validation,
            ClaimError::Rules(e) => e.kind(),
            ClaimError::Billing(e) => e.kind(),
            ClaimError::Port(e) => e.kind(),
        }
    }
}

impl From<PortError> for ClaimError {
    fn from(e: PortError) -> Self {
        match e {
            PortError::NotFound { entity_type, id } => ClaimError::NotFound { entity: entity_type, id },
            PortError::Conflict { message } => ClaimError::Duplicate(message),
            PortError::Validation { message, .. } => ClaimError::Validation(message),
            other => ClaimError::Port(other),
        }
    }
}

impl From<PolicyError> for ClaimError {
    fn from(e: PolicyError) -> Self {
        match e {
            PolicyError::NotFound { entity, id } => ClaimError::NotFound { entity, id },
            PolicyError::Port(port) => port.into(),
            PolicyError::Rules(rules) => ClaimError::Rules(rules),
            PolicyError::Billing(billing) => ClaimError::Billing(billing),
            other => ClaimError::Validation(other.to_string()),
        }
    }
}

impl From<CoreError> for ClaimError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Cancelled(c) => ClaimError::Port(c.into()),
            CoreError::NotFound(message) => ClaimError::NotFound {
                entity: "Resource".to_string(),
                id: message,
            },
            other => ClaimError::Validation(other.to_string()),
        }
    }
}

impl From<Cancelled> for ClaimError {
    fn from(c: Cancelled) -> Self {
        ClaimError::Port(c.into())
    }
}

impl From<validator::ValidationErrors> for ClaimError {
    fn from(e: validator::ValidationErrors) -> Self {
        ClaimError::Validation(e.to_string())
    }
}
