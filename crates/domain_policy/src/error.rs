//! Policy domain errors

use core_kernel::{Cancelled, CoreError, ErrorKind, PortError};
use domain_billing::BillingError;
use domain_party::PartyError;
use domain_rules::RulesError;
use thiserror::Error;

/// Errors raised by the policy, quote, pricing and lifecycle services
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("Validation error: {0}")]
    Validation(String),

    /// A unique key (policy or quote number) is already taken
    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    /// The policy does not satisfy renewal or cancellation preconditions
    #[error("Not eligible: {0}")]
    NotEligible(String),

    /// An immutable field was given a new value
    #[error("Field {0} cannot be changed after creation")]
    Immutable(&'static str),

    #[error("Rules error: {0}")]
    Rules(#[from] RulesError),

    #[error(transparent)]
    Billing(#[from] BillingError),

    #[error(transparent)]
    Port(PortError),
}

impl PolicyError {
    pub fn validation(message: impl Into<String>) -> Self {
        PolicyError::Validation(message.into())
    }

    pub fn not_eligible(message: impl Into<String>) -> Self {
        PolicyError::NotEligible(message.into())
    }

    pub fn transition(from: impl ToString, to: impl ToString) -> Self {
        PolicyError::InvalidStateTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PolicyError::NotFound { .. } => ErrorKind::NotFound,
            PolicyError::Validation(_)
            | PolicyError::Duplicate(_)
            | PolicyError::InvalidStateTransition { .. }
            | PolicyError::NotEligible(_)
            | PolicyError::Immutable(_) => ErrorKind::Validation,
            PolicyError::Rules(e) => e.kind(),
            PolicyError::Billing(e) => e.kind(),
            PolicyError::Port(e) => e.kind(),
        }
    }
}

impl From<PortError> for PolicyError {
    fn from(e: PortError) -> Self {
        match e {
            PortError::NotFound { entity_type, id } => PolicyError::NotFound { entity: entity_type, id },
            PortError::Conflict { message } => PolicyError::Duplicate(message),
            PortError::Validation { message, .. } => PolicyError::Validation(message),
            other => PolicyError::Port(other),
        }
    }
}

impl From<PartyError> for PolicyError {
    fn from(e: PartyError) -> Self {
        match e {
            PartyError::NotFound(id) => PolicyError::NotFound {
                entity: "Customer".to_string(),
                id,
            },
            PartyError::Validation(message) | PartyError::Duplicate(message) => PolicyError::Validation(message),
            PartyError::Port(port) => port.into(),
        }
    }
}

impl From<CoreError> for PolicyError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Cancelled(c) => PolicyError::Port(c.into()),
            CoreError::NotFound(message) => PolicyError::NotFound {
                entity: "Resource".to_string(),
                id: message,
            },
            other => PolicyError::Validation(other.to_string()),
        }
    }
}

impl From<Cancelled> for PolicyError {
    fn from(c: Cancelled) -> Self {
        PolicyError::Port(c.into())
    }
}

impl From<validator::ValidationErrors> for PolicyError {
    fn from(e: validator::ValidationErrors) -> Self {
        PolicyError::Validation(e.to_string())
    }
}
