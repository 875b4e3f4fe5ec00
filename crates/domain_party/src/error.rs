//! Party domain errors

use core_kernel::{CoreError, ErrorKind, PortError};
use thiserror::Error;

/// Errors raised by the customer service
#[derive(Debug, Error)]
pub enum PartyError {
    #[error("Customer not found: {0}")]
    NotFound(String),

    #[error("Customer already registered: {0}")]
    Duplicate(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Port(PortError),
}

impl PartyError {
    pub fn validation(message: impl Into<String>) -> Self {
        PartyError::Validation(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PartyError::NotFound(_) => ErrorKind::NotFound,
            PartyError::Duplicate(_) | PartyError::Validation(_) => ErrorKind::Validation,
            PartyError::Port(e) => e.kind(),
        }
    }
}

impl From<PortError> for PartyError {
    fn from(e: PortError) -> Self {
        match e {
            PortError::NotFound { id, .. } => PartyError::NotFound(id),
            PortError::Conflict { message } => PartyError::Duplicate(message),
            PortError::Validation { message, .. } => PartyError::Validation(message),
            other => PartyError::Port(other),
        }
    }
}

impl From<validator::ValidationErrors> for PartyError {
    fn from(errors: validator::ValidationErrors) -> Self {
        PartyError::Validation(errors.to_string())
    }
}

impl From<CoreError> for PartyError {
    fn from(e: CoreError) -> Self {
        PartyError::Validation(e.to_string())
    }
}
