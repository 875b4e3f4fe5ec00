//! Core error types used across the system

use serde::Serialize;
use thiserror::Error;

use crate::context::Cancelled;
use crate::money::MoneyError;
use crate::temporal::TemporalError;

/// Coarse classification shared by every error type in the workspace
///
/// The HTTP layer maps these to status codes; services use them to decide
/// whether a failure is the caller's fault or an infrastructure problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad input, unique-key conflict surfaced to the caller, or a disallowed transition
    Validation,
    NotFound,
    Conflict,
    Unauthorized,
    /// Repository or downstream failure
    Io,
    Cancelled,
}

/// Core error type for the kernel
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Money error: {0}")]
    Money(#[from] MoneyError),

    #[error("Temporal error: {0}")]
    Temporal(#[from] TemporalError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

impl CoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        CoreError::Validation(message.into())
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        CoreError::InvalidStateTransition(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        CoreError::NotFound(message.into())
    }

    /// Returns the coarse error classification
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Money(_)
            | CoreError::Temporal(_)
            | CoreError::Validation(_)
            | CoreError::InvalidStateTransition(_) => ErrorKind::Validation,
            CoreError::NotFound(_) => ErrorKind::NotFound,
            CoreError::Configuration(_) => ErrorKind::Io,
            CoreError::Cancelled(_) => ErrorKind::Cancelled,
        }
    }
}
