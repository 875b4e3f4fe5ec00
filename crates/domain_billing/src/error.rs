//! Billing domain errors

use core_kernel::{Cancelled, ErrorKind, PaymentId, PortError};
use thiserror::Error;

/// Errors raised by payment processing
#[derive(Debug, Error)]
pub enum BillingError {
    #[error("Payment not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid payment transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// The gateway rejected the charge; the payment was stored as failed
    #[error("Payment {payment_id} failed: {reason}")]
    PaymentFailed { payment_id: PaymentId, reason: String },

    /// The caller's context stopped mid-charge; the payment was stored as failed
    #[error("Payment {payment_id} cancelled: {source}")]
    Cancelled {
        payment_id: PaymentId,
        #[source]
        source: Cancelled,
    },

    #[error(transparent)]
    Port(PortError),
}

impl BillingError {
    pub fn validation(message: impl Into<String>) -> Self {
        BillingError::Validation(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            BillingError::NotFound(_) => ErrorKind::NotFound,
            BillingError::Validation(_)
            | BillingError::InvalidTransition { .. }
            | BillingError::PaymentFailed { .. } => ErrorKind::Validation,
            BillingError::Cancelled { .. } => ErrorKind::Cancelled,
            BillingError::Port(e) => e.kind(),
        }
    }
}

impl From<PortError> for BillingError {
    fn from(e: PortError) -> Self {
        match e {
            PortError::NotFound { id, .. } => BillingError::NotFound(id),
            PortError::Validation { message, .. } => BillingError::Validation(message),
            other => BillingError::Port(other),
        }
    }
}

impl From<Cancelled> for BillingError {
    fn from(c: Cancelled) -> Self {
        BillingError::Port(c.into())
    }
}
