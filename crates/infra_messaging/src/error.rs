//! Messaging error types

use core_kernel::PortError;
use thiserror::Error;

/// Errors raised by the event bus and job dispatcher
#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("Handler already subscribed: {0}")]
    AlreadySubscribed(String),

    #[error("Handler not subscribed: {0}")]
    NotSubscribed(String),

    #[error("{0} is closed")]
    Closed(&'static str),
}

impl From<MessagingError> for PortError {
    fn from(e: MessagingError) -> Self {
        match e {
            MessagingError::AlreadySubscribed(name) => {
                PortError::conflict(format!("handler {} already subscribed", name))
            }
            MessagingError::NotSubscribed(name) => PortError::not_found("Subscription", name),
            MessagingError::Closed(service) => PortError::unavailable(service),
        }
    }
}
