//! Rules errors

use core_kernel::{Cancelled, ErrorKind};
use thiserror::Error;

/// Errors raised while loading, validating or updating business rules
#[derive(Debug, Error)]
pub enum RulesError {
    /// A rule value violates an invariant
    #[error("Invalid {section} rules: {message}")]
    Invalid {
        section: &'static str,
        message: String,
    },

    /// A mandatory entry is absent
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Section name not recognised
    #[error("Unknown rules section: {0}")]
    UnknownSection(String),

    /// Rules source could not be parsed
    #[error("Failed to parse rules: {0}")]
    Parse(String),

    /// Rules file could not be read
    #[error("Failed to load rules: {0}")]
    Load(String),

    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

impl RulesError {
    pub fn invalid(section: &'static str, message: impl Into<String>) -> Self {
        RulesError::Invalid {
            section,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RulesError::Invalid { .. }
            | RulesError::MissingField(_)
            | RulesError::Parse(_) => ErrorKind::Validation,
            RulesError::UnknownSection(_) => ErrorKind::NotFound,
            RulesError::Load(_) => ErrorKind::Io,
            RulesError::Cancelled(_) => ErrorKind::Cancelled,
        }
    }
}

impl From<config::ConfigError> for RulesError {
    fn from(e: config::ConfigError) -> Self {
        match e {
            config::ConfigError::Foreign(_) | config::ConfigError::NotFound(_) => {
                RulesError::Load(e.to_string())
            }
            other => RulesError::Parse(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for RulesError {
    fn from(e: serde_json::Error) -> Self {
        RulesError::Parse(e.to_string())
    }
}
