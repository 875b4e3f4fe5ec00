//! API error handling
//!
//! Domain errors are classified by [`ErrorKind`] and rendered as
//! `{"error": "<message>"}`.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use core_kernel::{CoreError, ErrorKind, PortError};
use domain_billing::BillingError;
use domain_claims::ClaimError;
use domain_party::PartyError;
use domain_policy::PolicyError;
use domain_rules::RulesError;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    /// Bad input, malformed JSON or a disallowed state transition
    #[error("{0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("{0}")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    /// Classifies a domain failure
    ///
    /// Unique-key conflicts are client errors and share the 400 bucket with
    /// validation failures.
    pub fn from_kind(kind: ErrorKind, message: String) -> Self {
        match kind {
            ErrorKind::Validation | ErrorKind::Conflict => ApiError::BadRequest(message),
            ErrorKind::NotFound => ApiError::NotFound(message),
            ErrorKind::Unauthorized => ApiError::Unauthorized,
            ErrorKind::Io | ErrorKind::Cancelled => ApiError::Internal(message),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

macro_rules! classify {
    ($($source:ty),* $(,)?) => {
        $(
            impl From<$source> for ApiError {
                fn from(e: $source) -> Self {
                    ApiError::from_kind(e.kind(), e.to_string())
                }
            }
        )*
    };
}

classify!(CoreError, PortError, PartyError, BillingError, PolicyError, ClaimError, RulesError);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            ApiError::from_kind(ErrorKind::Validation, "bad".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from_kind(ErrorKind::Conflict, "dup".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from_kind(ErrorKind::NotFound, "gone".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from_kind(ErrorKind::Io, "db down".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_port_not_found_is_404() {
        let err: ApiError = PortError::not_found("Policy", "abc").into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
