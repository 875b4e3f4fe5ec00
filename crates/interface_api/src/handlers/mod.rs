//! API route handlers
//!
//! Every handler receives the per-request [`core_kernel::Context`] from the
//! request extensions and delegates to a domain service.

pub mod claims;
pub mod customers;
pub mod health;
pub mod payments;
pub mod policies;
pub mod products;
pub mod quotes;
pub mod rules;
pub mod underwriting;

use axum::{http::StatusCode, Json};

/// A `201 Created` response carrying the new resource
pub(crate) fn created<T>(value: T) -> (StatusCode, Json<T>) {
    (StatusCode::CREATED, Json(value))
}
