//! Test Utilities Crate
//!
//! Shared test infrastructure for the marketplace test suites.
//!
//! # Modules
//!
//! - `fixtures`: Ready-made customers, products, policies, claims and requests
//! - `builders`: Builders for entities when a test needs specific fields
//! - `harness`: Every service wired over in-memory adapters
//! - `database`: PostgreSQL container management for adapter tests
//! - `assertions`: Assertion helpers for errors, events, jobs and workflows
//! - `generators`: proptest strategies for valid domain input

pub mod assertions;
pub mod builders;
pub mod database;
pub mod fixtures;
pub mod generators;
pub mod harness;

pub use assertions::*;
pub use builders::*;
pub use database::*;
pub use fixtures::*;
pub use generators::*;
pub use harness::*;
