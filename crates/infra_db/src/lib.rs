//! Infrastructure Database Layer
//!
//! PostgreSQL adapters for the marketplace repositories, built on SQLx.
//! Queries are assembled at runtime so the crate builds without a live
//! database; the schema lives in `migrations/` and is embedded with
//! [`run_migrations`].
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PgPolicyRepository};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/marketplace")).await?;
//! run_migrations(&pool).await?;
//! let policies = PgPolicyRepository::new(pool.clone());
//! ```

pub mod error;
pub mod pool;
pub mod repositories;

pub use error::DatabaseError;
pub use pool::{create_pool, run_migrations, DatabaseConfig, DatabasePool};
pub use repositories::{
    PgClaimRepository, PgCustomerRepository, PgPaymentRepository, PgPolicyRepository, PgProductRepository,
    PgQuoteRepository, PgWorkflowRepository,
};
