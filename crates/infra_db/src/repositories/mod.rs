//! Repository implementations for the domain ports
//!
//! One adapter per port. Each maps a `*Row` struct to its domain type and
//! reports failures as [`core_kernel::PortError`]. Soft-deleted rows are
//! invisible to every read.

pub mod claims;
pub mod customers;
pub mod payments;
pub mod policies;

pub use claims::{PgClaimRepository, PgWorkflowRepository};
pub use customers::PgCustomerRepository;
pub use payments::PgPaymentRepository;
pub use policies::{PgPolicyRepository, PgProductRepository, PgQuoteRepository};
