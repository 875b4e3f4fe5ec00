//! Claims Domain
//!
//! Claim submission, fraud scoring and the staged workflow that takes a
//! claim from `submitted` to a decision and, when approved, to payout.
//!
//! # Architecture
//!
//! - **Entity**: [`Claim`] with its documents and status machine
//! - **Fraud**: [`fraud`] scores a claim with eight weighted factors read
//!   from the live business rules
//! - **Workflow**: [`processing`] runs the stages laid out by [`workflow`]
//!   and persists the workflow after each one
//! - **Payout**: [`payout`] pays approved claims on the `payouts` queue
//!
//! # Claim Lifecycle
//!
//! ```text
//! submitted -> under_review -> approved -> paid
//!     \             \-> denied
//!      \-> approved | denied
//! ```

pub mod claim;
pub mod error;
pub mod fraud;
pub mod payout;
pub mod ports;
pub mod processing;
pub mod service;
pub mod workflow;

pub use claim::{Claim, ClaimDocument, ClaimStatus, ClaimUpdate, NewClaim};
pub use error::ClaimError;
pub use fraud::{score_claim, FraudDetectionService, FraudFactor, FraudInput, FraudRiskLevel, FraudScore, FRAUD_FACTORS};
pub use payout::{PayoutJob, PAYOUT_QUEUE};
pub use ports::{ClaimFilter, ClaimRepository, WorkflowRepository};
pub use processing::{ClaimWorkflowService, StageOverride};
pub use service::ClaimService;
pub use workflow::{Stage, StageId, StageOutcome, StageResult, StageStatus, Workflow, WorkflowStatus};
