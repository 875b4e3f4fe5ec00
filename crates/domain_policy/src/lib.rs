//! Policy Domain
//!
//! Everything between a product listing and an issued, renewed or
//! cancelled policy.
//!
//! # Architecture
//!
//! - **Entities**: [`Product`], [`Quote`], [`Policy`]
//! - **Factor pipelines**: [`pricing`] and [`risk`] score an application as
//!   a list of small descriptors evaluated against the live business rules
//! - **Decisions**: [`underwriting`] settles an application from its risk
//!   profile and price
//! - **Lifecycle**: [`lifecycle`] renews and cancels policies and runs the
//!   sweeps that [`scheduler`] drives on timers
//!
//! # Policy Lifecycle
//!
//! ```text
//! pending -> active -> expired
//!    |         \-> cancelled (pro-rated refund)
//!    \-> cancelled (grace period elapsed)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_policy::{PolicyLifecycleService, RenewalOptions};
//!
//! let result = lifecycle
//!     .renew_policy(&ctx, policy_id, RenewalOptions {
//!         payment_method: Some("card".into()),
//!         ..Default::default()
//!     })
//!     .await?;
//! assert_eq!(result.status, RenewalStatus::Renewed);
//! ```

pub mod error;
pub mod lifecycle;
pub mod notification;
pub mod policy;
pub mod ports;
pub mod pricing;
pub mod product;
pub mod quote;
pub mod risk;
pub mod scheduler;
pub mod service;
pub mod underwriting;

pub use error::PolicyError;
pub use lifecycle::{
    CancellationResult, PolicyLifecycleService, RenewalOptions, RenewalResult, RenewalStatus, SweepReport,
};
pub use notification::{NotificationJob, NotificationType, NOTIFICATION_QUEUE};
pub use policy::{NewPolicy, PaymentFrequency, Policy, PolicyStatus, PolicyUpdate};
pub use ports::{
    PolicyFilter, PolicyRepository, ProductFilter, ProductRepository, QuoteFilter, QuoteRepository,
};
pub use pricing::{PricingEngine, PricingRequest, PricingResult, PricingScenario, ScenarioComparison};
pub use product::{NewProduct, Product, ProductStatus, ProductUpdate};
pub use quote::{Quote, QuoteStatus, QuoteUpdate};
pub use risk::{ApprovalStatus, RiskAssessmentRequest, RiskAssessmentService, RiskLevel, RiskProfile, Severity};
pub use scheduler::{LifecycleScheduler, SchedulerConfig, SweepKind};
pub use service::{PolicyService, ProductService, QuoteService};
pub use underwriting::{Decision, DecisionReview, UnderwritingDecision, UnderwritingRequest, UnderwritingService};
