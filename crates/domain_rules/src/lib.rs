//! Business Rules Domain
//!
//! Process-wide tunables for every scoring and lifecycle component:
//! fraud detection, risk assessment, pricing, underwriting, commission,
//! compliance, policy lifecycle and claim processing.
//!
//! Rules are held as an immutable [`BusinessRules`] snapshot behind a
//! [`RulesManager`]. Readers take an `Arc` to the current snapshot and keep
//! using it for the whole operation; updates validate a complete candidate
//! and swap it in atomically, so a rejected update leaves the previous
//! snapshot in place.
//!
//! # Example
//!
//! ```rust,ignore
//! let manager = RulesManager::from_file(&ctx, "config/business_rules.json").await?;
//! let rules = manager.get_config();
//! let threshold = rules.claim_processing.senior_review_threshold;
//! ```

pub mod error;
pub mod rules;
pub mod validation;
pub mod manager;

pub use error::RulesError;
pub use rules::{
    AutoReviewRules, BusinessRules, ClaimProcessingRules, CommissionRules, ComplianceRules,
    DataQualityScores, FraudDetectionRules, FraudFactorWeights, FraudThresholds,
    PolicyLifecycleRules, PricingRules, RiskAssessmentRules, RiskLevelThresholds, RiskWeights,
    RulesSection, UnderwritingRules,
};
pub use validation::validate_rules;
pub use manager::{RulesManager, RulesMetadata};
