//! Business rules snapshot
//!
//! Every section implements `Default` with the production defaults, and is
//! `#[serde(default)]` so a rules file only needs to name what it overrides.
//! Pricing percentages are expressed in percent of coverage (`8` = 8%).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::RulesError;

/// The complete rules configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusinessRules {
    pub version: String,
    pub last_updated: DateTime<Utc>,
    pub fraud_detection: FraudDetectionRules,
    pub risk_assessment: RiskAssessmentRules,
    pub pricing: PricingRules,
    pub underwriting: UnderwritingRules,
    pub commission: CommissionRules,
    pub compliance: ComplianceRules,
    pub policy_lifecycle: PolicyLifecycleRules,
    pub claim_processing: ClaimProcessingRules,
}

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            version: "1.0.0".to_string(),
            last_updated: Utc::now(),
            fraud_detection: FraudDetectionRules::default(),
            risk_assessment: RiskAssessmentRules::default(),
            pricing: PricingRules::default(),
            underwriting: UnderwritingRules::default(),
            commission: CommissionRules::default(),
            compliance: ComplianceRules::default(),
            policy_lifecycle: PolicyLifecycleRules::default(),
            claim_processing: ClaimProcessingRules::default(),
        }
    }
}

/// Names of the replaceable rule sections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RulesSection {
    FraudDetection,
    RiskAssessment,
    Pricing,
    Underwriting,
    Commission,
    Compliance,
    PolicyLifecycle,
    ClaimProcessing,
}

impl RulesSection {
    pub const ALL: [RulesSection; 8] = [
        RulesSection::FraudDetection,
        RulesSection::RiskAssessment,
        RulesSection::Pricing,
        RulesSection::Underwriting,
        RulesSection::Commission,
        RulesSection::Compliance,
        RulesSection::PolicyLifecycle,
        RulesSection::ClaimProcessing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RulesSection::FraudDetection => "fraud_detection",
            RulesSection::RiskAssessment => "risk_assessment",
            RulesSection::Pricing => "pricing",
            RulesSection::Underwriting => "underwriting",
            RulesSection::Commission => "commission",
            RulesSection::Compliance => "compliance",
            RulesSection::PolicyLifecycle => "policy_lifecycle",
            RulesSection::ClaimProcessing => "claim_processing",
        }
    }
}

impl fmt::Display for RulesSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RulesSection {
    type Err = RulesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RulesSection::ALL
            .into_iter()
            .find(|section| section.as_str() == s)
            .ok_or_else(|| RulesError::UnknownSection(s.to_string()))
    }
}

// ============================================================================
// Fraud detection
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FraudDetectionRules {
    pub enabled: bool,
    pub factor_weights: FraudFactorWeights,
    pub thresholds: FraudThresholds,
    pub policy_start_threshold_days: i64,
    pub reporting_delay_threshold_days: i64,
    pub weekend_multiplier: f64,
    pub business_hours_multiplier: f64,
    pub round_number_penalty: f64,
    pub high_value_threshold: Decimal,
    pub very_high_value_threshold: Decimal,
    /// Claim/coverage ratio above which the amount factor scores high
    pub coverage_ratio_threshold: f64,
    pub new_account_threshold_days: i64,
    /// Prior claims within a year that count as a frequent claimant
    pub frequent_claims_threshold: u32,
    pub min_supporting_documents: usize,
    pub high_risk_countries: Vec<String>,
    pub high_risk_regions: Vec<String>,
    pub auto_review: AutoReviewRules,
}

impl Default for FraudDetectionRules {
    fn default() -> Self {
        Self {
            enabled: true,
            factor_weights: FraudFactorWeights::default(),
            thresholds: FraudThresholds::default(),
            policy_start_threshold_days: 30,
            reporting_delay_threshold_days: 30,
            weekend_multiplier: 1.5,
            business_hours_multiplier: 1.2,
            round_number_penalty: 10.0,
            high_value_threshold: dec!(50000),
            very_high_value_threshold: dec!(100000),
            coverage_ratio_threshold: 0.9,
            new_account_threshold_days: 90,
            frequent_claims_threshold: 3,
            min_supporting_documents: 2,
            high_risk_countries: Vec::new(),
            high_risk_regions: Vec::new(),
            auto_review: AutoReviewRules::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FraudFactorWeights {
    pub claim_timing: f64,
    pub claim_amount: f64,
    pub customer_history: f64,
    pub incident_patterns: f64,
    pub documentation: f64,
    pub geographic_risk: f64,
    pub behavioral_patterns: f64,
    pub policy_history: f64,
}

impl Default for FraudFactorWeights {
    fn default() -> Self {
        Self {
            claim_timing: 0.20,
            claim_amount: 0.20,
            customer_history: 0.15,
            incident_patterns: 0.10,
            documentation: 0.10,
            geographic_risk: 0.10,
            behavioral_patterns: 0.10,
            policy_history: 0.05,
        }
    }
}

impl FraudFactorWeights {
    /// `(factor name, weight)` pairs in evaluation order
    pub fn entries(&self) -> [(&'static str, f64); 8] {
        [
            ("claim_timing", self.claim_timing),
            ("claim_amount", self.claim_amount),
            ("customer_history", self.customer_history),
            ("incident_patterns", self.incident_patterns),
            ("documentation", self.documentation),
            ("geographic_risk", self.geographic_risk),
            ("behavioral_patterns", self.behavioral_patterns),
            ("policy_history", self.policy_history),
        ]
    }
}

/// Score boundaries of the fraud risk levels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FraudThresholds {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
    pub critical: f64,
}

impl Default for FraudThresholds {
    fn default() -> Self {
        Self {
            low: 20.0,
            medium: 40.0,
            high: 60.0,
            critical: 80.0,
        }
    }
}

/// When a fraud score must go to a human
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoReviewRules {
    pub score_threshold: f64,
    /// Critical factors that force review; 0 reviews every claim
    pub critical_factor_count: usize,
    /// Factors at high severity or above that force review; 0 reviews every claim
    pub high_severity_count: usize,
}

impl Default for AutoReviewRules {
    fn default() -> Self {
        Self {
            score_threshold: 70.0,
            critical_factor_count: 1,
            high_severity_count: 2,
        }
    }
}

// ============================================================================
// Risk assessment
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskAssessmentRules {
    pub weights: RiskWeights,
    pub level_thresholds: RiskLevelThresholds,
    /// Overall score from which a profile is conditional
    pub conditional_threshold: f64,
    /// Overall score from which a profile is declined
    pub decline_threshold: f64,
    pub min_premium_adjustment: Decimal,
    pub max_premium_adjustment: Decimal,
    pub validity_days: i64,
    pub high_risk_countries: Vec<String>,
}

impl Default for RiskAssessmentRules {
    fn default() -> Self {
        Self {
            weights: RiskWeights::default(),
            level_thresholds: RiskLevelThresholds::default(),
            conditional_threshold: 60.0,
            decline_threshold: 80.0,
            min_premium_adjustment: dec!(-50),
            max_premium_adjustment: dec!(200),
            validity_days: 90,
            high_risk_countries: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskWeights {
    pub demographic: f64,
    pub behavioral: f64,
    pub financial: f64,
    pub geographic: f64,
    pub product_specific: f64,
    pub historical: f64,
    pub lifestyle: f64,
    pub compliance: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            demographic: 0.20,
            behavioral: 0.25,
            financial: 0.30,
            geographic: 0.15,
            product_specific: 0.20,
            historical: 0.25,
            lifestyle: 0.10,
            compliance: 0.05,
        }
    }
}

impl RiskWeights {
    pub fn entries(&self) -> [(&'static str, f64); 8] {
        [
            ("demographic", self.demographic),
            ("behavioral", self.behavioral),
            ("financial", self.financial),
            ("geographic", self.geographic),
            ("product_specific", self.product_specific),
            ("historical", self.historical),
            ("lifestyle", self.lifestyle),
            ("compliance", self.compliance),
        ]
    }
}

/// Lower bounds of the medium, high and very-high risk bins
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskLevelThresholds {
    pub medium: f64,
    pub high: f64,
    pub very_high: f64,
}

impl Default for RiskLevelThresholds {
    fn default() -> Self {
        Self {
            medium: 40.0,
            high: 60.0,
            very_high: 80.0,
        }
    }
}

// ============================================================================
// Pricing
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingRules {
    /// Rate per 1000 of coverage by product category; `default` is mandatory
    pub base_rates: BTreeMap<String, Decimal>,
    /// Named discounts, percent of coverage
    pub discounts: BTreeMap<String, Decimal>,
    pub tax_rate: Decimal,
    pub market_adjustment: Decimal,
    /// Keyed by payment frequency; all three frequencies are mandatory
    pub frequency_adjustments: BTreeMap<String, Decimal>,
    pub high_coverage_threshold: Decimal,
    pub high_coverage_rate: Decimal,
    pub medium_coverage_threshold: Decimal,
    pub medium_coverage_rate: Decimal,
    /// Account younger than six months
    pub new_account_surcharge: Decimal,
    /// Account younger than two years
    pub young_account_surcharge: Decimal,
    pub established_account_discount: Decimal,
    /// Account older than five years
    pub long_loyalty_discount: Decimal,
    /// Account older than two years
    pub loyalty_discount: Decimal,
    /// December to February
    pub winter_adjustment: Decimal,
    /// June to August
    pub summer_adjustment: Decimal,
    pub quote_validity_hours: i64,
}

impl Default for PricingRules {
    fn default() -> Self {
        Self {
            base_rates: BTreeMap::from([
                ("auto".to_string(), dec!(15)),
                ("home".to_string(), dec!(8)),
                ("life".to_string(), dec!(5)),
                ("health".to_string(), dec!(25)),
                ("business".to_string(), dec!(20)),
                ("default".to_string(), dec!(10)),
            ]),
            discounts: BTreeMap::from([
                ("multi_policy".to_string(), dec!(10)),
                ("loyalty".to_string(), dec!(5)),
                ("early_payment".to_string(), dec!(3)),
                ("safe_driver".to_string(), dec!(8)),
                ("security_system".to_string(), dec!(6)),
            ]),
            tax_rate: dec!(8),
            market_adjustment: dec!(3),
            frequency_adjustments: BTreeMap::from([
                ("annually".to_string(), dec!(-5)),
                ("quarterly".to_string(), dec!(2)),
                ("monthly".to_string(), dec!(5)),
            ]),
            high_coverage_threshold: dec!(1000000),
            high_coverage_rate: dec!(0.1),
            medium_coverage_threshold: dec!(500000),
            medium_coverage_rate: dec!(0.05),
            new_account_surcharge: dec!(2),
            young_account_surcharge: dec!(1),
            established_account_discount: dec!(0.5),
            long_loyalty_discount: dec!(8),
            loyalty_discount: dec!(3),
            winter_adjustment: dec!(2),
            summer_adjustment: dec!(1),
            quote_validity_hours: 24,
        }
    }
}

impl PricingRules {
    /// Base rate for a category, falling back to the `default` entry
    pub fn base_rate(&self, category: &str) -> Decimal {
        self.base_rates
            .get(category)
            .or_else(|| self.base_rates.get("default"))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }
}

// ============================================================================
// Underwriting
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnderwritingRules {
    pub baseline_confidence: f64,
    pub decline_threshold: f64,
    pub conditional_threshold: f64,
    pub review_threshold: f64,
    pub data_quality: DataQualityScores,
    pub documentation_deadline_days: i64,
    pub monitoring_deadline_days: i64,
    pub inspection_deadline_days: i64,
    pub advance_payment_deadline_days: i64,
    pub max_coverage_amount: Decimal,
    pub validity_days: i64,
}

impl Default for UnderwritingRules {
    fn default() -> Self {
        Self {
            baseline_confidence: 0.8,
            decline_threshold: 80.0,
            conditional_threshold: 60.0,
            review_threshold: 40.0,
            data_quality: DataQualityScores::default(),
            documentation_deadline_days: 30,
            monitoring_deadline_days: 90,
            inspection_deadline_days: 14,
            advance_payment_deadline_days: 7,
            max_coverage_amount: dec!(10000000),
            validity_days: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataQualityScores {
    pub excellent: f64,
    pub good: f64,
    pub fair: f64,
    pub poor: f64,
}

impl Default for DataQualityScores {
    fn default() -> Self {
        Self {
            excellent: 1.0,
            good: 0.8,
            fair: 0.6,
            poor: 0.4,
        }
    }
}

impl DataQualityScores {
    /// Score of a data-quality label; unknown labels count as poor
    pub fn score(&self, label: &str) -> f64 {
        match label {
            "excellent" => self.excellent,
            "good" => self.good,
            "fair" => self.fair,
            _ => self.poor,
        }
    }
}

// ============================================================================
// Commission and compliance
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommissionRules {
    /// Partner commission in percent of premium, by product category
    pub rates: BTreeMap<String, Decimal>,
    pub renewal_rate: Decimal,
    pub max_rate: Decimal,
}

impl Default for CommissionRules {
    fn default() -> Self {
        Self {
            rates: BTreeMap::from([
                ("auto".to_string(), dec!(10)),
                ("home".to_string(), dec!(12)),
                ("life".to_string(), dec!(15)),
                ("health".to_string(), dec!(8)),
                ("business".to_string(), dec!(10)),
                ("default".to_string(), dec!(10)),
            ]),
            renewal_rate: dec!(5),
            max_rate: dec!(25),
        }
    }
}

impl CommissionRules {
    /// Commission in percent for a category, falling back to `default`
    pub fn rate(&self, category: &str) -> Decimal {
        self.rates
            .get(category)
            .or_else(|| self.rates.get("default"))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplianceRules {
    pub kyc_required: bool,
    pub aml_required: bool,
    pub max_policies_per_customer: u32,
    /// Countries where no cover is written
    pub restricted_countries: Vec<String>,
    pub data_retention_days: i64,
}

impl Default for ComplianceRules {
    fn default() -> Self {
        Self {
            kyc_required: true,
            aml_required: true,
            max_policies_per_customer: 10,
            restricted_countries: Vec::new(),
            data_retention_days: 2555,
        }
    }
}

// ============================================================================
// Policy lifecycle
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyLifecycleRules {
    /// A policy is renewable this many days before it expires
    pub renewal_window_days: i64,
    pub renewal_premium_increase: Decimal,
    /// Premium multiplier by payment frequency; all three are mandatory
    pub frequency_multipliers: BTreeMap<String, Decimal>,
    pub grace_period_days: i64,
    /// Share of the unused premium refunded on cancellation
    pub cancellation_refund_factor: Decimal,
    pub reminder_days_ahead: i64,
    pub auto_renewal_enabled: bool,
}

impl Default for PolicyLifecycleRules {
    fn default() -> Self {
        Self {
            renewal_window_days: 30,
            renewal_premium_increase: dec!(1.03),
            frequency_multipliers: BTreeMap::from([
                ("annually".to_string(), dec!(0.95)),
                ("quarterly".to_string(), dec!(1.02)),
                ("monthly".to_string(), dec!(1.05)),
            ]),
            grace_period_days: 15,
            cancellation_refund_factor: dec!(0.90),
            reminder_days_ahead: 30,
            auto_renewal_enabled: true,
        }
    }
}

impl PolicyLifecycleRules {
    pub fn frequency_multiplier(&self, frequency: &str) -> Decimal {
        self.frequency_multipliers
            .get(frequency)
            .copied()
            .unwrap_or(Decimal::ONE)
    }
}

// ============================================================================
// Claim processing
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaimProcessingRules {
    /// Claims above this amount get a senior review stage
    pub senior_review_threshold: Decimal,
    /// Claims above this amount get an executive approval stage
    pub executive_approval_threshold: Decimal,
    /// Claims above this amount always need a damage assessor
    pub damage_review_threshold: Decimal,
    pub min_supporting_documents: usize,
    /// Fraud score from which the fraud stage declines
    pub fraud_decline_score: f64,
    /// Fraud score from which the fraud stage asks for review
    pub fraud_review_score: f64,
}

impl Default for ClaimProcessingRules {
    fn default() -> Self {
        Self {
            senior_review_threshold: dec!(50000),
            executive_approval_threshold: dec!(100000),
            damage_review_threshold: dec!(10000),
            min_supporting_documents: 2,
            fraud_decline_score: 80.0,
            fraud_review_score: 60.0,
        }
    }
}
