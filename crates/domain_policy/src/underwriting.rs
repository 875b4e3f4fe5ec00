//! Underwriting decisions
//!
//! An application is risk-assessed, priced, and then settled as approved,
//! conditional, pending review or declined. Conditional decisions carry
//! conditions with deadlines; a manual review can override any automatic
//! outcome.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument};
use uuid::Uuid;

use core_kernel::{text_enum, Context, Currency, CustomerId, ProductId};
use domain_rules::{RulesManager, UnderwritingRules};

use crate::error::PolicyError;
use crate::policy::PaymentFrequency;
use crate::pricing::{PricingEngine, PricingRequest, PricingResult};
use crate::risk::{RiskAssessmentRequest, RiskAssessmentService, RiskLevel, RiskProfile, Severity};

text_enum! {
    pub enum Decision {
        Approved => "approved",
        Declined => "declined",
        Conditional => "conditional",
        PendingReview => "pending_review",
    }
}

/// An application for cover
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnderwritingRequest {
    pub user_id: CustomerId,
    pub product_id: ProductId,
    pub coverage_amount: Decimal,
    #[serde(default)]
    pub currency: Currency,
    #[serde(default)]
    pub payment_frequency: PaymentFrequency,
    pub effective_date: DateTime<Utc>,
    pub expiration_date: DateTime<Utc>,
    /// Passed through to pricing
    #[serde(default)]
    pub risk_factors: BTreeMap<String, Value>,
    #[serde(default)]
    pub discounts: Vec<String>,
    /// Quality labels (`excellent`, `good`, `fair`, `poor`) of the data
    /// sources behind the application
    #[serde(default)]
    pub data_quality: Vec<String>,
}

impl UnderwritingRequest {
    pub fn validate(&self, rules: &UnderwritingRules) -> Result<(), PolicyError> {
        if self.coverage_amount <= Decimal::ZERO {
            return Err(PolicyError::validation("coverage_amount must be positive"));
        }
        if self.coverage_amount > rules.max_coverage_amount {
            return Err(PolicyError::validation(format!(
                "coverage_amount exceeds the maximum of {}",
                rules.max_coverage_amount
            )));
        }
        if self.expiration_date <= self.effective_date {
            return Err(PolicyError::validation("expiration_date must be after effective_date"));
        }
        Ok(())
    }

    fn pricing_request(&self) -> PricingRequest {
        PricingRequest {
            product_id: self.product_id,
            user_id: self.user_id,
            coverage_amount: self.coverage_amount,
            currency: self.currency,
            payment_frequency: self.payment_frequency,
            effective_date: self.effective_date,
            expiration_date: self.expiration_date,
            risk_factors: self.risk_factors.clone(),
            discounts: self.discounts.clone(),
            options: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnderwritingCondition {
    pub condition_type: String,
    pub description: String,
    pub deadline: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnderwritingDecision {
    pub id: Uuid,
    pub user_id: CustomerId,
    pub product_id: ProductId,
    pub decision: Decision,
    /// Within `[0, 1]`; 1.0 once a person has reviewed the decision
    pub confidence: f64,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    /// Final premium after the risk adjustment
    pub premium: Decimal,
    pub currency: Currency,
    pub conditions: Vec<UnderwritingCondition>,
    pub reasons: Vec<String>,
    pub recommendations: Vec<String>,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub review_notes: Option<String>,
    pub decided_at: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

/// A manual override of an automatic decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionReview {
    pub decision: UnderwritingDecision,
    pub outcome: Decision,
    pub reviewer: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Settles an application from its risk profile and price
pub fn decide(
    profile: &RiskProfile,
    pricing: &PricingResult,
    data_quality: &[String],
    rules: &UnderwritingRules,
    now: DateTime<Utc>,
) -> UnderwritingDecision {
    let score = profile.overall_score;
    let critical: Vec<_> = profile
        .assessments
        .iter()
        .filter(|a| a.severity == Severity::Critical)
        .collect();

    let mut reasons = Vec::new();
    let decision = if !critical.is_empty() {
        for a in &critical {
            reasons.push(format!("Critical {} risk: {}", a.category, a.description));
        }
        Decision::Declined
    } else if score >= rules.decline_threshold {
        reasons.push(format!("Risk score {:.1} is above the decline threshold", score));
        Decision::Declined
    } else if score >= rules.conditional_threshold {
        reasons.push(format!("Risk score {:.1} requires conditions", score));
        Decision::Conditional
    } else if score >= rules.review_threshold {
        reasons.push(format!("Risk score {:.1} requires manual review", score));
        Decision::PendingReview
    } else {
        reasons.push("Risk within automatic approval limits".to_string());
        Decision::Approved
    };

    let conditions = if decision == Decision::Conditional {
        standard_conditions(rules, now)
    } else {
        Vec::new()
    };

    let avg_quality = if data_quality.is_empty() {
        rules.data_quality.good
    } else {
        data_quality.iter().map(|l| rules.data_quality.score(l)).sum::<f64>() / data_quality.len() as f64
    };
    let confidence = ((rules.baseline_confidence + avg_quality) / 2.0).clamp(0.0, 1.0);

    let loading = Decimal::ONE + profile.premium_adjustment / Decimal::ONE_HUNDRED;
    let premium = (pricing.final_premium * loading)
        .max(Decimal::ZERO)
        .round_dp(pricing.currency.decimal_places());

    UnderwritingDecision {
        id: Uuid::now_v7(),
        user_id: profile.user_id,
        product_id: profile.product_id,
        decision,
        confidence,
        risk_score: score,
        risk_level: profile.risk_level,
        premium,
        currency: pricing.currency,
        conditions,
        reasons,
        recommendations: profile.recommendations.clone(),
        reviewed_by: None,
        reviewed_at: None,
        review_notes: None,
        decided_at: now,
        valid_until: now + Duration::days(rules.validity_days),
    }
}

fn standard_conditions(rules: &UnderwritingRules, now: DateTime<Utc>) -> Vec<UnderwritingCondition> {
    let condition = |kind: &str, description: &str, days: i64| UnderwritingCondition {
        condition_type: kind.to_string(),
        description: description.to_string(),
        deadline: now + Duration::days(days),
    };
    vec![
        condition("documentation", "Submit supporting documentation", rules.documentation_deadline_days),
        condition("monitoring", "Account monitored during the probation period", rules.monitoring_deadline_days),
        condition("inspection", "Complete a risk inspection", rules.inspection_deadline_days),
        condition("advance_payment", "Pay the first premium in advance", rules.advance_payment_deadline_days),
    ]
}

/// Applies a reviewer's outcome to a decision
///
/// # Errors
///
/// `Validation` when the reviewer is blank or the outcome is
/// `pending_review`.
pub fn apply_review(review: DecisionReview, now: DateTime<Utc>) -> Result<UnderwritingDecision, PolicyError> {
    if review.reviewer.trim().is_empty() {
        return Err(PolicyError::validation("reviewer is required"));
    }
    if review.outcome == Decision::PendingReview {
        return Err(PolicyError::validation("a review must settle the decision"));
    }
    let mut decision = review.decision;
    if review.outcome != Decision::Conditional {
        decision.conditions.clear();
    }
    decision
        .reasons
        .push(format!("Manually {} by {}", review.outcome, review.reviewer));
    decision.decision = review.outcome;
    decision.confidence = 1.0;
    decision.reviewed_by = Some(review.reviewer);
    decision.reviewed_at = Some(now);
    decision.review_notes = review.notes;
    Ok(decision)
}

pub struct UnderwritingService {
    risk: Arc<RiskAssessmentService>,
    pricing: Arc<PricingEngine>,
    rules: Arc<RulesManager>,
}

impl UnderwritingService {
    pub fn new(risk: Arc<RiskAssessmentService>, pricing: Arc<PricingEngine>, rules: Arc<RulesManager>) -> Self {
        Self { risk, pricing, rules }
    }

    #[instrument(skip(self, ctx, request), fields(user_id = %request.user_id, product_id = %request.product_id))]
    pub async fn evaluate(&self, ctx: &Context, request: &UnderwritingRequest) -> Result<UnderwritingDecision, PolicyError> {
        let rules = self.rules.get_config();
        request.validate(&rules.underwriting)?;

        let profile = self
            .risk
            .assess_risk(
                ctx,
                &RiskAssessmentRequest {
                    user_id: request.user_id,
                    product_id: request.product_id,
                    coverage_amount: request.coverage_amount,
                },
            )
            .await?;
        let pricing = self.pricing.calculate_premium(ctx, &request.pricing_request()).await?;

        let decision = decide(&profile, &pricing, &request.data_quality, &rules.underwriting, Utc::now());
        info!(
            decision = %decision.decision,
            risk_score = decision.risk_score,
            confidence = decision.confidence,
            "Underwriting decision made"
        );
        Ok(decision)
    }

    #[instrument(skip(self, review), fields(decision_id = %review.decision.id, reviewer = %review.reviewer))]
    pub fn review(&self, review: DecisionReview) -> Result<UnderwritingDecision, PolicyError> {
        let decision = apply_review(review, Utc::now())?;
        info!(decision = %decision.decision, "Underwriting decision reviewed");
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::PriceBreakdown;
    use crate::risk::{ApprovalStatus, Assessment};
    use rust_decimal_macros::dec;

    fn assessment(category: &str, score: f64, severity: Severity) -> Assessment {
        Assessment {
            category: category.to_string(),
            score,
            weight: 0.2,
            impact: severity.impact(),
            severity,
            description: format!("{} check", category),
            factors: Vec::new(),
        }
    }

    fn profile(score: f64, assessments: Vec<Assessment>) -> RiskProfile {
        let now = Utc::now();
        RiskProfile {
            user_id: CustomerId::new(),
            product_id: ProductId::new(),
            coverage_amount: dec!(100000),
            overall_score: score,
            risk_level: RiskLevel::Low,
            risk_category: "preferred".to_string(),
            assessments,
            recommendations: vec!["Standard terms apply".to_string()],
            premium_adjustment: dec!(10),
            approval_status: ApprovalStatus::Approved,
            conditions: Vec::new(),
            assessment_date: now,
            valid_until: now + Duration::days(90),
        }
    }

    fn pricing(final_premium: Decimal) -> PricingResult {
        let now = Utc::now();
        PricingResult {
            product_id: ProductId::new(),
            user_id: CustomerId::new(),
            base_premium: final_premium,
            adjusted_premium: final_premium,
            final_premium,
            currency: Currency::USD,
            breakdown: PriceBreakdown::default(),
            factors: Vec::new(),
            calculated_at: now,
            valid_until: now,
        }
    }

    fn decide_with(score: f64, assessments: Vec<Assessment>) -> UnderwritingDecision {
        decide(
            &profile(score, assessments),
            &pricing(dec!(1000)),
            &[],
            &UnderwritingRules::default(),
            Utc::now(),
        )
    }

    #[test]
    fn test_decision_bands() {
        assert_eq!(decide_with(10.0, vec![]).decision, Decision::Approved);
        assert_eq!(decide_with(45.0, vec![]).decision, Decision::PendingReview);
        assert_eq!(decide_with(65.0, vec![]).decision, Decision::Conditional);
        assert_eq!(decide_with(85.0, vec![]).decision, Decision::Declined);
    }

    #[test]
    fn test_critical_assessment_declines_low_score() {
        let d = decide_with(5.0, vec![assessment("compliance", 80.0, Severity::Critical)]);
        assert_eq!(d.decision, Decision::Declined);
        assert!(d.reasons[0].contains("compliance"));
    }

    #[test]
    fn test_conditional_deadlines() {
        let d = decide_with(65.0, vec![]);
        let deadline = |kind: &str| {
            let c = d.conditions.iter().find(|c| c.condition_type == kind).unwrap();
            (c.deadline - d.decided_at).num_days()
        };
        assert_eq!(deadline("documentation"), 30);
        assert_eq!(deadline("monitoring"), 90);
        assert_eq!(deadline("inspection"), 14);
        assert_eq!(deadline("advance_payment"), 7);
    }

    #[test]
    fn test_confidence_from_data_quality() {
        let rules = UnderwritingRules::default();
        let d = decide(
            &profile(10.0, vec![]),
            &pricing(dec!(1000)),
            &["excellent".to_string(), "fair".to_string()],
            &rules,
            Utc::now(),
        );
        assert!((d.confidence - 0.8).abs() < 1e-9);
        assert_eq!((d.valid_until - d.decided_at).num_days(), 30);
        // 1000 loaded by the 10% risk adjustment
        assert_eq!(d.premium, dec!(1100));
    }

    #[test]
    fn test_review_overrides_with_full_confidence() {
        let d = decide_with(65.0, vec![]);
        let reviewed = apply_review(
            DecisionReview {
                decision: d,
                outcome: Decision::Approved,
                reviewer: "uw-17".to_string(),
                notes: Some("documents received".to_string()),
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(reviewed.decision, Decision::Approved);
        assert_eq!(reviewed.confidence, 1.0);
        assert_eq!(reviewed.reviewed_by.as_deref(), Some("uw-17"));
        assert!(reviewed.conditions.is_empty());
    }

    #[test]
    fn test_review_must_settle() {
        let d = decide_with(45.0, vec![]);
        let result = apply_review(
            DecisionReview {
                decision: d,
                outcome: Decision::PendingReview,
                reviewer: "uw-17".to_string(),
                notes: None,
            },
            Utc::now(),
        );
        assert!(matches!(result, Err(PolicyError::Validation(_))));
    }
}
