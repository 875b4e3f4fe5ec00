//! Rules validation
//!
//! A candidate snapshot is checked as a whole before it can replace the
//! current one. The first violation found is reported.

use rust_decimal::Decimal;

use crate::error::RulesError;
use crate::rules::{BusinessRules, FraudThresholds, RiskLevelThresholds};

const FREQUENCIES: [&str; 3] = ["annually", "quarterly", "monthly"];

/// Checks every invariant of a rules snapshot
pub fn validate_rules(rules: &BusinessRules) -> Result<(), RulesError> {
    if rules.version.trim().is_empty() {
        return Err(RulesError::MissingField("version".to_string()));
    }
    validate_fraud(rules)?;
    validate_risk(rules)?;
    validate_pricing(rules)?;
    validate_underwriting(rules)?;
    validate_commission(rules)?;
    validate_lifecycle(rules)?;
    validate_claims(rules)
}

fn weights_valid(section: &'static str, entries: &[(&'static str, f64)]) -> Result<(), RulesError> {
    for (name, weight) in entries {
        if !weight.is_finite() || *weight < 0.0 {
            return Err(RulesError::invalid(section, format!("weight {} must be non-negative", name)));
        }
    }
    if entries.iter().map(|(_, w)| w).sum::<f64>() <= 0.0 {
        return Err(RulesError::invalid(section, "at least one weight must be positive"));
    }
    Ok(())
}

fn fraud_thresholds_ordered(t: &FraudThresholds) -> bool {
    t.low <= t.medium && t.medium <= t.high && t.high <= t.critical
}

fn risk_thresholds_ordered(t: &RiskLevelThresholds) -> bool {
    t.medium <= t.high && t.high <= t.very_high
}

fn in_score_range(value: f64) -> bool {
    (0.0..=100.0).contains(&value)
}

fn validate_fraud(rules: &BusinessRules) -> Result<(), RulesError> {
    const SECTION: &str = "fraud_detection";
    let fraud = &rules.fraud_detection;

    weights_valid(SECTION, &fraud.factor_weights.entries())?;
    if !fraud_thresholds_ordered(&fraud.thresholds) {
        return Err(RulesError::invalid(SECTION, "thresholds must satisfy low <= medium <= high <= critical"));
    }
    let t = &fraud.thresholds;
    if ![t.low, t.medium, t.high, t.critical, fraud.auto_review.score_threshold]
        .into_iter()
        .all(in_score_range)
    {
        return Err(RulesError::invalid(SECTION, "score thresholds must lie in [0, 100]"));
    }
    if fraud.weekend_multiplier < 0.0 || fraud.business_hours_multiplier < 0.0 {
        return Err(RulesError::invalid(SECTION, "multipliers must be non-negative"));
    }
    if fraud.policy_start_threshold_days <= 0
        || fraud.reporting_delay_threshold_days <= 0
        || fraud.new_account_threshold_days <= 0
    {
        return Err(RulesError::invalid(SECTION, "day thresholds must be positive"));
    }
    if fraud.high_value_threshold > fraud.very_high_value_threshold {
        return Err(RulesError::invalid(SECTION, "high_value_threshold must not exceed very_high_value_threshold"));
    }
    if fraud.coverage_ratio_threshold <= 0.0 {
        return Err(RulesError::invalid(SECTION, "coverage_ratio_threshold must be positive"));
    }
    Ok(())
}

fn validate_risk(rules: &BusinessRules) -> Result<(), RulesError> {
    const SECTION: &str = "risk_assessment";
    let risk = &rules.risk_assessment;

    weights_valid(SECTION, &risk.weights.entries())?;
    if !risk_thresholds_ordered(&risk.level_thresholds) {
        return Err(RulesError::invalid(SECTION, "level thresholds must satisfy medium <= high <= very_high"));
    }
    if risk.conditional_threshold > risk.decline_threshold {
        return Err(RulesError::invalid(SECTION, "conditional_threshold must not exceed decline_threshold"));
    }
    if risk.min_premium_adjustment > risk.max_premium_adjustment {
        return Err(RulesError::invalid(SECTION, "premium adjustment bounds are inverted"));
    }
    if risk.validity_days <= 0 {
        return Err(RulesError::invalid(SECTION, "validity_days must be positive"));
    }
    Ok(())
}

fn validate_pricing(rules: &BusinessRules) -> Result<(), RulesError> {
    const SECTION: &str = "pricing";
    let pricing = &rules.pricing;

    if !pricing.base_rates.contains_key("default") {
        return Err(RulesError::MissingField("pricing.base_rates.default".to_string()));
    }
    if let Some((category, _)) = pricing.base_rates.iter().find(|(_, rate)| rate.is_sign_negative()) {
        return Err(RulesError::invalid(SECTION, format!("base rate for {} must be non-negative", category)));
    }
    if let Some((name, _)) = pricing.discounts.iter().find(|(_, pct)| pct.is_sign_negative()) {
        return Err(RulesError::invalid(SECTION, format!("discount {} must be non-negative", name)));
    }
    for frequency in FREQUENCIES {
        if !pricing.frequency_adjustments.contains_key(frequency) {
            return Err(RulesError::MissingField(format!("pricing.frequency_adjustments.{}", frequency)));
        }
    }
    if pricing.tax_rate.is_sign_negative() {
        return Err(RulesError::invalid(SECTION, "tax_rate must be non-negative"));
    }
    if pricing.medium_coverage_threshold > pricing.high_coverage_threshold {
        return Err(RulesError::invalid(SECTION, "coverage thresholds are inverted"));
    }
    if pricing.quote_validity_hours <= 0 {
        return Err(RulesError::invalid(SECTION, "quote_validity_hours must be positive"));
    }
    Ok(())
}

fn validate_underwriting(rules: &BusinessRules) -> Result<(), RulesError> {
    const SECTION: &str = "underwriting";
    let uw = &rules.underwriting;

    if !(uw.review_threshold <= uw.conditional_threshold && uw.conditional_threshold <= uw.decline_threshold) {
        return Err(RulesError::invalid(SECTION, "thresholds must satisfy review <= conditional <= decline"));
    }
    if !(0.0..=1.0).contains(&uw.baseline_confidence) {
        return Err(RulesError::invalid(SECTION, "baseline_confidence must lie in [0, 1]"));
    }
    let q = &uw.data_quality;
    if ![q.excellent, q.good, q.fair, q.poor].iter().all(|s| (0.0..=1.0).contains(s)) {
        return Err(RulesError::invalid(SECTION, "data quality scores must lie in [0, 1]"));
    }
    if uw.max_coverage_amount <= Decimal::ZERO {
        return Err(RulesError::invalid(SECTION, "max_coverage_amount must be positive"));
    }
    Ok(())
}

fn validate_commission(rules: &BusinessRules) -> Result<(), RulesError> {
    const SECTION: &str = "commission";
    let commission = &rules.commission;

    if let Some((category, _)) = commission
        .rates
        .iter()
        .find(|(_, rate)| rate.is_sign_negative() || **rate > commission.max_rate)
    {
        return Err(RulesError::invalid(SECTION, format!("rate for {} must lie in [0, max_rate]", category)));
    }
    Ok(())
}

fn validate_lifecycle(rules: &BusinessRules) -> Result<(), RulesError> {
    const SECTION: &str = "policy_lifecycle";
    let lifecycle = &rules.policy_lifecycle;

    for frequency in FREQUENCIES {
        match lifecycle.frequency_multipliers.get(frequency) {
            None => {
                return Err(RulesError::MissingField(format!(
                    "policy_lifecycle.frequency_multipliers.{}",
                    frequency
                )))
            }
            Some(m) if *m <= Decimal::ZERO => {
                return Err(RulesError::invalid(SECTION, format!("multiplier for {} must be positive", frequency)))
            }
            Some(_) => {}
        }
    }
    if lifecycle.renewal_window_days <= 0 || lifecycle.grace_period_days < 0 {
        return Err(RulesError::invalid(SECTION, "renewal window must be positive and grace period non-negative"));
    }
    if lifecycle.renewal_premium_increase <= Decimal::ZERO {
        return Err(RulesError::invalid(SECTION, "renewal_premium_increase must be positive"));
    }
    if lifecycle.cancellation_refund_factor.is_sign_negative() || lifecycle.cancellation_refund_factor > Decimal::ONE {
        return Err(RulesError::invalid(SECTION, "cancellation_refund_factor must lie in [0, 1]"));
    }
    Ok(())
}

fn validate_claims(rules: &BusinessRules) -> Result<(), RulesError> {
    const SECTION: &str = "claim_processing";
    let claims = &rules.claim_processing;

    if claims.senior_review_threshold > claims.executive_approval_threshold {
        return Err(RulesError::invalid(SECTION, "senior_review_threshold must not exceed executive_approval_threshold"));
    }
    if claims.fraud_review_score > claims.fraud_decline_score {
        return Err(RulesError::invalid(SECTION, "fraud_review_score must not exceed fraud_decline_score"));
    }
    if !in_score_range(claims.fraud_review_score) || !in_score_range(claims.fraud_decline_score) {
        return Err(RulesError::invalid(SECTION, "fraud scores must lie in [0, 100]"));
    }
    Ok(())
}
