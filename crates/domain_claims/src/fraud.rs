//! Claim fraud scoring
//!
//! Eight weighted factors, each a descriptor in [`FRAUD_FACTORS`], score a
//! claim in the context of its policy, its customer and the customer's
//! earlier claims. Every threshold is read from the live
//! `fraud_detection` rules, so a rules swap changes the next analysis.
//!
//! A factor's severity is the band of its score, bumped one level when a
//! factor-specific aggravating condition holds.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, Timelike, Utc, Weekday};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, instrument, warn};

use core_kernel::{text_enum, ClaimId, Context, CustomerId, DomainEvent, EventPayload, EventPublisher};
use domain_party::{AmlStatus, Customer, CustomerRepository};
use domain_policy::{Policy, PolicyRepository, PolicyStatus, Severity};
use domain_rules::{BusinessRules, FraudDetectionRules, RulesManager};

use crate::claim::{Claim, ClaimStatus};
use crate::error::ClaimError;
use crate::ports::{ClaimFilter, ClaimRepository};

text_enum! {
    pub enum FraudRiskLevel {
        Low => "low",
        Medium => "medium",
        High => "high",
        Critical => "critical",
    }
}

impl FraudRiskLevel {
    pub fn for_score(score: f64, rules: &FraudDetectionRules) -> Self {
        let t = &rules.thresholds;
        if score >= t.critical {
            FraudRiskLevel::Critical
        } else if score >= t.high {
            FraudRiskLevel::High
        } else if score >= t.medium {
            FraudRiskLevel::Medium
        } else {
            FraudRiskLevel::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudFactor {
    pub factor: String,
    pub weight: f64,
    /// Within `[0, 100]`
    pub score: f64,
    pub description: String,
    pub severity: Severity,
    pub indicators: Vec<String>,
}

/// Result of a fraud analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudScore {
    pub claim_id: ClaimId,
    pub customer_id: CustomerId,
    /// Within `[0, 100]`
    pub score: f64,
    pub risk_level: FraudRiskLevel,
    pub factors: Vec<FraudFactor>,
    pub recommendations: Vec<String>,
    pub requires_review: bool,
    /// Within `[0, 1]`
    pub confidence: f64,
    pub metadata: Value,
    pub analyzed_at: DateTime<Utc>,
}

impl FraudScore {
    pub fn factor(&self, name: &str) -> Option<&FraudFactor> {
        self.factors.iter().find(|f| f.factor == name)
    }
}

/// Everything the factors read
pub struct FraudInput<'a> {
    pub claim: &'a Claim,
    pub policy: &'a Policy,
    pub customer: &'a Customer,
    /// The customer's other claims
    pub prior_claims: &'a [Claim],
    pub now: DateTime<Utc>,
}

impl FraudInput<'_> {
    fn others(&self) -> impl Iterator<Item = &Claim> {
        let id = self.claim.id;
        self.prior_claims.iter().filter(move |c| c.id != id)
    }

    /// Other claims reported in the year before this one
    fn recent_claims(&self) -> Vec<&Claim> {
        let since = self.claim.reported_date - Duration::days(365);
        self.others()
            .filter(|c| c.reported_date >= since && c.reported_date <= self.claim.reported_date)
            .collect()
    }
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

fn contains_ignore_case(list: &[String], value: &str) -> bool {
    list.iter().any(|v| v.eq_ignore_ascii_case(value))
}

/// Intermediate result of one factor function
struct Scored {
    score: f64,
    aggravated: bool,
    description: String,
    indicators: Vec<String>,
}

impl Scored {
    fn new(score: f64, description: impl Into<String>) -> Self {
        Self {
            score,
            aggravated: false,
            description: description.into(),
            indicators: Vec::new(),
        }
    }

    fn add(&mut self, points: f64, indicator: &str) {
        self.score += points;
        self.indicators.push(indicator.to_string());
    }
}

pub struct FraudFactorDescriptor {
    pub name: &'static str,
    compute: fn(&FraudInput<'_>, &FraudDetectionRules) -> Scored,
}

impl FraudFactorDescriptor {
    pub fn evaluate(&self, input: &FraudInput<'_>, rules: &FraudDetectionRules) -> FraudFactor {
        let scored = (self.compute)(input, rules);
        let score = ((scored.score.clamp(0.0, 100.0)) * 100.0).round() / 100.0;
        let band = Severity::for_score(score);
        let weight = rules
            .factor_weights
            .entries()
            .iter()
            .find(|(name, _)| *name == self.name)
            .map(|(_, w)| *w)
            .unwrap_or(0.0);
        FraudFactor {
            factor: self.name.to_string(),
            weight,
            score,
            description: scored.description,
            severity: if scored.aggravated { band.bump() } else { band },
            indicators: scored.indicators,
        }
    }
}

pub const FRAUD_FACTORS: [FraudFactorDescriptor; 8] = [
    FraudFactorDescriptor { name: "claim_timing", compute: claim_timing },
    FraudFactorDescriptor { name: "claim_amount", compute: claim_amount },
    FraudFactorDescriptor { name: "customer_history", compute: customer_history },
    FraudFactorDescriptor { name: "incident_patterns", compute: incident_patterns },
    FraudFactorDescriptor { name: "documentation", compute: documentation },
    FraudFactorDescriptor { name: "geographic_risk", compute: geographic_risk },
    FraudFactorDescriptor { name: "behavioral_patterns", compute: behavioral_patterns },
    FraudFactorDescriptor { name: "policy_history", compute: policy_history },
];

pub fn factor(name: &str) -> Option<&'static FraudFactorDescriptor> {
    FRAUD_FACTORS.iter().find(|f| f.name == name)
}

fn claim_timing(input: &FraudInput<'_>, rules: &FraudDetectionRules) -> Scored {
    let claim = input.claim;
    let since_start = (claim.incident_date - input.policy.effective_date).num_days();
    let window = rules.policy_start_threshold_days;

    let mut s = if since_start < window {
        let mut s = Scored::new(80.0, format!("Incident {} days after policy start", since_start));
        s.indicators.push("early_claim".into());
        s
    } else if since_start < window * 4 {
        Scored::new(40.0, format!("Incident {} days after policy start", since_start))
    } else {
        Scored::new(10.0, "Incident well into the policy term")
    };

    if claim.reporting_delay_days() > rules.reporting_delay_threshold_days {
        s.add(20.0, "late_reporting");
        s.aggravated = since_start < window;
    }
    if matches!(claim.incident_date.weekday(), Weekday::Sat | Weekday::Sun) {
        s.score *= rules.weekend_multiplier;
        s.indicators.push("weekend_incident".into());
    }
    if (9..=17).contains(&claim.incident_date.hour()) {
        s.score *= rules.business_hours_multiplier;
        s.indicators.push("business_hours_incident".into());
    }
    s
}

fn claim_amount(input: &FraudInput<'_>, rules: &FraudDetectionRules) -> Scored {
    let amount = input.claim.claim_amount;
    let coverage = input.policy.coverage_amount;
    let ratio = if coverage > Decimal::ZERO { to_f64(amount / coverage) } else { 1.0 };
    let threshold = rules.coverage_ratio_threshold;

    let mut s = if ratio > threshold {
        let mut s = Scored::new(70.0, format!("Claim is {:.0}% of coverage", ratio * 100.0));
        s.indicators.push("near_coverage_limit".into());
        s
    } else if ratio > 0.8 * threshold {
        Scored::new(40.0, format!("Claim is {:.0}% of coverage", ratio * 100.0))
    } else if ratio < 0.1 {
        Scored::new(5.0, "Claim is a small share of coverage")
    } else {
        Scored::new(15.0, format!("Claim is {:.0}% of coverage", ratio * 100.0))
    };

    if amount > Decimal::ONE_THOUSAND && (amount % Decimal::ONE_THOUSAND).is_zero() {
        s.add(rules.round_number_penalty, "round_amount");
    }
    if amount > rules.very_high_value_threshold {
        s.add(30.0, "very_high_value");
    } else if amount > rules.high_value_threshold {
        s.add(15.0, "high_value");
    }
    s.aggravated = ratio > 1.0;
    s
}

fn customer_history(input: &FraudInput<'_>, rules: &FraudDetectionRules) -> Scored {
    let customer = input.customer;
    let age = customer.account_age_days(input.now);
    let threshold = rules.new_account_threshold_days;

    let mut s = if age < threshold {
        let mut s = Scored::new(60.0, format!("Account opened {} days ago", age));
        s.indicators.push("new_account".into());
        s
    } else if age < threshold * 2 {
        Scored::new(30.0, format!("Account opened {} days ago", age))
    } else {
        Scored::new(10.0, "Established account")
    };

    if !customer.is_active() {
        s.add(30.0, "inactive_account");
    }
    if !customer.is_kyc_verified() {
        s.add(20.0, "kyc_not_verified");
    }
    if !customer.is_aml_cleared() {
        s.add(25.0, "aml_not_cleared");
    }
    if customer.is_high_risk() {
        s.add(15.0, "high_risk_profile");
    }
    s.aggravated = matches!(customer.aml_status, AmlStatus::Flagged | AmlStatus::Blocked);
    s
}

fn incident_patterns(input: &FraudInput<'_>, _: &FraudDetectionRules) -> Scored {
    let claim = input.claim;
    let mut s = Scored::new(10.0, "No unusual incident pattern");

    if claim.description.trim().len() < 20 {
        s.add(20.0, "vague_description");
    }
    if claim.incident_date.hour() < 5 {
        s.add(15.0, "night_incident");
    }
    let to_expiry = (input.policy.expiration_date - claim.incident_date).num_days();
    if (0..=14).contains(&to_expiry) {
        s.add(25.0, "near_policy_expiration");
    }
    let clustered = input
        .others()
        .any(|c| (c.incident_date - claim.incident_date).num_days().abs() <= 30);
    if clustered {
        s.add(20.0, "clustered_incidents");
    }
    if !s.indicators.is_empty() {
        s.description = format!("Incident pattern flags: {}", s.indicators.join(", "));
    }
    s.aggravated = s.indicators.len() >= 3;
    s
}

fn documentation(input: &FraudInput<'_>, rules: &FraudDetectionRules) -> Scored {
    let claim = input.claim;
    let supplied = claim.supporting_documents();
    let required = rules.min_supporting_documents;

    let mut s = if supplied == 0 {
        let mut s = Scored::new(60.0, "No supporting documents");
        s.indicators.push("no_documents".into());
        s
    } else if supplied < required {
        let mut s = Scored::new(35.0, format!("{} of {} required documents", supplied, required));
        s.indicators.push("insufficient_documents".into());
        s
    } else {
        Scored::new(10.0, format!("{} supporting documents", supplied))
    };

    if claim.documents.iter().any(|d| d.size <= 0) {
        s.add(15.0, "empty_document");
    }
    s.aggravated = supplied < required && claim.claim_amount > rules.high_value_threshold;
    s
}

fn geographic_risk(input: &FraudInput<'_>, rules: &FraudDetectionRules) -> Scored {
    let Some(address) = input.customer.get_primary_address() else {
        let mut s = Scored::new(30.0, "No address on file");
        s.indicators.push("missing_address".into());
        return s;
    };

    let country_risk = contains_ignore_case(&rules.high_risk_countries, &address.country);
    let region_risk = address
        .state
        .as_deref()
        .is_some_and(|state| contains_ignore_case(&rules.high_risk_regions, state));

    let mut s = if country_risk {
        let mut s = Scored::new(70.0, format!("Customer located in {}", address.country));
        s.indicators.push("high_risk_country".into());
        s
    } else {
        Scored::new(10.0, format!("Customer located in {}", address.country))
    };
    if region_risk {
        s.add(20.0, "high_risk_region");
    }
    s.aggravated = country_risk && region_risk;
    s
}

fn behavioral_patterns(input: &FraudInput<'_>, rules: &FraudDetectionRules) -> Scored {
    let recent = input.recent_claims();
    let count = recent.len() as u32;
    let frequent = rules.frequent_claims_threshold.max(1);

    let mut s = if count >= frequent {
        let mut s = Scored::new(70.0, format!("{} other claims in the last year", count));
        s.indicators.push("frequent_claimant".into());
        s
    } else if count > 0 {
        Scored::new(10.0 + 15.0 * f64::from(count), format!("{} other claims in the last year", count))
    } else {
        Scored::new(5.0, "First claim in the last year")
    };

    if input.others().any(|c| c.status == ClaimStatus::Denied) {
        s.add(20.0, "previously_denied");
    }
    s.aggravated = count >= frequent * 2;
    s
}

fn policy_history(input: &FraudInput<'_>, _: &FraudDetectionRules) -> Scored {
    let policy = input.policy;
    let claim = input.claim;
    let mut s = Scored::new(10.0, "Policy in good standing");

    if policy.status != PolicyStatus::Active {
        s.add(40.0, "policy_not_active");
    }
    let outside = !policy.covers(claim.incident_date);
    if outside {
        s.add(25.0, "incident_outside_term");
    }
    let claimed_on_policy: Decimal = input
        .others()
        .filter(|c| c.policy_id == policy.id && c.status != ClaimStatus::Denied)
        .map(|c| c.claim_amount)
        .sum();
    if claimed_on_policy + claim.claim_amount > policy.coverage_amount {
        s.add(15.0, "coverage_exhausted");
    }
    if !s.indicators.is_empty() {
        s.description = format!("Policy flags: {}", s.indicators.join(", "));
    }
    s.aggravated = outside && policy.status == PolicyStatus::Cancelled;
    s
}

fn factor_recommendation(factor: &str) -> &'static str {
    match factor {
        "claim_timing" => "Verify the incident date against independent records",
        "claim_amount" => "Obtain an independent valuation of the loss",
        "customer_history" => "Complete identity and AML checks before payment",
        "incident_patterns" => "Interview the claimant about the incident circumstances",
        "documentation" => "Request the missing supporting documents",
        "geographic_risk" => "Confirm the incident location",
        "behavioral_patterns" => "Review the claimant's earlier claims",
        "policy_history" => "Confirm the policy was in force at the incident date",
        _ => "Review this factor manually",
    }
}

/// Scores a claim
///
/// Pure: [`FraudDetectionService`] loads the inputs before calling this.
pub fn score_claim(input: &FraudInput<'_>, rules: &BusinessRules) -> FraudScore {
    let fraud_rules = &rules.fraud_detection;
    let factors: Vec<FraudFactor> = FRAUD_FACTORS.iter().map(|f| f.evaluate(input, fraud_rules)).collect();

    let total_weight: f64 = factors.iter().map(|f| f.weight).sum();
    let score = if total_weight > 0.0 {
        (factors.iter().map(|f| f.score * f.weight).sum::<f64>() / total_weight).clamp(0.0, 100.0)
    } else {
        0.0
    };
    let score = (score * 100.0).round() / 100.0;
    let risk_level = FraudRiskLevel::for_score(score, fraud_rules);

    let active = factors.iter().filter(|f| f.weight > 0.0).count() as f64;
    let confidence = ((total_weight.min(1.0) + (active / FRAUD_FACTORS.len() as f64).min(1.0)) / 2.0).clamp(0.0, 1.0);

    let critical = factors.iter().filter(|f| f.severity == Severity::Critical).count();
    let high = factors.iter().filter(|f| f.severity.is_at_least(Severity::High)).count();
    let auto_review = &fraud_rules.auto_review;
    // A zero count threshold is always met and sends every claim to review.
    let requires_review = score >= auto_review.score_threshold
        || critical >= auto_review.critical_factor_count
        || high >= auto_review.high_severity_count;

    let mut recommendations: Vec<String> = match risk_level {
        FraudRiskLevel::Low => vec!["Process the claim normally".to_string()],
        FraudRiskLevel::Medium => vec!["Verify claim details with the claimant".to_string()],
        FraudRiskLevel::High => vec![
            "Assign the claim to a fraud investigator".to_string(),
            "Hold payment until the investigation closes".to_string(),
        ],
        FraudRiskLevel::Critical => vec![
            "Suspend processing pending a special investigation".to_string(),
            "Notify the special investigations unit".to_string(),
        ],
    };
    for f in factors.iter().filter(|f| f.severity.is_at_least(Severity::High)) {
        recommendations.push(factor_recommendation(&f.factor).to_string());
    }

    let metadata = json!({
        "rules_version": rules.version,
        "total_weight": total_weight,
        "critical_factors": critical,
        "high_severity_factors": high,
        "prior_claims": input.prior_claims.iter().filter(|c| c.id != input.claim.id).count(),
    });

    FraudScore {
        claim_id: input.claim.id,
        customer_id: input.customer.id,
        score,
        risk_level,
        factors,
        recommendations,
        requires_review,
        confidence,
        metadata,
        analyzed_at: input.now,
    }
}

pub struct FraudDetectionService {
    claims: Arc<dyn ClaimRepository>,
    policies: Arc<dyn PolicyRepository>,
    customers: Arc<dyn CustomerRepository>,
    publisher: Arc<dyn EventPublisher>,
    rules: Arc<RulesManager>,
}

impl FraudDetectionService {
    pub fn new(
        claims: Arc<dyn ClaimRepository>,
        policies: Arc<dyn PolicyRepository>,
        customers: Arc<dyn CustomerRepository>,
        publisher: Arc<dyn EventPublisher>,
        rules: Arc<RulesManager>,
    ) -> Self {
        Self {
            claims,
            policies,
            customers,
            publisher,
            rules,
        }
    }

    /// Loads a claim and scores it
    ///
    /// # Errors
    ///
    /// `FraudDetectionDisabled` when the live rules switch analysis off.
    pub async fn analyze_claim(&self, ctx: &Context, claim_id: ClaimId) -> Result<FraudScore, ClaimError> {
        if !self.rules.get_config().fraud_detection.enabled {
            return Err(ClaimError::FraudDetectionDisabled);
        }
        let claim = self.claims.get_by_id(ctx, claim_id).await?;
        self.analyze(ctx, &claim).await
    }

    /// Scores an already loaded claim and publishes the result
    #[instrument(skip(self, ctx, claim), fields(claim_id = %claim.id))]
    pub async fn analyze(&self, ctx: &Context, claim: &Claim) -> Result<FraudScore, ClaimError> {
        let rules = self.rules.get_config();
        if !rules.fraud_detection.enabled {
            return Err(ClaimError::FraudDetectionDisabled);
        }
        let policy = self.policies.get_by_id(ctx, claim.policy_id).await?;
        let customer = self.customers.get_by_id(ctx, claim.user_id).await?;
        let filter = ClaimFilter {
            user_id: Some(claim.user_id),
            ..Default::default()
        };
        let prior_claims = self.claims.list(ctx, &filter, 100, 0).await?;

        let result = score_claim(
            &FraudInput {
                claim,
                policy: &policy,
                customer: &customer,
                prior_claims: &prior_claims,
                now: Utc::now(),
            },
            &rules,
        );
        info!(
            score = result.score,
            risk_level = %result.risk_level,
            requires_review = result.requires_review,
            "Fraud analysis completed"
        );

        let event = DomainEvent::new(
            claim.id,
            EventPayload::FraudAnalysisCompleted {
                claim_id: claim.id,
                customer_id: customer.id,
                score: result.score,
                risk_level: result.risk_level.to_string(),
                requires_review: result.requires_review,
                confidence: result.confidence,
                factor_names: result.factors.iter().map(|f| f.factor.clone()).collect(),
            },
        );
        if let Err(e) = self.publisher.publish(ctx, event).await {
            warn!(error = %e, "Failed to publish fraud.analysis_completed");
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use core_kernel::{Currency, ProductId};
    use domain_party::{Address, AddressType, CustomerStatus, KycStatus};
    use rust_decimal_macros::dec;

    use crate::claim::{ClaimDocument, NewClaim};

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn policy(effective: DateTime<Utc>) -> Policy {
        Policy::new(
            ProductId::new(),
            CustomerId::new(),
            dec!(1200),
            dec!(100000),
            Currency::USD,
            effective,
            effective + Duration::days(365),
        )
        .unwrap()
    }

    fn established_customer(now: DateTime<Utc>) -> Customer {
        let mut c = Customer::new("ana@example.com", "Ana", "Silva");
        c.created_at = now - Duration::days(1000);
        c.kyc_status = KycStatus::Verified;
        c.aml_status = AmlStatus::Cleared;
        c.addresses = vec![Address::new(AddressType::Residential, "1 Main St", "Lisbon", "1000-001", "PT").primary()];
        c
    }

    fn claim(policy: &Policy, amount: Decimal, incident: DateTime<Utc>, reported: DateTime<Utc>) -> Claim {
        NewClaim {
            policy_id: policy.id,
            user_id: policy.user_id,
            title: "Collision".to_string(),
            description: "Vehicle struck while parked outside the office".to_string(),
            claim_amount: amount,
            currency: Currency::USD,
            incident_date: incident,
            reported_date: Some(reported),
            documents: vec![
                ClaimDocument::new("photo.jpg", 2048, "image/jpeg"),
                ClaimDocument::new("estimate.pdf", 4096, "application/pdf"),
            ],
        }
        .into_claim(reported)
        .unwrap()
    }

    #[test]
    fn test_claim_timing_early_business_hours() {
        let p = policy(at(2024, 6, 1, 0));
        let c = claim(&p, dec!(4200), at(2024, 6, 10, 10), at(2024, 6, 11, 9));
        let customer = established_customer(at(2024, 6, 11, 9));
        let input = FraudInput {
            claim: &c,
            policy: &p,
            customer: &customer,
            prior_claims: &[],
            now: at(2024, 6, 11, 9),
        };
        let f = factor("claim_timing").unwrap().evaluate(&input, &FraudDetectionRules::default());
        assert_eq!(f.score, 96.0);
        assert_eq!(f.severity, Severity::High);
        assert!(f.indicators.contains(&"business_hours_incident".to_string()));
    }

    #[test]
    fn test_late_report_in_start_window_bumps_severity() {
        let p = policy(at(2024, 6, 1, 0));
        let c = claim(&p, dec!(4200), at(2024, 6, 2, 20), at(2024, 7, 20, 20));
        let customer = established_customer(at(2024, 7, 20, 20));
        let input = FraudInput {
            claim: &c,
            policy: &p,
            customer: &customer,
            prior_claims: &[],
            now: at(2024, 7, 20, 20),
        };
        let f = factor("claim_timing").unwrap().evaluate(&input, &FraudDetectionRules::default());
        // 80 + 20, Sunday incident × 1.5, clamped
        assert_eq!(f.score, 100.0);
        assert_eq!(f.severity, Severity::Critical);
    }

    #[test]
    fn test_round_high_value_amount() {
        let p = policy(at(2023, 1, 1, 0));
        let c = claim(&p, dec!(95000), at(2023, 9, 5, 20), at(2023, 9, 6, 20));
        let customer = established_customer(at(2023, 9, 6, 20));
        let input = FraudInput {
            claim: &c,
            policy: &p,
            customer: &customer,
            prior_claims: &[],
            now: at(2023, 9, 6, 20),
        };
        let f = factor("claim_amount").unwrap().evaluate(&input, &FraudDetectionRules::default());
        // ratio 0.95 > 0.9 → 70, + round 10, + high value 15
        assert_eq!(f.score, 95.0);
        assert!(f.indicators.contains(&"round_amount".to_string()));
    }

    #[test]
    fn test_new_unverified_customer_history() {
        let now = at(2024, 6, 11, 9);
        let p = policy(at(2024, 1, 1, 0));
        let c = claim(&p, dec!(4200), at(2024, 6, 10, 20), now);
        let mut customer = Customer::new("new@example.com", "New", "Customer");
        customer.created_at = now - Duration::days(10);
        let input = FraudInput {
            claim: &c,
            policy: &p,
            customer: &customer,
            prior_claims: &[],
            now,
        };
        let f = factor("customer_history").unwrap().evaluate(&input, &FraudDetectionRules::default());
        assert_eq!(f.score, 100.0);
        assert_eq!(f.indicators, vec!["new_account", "kyc_not_verified", "aml_not_cleared"]);

        customer.status = CustomerStatus::Suspended;
        customer.aml_status = AmlStatus::Flagged;
        let input = FraudInput {
            claim: &c,
            policy: &p,
            customer: &customer,
            prior_claims: &[],
            now,
        };
        let f = factor("customer_history").unwrap().evaluate(&input, &FraudDetectionRules::default());
        assert_eq!(f.severity, Severity::Critical);
    }

    #[test]
    fn test_frequent_claimant() {
        let now = at(2024, 6, 11, 9);
        let p = policy(at(2023, 1, 1, 0));
        let c = claim(&p, dec!(800), at(2024, 6, 10, 20), now);
        let prior: Vec<Claim> = (1..=3)
            .map(|m| claim(&p, dec!(300), at(2024, m, 5, 20), at(2024, m, 6, 20)))
            .collect();
        let customer = established_customer(now);
        let input = FraudInput {
            claim: &c,
            policy: &p,
            customer: &customer,
            prior_claims: &prior,
            now,
        };
        let f = factor("behavioral_patterns").unwrap().evaluate(&input, &FraudDetectionRules::default());
        assert_eq!(f.score, 70.0);
        assert!(f.indicators.contains(&"frequent_claimant".to_string()));
    }

    #[test]
    fn test_clean_claim_scores_low() {
        let now = at(2024, 6, 12, 20);
        let p = policy(at(2023, 9, 1, 0));
        let c = claim(&p, dec!(2450), at(2024, 6, 11, 20), now);
        let customer = established_customer(now);
        let rules = BusinessRules::default();
        let result = score_claim(
            &FraudInput {
                claim: &c,
                policy: &p,
                customer: &customer,
                prior_claims: &[],
                now,
            },
            &rules,
        );
        assert_eq!(result.risk_level, FraudRiskLevel::Low);
        assert!(!result.requires_review);
        assert!((result.confidence - 1.0).abs() < 1e-9);
        assert_eq!(result.factors.len(), 8);
    }

    #[test]
    fn test_review_forced_by_score_threshold() {
        let now = at(2024, 6, 12, 20);
        let p = policy(at(2023, 9, 1, 0));
        let c = claim(&p, dec!(2450), at(2024, 6, 11, 20), now);
        let customer = established_customer(now);
        let mut rules = BusinessRules::default();
        rules.fraud_detection.auto_review.score_threshold = 0.0;
        let result = score_claim(
            &FraudInput {
                claim: &c,
                policy: &p,
                customer: &customer,
                prior_claims: &[],
                now,
            },
            &rules,
        );
        assert!(result.requires_review);
    }

    #[test]
    fn test_zero_count_threshold_always_reviews() {
        let now = at(2024, 6, 12, 20);
        let p = policy(at(2023, 9, 1, 0));
        let c = claim(&p, dec!(2450), at(2024, 6, 11, 20), now);
        let customer = established_customer(now);
        let input = FraudInput {
            claim: &c,
            policy: &p,
            customer: &customer,
            prior_claims: &[],
            now,
        };

        let mut rules = BusinessRules::default();
        assert!(!score_claim(&input, &rules).requires_review);

        rules.fraud_detection.auto_review.high_severity_count = 0;
        assert!(score_claim(&input, &rules).requires_review);
    }

    #[test]
    fn test_unknown_factor() {
        assert!(factor("horoscope").is_none());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use chrono::TimeZone;
    use core_kernel::{Currency, ProductId};
    use proptest::prelude::*;

    use crate::claim::NewClaim;

    proptest! {
        #[test]
        fn score_and_confidence_stay_in_range(
            amount in 1u64..2_000_000,
            start_offset in 0i64..400,
            delay in 0i64..90,
            hour in 0u32..24,
            weights in proptest::collection::vec(0.0f64..1.0, 8),
        ) {
            let effective = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
            let policy = Policy::new(
                ProductId::new(),
                CustomerId::new(),
                Decimal::from(1000),
                Decimal::from(100_000),
                Currency::USD,
                effective,
                effective + Duration::days(365),
            ).unwrap();
            let incident = effective + Duration::days(start_offset) + Duration::hours(i64::from(hour));
            let reported = incident + Duration::days(delay);
            let claim = NewClaim {
                policy_id: policy.id,
                user_id: policy.user_id,
                title: "t".to_string(),
                description: "d".to_string(),
                claim_amount: Decimal::from(amount),
                currency: Currency::USD,
                incident_date: incident,
                reported_date: Some(reported),
                documents: vec![],
            }.into_claim(reported).unwrap();
            let customer = Customer::new("p@example.com", "P", "Q");

            let mut rules = BusinessRules::default();
            let w = &mut rules.fraud_detection.factor_weights;
            w.claim_timing = weights[0];
            w.claim_amount = weights[1];
            w.customer_history = weights[2];
            w.incident_patterns = weights[3];
            w.documentation = weights[4];
            w.geographic_risk = weights[5];
            w.behavioral_patterns = weights[6];
            w.policy_history = weights[7];

            let result = score_claim(
                &FraudInput { claim: &claim, policy: &policy, customer: &customer, prior_claims: &[], now: reported },
                &rules,
            );
            prop_assert!((0.0..=100.0).contains(&result.score));
            prop_assert!((0.0..=1.0).contains(&result.confidence));
            if result.score >= rules.fraud_detection.auto_review.score_threshold {
                prop_assert!(result.requires_review);
            }
            for f in &result.factors {
                prop_assert!((0.0..=100.0).contains(&f.score));
            }
        }
    }
}
