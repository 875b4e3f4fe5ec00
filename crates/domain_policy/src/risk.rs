//! Applicant risk assessment
//!
//! Eight weighted assessments, each a descriptor in [`ASSESSMENTS`], score
//! a customer for a product and coverage amount. The weighted mean decides
//! the risk level and approval status; the product of the assessment
//! impacts feeds the premium adjustment.
//!
//! A critical assessment always declines, whatever the overall score.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use core_kernel::{text_enum, Context, CustomerId, ProductId};
use domain_party::{
    AmlStatus, Customer, CustomerRepository, CustomerTier, RiskProfile as CustomerRiskProfile,
};
use domain_rules::{BusinessRules, RulesManager};

use crate::error::PolicyError;
use crate::policy::{Policy, PolicyStatus};
use crate::ports::{PolicyFilter, PolicyRepository, ProductRepository};
use crate::product::{categories, Product};

text_enum! {
    pub enum Severity {
        Low => "low",
        Medium => "medium",
        High => "high",
        Critical => "critical",
    }
}

impl Severity {
    /// Band for an assessment score; `Critical` is only ever assigned explicitly
    pub fn for_score(score: f64) -> Self {
        if score >= 60.0 {
            Severity::High
        } else if score >= 40.0 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    /// Premium multiplier contributed by an assessment of this severity
    pub fn impact(&self) -> f64 {
        match self {
            Severity::Low => 1.0,
            Severity::Medium => 1.05,
            Severity::High => 1.15,
            Severity::Critical => 2.0,
        }
    }

    /// Ordinal, low = 0 through critical = 3
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Low => 0,
            Severity::Medium => 1,
            Severity::High => 2,
            Severity::Critical => 3,
        }
    }

    pub fn is_at_least(&self, other: Severity) -> bool {
        self.rank() >= other.rank()
    }

    /// One band higher, saturating at `Critical`
    pub fn bump(&self) -> Self {
        match self {
            Severity::Low => Severity::Medium,
            Severity::Medium => Severity::High,
            Severity::High | Severity::Critical => Severity::Critical,
        }
    }
}

text_enum! {
    pub enum RiskLevel {
        Low => "low",
        Medium => "medium",
        High => "high",
        VeryHigh => "very_high",
    }
}

text_enum! {
    pub enum ApprovalStatus {
        Approved => "approved",
        Conditional => "conditional",
        Declined => "declined",
    }
}

/// One scored dimension of risk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub category: String,
    pub score: f64,
    pub weight: f64,
    pub impact: f64,
    pub severity: Severity,
    pub description: String,
    pub factors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskCondition {
    pub condition_type: String,
    pub description: String,
}

/// Outcome of a risk assessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskProfile {
    pub user_id: CustomerId,
    pub product_id: ProductId,
    pub coverage_amount: Decimal,
    /// Within `[0, 100]`
    pub overall_score: f64,
    pub risk_level: RiskLevel,
    pub risk_category: String,
    pub assessments: Vec<Assessment>,
    pub recommendations: Vec<String>,
    /// Percent, clamped to the configured range
    pub premium_adjustment: Decimal,
    pub approval_status: ApprovalStatus,
    pub conditions: Vec<RiskCondition>,
    pub assessment_date: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

impl RiskProfile {
    pub fn has_critical(&self) -> bool {
        self.assessments.iter().any(|a| a.severity == Severity::Critical)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessmentRequest {
    pub user_id: CustomerId,
    pub product_id: ProductId,
    pub coverage_amount: Decimal,
}

/// Everything the assessments read
pub struct RiskInput<'a> {
    pub customer: &'a Customer,
    pub product: &'a Product,
    pub coverage_amount: Decimal,
    /// The customer's other policies
    pub policy_history: &'a [Policy],
    pub now: DateTime<Utc>,
}

impl RiskInput<'_> {
    fn age(&self) -> Option<u32> {
        self.customer.age(self.now.date_naive())
    }

    /// Requested coverage relative to the product's standard coverage
    fn coverage_ratio(&self) -> f64 {
        if self.product.coverage_amount <= Decimal::ZERO {
            return 1.0;
        }
        decimal_to_f64(self.coverage_amount / self.product.coverage_amount)
    }
}

fn decimal_to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// Intermediate result of one assessment function
struct Scored {
    score: f64,
    severity: Option<Severity>,
    impact: Option<f64>,
    description: String,
    factors: Vec<String>,
}

impl Scored {
    fn new(score: f64, description: impl Into<String>) -> Self {
        Self {
            score,
            severity: None,
            impact: None,
            description: description.into(),
            factors: Vec::new(),
        }
    }

    fn add(&mut self, points: f64, factor: impl Into<String>) {
        self.score += points;
        self.factors.push(factor.into());
    }
}

pub struct AssessmentDescriptor {
    pub category: &'static str,
    compute: fn(&RiskInput<'_>, &BusinessRules) -> Scored,
}

impl AssessmentDescriptor {
    pub fn evaluate(&self, input: &RiskInput<'_>, rules: &BusinessRules) -> Assessment {
        let scored = (self.compute)(input, rules);
        let score = scored.score.clamp(0.0, 100.0);
        let severity = scored.severity.unwrap_or_else(|| Severity::for_score(score));
        let weight = rules
            .risk_assessment
            .weights
            .entries()
            .iter()
            .find(|(name, _)| *name == self.category)
            .map(|(_, w)| *w)
            .unwrap_or(0.0);
        Assessment {
            category: self.category.to_string(),
            score,
            weight,
            impact: scored.impact.unwrap_or_else(|| severity.impact()),
            severity,
            description: scored.description,
            factors: scored.factors,
        }
    }
}

pub const ASSESSMENTS: [AssessmentDescriptor; 8] = [
    AssessmentDescriptor { category: "demographic", compute: demographic },
    AssessmentDescriptor { category: "behavioral", compute: behavioral },
    AssessmentDescriptor { category: "financial", compute: financial },
    AssessmentDescriptor { category: "geographic", compute: geographic },
    AssessmentDescriptor { category: "product_specific", compute: product_specific },
    AssessmentDescriptor { category: "historical", compute: historical },
    AssessmentDescriptor { category: "lifestyle", compute: lifestyle },
    AssessmentDescriptor { category: "compliance", compute: compliance },
];

fn demographic(input: &RiskInput<'_>, _: &BusinessRules) -> Scored {
    match input.age() {
        None => {
            let mut s = Scored::new(40.0, "Date of birth unknown");
            s.factors.push("missing_date_of_birth".into());
            s
        }
        Some(age) if age < 25 => {
            let mut s = Scored::new(65.0, format!("Applicant aged {}", age));
            s.factors.push("young_applicant".into());
            s
        }
        Some(age) if age > 65 => {
            let mut s = Scored::new(55.0, format!("Applicant aged {}", age));
            s.factors.push("senior_applicant".into());
            s
        }
        Some(age) => Scored::new(20.0, format!("Applicant aged {}", age)),
    }
}

fn behavioral(input: &RiskInput<'_>, _: &BusinessRules) -> Scored {
    let customer = input.customer;
    let mut s = Scored::new(20.0, "Account behaviour");
    if !customer.is_kyc_verified() {
        s.add(25.0, "kyc_not_verified");
    }
    match customer.aml_status {
        AmlStatus::Pending => s.add(10.0, "aml_pending"),
        AmlStatus::Flagged | AmlStatus::Blocked => s.add(35.0, "aml_flagged"),
        AmlStatus::Cleared => {}
    }
    match customer.risk_profile {
        CustomerRiskProfile::High => s.add(20.0, "high_risk_profile"),
        CustomerRiskProfile::VeryHigh => s.add(30.0, "very_high_risk_profile"),
        _ => {}
    }
    s
}

fn financial(input: &RiskInput<'_>, _: &BusinessRules) -> Scored {
    let ratio = input.coverage_ratio();
    let mut s = if ratio > 2.0 {
        Scored::new(70.0, format!("Coverage {:.1}x the product standard", ratio))
    } else if ratio > 1.0 {
        Scored::new(50.0, format!("Coverage {:.1}x the product standard", ratio))
    } else {
        Scored::new(20.0, "Coverage within product standard")
    };
    if input.coverage_amount > Decimal::from(1_000_000) {
        s.add(15.0, "coverage_above_one_million");
    }
    if matches!(input.customer.customer_tier, CustomerTier::Gold | CustomerTier::Platinum) {
        s.add(-10.0, "premium_tier");
    }
    s
}

fn geographic(input: &RiskInput<'_>, rules: &BusinessRules) -> Scored {
    match input.customer.country() {
        None => {
            let mut s = Scored::new(40.0, "No address on file");
            s.factors.push("missing_address".into());
            s
        }
        Some(country) if contains_ignore_case(&rules.risk_assessment.high_risk_countries, country) => {
            let mut s = Scored::new(75.0, format!("Resident in high-risk country {}", country));
            s.factors.push("high_risk_country".into());
            s
        }
        Some(country) => Scored::new(15.0, format!("Resident in {}", country)),
    }
}

fn product_specific(input: &RiskInput<'_>, _: &BusinessRules) -> Scored {
    let base = match input.product.category.as_str() {
        categories::AUTO => 40.0,
        categories::HEALTH => 35.0,
        categories::HOME => 30.0,
        categories::LIFE => 25.0,
        categories::BUSINESS => 45.0,
        _ => 30.0,
    };
    let mut s = Scored::new(base, format!("{} product line", input.product.category));
    if input.coverage_ratio() > 1.0 {
        s.add(25.0, "coverage_above_product_standard");
    }
    s
}

fn historical(input: &RiskInput<'_>, _: &BusinessRules) -> Scored {
    let history = input.policy_history;
    if history.is_empty() {
        let mut s = Scored::new(30.0, "No policy history");
        s.factors.push("no_history".into());
        return s;
    }
    let cancelled = history.iter().filter(|p| p.status == PolicyStatus::Cancelled).count();
    let lapsed = history
        .iter()
        .filter(|p| p.status == PolicyStatus::Expired && p.renewal_date.is_none())
        .count();
    let mut s = Scored::new(10.0, format!("{} prior policies", history.len()));
    if cancelled > 0 {
        s.add(20.0 * cancelled as f64, format!("{}_cancelled_policies", cancelled));
    }
    if lapsed > 0 {
        s.add(10.0 * lapsed as f64, format!("{}_lapsed_policies", lapsed));
    }
    s
}

fn lifestyle(input: &RiskInput<'_>, _: &BusinessRules) -> Scored {
    let mut s = Scored::new(20.0, "Lifestyle indicators");
    let age = input.age();
    match input.product.category.as_str() {
        categories::AUTO if age.is_some_and(|a| a < 25) => s.add(30.0, "young_driver"),
        categories::LIFE if age.is_some_and(|a| a > 60) => s.add(25.0, "late_life_cover"),
        _ => {}
    }
    if input.customer.customer_tier == CustomerTier::Platinum {
        s.add(-5.0, "platinum_tier");
    }
    s
}

fn compliance(input: &RiskInput<'_>, rules: &BusinessRules) -> Scored {
    let customer = input.customer;
    let critical = |score: f64, description: String, factor: &str| Scored {
        score,
        severity: Some(Severity::Critical),
        impact: Some(2.0),
        description,
        factors: vec![factor.to_string()],
    };

    if !customer.is_active() {
        return critical(80.0, format!("Account status is {}", customer.status), "inactive_account");
    }
    if customer.aml_status == AmlStatus::Blocked {
        return critical(90.0, "Customer blocked by AML screening".to_string(), "aml_blocked");
    }
    if let Some(country) = customer.country() {
        if contains_ignore_case(&rules.compliance.restricted_countries, country) {
            return critical(90.0, format!("Country {} is restricted", country), "restricted_country");
        }
    }
    let mut s = Scored::new(10.0, "Compliance checks");
    if rules.compliance.kyc_required && !customer.is_kyc_verified() {
        s.add(40.0, "kyc_outstanding");
    }
    s
}

fn contains_ignore_case(list: &[String], value: &str) -> bool {
    list.iter().any(|v| v.eq_ignore_ascii_case(value))
}

/// Scores an applicant
///
/// Pure: repositories are consulted by [`RiskAssessmentService`] before
/// this is called.
pub fn evaluate_risk(input: &RiskInput<'_>, rules: &BusinessRules) -> RiskProfile {
    let risk_rules = &rules.risk_assessment;
    let assessments: Vec<Assessment> = ASSESSMENTS.iter().map(|d| d.evaluate(input, rules)).collect();

    let total_weight: f64 = assessments.iter().map(|a| a.weight).sum();
    let overall_score = if total_weight > 0.0 {
        (assessments.iter().map(|a| a.score * a.weight).sum::<f64>() / total_weight).clamp(0.0, 100.0)
    } else {
        0.0
    };

    let thresholds = &risk_rules.level_thresholds;
    let risk_level = if overall_score >= thresholds.very_high {
        RiskLevel::VeryHigh
    } else if overall_score >= thresholds.high {
        RiskLevel::High
    } else if overall_score >= thresholds.medium {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    let impact_product: f64 = assessments.iter().map(|a| a.impact).product();
    let raw_adjustment = (overall_score - 50.0) * 2.0 + (impact_product - 1.0) * 100.0;
    let premium_adjustment = Decimal::try_from(raw_adjustment)
        .unwrap_or(Decimal::ZERO)
        .round_dp(2)
        .clamp(risk_rules.min_premium_adjustment, risk_rules.max_premium_adjustment);

    let has_critical = assessments.iter().any(|a| a.severity == Severity::Critical);
    let approval_status = if has_critical || overall_score >= risk_rules.decline_threshold {
        ApprovalStatus::Declined
    } else if overall_score >= risk_rules.conditional_threshold {
        ApprovalStatus::Conditional
    } else {
        ApprovalStatus::Approved
    };

    let conditions = assessments
        .iter()
        .filter(|a| a.severity.is_at_least(Severity::High))
        .filter_map(|a| match a.category.as_str() {
            "financial" => Some(RiskCondition {
                condition_type: "additional_documentation".to_string(),
                description: "Provide proof of income and assets".to_string(),
            }),
            "behavioral" => Some(RiskCondition {
                condition_type: "probation_period".to_string(),
                description: "Six-month probationary period".to_string(),
            }),
            "product_specific" => Some(RiskCondition {
                condition_type: "reduced_limits".to_string(),
                description: "Coverage limited to the product standard".to_string(),
            }),
            _ => None,
        })
        .collect();

    let mut recommendations: Vec<String> = match risk_level {
        RiskLevel::Low => vec!["Standard terms apply".to_string()],
        RiskLevel::Medium => vec!["Monitor account activity during the first term".to_string()],
        RiskLevel::High => vec![
            "Require additional documentation before binding".to_string(),
            "Consider a higher deductible".to_string(),
        ],
        RiskLevel::VeryHigh => vec!["Refer to a senior underwriter".to_string()],
    };
    for a in assessments.iter().filter(|a| a.severity.is_at_least(Severity::High)) {
        recommendations.push(format!("Review {} risk: {}", a.category, a.description));
    }

    let risk_category = match risk_level {
        RiskLevel::Low => "preferred",
        RiskLevel::Medium => "standard",
        RiskLevel::High => "substandard",
        RiskLevel::VeryHigh => "high_risk",
    };

    RiskProfile {
        user_id: input.customer.id,
        product_id: input.product.id,
        coverage_amount: input.coverage_amount,
        overall_score,
        risk_level,
        risk_category: risk_category.to_string(),
        assessments,
        recommendations,
        premium_adjustment,
        approval_status,
        conditions,
        assessment_date: input.now,
        valid_until: input.now + Duration::days(risk_rules.validity_days.max(1)),
    }
}

/// Loads the applicant's data and scores it
pub struct RiskAssessmentService {
    customers: Arc<dyn CustomerRepository>,
    products: Arc<dyn ProductRepository>,
    policies: Arc<dyn PolicyRepository>,
    rules: Arc<RulesManager>,
}

impl RiskAssessmentService {
    pub fn new(
        customers: Arc<dyn CustomerRepository>,
        products: Arc<dyn ProductRepository>,
        policies: Arc<dyn PolicyRepository>,
        rules: Arc<RulesManager>,
    ) -> Self {
        Self { customers, products, policies, rules }
    }

    #[instrument(skip(self, ctx, request), fields(user_id = %request.user_id, product_id = %request.product_id))]
    pub async fn assess_risk(&self, ctx: &Context, request: &RiskAssessmentRequest) -> Result<RiskProfile, PolicyError> {
        if request.coverage_amount <= Decimal::ZERO {
            return Err(PolicyError::validation("coverage_amount must be positive"));
        }
        let customer = self.customers.get_by_id(ctx, request.user_id).await?;
        let product = self.products.get_by_id(ctx, request.product_id).await?;
        let filter = PolicyFilter {
            user_id: Some(customer.id),
            ..Default::default()
        };
        let history = self.policies.list(ctx, &filter, 100, 0).await?;
        let rules = self.rules.get_config();

        let profile = evaluate_risk(
            &RiskInput {
                customer: &customer,
                product: &product,
                coverage_amount: request.coverage_amount,
                policy_history: &history,
                now: Utc::now(),
            },
            &rules,
        );
        info!(
            score = profile.overall_score,
            risk_level = %profile.risk_level,
            approval_status = %profile.approval_status,
            "Risk assessed"
        );
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use core_kernel::{Currency, PartnerId};
    use domain_party::{Address, AddressType, CustomerStatus, KycStatus};
    use crate::product::ProductStatus;

    fn product(category: &str) -> Product {
        let now = Utc::now();
        Product {
            id: ProductId::new(),
            partner_id: PartnerId::new(),
            name: "Cover".to_string(),
            description: None,
            category: category.to_string(),
            base_price: Decimal::from(100),
            coverage_amount: Decimal::from(100_000),
            coverage_period_days: 365,
            currency: Currency::USD,
            status: ProductStatus::Active,
            effective_date: now,
            expiration_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn good_customer() -> Customer {
        let mut c = Customer::new("ok@example.com", "Good", "Customer");
        c.kyc_status = KycStatus::Verified;
        c.aml_status = AmlStatus::Cleared;
        c.date_of_birth = NaiveDate::from_ymd_opt(1985, 5, 1);
        c.addresses.push(Address::new(AddressType::Residential, "1 Main", "Austin", "78701", "US"));
        c
    }

    fn assess(customer: &Customer, product: &Product, coverage: Decimal) -> RiskProfile {
        evaluate_risk(
            &RiskInput {
                customer,
                product,
                coverage_amount: coverage,
                policy_history: &[],
                now: Utc::now(),
            },
            &BusinessRules::default(),
        )
    }

    #[test]
    fn test_coverage_ratio_keeps_fraction() {
        assert_eq!(decimal_to_f64(Decimal::new(25, 2)), 0.25);
        assert_eq!(decimal_to_f64(Decimal::from(100_000) / Decimal::from(80_000)), 1.25);
    }

    #[test]
    fn test_clean_applicant_is_approved() {
        let profile = assess(&good_customer(), &product("home"), Decimal::from(50_000));
        assert_eq!(profile.risk_level, RiskLevel::Low);
        assert_eq!(profile.approval_status, ApprovalStatus::Approved);
        assert!(profile.conditions.is_empty());
        assert!(profile.valid_until > profile.assessment_date);
    }

    #[test]
    fn test_inactive_account_forces_decline() {
        let mut customer = good_customer();
        customer.status = CustomerStatus::Suspended;
        let profile = assess(&customer, &product("home"), Decimal::from(50_000));

        let compliance = profile.assessments.iter().find(|a| a.category == "compliance").unwrap();
        assert_eq!(compliance.score, 80.0);
        assert_eq!(compliance.impact, 2.0);
        assert_eq!(compliance.severity, Severity::Critical);
        assert_eq!(profile.approval_status, ApprovalStatus::Declined);
        assert!(profile.overall_score < 80.0);
    }

    #[test]
    fn test_high_financial_risk_adds_documentation_condition() {
        let profile = assess(&good_customer(), &product("auto"), Decimal::from(300_000));
        assert!(profile
            .conditions
            .iter()
            .any(|c| c.condition_type == "additional_documentation"));
        assert!(profile
            .conditions
            .iter()
            .any(|c| c.condition_type == "reduced_limits"));
    }

    #[test]
    fn test_premium_adjustment_is_clamped() {
        let mut customer = good_customer();
        customer.status = CustomerStatus::Closed;
        customer.aml_status = AmlStatus::Flagged;
        customer.risk_profile = CustomerRiskProfile::VeryHigh;
        let profile = assess(&customer, &product("business"), Decimal::from(5_000_000));
        assert!(profile.premium_adjustment <= Decimal::from(200));
        assert!(profile.premium_adjustment >= Decimal::from(-50));
    }

    #[test]
    fn test_severity_bump_saturates() {
        assert_eq!(Severity::High.bump(), Severity::Critical);
        assert_eq!(Severity::Critical.bump(), Severity::Critical);
        assert!(!Severity::Medium.is_at_least(Severity::High));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use core_kernel::{Currency, PartnerId};
    use proptest::prelude::*;
    use crate::product::ProductStatus;

    proptest! {
        #[test]
        fn overall_score_in_range(coverage in 1u64..10_000_000, inactive in any::<bool>()) {
            let now = Utc::now();
            let product = Product {
                id: ProductId::new(),
                partner_id: PartnerId::new(),
                name: "p".into(),
                description: None,
                category: "auto".into(),
                base_price: Decimal::ONE,
                coverage_amount: Decimal::from(100_000),
                coverage_period_days: 365,
                currency: Currency::USD,
                status: ProductStatus::Active,
                effective_date: now,
                expiration_date: None,
                created_at: now,
                updated_at: now,
            };
            let mut customer = Customer::new("p@example.com", "P", "Q");
            if inactive {
                customer.status = domain_party::CustomerStatus::Inactive;
            }
            let profile = evaluate_risk(
                &RiskInput {
                    customer: &customer,
                    product: &product,
                    coverage_amount: Decimal::from(coverage),
                    policy_history: &[],
                    now,
                },
                &BusinessRules::default(),
            );
            prop_assert!((0.0..=100.0).contains(&profile.overall_score));
            if profile.has_critical() {
                prop_assert_eq!(profile.approval_status, ApprovalStatus::Declined);
            }
        }
    }
}
