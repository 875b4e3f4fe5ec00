//! Premium pricing engine
//!
//! The premium is a base rate per 1000 of coverage, pro-rated for terms
//! shorter than a year, plus eight independent adjustment factors. Each
//! factor is a small descriptor in [`FACTORS`] that turns the request and
//! the current [`PricingRules`] into one [`PricingFactor`]; the engine only
//! sums them.
//!
//! ```text
//! adjusted = base + Σ factor.value
//! final    = max(0, adjusted)
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use core_kernel::{text_enum, years_between, Context, Currency, CustomerId, Money, ProductId, Rate};
use domain_party::CustomerRepository;
use domain_rules::{PricingRules, RulesManager};

use crate::error::PolicyError;
use crate::policy::PaymentFrequency;
use crate::ports::ProductRepository;

text_enum! {
    pub enum FactorType {
        Rate => "rate",
        Discount => "discount",
        Surcharge => "surcharge",
        Tax => "tax",
        Frequency => "frequency",
        Market => "market",
    }
}

text_enum! {
    /// Effect of a factor from the customer's point of view
    pub enum Impact {
        /// Lowers the premium
        Positive => "positive",
        /// Raises the premium
        Negative => "negative",
        Neutral => "neutral",
    }
}

impl Impact {
    fn of(value: Decimal) -> Self {
        if value.is_zero() {
            Impact::Neutral
        } else if value.is_sign_negative() {
            Impact::Positive
        } else {
            Impact::Negative
        }
    }
}

/// One priced adjustment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingFactor {
    pub factor: String,
    pub factor_type: FactorType,
    pub value: Decimal,
    pub description: String,
    pub impact: Impact,
}

/// Input to the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingRequest {
    pub product_id: ProductId,
    pub user_id: CustomerId,
    pub coverage_amount: Decimal,
    #[serde(default)]
    pub currency: Currency,
    #[serde(default)]
    pub payment_frequency: PaymentFrequency,
    pub effective_date: DateTime<Utc>,
    pub expiration_date: DateTime<Utc>,
    /// Free-form risk data; numeric entries under `custom_factors` are
    /// extra risk percentages
    #[serde(default)]
    pub risk_factors: BTreeMap<String, Value>,
    /// Names of requested discounts, e.g. `multi_policy`
    #[serde(default)]
    pub discounts: Vec<String>,
    #[serde(default)]
    pub options: BTreeMap<String, Value>,
}

impl PricingRequest {
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.coverage_amount <= Decimal::ZERO {
            return Err(PolicyError::validation("coverage_amount must be positive"));
        }
        if self.expiration_date <= self.effective_date {
            return Err(PolicyError::validation("expiration_date must be after effective_date"));
        }
        Ok(())
    }

    /// Numeric entries of `risk_factors.custom_factors`
    fn custom_factors(&self) -> impl Iterator<Item = (&str, Decimal)> {
        self.risk_factors
            .get("custom_factors")
            .and_then(Value::as_object)
            .into_iter()
            .flat_map(|map| map.iter())
            .filter_map(|(name, value)| {
                value
                    .as_f64()
                    .and_then(|f| Decimal::try_from(f).ok())
                    .map(|d| (name.as_str(), d))
            })
    }
}

/// Per-factor amounts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub base_premium: Decimal,
    pub coverage_adjustment: Decimal,
    pub risk_adjustment: Decimal,
    pub discount_adjustment: Decimal,
    pub tax_adjustment: Decimal,
    pub frequency_adjustment: Decimal,
    pub market_adjustment: Decimal,
    pub loyalty_adjustment: Decimal,
    pub seasonal_adjustment: Decimal,
    pub total_adjustment: Decimal,
}

impl PriceBreakdown {
    fn slot(&mut self, slot: Slot) -> &mut Decimal {
        match slot {
            Slot::Coverage => &mut self.coverage_adjustment,
            Slot::Risk => &mut self.risk_adjustment,
            Slot::Discount => &mut self.discount_adjustment,
            Slot::Tax => &mut self.tax_adjustment,
            Slot::Frequency => &mut self.frequency_adjustment,
            Slot::Market => &mut self.market_adjustment,
            Slot::Loyalty => &mut self.loyalty_adjustment,
            Slot::Seasonal => &mut self.seasonal_adjustment,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingResult {
    pub product_id: ProductId,
    pub user_id: CustomerId,
    pub base_premium: Decimal,
    pub adjusted_premium: Decimal,
    /// Never negative
    pub final_premium: Decimal,
    pub currency: Currency,
    pub breakdown: PriceBreakdown,
    pub factors: Vec<PricingFactor>,
    pub calculated_at: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

impl PricingResult {
    /// Names of the factors that changed the price
    pub fn contributing_factors(&self) -> Vec<String> {
        self.factors
            .iter()
            .filter(|f| !f.value.is_zero())
            .map(|f| f.factor.clone())
            .collect()
    }
}

/// What every factor sees
pub struct FactorInput<'a> {
    pub request: &'a PricingRequest,
    pub coverage: Money,
    pub account_age_years: Decimal,
}

impl FactorInput<'_> {
    fn percent_of_coverage(&self, pct: Decimal) -> Decimal {
        Rate::from_percentage(pct).apply(&self.coverage).amount()
    }
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Coverage,
    Risk,
    Discount,
    Tax,
    Frequency,
    Market,
    Loyalty,
    Seasonal,
}

/// A named factor computation
pub struct FactorDescriptor {
    pub name: &'static str,
    pub factor_type: FactorType,
    slot: Slot,
    compute: fn(&FactorInput<'_>, &PricingRules) -> (Decimal, String),
}

impl FactorDescriptor {
    pub fn evaluate(&self, input: &FactorInput<'_>, rules: &PricingRules) -> PricingFactor {
        let (value, description) = (self.compute)(input, rules);
        PricingFactor {
            factor: self.name.to_string(),
            factor_type: self.factor_type,
            value,
            description,
            impact: Impact::of(value),
        }
    }
}

pub const FACTORS: [FactorDescriptor; 8] = [
    FactorDescriptor {
        name: "coverage",
        factor_type: FactorType::Rate,
        slot: Slot::Coverage,
        compute: coverage_factor,
    },
    FactorDescriptor {
        name: "risk",
        factor_type: FactorType::Surcharge,
        slot: Slot::Risk,
        compute: risk_factor,
    },
    FactorDescriptor {
        name: "discounts",
        factor_type: FactorType::Discount,
        slot: Slot::Discount,
        compute: discount_factor,
    },
    FactorDescriptor {
        name: "tax",
        factor_type: FactorType::Tax,
        slot: Slot::Tax,
        compute: tax_factor,
    },
    FactorDescriptor {
        name: "payment_frequency",
        factor_type: FactorType::Frequency,
        slot: Slot::Frequency,
        compute: frequency_factor,
    },
    FactorDescriptor {
        name: "market",
        factor_type: FactorType::Market,
        slot: Slot::Market,
        compute: market_factor,
    },
    FactorDescriptor {
        name: "loyalty",
        factor_type: FactorType::Discount,
        slot: Slot::Loyalty,
        compute: loyalty_factor,
    },
    FactorDescriptor {
        name: "seasonal",
        factor_type: FactorType::Rate,
        slot: Slot::Seasonal,
        compute: seasonal_factor,
    },
];

fn coverage_factor(input: &FactorInput<'_>, rules: &PricingRules) -> (Decimal, String) {
    let amount = input.coverage.amount();
    if amount > rules.high_coverage_threshold {
        (
            input.percent_of_coverage(rules.high_coverage_rate),
            format!("High coverage above {}", rules.high_coverage_threshold),
        )
    } else if amount > rules.medium_coverage_threshold {
        (
            input.percent_of_coverage(rules.medium_coverage_rate),
            format!("Medium coverage above {}", rules.medium_coverage_threshold),
        )
    } else {
        (Decimal::ZERO, "Standard coverage".to_string())
    }
}

fn risk_factor(input: &FactorInput<'_>, rules: &PricingRules) -> (Decimal, String) {
    let age = input.account_age_years;
    let (mut pct, mut description) = if age < dec!(0.5) {
        (rules.new_account_surcharge, "New account surcharge".to_string())
    } else if age < Decimal::TWO {
        (rules.young_account_surcharge, "Young account surcharge".to_string())
    } else {
        (-rules.established_account_discount, "Established account credit".to_string())
    };
    for (name, extra) in input.request.custom_factors() {
        pct += extra;
        description.push_str(&format!(", {} {}%", name, extra));
    }
    (input.percent_of_coverage(pct), description)
}

fn discount_factor(input: &FactorInput<'_>, rules: &PricingRules) -> (Decimal, String) {
    let requested: BTreeSet<&str> = input.request.discounts.iter().map(String::as_str).collect();
    let applied: Vec<(&str, Decimal)> = requested
        .into_iter()
        .filter_map(|name| rules.discounts.get(name).map(|pct| (name, *pct)))
        .collect();
    if applied.is_empty() {
        return (Decimal::ZERO, "No discounts".to_string());
    }
    let pct: Decimal = applied.iter().map(|(_, pct)| *pct).sum();
    let names: Vec<&str> = applied.iter().map(|(name, _)| *name).collect();
    (-input.percent_of_coverage(pct), format!("Discounts: {}", names.join(", ")))
}

fn tax_factor(input: &FactorInput<'_>, rules: &PricingRules) -> (Decimal, String) {
    (
        input.percent_of_coverage(rules.tax_rate),
        format!("Tax at {}%", rules.tax_rate),
    )
}

fn frequency_factor(input: &FactorInput<'_>, rules: &PricingRules) -> (Decimal, String) {
    let frequency = input.request.payment_frequency;
    let pct = rules
        .frequency_adjustments
        .get(frequency.as_str())
        .copied()
        .unwrap_or(Decimal::ZERO);
    (input.percent_of_coverage(pct), format!("{} payments", frequency))
}

fn market_factor(input: &FactorInput<'_>, rules: &PricingRules) -> (Decimal, String) {
    (
        input.percent_of_coverage(rules.market_adjustment),
        "Market conditions".to_string(),
    )
}

fn loyalty_factor(input: &FactorInput<'_>, rules: &PricingRules) -> (Decimal, String) {
    let age = input.account_age_years;
    if age > Decimal::from(5) {
        (-input.percent_of_coverage(rules.long_loyalty_discount), "Customer for over 5 years".to_string())
    } else if age > Decimal::TWO {
        (-input.percent_of_coverage(rules.loyalty_discount), "Customer for over 2 years".to_string())
    } else {
        (Decimal::ZERO, "No loyalty discount".to_string())
    }
}

fn seasonal_factor(input: &FactorInput<'_>, rules: &PricingRules) -> (Decimal, String) {
    match input.request.effective_date.month() {
        12 | 1 | 2 => (input.percent_of_coverage(rules.winter_adjustment), "Winter season".to_string()),
        6..=8 => (input.percent_of_coverage(rules.summer_adjustment), "Summer season".to_string()),
        _ => (Decimal::ZERO, "No seasonal adjustment".to_string()),
    }
}

/// Prices a validated request
///
/// Pure: everything it needs is passed in, so it can be exercised without
/// repositories.
pub fn price(
    request: &PricingRequest,
    category: &str,
    account_age_years: Decimal,
    rules: &PricingRules,
    now: DateTime<Utc>,
) -> PricingResult {
    let currency = request.currency;
    let places = currency.decimal_places();

    let mut base = rules.base_rate(category) * request.coverage_amount / Decimal::ONE_THOUSAND;
    let years = years_between(request.effective_date, request.expiration_date);
    if years < Decimal::ONE {
        base *= years;
    }
    let base = base.round_dp(places);

    let input = FactorInput {
        request,
        coverage: Money::new(request.coverage_amount, currency),
        account_age_years,
    };

    let mut breakdown = PriceBreakdown {
        base_premium: base,
        ..Default::default()
    };
    let factors: Vec<PricingFactor> = FACTORS
        .iter()
        .map(|descriptor| {
            let mut factor = descriptor.evaluate(&input, rules);
            factor.value = factor.value.round_dp(places);
            *breakdown.slot(descriptor.slot) += factor.value;
            factor
        })
        .collect();

    breakdown.total_adjustment = factors.iter().map(|f| f.value).sum();
    let adjusted = base + breakdown.total_adjustment;

    PricingResult {
        product_id: request.product_id,
        user_id: request.user_id,
        base_premium: base,
        adjusted_premium: adjusted,
        final_premium: adjusted.max(Decimal::ZERO),
        currency,
        breakdown,
        factors,
        calculated_at: now,
        valid_until: now + Duration::hours(rules.quote_validity_hours),
    }
}

/// A named alternative request for comparison
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingScenario {
    pub name: String,
    pub request: PricingRequest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    pub name: String,
    pub result: PricingResult,
    /// `scenario.final - base.final`
    pub difference: Decimal,
    pub percentage_change: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioComparison {
    pub base: PricingResult,
    pub scenarios: Vec<ScenarioOutcome>,
}

/// Prices requests against live products, customers and rules
pub struct PricingEngine {
    products: Arc<dyn ProductRepository>,
    customers: Arc<dyn CustomerRepository>,
    rules: Arc<RulesManager>,
}

impl PricingEngine {
    pub fn new(
        products: Arc<dyn ProductRepository>,
        customers: Arc<dyn CustomerRepository>,
        rules: Arc<RulesManager>,
    ) -> Self {
        Self { products, customers, rules }
    }

    /// Calculates the premium for one request
    ///
    /// # Errors
    ///
    /// `Validation` for a non-positive coverage or an empty term, `NotFound`
    /// for an unknown product or customer.
    #[instrument(skip(self, ctx, request), fields(product_id = %request.product_id, user_id = %request.user_id))]
    pub async fn calculate_premium(&self, ctx: &Context, request: &PricingRequest) -> Result<PricingResult, PolicyError> {
        request.validate()?;
        let product = self.products.get_by_id(ctx, request.product_id).await?;
        let customer = self.customers.get_by_id(ctx, request.user_id).await?;
        let rules = self.rules.get_config();

        let now = Utc::now();
        let result = price(request, &product.category, customer.account_age_years(now), &rules.pricing, now);
        debug!(
            base_premium = %result.base_premium,
            final_premium = %result.final_premium,
            "Premium calculated"
        );
        Ok(result)
    }

    /// Prices a base request and each scenario, reporting the change from base
    pub async fn compare_scenarios(
        &self,
        ctx: &Context,
        base: &PricingRequest,
        scenarios: &[PricingScenario],
    ) -> Result<ScenarioComparison, PolicyError> {
        let base = self.calculate_premium(ctx, base).await?;
        let mut outcomes = Vec::with_capacity(scenarios.len());
        for scenario in scenarios {
            let result = self.calculate_premium(ctx, &scenario.request).await?;
            let difference = result.final_premium - base.final_premium;
            let percentage_change = if base.final_premium.is_zero() {
                Decimal::ZERO
            } else {
                (difference / base.final_premium * Decimal::ONE_HUNDRED).round_dp(2)
            };
            outcomes.push(ScenarioOutcome {
                name: scenario.name.clone(),
                result,
                difference,
                percentage_change,
            });
        }
        Ok(ScenarioComparison { base, scenarios: outcomes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn request(frequency: PaymentFrequency) -> PricingRequest {
        PricingRequest {
            product_id: ProductId::new(),
            user_id: CustomerId::new(),
            coverage_amount: dec!(100000),
            currency: Currency::USD,
            payment_frequency: frequency,
            effective_date: Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap(),
            expiration_date: Utc.with_ymd_and_hms(2025, 3, 15, 0, 0, 0).unwrap(),
            risk_factors: BTreeMap::new(),
            discounts: Vec::new(),
            options: BTreeMap::new(),
        }
    }

    fn factor<'a>(result: &'a PricingResult, name: &str) -> &'a PricingFactor {
        result.factors.iter().find(|f| f.factor == name).unwrap()
    }

    #[test]
    fn test_baseline_auto_annual_new_customer() {
        let rules = PricingRules::default();
        let result = price(&request(PaymentFrequency::Annually), "auto", Decimal::ZERO, &rules, Utc::now());

        assert_eq!(result.base_premium, dec!(1500));
        assert_eq!(result.breakdown.risk_adjustment, dec!(2000));
        assert_eq!(result.breakdown.tax_adjustment, dec!(8000));
        assert_eq!(result.breakdown.frequency_adjustment, dec!(-5000));
        assert_eq!(result.breakdown.market_adjustment, dec!(3000));
        assert_eq!(result.breakdown.seasonal_adjustment, Decimal::ZERO);
        assert_eq!(result.breakdown.total_adjustment, dec!(8000));
        assert_eq!(result.final_premium, dec!(9500));
        assert_eq!(factor(&result, "seasonal").impact, Impact::Neutral);
    }

    #[test]
    fn test_short_term_is_pro_rated() {
        let mut req = request(PaymentFrequency::Monthly);
        req.expiration_date = req.effective_date + Duration::days(73);
        let result = price(&req, "home", dec!(3), &PricingRules::default(), Utc::now());
        // 8 × 100 × 73/365
        assert_eq!(result.base_premium, dec!(160));
    }

    #[test]
    fn test_unknown_category_uses_default_rate() {
        let result = price(&request(PaymentFrequency::Annually), "marine", dec!(3), &PricingRules::default(), Utc::now());
        assert_eq!(result.base_premium, dec!(1000));
    }

    #[test]
    fn test_discounts_are_deduplicated_and_unknown_ignored() {
        let mut req = request(PaymentFrequency::Annually);
        req.discounts = vec!["multi_policy".into(), "safe_driver".into(), "multi_policy".into(), "vip".into()];
        let result = price(&req, "auto", dec!(3), &PricingRules::default(), Utc::now());
        assert_eq!(result.breakdown.discount_adjustment, dec!(-18000));
        assert_eq!(factor(&result, "discounts").impact, Impact::Positive);
    }

    #[test]
    fn test_loyalty_tiers() {
        let rules = PricingRules::default();
        let req = request(PaymentFrequency::Annually);
        let two_plus = price(&req, "auto", dec!(3), &rules, Utc::now());
        let five_plus = price(&req, "auto", dec!(6), &rules, Utc::now());
        assert_eq!(two_plus.breakdown.loyalty_adjustment, dec!(-3000));
        assert_eq!(five_plus.breakdown.loyalty_adjustment, dec!(-8000));
        assert_eq!(two_plus.breakdown.risk_adjustment, dec!(-500));
    }

    #[test]
    fn test_custom_risk_factors_add_percentages() {
        let mut req = request(PaymentFrequency::Annually);
        req.risk_factors.insert(
            "custom_factors".to_string(),
            json!({ "prior_accidents": 1.5, "note": "ignored" }),
        );
        let result = price(&req, "auto", Decimal::ONE, &PricingRules::default(), Utc::now());
        // young account 1% plus 1.5%
        assert_eq!(result.breakdown.risk_adjustment, dec!(2500));
    }

    #[test]
    fn test_winter_and_high_coverage() {
        let mut req = request(PaymentFrequency::Quarterly);
        req.coverage_amount = dec!(2000000);
        req.effective_date = Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap();
        req.expiration_date = Utc.with_ymd_and_hms(2025, 12, 1, 0, 0, 0).unwrap();
        let result = price(&req, "auto", dec!(3), &PricingRules::default(), Utc::now());
        assert_eq!(result.breakdown.seasonal_adjustment, dec!(40000));
        assert_eq!(result.breakdown.coverage_adjustment, dec!(2000));
    }

    #[test]
    fn test_validation_rejects_bad_requests() {
        let mut req = request(PaymentFrequency::Annually);
        req.coverage_amount = Decimal::ZERO;
        assert!(req.validate().is_err());

        let mut req = request(PaymentFrequency::Annually);
        req.expiration_date = req.effective_date;
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_valid_until_uses_quote_validity() {
        let now = Utc::now();
        let result = price(&request(PaymentFrequency::Annually), "auto", Decimal::ZERO, &PricingRules::default(), now);
        assert_eq!(result.valid_until, now + Duration::hours(24));
    }
}
