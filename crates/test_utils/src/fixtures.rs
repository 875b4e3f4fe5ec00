//! Pre-built Test Fixtures
//!
//! Ready-to-use entities and requests with predictable defaults. Identifiers
//! and emails are unique per call, so fixtures can be inserted into the same
//! repository repeatedly.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::{FirstName, LastName};
use fake::Fake;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::{Currency, PartnerId};
use domain_claims::{Claim, ClaimDocument, NewClaim};
use domain_party::{Address, AddressType, Customer, NewCustomer};
use domain_policy::{NewProduct, PaymentFrequency, Policy, PricingRequest, Product, RiskAssessmentRequest};

/// Relative dates
pub struct Dates;

impl Dates {
    pub fn days_ago(days: i64) -> DateTime<Utc> {
        Utc::now() - Duration::days(days)
    }

    pub fn days_from_now(days: i64) -> DateTime<Utc> {
        Utc::now() + Duration::days(days)
    }

    /// A birth date making the holder `years` old today
    pub fn born_years_ago(years: i32) -> NaiveDate {
        let today = Utc::now().date_naive();
        today
            .with_year(today.year() - years)
            .or_else(|| NaiveDate::from_ymd_opt(today.year() - years, today.month(), 28))
            .unwrap_or(today)
    }
}

/// Entity fixtures
pub struct Fixtures;

impl Fixtures {
    /// A 35-year-old customer with a residential address and a random email
    pub fn customer() -> Customer {
        let email: String = SafeEmail().fake();
        let first: String = FirstName().fake();
        let last: String = LastName().fake();
        let mut customer = Customer::new(email, first, last);
        customer.date_of_birth = Some(Dates::born_years_ago(35));
        customer.addresses =
            vec![Address::new(AddressType::Residential, "1 Main St", "Springfield", "12345", "US").primary()];
        customer
    }

    pub fn new_customer(email: impl Into<String>) -> NewCustomer {
        NewCustomer {
            email: email.into(),
            first_name: FirstName().fake(),
            last_name: LastName().fake(),
            phone: Some("+15550100".to_string()),
            date_of_birth: Some(Dates::born_years_ago(35)),
            addresses: Vec::new(),
        }
    }

    pub fn new_product(category: &str) -> NewProduct {
        NewProduct {
            partner_id: PartnerId::new_v7(),
            name: format!("{category} cover"),
            description: None,
            category: category.to_string(),
            base_price: dec!(1000),
            coverage_amount: dec!(100000),
            coverage_period_days: 365,
            currency: Currency::USD,
            status: None,
            effective_date: Some(Dates::days_ago(365)),
            expiration_date: None,
        }
    }

    /// An active `auto` product priced at 1000 USD for 100,000 of cover
    pub fn product() -> Product {
        Self::product_in("auto")
    }

    pub fn product_in(category: &str) -> Product {
        Self::new_product(category)
            .into_product()
            .expect("fixture product is valid")
    }

    /// An active one-year policy that started 30 days ago
    pub fn active_policy(customer: &Customer, product: &Product) -> Policy {
        crate::builders::PolicyBuilder::new(customer.id, product.id).build()
    }

    pub fn new_claim(policy: &Policy, amount: Decimal) -> NewClaim {
        NewClaim {
            policy_id: policy.id,
            user_id: policy.user_id,
            title: "Rear-end collision".to_string(),
            description: "Hit from behind at a traffic light".to_string(),
            claim_amount: amount,
            currency: policy.currency,
            incident_date: Dates::days_ago(3),
            reported_date: None,
            documents: vec![ClaimDocument::new("police_report.pdf", 120_000, "application/pdf")],
        }
    }

    /// A submitted claim with one document, incident three days ago
    pub fn claim(policy: &Policy, amount: Decimal) -> Claim {
        Self::new_claim(policy, amount)
            .into_claim(Utc::now())
            .expect("fixture claim is valid")
    }

    /// A one-year monthly-paid pricing request starting today
    pub fn pricing_request(customer: &Customer, product: &Product) -> PricingRequest {
        let start = Utc::now();
        PricingRequest {
            product_id: product.id,
            user_id: customer.id,
            coverage_amount: product.coverage_amount,
            currency: product.currency,
            payment_frequency: PaymentFrequency::Monthly,
            effective_date: start,
            expiration_date: start + Duration::days(365),
            risk_factors: BTreeMap::new(),
            discounts: Vec::new(),
            options: BTreeMap::new(),
        }
    }

    pub fn risk_request(customer: &Customer, product: &Product) -> RiskAssessmentRequest {
        RiskAssessmentRequest {
            user_id: customer.id,
            product_id: product.id,
            coverage_amount: product.coverage_amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_customers_have_unique_ids() {
        let a = Fixtures::customer();
        let b = Fixtures::customer();
        assert_ne!(a.id, b.id);
        assert!(a.email.contains('@'));
    }

    #[test]
    fn test_born_years_ago() {
        let dob = Dates::born_years_ago(40);
        assert_eq!(Utc::now().year() - dob.year(), 40);
    }

    #[test]
    fn test_claim_fixture_is_submitted() {
        let customer = Fixtures::customer();
        let product = Fixtures::product();
        let policy = Fixtures::active_policy(&customer, &product);
        let claim = Fixtures::claim(&policy, dec!(2500));
        assert_eq!(claim.status, domain_claims::ClaimStatus::Submitted);
        assert_eq!(claim.policy_id, policy.id);
    }
}
