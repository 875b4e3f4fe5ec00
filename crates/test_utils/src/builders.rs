//! Test Data Builders
//!
//! Builders construct domain entities with sensible defaults so a test only
//! spells out the fields it is about.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::{Currency, CustomerId, ProductId};
use domain_claims::{Claim, ClaimDocument, ClaimStatus};
use domain_party::{AmlStatus, Customer, CustomerStatus, CustomerTier, KycStatus};
use domain_policy::{PaymentFrequency, Policy, PolicyStatus};

use crate::fixtures::{Dates, Fixtures};

/// Builder for policies
///
/// Defaults: active, 1200 USD premium, 100,000 cover, one-year term that
/// started 30 days ago, no auto-renewal.
pub struct PolicyBuilder {
    product_id: ProductId,
    user_id: CustomerId,
    premium: Decimal,
    coverage_amount: Decimal,
    currency: Currency,
    payment_frequency: PaymentFrequency,
    status: PolicyStatus,
    effective_date: DateTime<Utc>,
    term_days: i64,
    auto_renew: bool,
    grace_period_end: Option<DateTime<Utc>>,
}

impl PolicyBuilder {
    pub fn new(user_id: CustomerId, product_id: ProductId) -> Self {
        Self {
            product_id,
            user_id,
            premium: dec!(1200),
            coverage_amount: dec!(100000),
            currency: Currency::USD,
            payment_frequency: PaymentFrequency::Annually,
            status: PolicyStatus::Active,
            effective_date: Dates::days_ago(30),
            term_days: 365,
            auto_renew: false,
            grace_period_end: None,
        }
    }

    pub fn premium(mut self, premium: Decimal) -> Self {
        self.premium = premium;
        self
    }

    pub fn coverage(mut self, coverage: Decimal) -> Self {
        self.coverage_amount = coverage;
        self
    }

    pub fn currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    pub fn payment_frequency(mut self, frequency: PaymentFrequency) -> Self {
        self.payment_frequency = frequency;
        self
    }

    pub fn status(mut self, status: PolicyStatus) -> Self {
        self.status = status;
        self
    }

    pub fn effective(mut self, date: DateTime<Utc>) -> Self {
        self.effective_date = date;
        self
    }

    pub fn term_days(mut self, days: i64) -> Self {
        self.term_days = days;
        self
    }

    /// Places the expiration `days` from now, keeping the term length
    pub fn expiring_in(mut self, days: i64) -> Self {
        self.effective_date = Dates::days_from_now(days) - Duration::days(self.term_days);
        self
    }

    pub fn auto_renew(mut self, auto_renew: bool) -> Self {
        self.auto_renew = auto_renew;
        self
    }

    /// A pending policy awaiting its first payment until `end`
    pub fn awaiting_payment_until(mut self, end: DateTime<Utc>) -> Self {
        self.status = PolicyStatus::Pending;
        self.grace_period_end = Some(end);
        self
    }

    pub fn build(self) -> Policy {
        let mut policy = Policy::new(
            self.product_id,
            self.user_id,
            self.premium,
            self.coverage_amount,
            self.currency,
            self.effective_date,
            self.effective_date + Duration::days(self.term_days),
        )
        .expect("builder policy is valid");
        policy.payment_frequency = self.payment_frequency;
        policy.status = self.status;
        policy.auto_renew = self.auto_renew;
        policy.grace_period_end = self.grace_period_end;
        policy
    }
}

/// Builder for claims against a policy
pub struct ClaimBuilder {
    policy: Policy,
    amount: Decimal,
    incident_days_ago: i64,
    reported_days_ago: Option<i64>,
    documents: usize,
    status: ClaimStatus,
}

impl ClaimBuilder {
    pub fn new(policy: &Policy) -> Self {
        Self {
            policy: policy.clone(),
            amount: dec!(2500),
            incident_days_ago: 3,
            reported_days_ago: None,
            documents: 1,
            status: ClaimStatus::Submitted,
        }
    }

    pub fn amount(mut self, amount: Decimal) -> Self {
        self.amount = amount;
        self
    }

    pub fn incident_days_ago(mut self, days: i64) -> Self {
        self.incident_days_ago = days;
        self
    }

    pub fn reported_days_ago(mut self, days: i64) -> Self {
        self.reported_days_ago = Some(days);
        self
    }

    /// Number of attached documents; zero for an undocumented claim
    pub fn documents(mut self, count: usize) -> Self {
        self.documents = count;
        self
    }

    pub fn status(mut self, status: ClaimStatus) -> Self {
        self.status = status;
        self
    }

    pub fn build(self) -> Claim {
        let mut input = Fixtures::new_claim(&self.policy, self.amount);
        input.incident_date = Dates::days_ago(self.incident_days_ago);
        input.reported_date = self.reported_days_ago.map(Dates::days_ago);
        input.documents = (0..self.documents)
            .map(|i| ClaimDocument::new(format!("document_{i}.pdf"), 120_000, "application/pdf"))
            .collect();
        let mut claim = input.into_claim(Utc::now()).expect("builder claim is valid");
        claim.status = self.status;
        claim
    }
}

/// Builder for customers
pub struct CustomerBuilder {
    customer: Customer,
}

impl Default for CustomerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CustomerBuilder {
    pub fn new() -> Self {
        Self {
            customer: Fixtures::customer(),
        }
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.customer.email = email.into();
        self
    }

    pub fn tier(mut self, tier: CustomerTier) -> Self {
        self.customer.customer_tier = tier;
        self
    }

    pub fn kyc(mut self, status: KycStatus) -> Self {
        self.customer.kyc_status = status;
        self
    }

    pub fn aml(mut self, status: AmlStatus) -> Self {
        self.customer.aml_status = status;
        self
    }

    /// A long-standing customer with verified KYC and cleared AML checks
    pub fn established(self) -> Self {
        self.account_age_days(1000)
            .kyc(KycStatus::Verified)
            .aml(AmlStatus::Cleared)
    }

    pub fn status(mut self, status: CustomerStatus) -> Self {
        self.customer.status = status;
        self
    }

    pub fn born(mut self, date: Option<NaiveDate>) -> Self {
        self.customer.date_of_birth = date;
        self
    }

    pub fn aged(self, years: i32) -> Self {
        self.born(Some(Dates::born_years_ago(years)))
    }

    /// Backdates the account so it is `days` old
    pub fn account_age_days(mut self, days: i64) -> Self {
        self.customer.created_at = Dates::days_ago(days);
        self.customer.updated_at = self.customer.created_at;
        self
    }

    pub fn without_addresses(mut self) -> Self {
        self.customer.addresses.clear();
        self
    }

    pub fn build(self) -> Customer {
        self.customer
    }
}
