//! Policy aggregate
//!
//! # Lifecycle
//!
//! ```text
//! pending ──payment──▶ active ──expiration──▶ expired
//!    │                  │  ▲
//!    │                  ▼  │
//!    │              suspended / inactive
//!    ▼
//! cancelled ◀────── active
//! ```
//!
//! `cancelled` and `expired` are terminal. `product_id`, `user_id` and
//! `policy_number` never change once the policy is persisted.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use core_kernel::{
    business_number, text_enum, CoveragePeriod, Currency, CustomerId, PolicyId, ProductId, QuoteId,
};

use crate::error::PolicyError;

text_enum! {
    /// How often the premium is collected
    pub enum PaymentFrequency {
        Monthly => "monthly",
        Quarterly => "quarterly",
        Annually => "annually",
    }
}

impl Default for PaymentFrequency {
    fn default() -> Self {
        PaymentFrequency::Annually
    }
}

text_enum! {
    pub enum PolicyStatus {
        /// Issued but awaiting its first payment
        Pending => "pending",
        Active => "active",
        Inactive => "inactive",
        Expired => "expired",
        Cancelled => "cancelled",
        Suspended => "suspended",
    }
}

impl PolicyStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PolicyStatus::Cancelled | PolicyStatus::Expired)
    }

    pub fn can_transition_to(&self, target: PolicyStatus) -> bool {
        use PolicyStatus::*;
        match (self, target) {
            (a, b) if *a == b => true,
            (Pending, Active | Cancelled) => true,
            (Active, Expired | Cancelled | Suspended | Inactive) => true,
            (Suspended | Inactive, Active | Cancelled | Expired) => true,
            _ => false,
        }
    }
}

/// An issued insurance policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub id: PolicyId,
    pub policy_number: String,
    pub product_id: ProductId,
    pub user_id: CustomerId,
    pub quote_id: Option<QuoteId>,
    pub premium: Decimal,
    pub coverage_amount: Decimal,
    pub currency: Currency,
    pub payment_frequency: PaymentFrequency,
    pub status: PolicyStatus,
    pub effective_date: DateTime<Utc>,
    pub expiration_date: DateTime<Utc>,
    /// Set once the policy has been renewed
    pub renewal_date: Option<DateTime<Utc>>,
    pub auto_renew: bool,
    /// Deadline for the first payment of a pending policy
    pub grace_period_end: Option<DateTime<Utc>>,
    /// The policy this one renews
    pub renewed_from: Option<PolicyId>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Policy {
    /// Creates an active policy
    ///
    /// # Errors
    ///
    /// `Validation` when the term is empty or inverted, or the premium or
    /// coverage is out of range.
    pub fn new(
        product_id: ProductId,
        user_id: CustomerId,
        premium: Decimal,
        coverage_amount: Decimal,
        currency: Currency,
        effective_date: DateTime<Utc>,
        expiration_date: DateTime<Utc>,
    ) -> Result<Self, PolicyError> {
        if expiration_date <= effective_date {
            return Err(PolicyError::validation("expiration_date must be after effective_date"));
        }
        if premium < Decimal::ZERO {
            return Err(PolicyError::validation("premium must not be negative"));
        }
        if coverage_amount <= Decimal::ZERO {
            return Err(PolicyError::validation("coverage_amount must be positive"));
        }
        let now = Utc::now();
        Ok(Self {
            id: PolicyId::new_v7(),
            policy_number: business_number("POL", now),
            product_id,
            user_id,
            quote_id: None,
            premium: premium.round_dp(currency.decimal_places()),
            coverage_amount,
            currency,
            payment_frequency: PaymentFrequency::default(),
            status: PolicyStatus::Active,
            effective_date,
            expiration_date,
            renewal_date: None,
            auto_renew: false,
            grace_period_end: None,
            renewed_from: None,
            cancelled_at: None,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn coverage_period(&self) -> CoveragePeriod {
        CoveragePeriod {
            start: self.effective_date,
            end: self.expiration_date,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == PolicyStatus::Active
    }

    /// Whether the incident instant falls inside the policy term
    pub fn covers(&self, at: DateTime<Utc>) -> bool {
        self.coverage_period().contains(at)
    }

    pub fn days_until_expiration(&self, at: DateTime<Utc>) -> i64 {
        self.coverage_period().days_remaining(at)
    }

    /// Moves an active policy past its expiration date to `expired`
    ///
    /// Returns true when the status changed.
    pub fn expire_if_elapsed(&mut self, at: DateTime<Utc>) -> bool {
        if self.status == PolicyStatus::Active && self.expiration_date < at {
            self.status = PolicyStatus::Expired;
            self.updated_at = at;
            return true;
        }
        false
    }

    pub fn transition_to(&mut self, target: PolicyStatus) -> Result<(), PolicyError> {
        if !self.status.can_transition_to(target) {
            return Err(PolicyError::transition(self.status, target));
        }
        self.status = target;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Activates a pending policy once its payment succeeded
    pub fn activate(&mut self) -> Result<(), PolicyError> {
        self.transition_to(PolicyStatus::Active)?;
        self.grace_period_end = None;
        Ok(())
    }

    pub fn cancel(&mut self, reason: impl Into<String>, at: DateTime<Utc>) -> Result<(), PolicyError> {
        self.transition_to(PolicyStatus::Cancelled)?;
        self.cancelled_at = Some(at);
        self.cancellation_reason = Some(reason.into());
        Ok(())
    }

    /// Puts a new policy on hold until its first payment, for `grace_days`
    pub fn await_payment(&mut self, grace_days: u32, at: DateTime<Utc>) {
        self.status = PolicyStatus::Pending;
        self.grace_period_end = Some(at + Duration::days(i64::from(grace_days)));
        self.updated_at = at;
    }
}

/// Input for issuing a policy directly
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewPolicy {
    pub product_id: ProductId,
    pub user_id: CustomerId,
    pub quote_id: Option<QuoteId>,
    pub premium: Decimal,
    pub coverage_amount: Decimal,
    #[serde(default)]
    pub currency: Currency,
    #[serde(default)]
    pub payment_frequency: PaymentFrequency,
    pub effective_date: DateTime<Utc>,
    pub expiration_date: DateTime<Utc>,
    #[serde(default)]
    pub auto_renew: bool,
}

impl NewPolicy {
    pub fn into_policy(self) -> Result<Policy, PolicyError> {
        let mut policy = Policy::new(
            self.product_id,
            self.user_id,
            self.premium,
            self.coverage_amount,
            self.currency,
            self.effective_date,
            self.expiration_date,
        )?;
        policy.quote_id = self.quote_id;
        policy.payment_frequency = self.payment_frequency;
        policy.auto_renew = self.auto_renew;
        Ok(policy)
    }
}

/// Partial policy update
///
/// The identity fields may be echoed back by clients but must match the
/// stored values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyUpdate {
    pub product_id: Option<ProductId>,
    pub user_id: Option<CustomerId>,
    pub policy_number: Option<String>,
    pub premium: Option<Decimal>,
    pub coverage_amount: Option<Decimal>,
    pub payment_frequency: Option<PaymentFrequency>,
    pub status: Option<PolicyStatus>,
    pub effective_date: Option<DateTime<Utc>>,
    pub expiration_date: Option<DateTime<Utc>>,
    pub auto_renew: Option<bool>,
}

impl PolicyUpdate {
    pub fn apply(self, policy: &mut Policy) -> Result<(), PolicyError> {
        if self.product_id.is_some_and(|p| p != policy.product_id) {
            return Err(PolicyError::Immutable("product_id"));
        }
        if self.user_id.is_some_and(|u| u != policy.user_id) {
            return Err(PolicyError::Immutable("user_id"));
        }
        if self.policy_number.as_ref().is_some_and(|n| *n != policy.policy_number) {
            return Err(PolicyError::Immutable("policy_number"));
        }

        let effective = self.effective_date.unwrap_or(policy.effective_date);
        let expiration = self.expiration_date.unwrap_or(policy.expiration_date);
        if expiration <= effective {
            return Err(PolicyError::validation("expiration_date must be after effective_date"));
        }
        if let Some(premium) = self.premium {
            if premium < Decimal::ZERO {
                return Err(PolicyError::validation("premium must not be negative"));
            }
            policy.premium = premium;
        }
        if let Some(coverage) = self.coverage_amount {
            if coverage <= Decimal::ZERO {
                return Err(PolicyError::validation("coverage_amount must be positive"));
            }
            policy.coverage_amount = coverage;
        }
        if let Some(status) = self.status {
            policy.transition_to(status)?;
        }
        if let Some(frequency) = self.payment_frequency {
            policy.payment_frequency = frequency;
        }
        if let Some(auto_renew) = self.auto_renew {
            policy.auto_renew = auto_renew;
        }
        policy.effective_date = effective;
        policy.expiration_date = expiration;
        policy.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn policy() -> Policy {
        let start = Utc::now() - Duration::days(100);
        Policy::new(
            ProductId::new(),
            CustomerId::new(),
            dec!(1200),
            dec!(100000),
            Currency::USD,
            start,
            start + Duration::days(365),
        )
        .unwrap()
    }

    #[test]
    fn test_inverted_term_rejected() {
        let now = Utc::now();
        let result = Policy::new(ProductId::new(), CustomerId::new(), dec!(1), dec!(1), Currency::USD, now, now);
        assert!(matches!(result, Err(PolicyError::Validation(_))));
    }

    #[test]
    fn test_expire_if_elapsed_only_once() {
        let mut p = policy();
        let later = p.expiration_date + Duration::seconds(1);
        assert!(!p.expire_if_elapsed(p.expiration_date));
        assert!(p.expire_if_elapsed(later));
        assert_eq!(p.status, PolicyStatus::Expired);
        assert!(!p.expire_if_elapsed(later));
    }

    #[test]
    fn test_cancelled_is_terminal() {
        let mut p = policy();
        p.cancel("customer request", Utc::now()).unwrap();
        assert!(p.status.is_terminal());
        assert!(p.transition_to(PolicyStatus::Active).is_err());
    }

    #[test]
    fn test_update_rejects_identity_changes() {
        let mut p = policy();
        let update = PolicyUpdate {
            user_id: Some(CustomerId::new()),
            ..Default::default()
        };
        assert!(matches!(update.apply(&mut p), Err(PolicyError::Immutable("user_id"))));

        let echo = PolicyUpdate {
            policy_number: Some(p.policy_number.clone()),
            auto_renew: Some(true),
            ..Default::default()
        };
        echo.apply(&mut p).unwrap();
        assert!(p.auto_renew);
    }

    #[test]
    fn test_pending_gets_grace_period() {
        let mut p = policy();
        let now = Utc::now();
        p.await_payment(15, now);
        assert_eq!(p.status, PolicyStatus::Pending);
        assert_eq!(p.grace_period_end, Some(now + Duration::days(15)));
        p.activate().unwrap();
        assert!(p.grace_period_end.is_none());
    }
}
