//! Priced quotes
//!
//! A quote freezes the output of the pricing engine for a limited time.
//! Status moves only forward: `pending → active | expired | used`, and
//! `active → used | expired`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{business_number, text_enum, Currency, CustomerId, ProductId, QuoteId};

use crate::error::PolicyError;
use crate::policy::PaymentFrequency;

text_enum! {
    pub enum QuoteStatus {
        Pending => "pending",
        Active => "active",
        Expired => "expired",
        Used => "used",
    }
}

impl QuoteStatus {
    pub fn can_transition_to(&self, target: QuoteStatus) -> bool {
        use QuoteStatus::*;
        matches!(
            (self, target),
            (Pending, Active | Expired | Used) | (Active, Used | Expired)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub quote_number: String,
    pub product_id: ProductId,
    pub user_id: CustomerId,
    pub coverage_amount: Decimal,
    pub base_price: Decimal,
    /// Never negative
    pub final_price: Decimal,
    pub currency: Currency,
    pub payment_frequency: PaymentFrequency,
    pub status: QuoteStatus,
    pub valid_until: DateTime<Utc>,
    /// Names of the factors that moved the price
    pub risk_factors: Vec<String>,
    /// Total discount granted, as a positive amount
    pub discount: Decimal,
    pub tax: Decimal,
    pub effective_date: DateTime<Utc>,
    pub expiration_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quote {
    /// A fresh pending quote
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        product_id: ProductId,
        user_id: CustomerId,
        coverage_amount: Decimal,
        base_price: Decimal,
        final_price: Decimal,
        currency: Currency,
        valid_until: DateTime<Utc>,
        effective_date: DateTime<Utc>,
        expiration_date: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: QuoteId::new_v7(),
            quote_number: business_number("QTE", now),
            product_id,
            user_id,
            coverage_amount,
            base_price,
            final_price: final_price.max(Decimal::ZERO),
            currency,
            payment_frequency: PaymentFrequency::default(),
            status: QuoteStatus::Pending,
            valid_until,
            risk_factors: Vec::new(),
            discount: Decimal::ZERO,
            tax: Decimal::ZERO,
            effective_date,
            expiration_date,
            created_at: now,
            updated_at: now,
        }
    }

    /// Expires a pending quote whose validity has lapsed; true when it changed
    pub fn expire_if_stale(&mut self, at: DateTime<Utc>) -> bool {
        if self.status == QuoteStatus::Pending && self.valid_until < at {
            self.status = QuoteStatus::Expired;
            self.updated_at = at;
            return true;
        }
        false
    }

    pub fn transition_to(&mut self, target: QuoteStatus) -> Result<(), PolicyError> {
        if !self.status.can_transition_to(target) {
            return Err(PolicyError::transition(self.status, target));
        }
        self.status = target;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Marks the quote consumed by a policy
    pub fn mark_used(&mut self, at: DateTime<Utc>) -> Result<(), PolicyError> {
        if self.valid_until < at {
            return Err(PolicyError::validation(format!("quote {} has expired", self.quote_number)));
        }
        self.transition_to(QuoteStatus::Used)
    }
}

/// Partial quote update; only the status and factor labels may change
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuoteUpdate {
    pub status: Option<QuoteStatus>,
    pub risk_factors: Option<Vec<String>>,
}

impl QuoteUpdate {
    pub fn apply(self, quote: &mut Quote) -> Result<(), PolicyError> {
        if let Some(status) = self.status {
            if status != quote.status {
                quote.transition_to(status)?;
            }
        }
        if let Some(factors) = self.risk_factors {
            quote.risk_factors = factors;
        }
        quote.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn quote(valid_for: Duration) -> Quote {
        let now = Utc::now();
        Quote::new(
            ProductId::new(),
            CustomerId::new(),
            dec!(100000),
            dec!(1500),
            dec!(9500),
            Currency::USD,
            now + valid_for,
            now,
            now + Duration::days(365),
        )
    }

    #[test]
    fn test_final_price_never_negative() {
        let now = Utc::now();
        let q = Quote::new(
            ProductId::new(),
            CustomerId::new(),
            dec!(1000),
            dec!(10),
            dec!(-50),
            Currency::USD,
            now,
            now,
            now + Duration::days(1),
        );
        assert_eq!(q.final_price, Decimal::ZERO);
    }

    #[test]
    fn test_stale_pending_quote_expires() {
        let mut q = quote(Duration::hours(-1));
        assert!(q.expire_if_stale(Utc::now()));
        assert_eq!(q.status, QuoteStatus::Expired);
        assert!(q.transition_to(QuoteStatus::Active).is_err());
    }

    #[test]
    fn test_forward_transitions_only() {
        let mut q = quote(Duration::hours(24));
        q.transition_to(QuoteStatus::Active).unwrap();
        assert!(q.transition_to(QuoteStatus::Pending).is_err());
        q.mark_used(Utc::now()).unwrap();
        assert_eq!(q.status, QuoteStatus::Used);
    }

    #[test]
    fn test_active_quote_not_expired_by_read() {
        let mut q = quote(Duration::hours(-1));
        q.status = QuoteStatus::Active;
        assert!(!q.expire_if_stale(Utc::now()));
    }
}
