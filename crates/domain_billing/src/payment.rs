//! Payment records
//!
//! A payment is money moving between a customer and the marketplace.
//! Charges carry a positive amount; refunds and claim payouts are recorded
//! as negative amounts so that summing a customer's payments yields the net
//! position.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{text_enum, ClaimId, Currency, CustomerId, PaymentId, PolicyId, SubscriptionId};

use crate::error::BillingError;

text_enum! {
    pub enum PaymentStatus {
        Pending => "pending",
        Completed => "completed",
        Failed => "failed",
        Refunded => "refunded",
    }
}

/// Method name used for claim payouts
pub const PAYOUT_METHOD: &str = "payout";

/// A payment record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub user_id: CustomerId,
    pub policy_id: Option<PolicyId>,
    pub subscription_id: Option<SubscriptionId>,
    /// Claim settled by this payment, for payouts
    pub claim_id: Option<ClaimId>,
    /// Negative for refunds and payouts
    pub amount: Decimal,
    pub currency: Currency,
    pub status: PaymentStatus,
    pub payment_method: String,
    pub description: Option<String>,
    pub transaction_id: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub refund_amount: Decimal,
    pub refunded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Creates a pending payment
    pub fn new(
        user_id: CustomerId,
        amount: Decimal,
        currency: Currency,
        payment_method: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: PaymentId::new_v7(),
            user_id,
            policy_id: None,
            subscription_id: None,
            claim_id: None,
            amount: amount.round_dp(currency.decimal_places()),
            currency,
            status: PaymentStatus::Pending,
            payment_method: payment_method.into(),
            description: None,
            transaction_id: None,
            processed_at: None,
            failed_at: None,
            failure_reason: None,
            refund_amount: Decimal::ZERO,
            refunded_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn for_policy(mut self, policy_id: PolicyId) -> Self {
        self.policy_id = Some(policy_id);
        self
    }

    pub fn for_claim(mut self, claim_id: ClaimId) -> Self {
        self.claim_id = Some(claim_id);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// True for refunds and payouts
    pub fn is_outgoing(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }

    pub fn is_payout(&self) -> bool {
        self.claim_id.is_some() && self.payment_method == PAYOUT_METHOD
    }

    /// Amount of a completed charge that can still be refunded
    pub fn refundable(&self) -> Decimal {
        if self.status != PaymentStatus::Completed || self.is_outgoing() {
            return Decimal::ZERO;
        }
        (self.amount - self.refund_amount).max(Decimal::ZERO)
    }

    /// Marks the payment completed with the gateway's transaction id
    pub fn complete(&mut self, transaction_id: impl Into<String>) -> Result<(), BillingError> {
        self.require_pending("completed")?;
        let now = Utc::now();
        self.status = PaymentStatus::Completed;
        self.transaction_id = Some(transaction_id.into());
        self.processed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), BillingError> {
        self.require_pending("failed")?;
        let now = Utc::now();
        self.status = PaymentStatus::Failed;
        self.failure_reason = Some(reason.into());
        self.failed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Records a (partial) refund of a completed charge
    ///
    /// The payment turns `refunded` once the whole amount was given back.
    pub fn apply_refund(&mut self, amount: Decimal) -> Result<(), BillingError> {
        if amount <= Decimal::ZERO {
            return Err(BillingError::validation("refund amount must be positive"));
        }
        if amount > self.refundable() {
            return Err(BillingError::validation(format!(
                "refund of {} exceeds refundable amount {}",
                amount,
                self.refundable()
            )));
        }
        let now = Utc::now();
        self.refund_amount += amount;
        self.refunded_at = Some(now);
        if self.refund_amount >= self.amount {
            self.status = PaymentStatus::Refunded;
        }
        self.updated_at = now;
        Ok(())
    }

    fn require_pending(&self, target: &str) -> Result<(), BillingError> {
        if self.status == PaymentStatus::Pending {
            Ok(())
        } else {
            Err(BillingError::InvalidTransition {
                from: self.status.to_string(),
                to: target.to_string(),
            })
        }
    }
}
