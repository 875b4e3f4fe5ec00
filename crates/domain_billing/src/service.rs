//! Payment service
//!
//! Every charge is persisted `pending` before the gateway is called, so a
//! crash or cancellation mid-flight never loses the attempt. The final state
//! is always written back, even when the caller's context has already been
//! cancelled.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use validator::Validate;

use core_kernel::{
    ClaimId, Context, Currency, CustomerId, DomainEvent, EventPayload, EventPublisher, Page,
    PageRequest, PaymentId, PolicyId, SubscriptionId,
};

use crate::error::BillingError;
use crate::gateway::{GatewayError, GatewayRequest, PaymentGateway};
use crate::payment::{Payment, PaymentStatus, PAYOUT_METHOD};
use crate::ports::{PaymentFilter, PaymentRepository};

/// Input for charging a customer
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PaymentRequest {
    pub user_id: CustomerId,
    pub policy_id: Option<PolicyId>,
    pub subscription_id: Option<SubscriptionId>,
    pub amount: Decimal,
    #[serde(default)]
    pub currency: Currency,
    #[validate(length(min = 1, max = 50, message = "payment_method is required"))]
    pub payment_method: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
}

/// A refund not tied to an earlier charge, such as a cancellation refund
#[derive(Debug, Clone)]
pub struct RefundRequest {
    pub user_id: CustomerId,
    pub policy_id: Option<PolicyId>,
    /// Positive amount returned to the customer
    pub amount: Decimal,
    pub currency: Currency,
    pub reason: String,
}

/// Settlement of an approved claim
#[derive(Debug, Clone)]
pub struct PayoutRequest {
    pub claim_id: ClaimId,
    pub user_id: CustomerId,
    pub policy_id: PolicyId,
    pub amount: Decimal,
    pub currency: Currency,
}

/// Charges, refunds and payouts
pub struct PaymentService {
    payments: Arc<dyn PaymentRepository>,
    gateway: Arc<dyn PaymentGateway>,
    publisher: Arc<dyn EventPublisher>,
}

impl PaymentService {
    pub fn new(
        payments: Arc<dyn PaymentRepository>,
        gateway: Arc<dyn PaymentGateway>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self { payments, gateway, publisher }
    }

    /// Charges the customer through the gateway
    ///
    /// # Errors
    ///
    /// - `Validation` for a non-positive amount or missing method
    /// - `PaymentFailed` when the gateway declines; the payment is stored as failed
    /// - `Cancelled` when `ctx` stops mid-charge; the payment is stored as failed
    #[instrument(skip(self, ctx, request), fields(user_id = %request.user_id, amount = %request.amount))]
    pub async fn process_payment(&self, ctx: &Context, request: PaymentRequest) -> Result<Payment, BillingError> {
        request.validate().map_err(|e| BillingError::validation(e.to_string()))?;
        if request.amount <= Decimal::ZERO {
            return Err(BillingError::validation("amount must be positive"));
        }

        let mut payment = Payment::new(request.user_id, request.amount, request.currency, request.payment_method);
        payment.policy_id = request.policy_id;
        payment.subscription_id = request.subscription_id;
        payment.description = request.description;
        let mut payment = self.payments.create(ctx, &payment).await?;

        let gateway_request = GatewayRequest {
            payment_id: payment.id,
            user_id: payment.user_id,
            amount: payment.amount,
            currency: payment.currency,
            payment_method: payment.payment_method.clone(),
        };

        match self.gateway.charge(ctx, &gateway_request).await {
            Ok(receipt) => {
                payment.complete(receipt.transaction_id.clone())?;
                let payment = self.payments.update(ctx, &payment).await?;
                info!(payment_id = %payment.id, transaction_id = %receipt.transaction_id, "Payment completed");
                self.publish_completed(ctx, &payment, receipt.transaction_id).await;
                Ok(payment)
            }
            Err(GatewayError::Cancelled(cancelled)) => {
                // The caller is gone; record the outcome on a detached context.
                let detached = Context::background();
                let payment = self.record_failure(&detached, payment, "cancelled").await?;
                Err(BillingError::Cancelled {
                    payment_id: payment.id,
                    source: cancelled,
                })
            }
            Err(e) => {
                let reason = e.failure_reason();
                let payment = self.record_failure(ctx, payment, &reason).await?;
                Err(BillingError::PaymentFailed {
                    payment_id: payment.id,
                    reason,
                })
            }
        }
    }

    async fn record_failure(&self, ctx: &Context, mut payment: Payment, reason: &str) -> Result<Payment, BillingError> {
        payment.fail(reason)?;
        let payment = self.payments.update(ctx, &payment).await?;
        warn!(payment_id = %payment.id, reason, "Payment failed");

        let event = DomainEvent::new(
            payment.id,
            EventPayload::PaymentFailed {
                payment_id: payment.id,
                user_id: payment.user_id,
                amount: payment.amount,
                currency: payment.currency,
                reason: reason.to_string(),
            },
        );
        if let Err(e) = self.publisher.publish(ctx, event).await {
            warn!(payment_id = %payment.id, error = %e, "Failed to publish payment.failed");
        }
        Ok(payment)
    }

    async fn publish_completed(&self, ctx: &Context, payment: &Payment, transaction_id: String) {
        let event = DomainEvent::new(
            payment.id,
            EventPayload::PaymentCompleted {
                payment_id: payment.id,
                user_id: payment.user_id,
                policy_id: payment.policy_id,
                amount: payment.amount,
                currency: payment.currency,
                transaction_id,
            },
        );
        if let Err(e) = self.publisher.publish(ctx, event).await {
            warn!(payment_id = %payment.id, error = %e, "Failed to publish payment.completed");
        }
    }

    async fn publish_refunded(&self, ctx: &Context, payment: &Payment, refund_amount: Decimal) {
        let event = DomainEvent::new(
            payment.id,
            EventPayload::PaymentRefunded {
                payment_id: payment.id,
                user_id: payment.user_id,
                policy_id: payment.policy_id,
                refund_amount,
                currency: payment.currency,
            },
        );
        if let Err(e) = self.publisher.publish(ctx, event).await {
            warn!(payment_id = %payment.id, error = %e, "Failed to publish payment.refunded");
        }
    }

    /// Records money returned to a customer as a negative-amount payment
    #[instrument(skip(self, ctx, request), fields(user_id = %request.user_id, amount = %request.amount))]
    pub async fn record_refund(&self, ctx: &Context, request: RefundRequest) -> Result<Payment, BillingError> {
        if request.amount <= Decimal::ZERO {
            return Err(BillingError::validation("refund amount must be positive"));
        }
        let mut refund = Payment::new(request.user_id, -request.amount, request.currency, "refund")
            .with_description(request.reason);
        refund.policy_id = request.policy_id;

        let receipt = self
            .gateway
            .disburse(ctx, &self.disbursement(&refund, request.amount))
            .await
            .map_err(|e| self.disbursement_error(refund.id, e))?;

        refund.complete(receipt.transaction_id)?;
        refund.status = PaymentStatus::Refunded;
        refund.refund_amount = refund.amount.abs();
        refund.refunded_at = refund.processed_at;

        let refund = self.payments.create(ctx, &refund).await?;
        info!(payment_id = %refund.id, "Refund recorded");
        self.publish_refunded(ctx, &refund, request.amount).await;
        Ok(refund)
    }

    /// Refunds part or all of a completed charge
    #[instrument(skip(self, ctx), fields(payment_id = %id))]
    pub async fn refund_payment(&self, ctx: &Context, id: PaymentId, amount: Decimal) -> Result<Payment, BillingError> {
        let mut payment = self.payments.get_by_id(ctx, id).await?;
        if amount > payment.refundable() {
            return Err(BillingError::validation(format!(
                "refund of {} exceeds refundable amount {}",
                amount,
                payment.refundable()
            )));
        }
        self.gateway
            .disburse(ctx, &self.disbursement(&payment, amount))
            .await
            .map_err(|e| self.disbursement_error(payment.id, e))?;

        payment.apply_refund(amount)?;
        let payment = self.payments.update(ctx, &payment).await?;
        info!(refund_amount = %amount, status = %payment.status, "Payment refunded");
        self.publish_refunded(ctx, &payment, amount).await;
        Ok(payment)
    }

    /// Pays out an approved claim
    ///
    /// Retries are harmless: an existing completed payout for the claim is
    /// returned instead of paying twice.
    #[instrument(skip(self, ctx, request), fields(claim_id = %request.claim_id, amount = %request.amount))]
    pub async fn record_payout(&self, ctx: &Context, request: PayoutRequest) -> Result<Payment, BillingError> {
        if request.amount <= Decimal::ZERO {
            return Err(BillingError::validation("payout amount must be positive"));
        }
        let filter = PaymentFilter {
            claim_id: Some(request.claim_id),
            status: Some(PaymentStatus::Completed),
            ..Default::default()
        };
        if let Some(existing) = self.payments.list(ctx, &filter, 1, 0).await?.into_iter().next() {
            info!(payment_id = %existing.id, "Payout already recorded");
            return Ok(existing);
        }

        let mut payout = Payment::new(request.user_id, -request.amount, request.currency, PAYOUT_METHOD)
            .for_policy(request.policy_id)
            .for_claim(request.claim_id)
            .with_description("claim payout");

        let receipt = self
            .gateway
            .disburse(ctx, &self.disbursement(&payout, request.amount))
            .await
            .map_err(|e| self.disbursement_error(payout.id, e))?;
        payout.complete(receipt.transaction_id.clone())?;

        let payout = self.payments.create(ctx, &payout).await?;
        info!(payment_id = %payout.id, "Claim payout recorded");
        self.publish_completed(ctx, &payout, receipt.transaction_id).await;
        Ok(payout)
    }

    fn disbursement(&self, payment: &Payment, amount: Decimal) -> GatewayRequest {
        GatewayRequest {
            payment_id: payment.id,
            user_id: payment.user_id,
            amount,
            currency: payment.currency,
            payment_method: payment.payment_method.clone(),
        }
    }

    fn disbursement_error(&self, payment_id: PaymentId, error: GatewayError) -> BillingError {
        match error {
            GatewayError::Cancelled(source) => BillingError::Cancelled { payment_id, source },
            other => BillingError::PaymentFailed {
                payment_id,
                reason: other.failure_reason(),
            },
        }
    }

    pub async fn get(&self, ctx: &Context, id: PaymentId) -> Result<Payment, BillingError> {
        Ok(self.payments.get_by_id(ctx, id).await?)
    }

    pub async fn list(
        &self,
        ctx: &Context,
        filter: &PaymentFilter,
        page: PageRequest,
    ) -> Result<Page<Payment>, BillingError> {
        let items = self.payments.list(ctx, filter, page.limit(), page.offset()).await?;
        let total = self.payments.count(ctx, filter).await?;
        Ok(Page::new(items, total, page))
    }
}
