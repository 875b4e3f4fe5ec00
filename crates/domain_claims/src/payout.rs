//! Background payout of approved claims

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use core_kernel::{
    ClaimId, Context, DomainEvent, EventPayload, EventPublisher, Job, JobError, RetryBackoff,
};
use domain_billing::{BillingError, PaymentService, PayoutRequest};

use crate::claim::ClaimStatus;
use crate::error::ClaimError;
use crate::ports::ClaimRepository;

pub const PAYOUT_QUEUE: &str = "payouts";

/// Pays an approved claim in full and marks it `paid`
///
/// Safe to retry: the payment service returns the existing payout for a
/// claim, and an already paid claim is left alone.
pub struct PayoutJob {
    pub claim_id: ClaimId,
    claims: Arc<dyn ClaimRepository>,
    payments: Arc<PaymentService>,
    publisher: Arc<dyn EventPublisher>,
}

impl PayoutJob {
    pub fn new(
        claim_id: ClaimId,
        claims: Arc<dyn ClaimRepository>,
        payments: Arc<PaymentService>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            claim_id,
            claims,
            payments,
            publisher,
        }
    }

    async fn pay(&self, ctx: &Context) -> Result<(), ClaimError> {
        let mut claim = self.claims.get_by_id(ctx, self.claim_id).await?;
        match claim.status {
            ClaimStatus::Paid => {
                info!(claim_id = %claim.id, "Claim already paid");
                return Ok(());
            }
            ClaimStatus::Approved => {}
            other => return Err(ClaimError::transition(other, ClaimStatus::Paid)),
        }

        let payout = self
            .payments
            .record_payout(
                ctx,
                PayoutRequest {
                    claim_id: claim.id,
                    user_id: claim.user_id,
                    policy_id: claim.policy_id,
                    amount: claim.claim_amount,
                    currency: claim.currency,
                },
            )
            .await?;

        claim.mark_paid(Utc::now())?;
        let claim = self.claims.update(ctx, &claim).await?;
        info!(claim_id = %claim.id, payment_id = %payout.id, amount = %claim.paid_amount, "Claim paid");

        let event = DomainEvent::new(
            claim.id,
            EventPayload::ClaimStatusChanged {
                claim_id: claim.id,
                from: ClaimStatus::Approved.to_string(),
                to: ClaimStatus::Paid.to_string(),
                reason: None,
            },
        );
        if let Err(e) = self.publisher.publish(ctx, event).await {
            warn!(error = %e, "Failed to publish claim.status_changed");
        }
        Ok(())
    }
}

#[async_trait]
impl Job for PayoutJob {
    fn job_type(&self) -> &'static str {
        "claim_payout"
    }

    fn queue_name(&self) -> &str {
        PAYOUT_QUEUE
    }

    fn max_retries(&self) -> u32 {
        5
    }

    fn retry_backoff(&self) -> RetryBackoff {
        RetryBackoff::exponential(Duration::from_secs(5))
    }

    fn priority(&self) -> i32 {
        10
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(30)
    }

    async fn perform(&self, ctx: &Context) -> Result<(), JobError> {
        ctx.check()?;
        self.pay(ctx).await.map_err(|e| match e {
            ClaimError::Port(port) => JobError::Port(port),
            ClaimError::Billing(BillingError::Cancelled { source, .. }) => JobError::Cancelled(source),
            other => JobError::failed(other.to_string()),
        })
    }
}
