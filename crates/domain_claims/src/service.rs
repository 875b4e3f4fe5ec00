//! Claim submission and maintenance

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};

use core_kernel::{ClaimId, Context, DomainEvent, EventPayload, EventPublisher, Page, PageRequest};
use domain_policy::PolicyRepository;

use crate::claim::{Claim, ClaimUpdate, NewClaim};
use crate::error::ClaimError;
use crate::ports::{ClaimFilter, ClaimRepository};

async fn publish(publisher: &dyn EventPublisher, ctx: &Context, event: DomainEvent) {
    let event_type = event.event_type();
    if let Err(e) = publisher.publish(ctx, event).await {
        warn!(event_type, error = %e, "Failed to publish event");
    }
}

pub struct ClaimService {
    claims: Arc<dyn ClaimRepository>,
    policies: Arc<dyn PolicyRepository>,
    publisher: Arc<dyn EventPublisher>,
}

impl ClaimService {
    pub fn new(
        claims: Arc<dyn ClaimRepository>,
        policies: Arc<dyn PolicyRepository>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            claims,
            policies,
            publisher,
        }
    }

    /// Submits a claim against an existing policy held by the claimant
    #[instrument(skip(self, ctx, input), fields(policy_id = %input.policy_id, user_id = %input.user_id))]
    pub async fn create(&self, ctx: &Context, input: NewClaim) -> Result<Claim, ClaimError> {
        let policy = self.policies.get_by_id(ctx, input.policy_id).await?;
        if policy.user_id != input.user_id {
            return Err(ClaimError::validation("policy belongs to a different customer"));
        }

        let claim = self.claims.create(ctx, &input.into_claim(Utc::now())?).await?;
        info!(claim_id = %claim.id, claim_number = %claim.claim_number, amount = %claim.claim_amount, "Claim submitted");

        publish(
            self.publisher.as_ref(),
            ctx,
            DomainEvent::new(
                claim.id,
                EventPayload::ClaimSubmitted {
                    claim_id: claim.id,
                    claim_number: claim.claim_number.clone(),
                    policy_id: claim.policy_id,
                    user_id: claim.user_id,
                    claim_amount: claim.claim_amount,
                    currency: claim.currency,
                },
            ),
        )
        .await;
        Ok(claim)
    }

    pub async fn get(&self, ctx: &Context, id: ClaimId) -> Result<Claim, ClaimError> {
        Ok(self.claims.get_by_id(ctx, id).await?)
    }

    pub async fn get_by_number(&self, ctx: &Context, number: &str) -> Result<Claim, ClaimError> {
        Ok(self.claims.get_by_number(ctx, number).await?)
    }

    pub async fn list(&self, ctx: &Context, filter: &ClaimFilter, page: PageRequest) -> Result<Page<Claim>, ClaimError> {
        let items = self.claims.list(ctx, filter, page.limit(), page.offset()).await?;
        let total = self.claims.count(ctx, filter).await?;
        Ok(Page::new(items, total, page))
    }

    /// Applies a partial update
    ///
    /// # Errors
    ///
    /// `Immutable` when an identity or date field differs from the stored
    /// value, `InvalidStatusTransition` for a disallowed status change.
    #[instrument(skip(self, ctx, update), fields(claim_id = %id))]
    pub async fn update(&self, ctx: &Context, id: ClaimId, update: ClaimUpdate) -> Result<Claim, ClaimError> {
        let mut claim = self.claims.get_by_id(ctx, id).await?;
        let from = claim.status;
        update.apply(&mut claim)?;
        let claim = self.claims.update(ctx, &claim).await?;

        if claim.status != from {
            info!(from = %from, to = %claim.status, "Claim status changed");
            publish(
                self.publisher.as_ref(),
                ctx,
                DomainEvent::new(
                    claim.id,
                    EventPayload::ClaimStatusChanged {
                        claim_id: claim.id,
                        from: from.to_string(),
                        to: claim.status.to_string(),
                        reason: claim.denial_reason.clone(),
                    },
                ),
            )
            .await;
        }
        Ok(claim)
    }

    #[instrument(skip(self, ctx), fields(claim_id = %id))]
    pub async fn delete(&self, ctx: &Context, id: ClaimId) -> Result<(), ClaimError> {
        self.claims.soft_delete(ctx, id).await?;
        info!("Claim deleted");
        Ok(())
    }
}
