//! Repository ports for claims and their workflows

use async_trait::async_trait;

use core_kernel::{ClaimId, Context, Currency, CustomerId, DomainPort, HealthCheckable, PolicyId, PortError};

use crate::claim::{Claim, ClaimStatus};
use crate::workflow::Workflow;

#[derive(Debug, Clone, Default)]
pub struct ClaimFilter {
    pub user_id: Option<CustomerId>,
    pub policy_id: Option<PolicyId>,
    pub status: Option<ClaimStatus>,
    pub currency: Option<Currency>,
}

impl ClaimFilter {
    pub fn matches(&self, claim: &Claim) -> bool {
        self.user_id.map_or(true, |u| claim.user_id == u)
            && self.policy_id.map_or(true, |p| claim.policy_id == p)
            && self.status.map_or(true, |s| claim.status == s)
            && self.currency.map_or(true, |c| claim.currency == c)
    }
}

/// Persistence port for claims
///
/// Updates never change `policy_id`, `user_id`, `claim_number`,
/// `incident_date` or `reported_date`.
#[async_trait]
pub trait ClaimRepository: DomainPort + HealthCheckable {
    /// A duplicate `claim_number` is a `Conflict`
    async fn create(&self, ctx: &Context, claim: &Claim) -> Result<Claim, PortError>;
    async fn get_by_id(&self, ctx: &Context, id: ClaimId) -> Result<Claim, PortError>;
    async fn get_by_number(&self, ctx: &Context, claim_number: &str) -> Result<Claim, PortError>;
    async fn list(&self, ctx: &Context, filter: &ClaimFilter, limit: u32, offset: u32) -> Result<Vec<Claim>, PortError>;
    async fn count(&self, ctx: &Context, filter: &ClaimFilter) -> Result<u64, PortError>;
    async fn update(&self, ctx: &Context, claim: &Claim) -> Result<Claim, PortError>;
    async fn soft_delete(&self, ctx: &Context, id: ClaimId) -> Result<(), PortError>;
}

/// Persistence port for claim workflows, one per claim
#[async_trait]
pub trait WorkflowRepository: DomainPort + HealthCheckable {
    /// Inserts or replaces the workflow for its claim
    async fn save(&self, ctx: &Context, workflow: &Workflow) -> Result<Workflow, PortError>;
    async fn get_by_claim(&self, ctx: &Context, claim_id: ClaimId) -> Result<Workflow, PortError>;
}

#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use core_kernel::memory::InMemoryTable;
    use core_kernel::HealthCheckResult;

    pub struct InMemoryClaimRepository {
        table: InMemoryTable<ClaimId, Claim>,
    }

    impl InMemoryClaimRepository {
        pub fn new() -> Self {
            Self {
                table: InMemoryTable::new("Claim"),
            }
        }
    }

    impl Default for InMemoryClaimRepository {
        fn default() -> Self {
            Self::new()
        }
    }

    impl DomainPort for InMemoryClaimRepository {}

    #[async_trait]
    impl HealthCheckable for InMemoryClaimRepository {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult::healthy("memory-claims", 0)
        }
    }

    #[async_trait]
    impl ClaimRepository for InMemoryClaimRepository {
        async fn create(&self, ctx: &Context, claim: &Claim) -> Result<Claim, PortError> {
            let number = claim.claim_number.clone();
            self.table
                .insert(ctx, claim.id, claim.clone(), |c| c.claim_number == number)
                .await
        }

        async fn get_by_id(&self, ctx: &Context, id: ClaimId) -> Result<Claim, PortError> {
            self.table.get(ctx, &id).await
        }

        async fn get_by_number(&self, ctx: &Context, claim_number: &str) -> Result<Claim, PortError> {
            self.table
                .find(ctx, |c| c.claim_number == claim_number)
                .await?
                .ok_or_else(|| PortError::not_found("Claim", claim_number))
        }

        async fn list(&self, ctx: &Context, filter: &ClaimFilter, limit: u32, offset: u32) -> Result<Vec<Claim>, PortError> {
            self.table.page(ctx, |c| filter.matches(c), limit, offset).await
        }

        async fn count(&self, ctx: &Context, filter: &ClaimFilter) -> Result<u64, PortError> {
            self.table.count(ctx, |c| filter.matches(c)).await
        }

        async fn update(&self, ctx: &Context, claim: &Claim) -> Result<Claim, PortError> {
            let stored = self.table.get(ctx, &claim.id).await?;
            let mut next = claim.clone();
            next.policy_id = stored.policy_id;
            next.user_id = stored.user_id;
            next.claim_number = stored.claim_number;
            next.incident_date = stored.incident_date;
            next.reported_date = stored.reported_date;
            self.table.replace(ctx, &claim.id, next).await
        }

        async fn soft_delete(&self, ctx: &Context, id: ClaimId) -> Result<(), PortError> {
            self.table.soft_delete(ctx, &id).await
        }
    }

    pub struct InMemoryWorkflowRepository {
        table: InMemoryTable<ClaimId, Workflow>,
    }

    impl InMemoryWorkflowRepository {
        pub fn new() -> Self {
            Self {
                table: InMemoryTable::new("Workflow"),
            }
        }
    }

    impl Default for InMemoryWorkflowRepository {
        fn default() -> Self {
            Self::new()
        }
    }

    impl DomainPort for InMemoryWorkflowRepository {}

    #[async_trait]
    impl HealthCheckable for InMemoryWorkflowRepository {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult::healthy("memory-workflows", 0)
        }
    }

    #[async_trait]
    impl WorkflowRepository for InMemoryWorkflowRepository {
        async fn save(&self, ctx: &Context, workflow: &Workflow) -> Result<Workflow, PortError> {
            match self.table.replace(ctx, &workflow.claim_id, workflow.clone()).await {
                Err(e) if e.is_not_found() => {
                    self.table
                        .insert(ctx, workflow.claim_id, workflow.clone(), |_| false)
                        .await
                }
                other => other,
            }
        }

        async fn get_by_claim(&self, ctx: &Context, claim_id: ClaimId) -> Result<Workflow, PortError> {
            self.table.get(ctx, &claim_id).await
        }
    }
}
