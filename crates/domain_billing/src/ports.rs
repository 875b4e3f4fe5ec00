//! Payment repository port

use async_trait::async_trait;

use core_kernel::{ClaimId, Context, CustomerId, DomainPort, HealthCheckable, PaymentId, PolicyId, PortError};

use crate::payment::{Payment, PaymentStatus};

/// Filter for payment listings; unset fields match everything
#[derive(Debug, Clone, Default)]
pub struct PaymentFilter {
    pub user_id: Option<CustomerId>,
    pub policy_id: Option<PolicyId>,
    pub claim_id: Option<ClaimId>,
    pub status: Option<PaymentStatus>,
}

impl PaymentFilter {
    pub fn matches(&self, payment: &Payment) -> bool {
        self.user_id.map_or(true, |u| payment.user_id == u)
            && self.policy_id.map_or(true, |p| payment.policy_id == Some(p))
            && self.claim_id.map_or(true, |c| payment.claim_id == Some(c))
            && self.status.map_or(true, |s| payment.status == s)
    }
}

/// Persistence port for payments
#[async_trait]
pub trait PaymentRepository: DomainPort + HealthCheckable {
    async fn create(&self, ctx: &Context, payment: &Payment) -> Result<Payment, PortError>;

    async fn get_by_id(&self, ctx: &Context, id: PaymentId) -> Result<Payment, PortError>;

    /// Oldest first
    async fn list(
        &self,
        ctx: &Context,
        filter: &PaymentFilter,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Payment>, PortError>;

    async fn count(&self, ctx: &Context, filter: &PaymentFilter) -> Result<u64, PortError>;

    async fn update(&self, ctx: &Context, payment: &Payment) -> Result<Payment, PortError>;
}

#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use core_kernel::memory::InMemoryTable;
    use core_kernel::HealthCheckResult;

    pub struct InMemoryPaymentRepository {
        table: InMemoryTable<PaymentId, Payment>,
    }

    impl InMemoryPaymentRepository {
        pub fn new() -> Self {
            Self {
                table: InMemoryTable::new("Payment"),
            }
        }

        /// Every stored payment regardless of filter
        pub async fn all(&self) -> Vec<Payment> {
            self.table
                .filter(&Context::background(), |_| true)
                .await
                .unwrap_or_default()
        }
    }

    impl Default for InMemoryPaymentRepository {
        fn default() -> Self {
            Self::new()
        }
    }

    impl DomainPort for InMemoryPaymentRepository {}

    #[async_trait]
    impl HealthCheckable for InMemoryPaymentRepository {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult::healthy("memory-payments", 0)
        }
    }

    #[async_trait]
    impl PaymentRepository for InMemoryPaymentRepository {
        async fn create(&self, ctx: &Context, payment: &Payment) -> Result<Payment, PortError> {
            self.table.insert(ctx, payment.id, payment.clone(), |_| false).await
        }

        async fn get_by_id(&self, ctx: &Context, id: PaymentId) -> Result<Payment, PortError> {
            self.table.get(ctx, &id).await
        }

        async fn list(
            &self,
            ctx: &Context,
            filter: &PaymentFilter,
            limit: u32,
            offset: u32,
        ) -> Result<Vec<Payment>, PortError> {
            self.table.page(ctx, |p| filter.matches(p), limit, offset).await
        }

        async fn count(&self, ctx: &Context, filter: &PaymentFilter) -> Result<u64, PortError> {
            self.table.count(ctx, |p| filter.matches(p)).await
        }

        async fn update(&self, ctx: &Context, payment: &Payment) -> Result<Payment, PortError> {
            self.table.replace(ctx, &payment.id, payment.clone()).await
        }
    }
}
