//! Customer repository port
//!
//! Services depend on [`CustomerRepository`]; `infra_db` provides the
//! PostgreSQL adapter and [`mock::InMemoryCustomerRepository`] backs the
//! tests.
//!
//! ```rust,ignore
//! pub struct CustomerService {
//!     customers: Arc<dyn CustomerRepository>,
//! }
//! ```

use async_trait::async_trait;

use core_kernel::{Context, CustomerId, DomainPort, HealthCheckable, PortError};

use crate::customer::{Customer, CustomerStatus, CustomerTier, KycStatus};

/// Filter for customer listings; unset fields match everything
#[derive(Debug, Clone, Default)]
pub struct CustomerFilter {
    pub email: Option<String>,
    pub status: Option<CustomerStatus>,
    pub kyc_status: Option<KycStatus>,
    pub customer_tier: Option<CustomerTier>,
}

impl CustomerFilter {
    pub fn matches(&self, customer: &Customer) -> bool {
        self.email.as_ref().map_or(true, |e| customer.email.eq_ignore_ascii_case(e))
            && self.status.map_or(true, |s| customer.status == s)
            && self.kyc_status.map_or(true, |k| customer.kyc_status == k)
            && self.customer_tier.map_or(true, |t| customer.customer_tier == t)
    }
}

/// Persistence port for customers
///
/// Soft-deleted customers are invisible to every method.
#[async_trait]
pub trait CustomerRepository: DomainPort + HealthCheckable {
    /// Inserts a customer; a duplicate email is a `Conflict`
    async fn create(&self, ctx: &Context, customer: &Customer) -> Result<Customer, PortError>;

    async fn get_by_id(&self, ctx: &Context, id: CustomerId) -> Result<Customer, PortError>;

    /// Case-insensitive lookup by email
    async fn get_by_email(&self, ctx: &Context, email: &str) -> Result<Customer, PortError>;

    /// Customers matching `filter`, oldest first
    async fn list(
        &self,
        ctx: &Context,
        filter: &CustomerFilter,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Customer>, PortError>;

    async fn count(&self, ctx: &Context, filter: &CustomerFilter) -> Result<u64, PortError>;

    async fn update(&self, ctx: &Context, customer: &Customer) -> Result<Customer, PortError>;

    async fn soft_delete(&self, ctx: &Context, id: CustomerId) -> Result<(), PortError>;
}

/// In-memory adapter for tests
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use core_kernel::memory::InMemoryTable;
    use core_kernel::HealthCheckResult;

    pub struct InMemoryCustomerRepository {
        table: InMemoryTable<CustomerId, Customer>,
    }

    impl InMemoryCustomerRepository {
        pub fn new() -> Self {
            Self {
                table: InMemoryTable::new("Customer"),
            }
        }

        /// Pre-populates the repository
        pub async fn with_customers(customers: Vec<Customer>) -> Self {
            let repo = Self::new();
            let ctx = Context::background();
            for customer in customers {
                let _ = repo.create(&ctx, &customer).await;
            }
            repo
        }
    }

    impl Default for InMemoryCustomerRepository {
        fn default() -> Self {
            Self::new()
        }
    }

    impl DomainPort for InMemoryCustomerRepository {}

    #[async_trait]
    impl HealthCheckable for InMemoryCustomerRepository {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult::healthy("memory-customers", 0)
        }
    }

    #[async_trait]
    impl CustomerRepository for InMemoryCustomerRepository {
        async fn create(&self, ctx: &Context, customer: &Customer) -> Result<Customer, PortError> {
            let email = customer.email.clone();
            self.table
                .insert(ctx, customer.id, customer.clone(), |c| c.email.eq_ignore_ascii_case(&email))
                .await
        }

        async fn get_by_id(&self, ctx: &Context, id: CustomerId) -> Result<Customer, PortError> {
            self.table.get(ctx, &id).await
        }

        async fn get_by_email(&self, ctx: &Context, email: &str) -> Result<Customer, PortError> {
            self.table
                .find(ctx, |c| c.email.eq_ignore_ascii_case(email))
                .await?
                .ok_or_else(|| PortError::not_found("Customer", email))
        }

        async fn list(
            &self,
            ctx: &Context,
            filter: &CustomerFilter,
            limit: u32,
            offset: u32,
        ) -> Result<Vec<Customer>, PortError> {
            self.table.page(ctx, |c| filter.matches(c), limit, offset).await
        }

        async fn count(&self, ctx: &Context, filter: &CustomerFilter) -> Result<u64, PortError> {
            self.table.count(ctx, |c| filter.matches(c)).await
        }

        async fn update(&self, ctx: &Context, customer: &Customer) -> Result<Customer, PortError> {
            let id = customer.id;
            let email = customer.email.clone();
            let clash = self
                .table
                .find(ctx, |c| c.id != id && c.email.eq_ignore_ascii_case(&email))
                .await?;
            if clash.is_some() {
                return Err(PortError::conflict(format!("email {} already registered", email)));
            }
            self.table.replace(ctx, &id, customer.clone()).await
        }

        async fn soft_delete(&self, ctx: &Context, id: CustomerId) -> Result<(), PortError> {
            self.table.soft_delete(ctx, &id).await
        }
    }
}
