//! Repository ports for products, quotes and policies
//!
//! Besides the usual CRUD surface, [`PolicyRepository`] carries the date
//! predicates the lifecycle sweeps run on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use core_kernel::{
    Context, Currency, CustomerId, DomainPort, HealthCheckable, PartnerId, PolicyId, PortError,
    ProductId, QuoteId,
};

use crate::policy::{Policy, PolicyStatus};
use crate::product::{Product, ProductStatus};
use crate::quote::{Quote, QuoteStatus};

#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub partner_id: Option<PartnerId>,
    pub category: Option<String>,
    pub status: Option<ProductStatus>,
    pub currency: Option<Currency>,
}

impl ProductFilter {
    pub fn matches(&self, product: &Product) -> bool {
        self.partner_id.map_or(true, |p| product.partner_id == p)
            && self.category.as_ref().map_or(true, |c| product.category.eq_ignore_ascii_case(c))
            && self.status.map_or(true, |s| product.status == s)
            && self.currency.map_or(true, |c| product.currency == c)
    }
}

#[derive(Debug, Clone, Default)]
pub struct QuoteFilter {
    pub user_id: Option<CustomerId>,
    pub product_id: Option<ProductId>,
    pub status: Option<QuoteStatus>,
    pub currency: Option<Currency>,
}

impl QuoteFilter {
    pub fn matches(&self, quote: &Quote) -> bool {
        self.user_id.map_or(true, |u| quote.user_id == u)
            && self.product_id.map_or(true, |p| quote.product_id == p)
            && self.status.map_or(true, |s| quote.status == s)
            && self.currency.map_or(true, |c| quote.currency == c)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PolicyFilter {
    pub user_id: Option<CustomerId>,
    pub product_id: Option<ProductId>,
    pub status: Option<PolicyStatus>,
    pub currency: Option<Currency>,
}

impl PolicyFilter {
    pub fn matches(&self, policy: &Policy) -> bool {
        self.user_id.map_or(true, |u| policy.user_id == u)
            && self.product_id.map_or(true, |p| policy.product_id == p)
            && self.status.map_or(true, |s| policy.status == s)
            && self.currency.map_or(true, |c| policy.currency == c)
    }
}

#[async_trait]
pub trait ProductRepository: DomainPort + HealthCheckable {
    async fn create(&self, ctx: &Context, product: &Product) -> Result<Product, PortError>;
    async fn get_by_id(&self, ctx: &Context, id: ProductId) -> Result<Product, PortError>;
    async fn list(&self, ctx: &Context, filter: &ProductFilter, limit: u32, offset: u32) -> Result<Vec<Product>, PortError>;
    async fn count(&self, ctx: &Context, filter: &ProductFilter) -> Result<u64, PortError>;
    async fn update(&self, ctx: &Context, product: &Product) -> Result<Product, PortError>;
    async fn soft_delete(&self, ctx: &Context, id: ProductId) -> Result<(), PortError>;
}

#[async_trait]
pub trait QuoteRepository: DomainPort + HealthCheckable {
    /// A duplicate `quote_number` is a `Conflict`
    async fn create(&self, ctx: &Context, quote: &Quote) -> Result<Quote, PortError>;
    async fn get_by_id(&self, ctx: &Context, id: QuoteId) -> Result<Quote, PortError>;
    async fn get_by_number(&self, ctx: &Context, quote_number: &str) -> Result<Quote, PortError>;
    async fn list(&self, ctx: &Context, filter: &QuoteFilter, limit: u32, offset: u32) -> Result<Vec<Quote>, PortError>;
    async fn count(&self, ctx: &Context, filter: &QuoteFilter) -> Result<u64, PortError>;
    async fn update(&self, ctx: &Context, quote: &Quote) -> Result<Quote, PortError>;
    async fn soft_delete(&self, ctx: &Context, id: QuoteId) -> Result<(), PortError>;
}

/// Persistence port for policies
///
/// Updates never change `product_id`, `user_id` or `policy_number`; the
/// PostgreSQL adapter leaves those columns out of its `UPDATE`.
#[async_trait]
pub trait PolicyRepository: DomainPort + HealthCheckable {
    /// A duplicate `policy_number` is a `Conflict`
    async fn create(&self, ctx: &Context, policy: &Policy) -> Result<Policy, PortError>;
    async fn get_by_id(&self, ctx: &Context, id: PolicyId) -> Result<Policy, PortError>;
    async fn get_by_number(&self, ctx: &Context, policy_number: &str) -> Result<Policy, PortError>;
    async fn list(&self, ctx: &Context, filter: &PolicyFilter, limit: u32, offset: u32) -> Result<Vec<Policy>, PortError>;
    async fn count(&self, ctx: &Context, filter: &PolicyFilter) -> Result<u64, PortError>;
    async fn update(&self, ctx: &Context, policy: &Policy) -> Result<Policy, PortError>;
    async fn soft_delete(&self, ctx: &Context, id: PolicyId) -> Result<(), PortError>;

    /// Active policies whose `expiration_date` is before `as_of`
    async fn find_expired_active(&self, ctx: &Context, as_of: DateTime<Utc>) -> Result<Vec<Policy>, PortError>;

    /// Pending policies whose `grace_period_end` is before `as_of`
    async fn find_grace_period_elapsed(&self, ctx: &Context, as_of: DateTime<Utc>) -> Result<Vec<Policy>, PortError>;

    /// Active policies expiring within `[from, to]`, soonest first
    async fn find_expiring_between(
        &self,
        ctx: &Context,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Policy>, PortError>;

    /// Active, auto-renewing, not yet renewed policies expiring within `window_days` of `as_of`
    async fn find_auto_renewal_candidates(
        &self,
        ctx: &Context,
        as_of: DateTime<Utc>,
        window_days: u32,
    ) -> Result<Vec<Policy>, PortError>;
}

#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use chrono::Duration;
    use core_kernel::memory::InMemoryTable;
    use core_kernel::HealthCheckResult;

    pub struct InMemoryProductRepository {
        table: InMemoryTable<ProductId, Product>,
    }

    impl InMemoryProductRepository {
        pub fn new() -> Self {
            Self {
                table: InMemoryTable::new("Product"),
            }
        }
    }

    impl Default for InMemoryProductRepository {
        fn default() -> Self {
            Self::new()
        }
    }

    impl DomainPort for InMemoryProductRepository {}

    #[async_trait]
    impl HealthCheckable for InMemoryProductRepository {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult::healthy("memory-products", 0)
        }
    }

    #[async_trait]
    impl ProductRepository for InMemoryProductRepository {
        async fn create(&self, ctx: &Context, product: &Product) -> Result<Product, PortError> {
            self.table.insert(ctx, product.id, product.clone(), |_| false).await
        }

        async fn get_by_id(&self, ctx: &Context, id: ProductId) -> Result<Product, PortError> {
            self.table.get(ctx, &id).await
        }

        async fn list(&self, ctx: &Context, filter: &ProductFilter, limit: u32, offset: u32) -> Result<Vec<Product>, PortError> {
            self.table.page(ctx, |p| filter.matches(p), limit, offset).await
        }

        async fn count(&self, ctx: &Context, filter: &ProductFilter) -> Result<u64, PortError> {
            self.table.count(ctx, |p| filter.matches(p)).await
        }

        async fn update(&self, ctx: &Context, product: &Product) -> Result<Product, PortError> {
            self.table.replace(ctx, &product.id, product.clone()).await
        }

        async fn soft_delete(&self, ctx: &Context, id: ProductId) -> Result<(), PortError> {
            self.table.soft_delete(ctx, &id).await
        }
    }

    pub struct InMemoryQuoteRepository {
        table: InMemoryTable<QuoteId, Quote>,
    }

    impl InMemoryQuoteRepository {
        pub fn new() -> Self {
            Self {
                table: InMemoryTable::new("Quote"),
            }
        }
    }

    impl Default for InMemoryQuoteRepository {
        fn default() -> Self {
            Self::new()
        }
    }

    impl DomainPort for InMemoryQuoteRepository {}

    #[async_trait]
    impl HealthCheckable for InMemoryQuoteRepository {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult::healthy("memory-quotes", 0)
        }
    }

    #[async_trait]
    impl QuoteRepository for InMemoryQuoteRepository {
        async fn create(&self, ctx: &Context, quote: &Quote) -> Result<Quote, PortError> {
            let number = quote.quote_number.clone();
            self.table
                .insert(ctx, quote.id, quote.clone(), |q| q.quote_number == number)
                .await
        }

        async fn get_by_id(&self, ctx: &Context, id: QuoteId) -> Result<Quote, PortError> {
            self.table.get(ctx, &id).await
        }

        async fn get_by_number(&self, ctx: &Context, quote_number: &str) -> Result<Quote, PortError> {
            self.table
                .find(ctx, |q| q.quote_number == quote_number)
                .await?
                .ok_or_else(|| PortError::not_found("Quote", quote_number))
        }

        async fn list(&self, ctx: &Context, filter: &QuoteFilter, limit: u32, offset: u32) -> Result<Vec<Quote>, PortError> {
            self.table.page(ctx, |q| filter.matches(q), limit, offset).await
        }

        async fn count(&self, ctx: &Context, filter: &QuoteFilter) -> Result<u64, PortError> {
            self.table.count(ctx, |q| filter.matches(q)).await
        }

        async fn update(&self, ctx: &Context, quote: &Quote) -> Result<Quote, PortError> {
            self.table.replace(ctx, &quote.id, quote.clone()).await
        }

        async fn soft_delete(&self, ctx: &Context, id: QuoteId) -> Result<(), PortError> {
            self.table.soft_delete(ctx, &id).await
        }
    }

    pub struct InMemoryPolicyRepository {
        table: InMemoryTable<PolicyId, Policy>,
    }

    impl InMemoryPolicyRepository {
        pub fn new() -> Self {
            Self {
                table: InMemoryTable::new("Policy"),
            }
        }

        /// Stores policies as given, bypassing service validation
        pub async fn with_policies(policies: Vec<Policy>) -> Self {
            let repo = Self::new();
            let ctx = Context::background();
            for policy in policies {
                let _ = repo.create(&ctx, &policy).await;
            }
            repo
        }
    }

    impl Default for InMemoryPolicyRepository {
        fn default() -> Self {
            Self::new()
        }
    }

    impl DomainPort for InMemoryPolicyRepository {}

    #[async_trait]
    impl HealthCheckable for InMemoryPolicyRepository {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult::healthy("memory-policies", 0)
        }
    }

    #[async_trait]
    impl PolicyRepository for InMemoryPolicyRepository {
        async fn create(&self, ctx: &Context, policy: &Policy) -> Result<Policy, PortError> {
            let number = policy.policy_number.clone();
            self.table
                .insert(ctx, policy.id, policy.clone(), |p| p.policy_number == number)
                .await
        }

        async fn get_by_id(&self, ctx: &Context, id: PolicyId) -> Result<Policy, PortError> {
            self.table.get(ctx, &id).await
        }

        async fn get_by_number(&self, ctx: &Context, policy_number: &str) -> Result<Policy, PortError> {
            self.table
                .find(ctx, |p| p.policy_number == policy_number)
                .await?
                .ok_or_else(|| PortError::not_found("Policy", policy_number))
        }

        async fn list(&self, ctx: &Context, filter: &PolicyFilter, limit: u32, offset: u32) -> Result<Vec<Policy>, PortError> {
            self.table.page(ctx, |p| filter.matches(p), limit, offset).await
        }

        async fn count(&self, ctx: &Context, filter: &PolicyFilter) -> Result<u64, PortError> {
            self.table.count(ctx, |p| filter.matches(p)).await
        }

        async fn update(&self, ctx: &Context, policy: &Policy) -> Result<Policy, PortError> {
            let stored = self.table.get(ctx, &policy.id).await?;
            let mut next = policy.clone();
            next.product_id = stored.product_id;
            next.user_id = stored.user_id;
            next.policy_number = stored.policy_number;
            self.table.replace(ctx, &policy.id, next).await
        }

        async fn soft_delete(&self, ctx: &Context, id: PolicyId) -> Result<(), PortError> {
            self.table.soft_delete(ctx, &id).await
        }

        async fn find_expired_active(&self, ctx: &Context, as_of: DateTime<Utc>) -> Result<Vec<Policy>, PortError> {
            self.table
                .filter(ctx, |p| p.status == PolicyStatus::Active && p.expiration_date < as_of)
                .await
        }

        async fn find_grace_period_elapsed(&self, ctx: &Context, as_of: DateTime<Utc>) -> Result<Vec<Policy>, PortError> {
            self.table
                .filter(ctx, |p| {
                    p.status == PolicyStatus::Pending && p.grace_period_end.is_some_and(|end| end < as_of)
                })
                .await
        }

        async fn find_expiring_between(
            &self,
            ctx: &Context,
            from: DateTime<Utc>,
            to: DateTime<Utc>,
        ) -> Result<Vec<Policy>, PortError> {
            let mut found = self
                .table
                .filter(ctx, |p| {
                    p.status == PolicyStatus::Active && p.expiration_date >= from && p.expiration_date <= to
                })
                .await?;
            found.sort_by_key(|p| p.expiration_date);
            Ok(found)
        }

        async fn find_auto_renewal_candidates(
            &self,
            ctx: &Context,
            as_of: DateTime<Utc>,
            window_days: u32,
        ) -> Result<Vec<Policy>, PortError> {
            let horizon = as_of + Duration::days(i64::from(window_days));
            self.table
                .filter(ctx, |p| {
                    p.status == PolicyStatus::Active
                        && p.auto_renew
                        && p.renewal_date.is_none()
                        && p.expiration_date >= as_of
                        && p.expiration_date <= horizon
                })
                .await
        }
    }
}
