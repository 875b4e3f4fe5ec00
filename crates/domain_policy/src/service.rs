//! Product, quote and policy services
//!
//! Quotes and policies are read-repaired: a pending quote past
//! `valid_until` or an active policy past `expiration_date` is persisted as
//! expired the first time it is read.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};

use core_kernel::{
    Context, DomainEvent, EventPayload, EventPublisher, Page, PageRequest, PolicyId, ProductId, QuoteId,
};

use crate::error::PolicyError;
use crate::policy::{NewPolicy, Policy, PolicyUpdate};
use crate::ports::{
    PolicyFilter, PolicyRepository, ProductFilter, ProductRepository, QuoteFilter, QuoteRepository,
};
use crate::pricing::{PricingEngine, PricingRequest};
use crate::product::{NewProduct, Product, ProductUpdate};
use crate::quote::{Quote, QuoteStatus, QuoteUpdate};

async fn publish(publisher: &dyn EventPublisher, ctx: &Context, event: DomainEvent) {
    let event_type = event.event_type();
    if let Err(e) = publisher.publish(ctx, event).await {
        warn!(event_type, error = %e, "Failed to publish event");
    }
}

// ============================================================================
// Products
// ============================================================================

pub struct ProductService {
    products: Arc<dyn ProductRepository>,
}

impl ProductService {
    pub fn new(products: Arc<dyn ProductRepository>) -> Self {
        Self { products }
    }

    #[instrument(skip(self, ctx, input), fields(name = %input.name))]
    pub async fn create(&self, ctx: &Context, input: NewProduct) -> Result<Product, PolicyError> {
        let product = self.products.create(ctx, &input.into_product()?).await?;
        info!(product_id = %product.id, "Product created");
        Ok(product)
    }

    pub async fn get(&self, ctx: &Context, id: ProductId) -> Result<Product, PolicyError> {
        Ok(self.products.get_by_id(ctx, id).await?)
    }

    pub async fn list(&self, ctx: &Context, filter: &ProductFilter, page: PageRequest) -> Result<Page<Product>, PolicyError> {
        let items = self.products.list(ctx, filter, page.limit(), page.offset()).await?;
        let total = self.products.count(ctx, filter).await?;
        Ok(Page::new(items, total, page))
    }

    #[instrument(skip(self, ctx, update), fields(product_id = %id))]
    pub async fn update(&self, ctx: &Context, id: ProductId, update: ProductUpdate) -> Result<Product, PolicyError> {
        let mut product = self.products.get_by_id(ctx, id).await?;
        update.apply(&mut product)?;
        Ok(self.products.update(ctx, &product).await?)
    }

    #[instrument(skip(self, ctx), fields(product_id = %id))]
    pub async fn delete(&self, ctx: &Context, id: ProductId) -> Result<(), PolicyError> {
        self.products.soft_delete(ctx, id).await?;
        info!("Product deleted");
        Ok(())
    }
}

// ============================================================================
// Quotes
// ============================================================================

pub struct QuoteService {
    quotes: Arc<dyn QuoteRepository>,
    products: Arc<dyn ProductRepository>,
    pricing: Arc<PricingEngine>,
    publisher: Arc<dyn EventPublisher>,
}

impl QuoteService {
    pub fn new(
        quotes: Arc<dyn QuoteRepository>,
        products: Arc<dyn ProductRepository>,
        pricing: Arc<PricingEngine>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            quotes,
            products,
            pricing,
            publisher,
        }
    }

    /// Prices the request and stores the result as a pending quote
    ///
    /// # Errors
    ///
    /// `Validation` when the product is not on sale or the request is
    /// malformed; `NotFound` for an unknown product or customer.
    #[instrument(skip(self, ctx, request), fields(product_id = %request.product_id, user_id = %request.user_id))]
    pub async fn create(&self, ctx: &Context, request: PricingRequest) -> Result<Quote, PolicyError> {
        let now = Utc::now();
        let product = self.products.get_by_id(ctx, request.product_id).await?;
        if !product.is_available(now) {
            return Err(PolicyError::validation(format!("product {} is not available", product.name)));
        }
        let priced = self.pricing.calculate_premium(ctx, &request).await?;

        let mut quote = Quote::new(
            request.product_id,
            request.user_id,
            request.coverage_amount,
            priced.base_premium,
            priced.final_premium,
            priced.currency,
            priced.valid_until,
            request.effective_date,
            request.expiration_date,
        );
        quote.payment_frequency = request.payment_frequency;
        quote.risk_factors = priced.contributing_factors();
        quote.tax = priced.breakdown.tax_adjustment;
        quote.discount = priced.breakdown.discount_adjustment.abs();

        let quote = self.quotes.create(ctx, &quote).await?;
        info!(quote_id = %quote.id, final_price = %quote.final_price, "Quote created");

        publish(
            self.publisher.as_ref(),
            ctx,
            DomainEvent::new(
                quote.id,
                EventPayload::QuoteCreated {
                    quote_id: quote.id,
                    quote_number: quote.quote_number.clone(),
                    user_id: quote.user_id,
                    product_id: quote.product_id,
                    final_price: quote.final_price,
                    currency: quote.currency,
                },
            ),
        )
        .await;
        Ok(quote)
    }

    pub async fn get(&self, ctx: &Context, id: QuoteId) -> Result<Quote, PolicyError> {
        let quote = self.quotes.get_by_id(ctx, id).await?;
        self.repair(ctx, quote).await
    }

    pub async fn get_by_number(&self, ctx: &Context, number: &str) -> Result<Quote, PolicyError> {
        let quote = self.quotes.get_by_number(ctx, number).await?;
        self.repair(ctx, quote).await
    }

    pub async fn list(&self, ctx: &Context, filter: &QuoteFilter, page: PageRequest) -> Result<Page<Quote>, PolicyError> {
        let stored = self.quotes.list(ctx, filter, page.limit(), page.offset()).await?;
        let total = self.quotes.count(ctx, filter).await?;
        let mut items = Vec::with_capacity(stored.len());
        for quote in stored {
            items.push(self.repair(ctx, quote).await?);
        }
        Ok(Page::new(items, total, page))
    }

    #[instrument(skip(self, ctx, update), fields(quote_id = %id))]
    pub async fn update(&self, ctx: &Context, id: QuoteId, update: QuoteUpdate) -> Result<Quote, PolicyError> {
        let mut quote = self.get(ctx, id).await?;
        update.apply(&mut quote)?;
        Ok(self.quotes.update(ctx, &quote).await?)
    }

    /// Forces a pending quote to `expired`
    #[instrument(skip(self, ctx), fields(quote_id = %id))]
    pub async fn expire(&self, ctx: &Context, id: QuoteId) -> Result<Quote, PolicyError> {
        let mut quote = self.get(ctx, id).await?;
        if quote.status != QuoteStatus::Pending {
            return Err(PolicyError::transition(quote.status, QuoteStatus::Expired));
        }
        quote.transition_to(QuoteStatus::Expired)?;
        let quote = self.quotes.update(ctx, &quote).await?;
        info!("Quote expired");
        Ok(quote)
    }

    #[instrument(skip(self, ctx), fields(quote_id = %id))]
    pub async fn delete(&self, ctx: &Context, id: QuoteId) -> Result<(), PolicyError> {
        self.quotes.soft_delete(ctx, id).await?;
        Ok(())
    }

    async fn repair(&self, ctx: &Context, mut quote: Quote) -> Result<Quote, PolicyError> {
        if quote.expire_if_stale(Utc::now()) {
            info!(quote_id = %quote.id, "Stale quote expired on read");
            return Ok(self.quotes.update(ctx, &quote).await?);
        }
        Ok(quote)
    }
}

// ============================================================================
// Policies
// ============================================================================

pub struct PolicyService {
    policies: Arc<dyn PolicyRepository>,
    products: Arc<dyn ProductRepository>,
    quotes: Arc<dyn QuoteRepository>,
    publisher: Arc<dyn EventPublisher>,
}

impl PolicyService {
    pub fn new(
        policies: Arc<dyn PolicyRepository>,
        products: Arc<dyn ProductRepository>,
        quotes: Arc<dyn QuoteRepository>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            policies,
            products,
            quotes,
            publisher,
        }
    }

    /// Issues a policy; a referenced quote is consumed
    #[instrument(skip(self, ctx, input), fields(product_id = %input.product_id, user_id = %input.user_id))]
    pub async fn create(&self, ctx: &Context, input: NewPolicy) -> Result<Policy, PolicyError> {
        self.products.get_by_id(ctx, input.product_id).await?;
        let policy = input.into_policy()?;
        let consumed = match policy.quote_id {
            Some(quote_id) => {
                let mut quote = self.quotes.get_by_id(ctx, quote_id).await?;
                if quote.user_id != policy.user_id || quote.product_id != policy.product_id {
                    return Err(PolicyError::validation("quote belongs to a different customer or product"));
                }
                quote.mark_used(Utc::now())?;
                Some(quote)
            }
            None => None,
        };

        let policy = self.policies.create(ctx, &policy).await?;
        if let Some(quote) = consumed {
            if let Err(e) = self.quotes.update(ctx, &quote).await {
                warn!(quote_id = %quote.id, error = %e, "Quote not consumed; withdrawing policy");
                if let Err(undo) = self.policies.soft_delete(&Context::background(), policy.id).await {
                    warn!(policy_id = %policy.id, error = %undo, "Failed to withdraw policy");
                }
                return Err(e.into());
            }
        }
        info!(policy_id = %policy.id, policy_number = %policy.policy_number, "Policy created");

        publish(
            self.publisher.as_ref(),
            ctx,
            DomainEvent::new(
                policy.id,
                EventPayload::PolicyCreated {
                    policy_id: policy.id,
                    policy_number: policy.policy_number.clone(),
                    user_id: policy.user_id,
                    product_id: policy.product_id,
                    premium: policy.premium,
                    currency: policy.currency,
                    renewed_from: policy.renewed_from,
                },
            ),
        )
        .await;
        Ok(policy)
    }

    pub async fn get(&self, ctx: &Context, id: PolicyId) -> Result<Policy, PolicyError> {
        let policy = self.policies.get_by_id(ctx, id).await?;
        self.repair(ctx, policy).await
    }

    pub async fn get_by_number(&self, ctx: &Context, number: &str) -> Result<Policy, PolicyError> {
        let policy = self.policies.get_by_number(ctx, number).await?;
        self.repair(ctx, policy).await
    }

    pub async fn list(&self, ctx: &Context, filter: &PolicyFilter, page: PageRequest) -> Result<Page<Policy>, PolicyError> {
        let stored = self.policies.list(ctx, filter, page.limit(), page.offset()).await?;
        let total = self.policies.count(ctx, filter).await?;
        let mut items = Vec::with_capacity(stored.len());
        for policy in stored {
            items.push(self.repair(ctx, policy).await?);
        }
        Ok(Page::new(items, total, page))
    }

    /// Applies a partial update
    ///
    /// # Errors
    ///
    /// `Immutable` when the update tries to change `product_id`, `user_id`
    /// or `policy_number`.
    #[instrument(skip(self, ctx, update), fields(policy_id = %id))]
    pub async fn update(&self, ctx: &Context, id: PolicyId, update: PolicyUpdate) -> Result<Policy, PolicyError> {
        let mut policy = self.get(ctx, id).await?;
        update.apply(&mut policy)?;
        Ok(self.policies.update(ctx, &policy).await?)
    }

    #[instrument(skip(self, ctx), fields(policy_id = %id))]
    pub async fn delete(&self, ctx: &Context, id: PolicyId) -> Result<(), PolicyError> {
        self.policies.soft_delete(ctx, id).await?;
        info!("Policy deleted");
        Ok(())
    }

    async fn repair(&self, ctx: &Context, mut policy: Policy) -> Result<Policy, PolicyError> {
        if !policy.expire_if_elapsed(Utc::now()) {
            return Ok(policy);
        }
        let policy = self.policies.update(ctx, &policy).await?;
        info!(policy_id = %policy.id, "Elapsed policy expired on read");
        publish(
            self.publisher.as_ref(),
            ctx,
            DomainEvent::new(
                policy.id,
                EventPayload::PolicyExpired {
                    policy_id: policy.id,
                    user_id: policy.user_id,
                    expiration_date: policy.expiration_date,
                },
            ),
        )
        .await;
        Ok(policy)
    }
}
