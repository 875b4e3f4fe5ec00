//! PostgreSQL adapters for products, quotes and policies
//!
//! The policy adapter also answers the date predicates the lifecycle
//! sweeps run on; those queries lean on the `(status, expiration_date)`
//! index.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, instrument};
use uuid::Uuid;

use core_kernel::{
    Context, CustomerId, DomainPort, HealthCheckResult, HealthCheckable, PartnerId, PolicyId, PortError,
    ProductId, QuoteId,
};
use domain_policy::{
    Policy, PolicyFilter, PolicyRepository, PolicyStatus, Product, ProductFilter, ProductRepository, Quote,
    QuoteFilter, QuoteRepository,
};

use crate::error::{parse_column, run, run_one, DatabaseError};
use crate::pool::probe;

// ============================================================================
// Products
// ============================================================================

const PRODUCT_COLUMNS: &str = "id, partner_id, name, description, category, base_price, coverage_amount, \
    coverage_period_days, currency, status, effective_date, expiration_date, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    partner_id: Uuid,
    name: String,
    description: Option<String>,
    category: String,
    base_price: Decimal,
    coverage_amount: Decimal,
    coverage_period_days: i32,
    currency: String,
    status: String,
    effective_date: DateTime<Utc>,
    expiration_date: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = PortError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Product {
            id: ProductId::from_uuid(row.id),
            partner_id: PartnerId::from_uuid(row.partner_id),
            name: row.name,
            description: row.description,
            category: row.category,
            base_price: row.base_price,
            coverage_amount: row.coverage_amount,
            coverage_period_days: u32::try_from(row.coverage_period_days).map_err(|e| {
                PortError::from(DatabaseError::SerializationError(format!("coverage_period_days: {e}")))
            })?,
            currency: parse_column("currency", &row.currency)?,
            status: parse_column("status", &row.status)?,
            effective_date: row.effective_date,
            expiration_date: row.expiration_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn period_days(product: &Product) -> Result<i32, PortError> {
    i32::try_from(product.coverage_period_days)
        .map_err(|_| PortError::validation_field("coverage period too long", "coverage_period_days"))
}

fn push_product_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &ProductFilter) {
    if let Some(partner) = filter.partner_id {
        builder.push(" AND partner_id = ").push_bind(*partner.as_uuid());
    }
    if let Some(category) = &filter.category {
        builder.push(" AND lower(category) = lower(").push_bind(category.clone()).push(")");
    }
    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(currency) = filter.currency {
        builder.push(" AND currency = ").push_bind(currency.code());
    }
}

#[derive(Debug, Clone)]
pub struct PgProductRepository {
    pool: PgPool,
}

impl PgProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl DomainPort for PgProductRepository {}

#[async_trait]
impl HealthCheckable for PgProductRepository {
    async fn health_check(&self) -> HealthCheckResult {
        probe(&self.pool, "postgres-products").await
    }
}

#[async_trait]
impl ProductRepository for PgProductRepository {
    async fn create(&self, ctx: &Context, product: &Product) -> Result<Product, PortError> {
        let sql = format!(
            "INSERT INTO products ({PRODUCT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             RETURNING {PRODUCT_COLUMNS}"
        );
        run(
            ctx,
            sqlx::query_as::<_, ProductRow>(&sql)
                .bind(*product.id.as_uuid())
                .bind(*product.partner_id.as_uuid())
                .bind(&product.name)
                .bind(&product.description)
                .bind(&product.category)
                .bind(product.base_price)
                .bind(product.coverage_amount)
                .bind(period_days(product)?)
                .bind(product.currency.code())
                .bind(product.status.as_str())
                .bind(product.effective_date)
                .bind(product.expiration_date)
                .bind(product.created_at)
                .bind(product.updated_at)
                .fetch_one(&self.pool),
        )
        .await?
        .try_into()
    }

    async fn get_by_id(&self, ctx: &Context, id: ProductId) -> Result<Product, PortError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 AND deleted_at IS NULL");
        run_one(
            ctx,
            "Product",
            id,
            sqlx::query_as::<_, ProductRow>(&sql).bind(*id.as_uuid()).fetch_optional(&self.pool),
        )
        .await?
        .try_into()
    }

    async fn list(&self, ctx: &Context, filter: &ProductFilter, limit: u32, offset: u32) -> Result<Vec<Product>, PortError> {
        let mut builder = QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE deleted_at IS NULL"));
        push_product_filter(&mut builder, filter);
        builder
            .push(" ORDER BY created_at, id LIMIT ")
            .push_bind(i64::from(limit))
            .push(" OFFSET ")
            .push_bind(i64::from(offset));
        let rows = run(ctx, builder.build_query_as::<ProductRow>().fetch_all(&self.pool)).await?;
        rows.into_iter().map(Product::try_from).collect()
    }

    async fn count(&self, ctx: &Context, filter: &ProductFilter) -> Result<u64, PortError> {
        let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM products WHERE deleted_at IS NULL");
        push_product_filter(&mut builder, filter);
        let count: i64 = run(ctx, builder.build_query_scalar().fetch_one(&self.pool)).await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn update(&self, ctx: &Context, product: &Product) -> Result<Product, PortError> {
        let sql = format!(
            "UPDATE products SET name = $2, description = $3, category = $4, base_price = $5, \
             coverage_amount = $6, coverage_period_days = $7, currency = $8, status = $9, \
             effective_date = $10, expiration_date = $11, updated_at = $12 \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {PRODUCT_COLUMNS}"
        );
        run_one(
            ctx,
            "Product",
            product.id,
            sqlx::query_as::<_, ProductRow>(&sql)
                .bind(*product.id.as_uuid())
                .bind(&product.name)
                .bind(&product.description)
                .bind(&product.category)
                .bind(product.base_price)
                .bind(product.coverage_amount)
                .bind(period_days(product)?)
                .bind(product.currency.code())
                .bind(product.status.as_str())
                .bind(product.effective_date)
                .bind(product.expiration_date)
                .bind(Utc::now())
                .fetch_optional(&self.pool),
        )
        .await?
        .try_into()
    }

    async fn soft_delete(&self, ctx: &Context, id: ProductId) -> Result<(), PortError> {
        soft_delete(&self.pool, ctx, "products", "Product", *id.as_uuid()).await
    }
}

async fn soft_delete(pool: &PgPool, ctx: &Context, table: &str, entity: &str, id: Uuid) -> Result<(), PortError> {
    let sql = format!("UPDATE {table} SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL");
    let result = run(ctx, sqlx::query(&sql).bind(id).execute(pool)).await?;
    if result.rows_affected() == 0 {
        return Err(PortError::not_found(entity, id));
    }
    Ok(())
}

// ============================================================================
// Quotes
// ============================================================================

const QUOTE_COLUMNS: &str = "id, quote_number, product_id, user_id, coverage_amount, base_price, final_price, \
    currency, payment_frequency, status, valid_until, risk_factors, discount, tax, effective_date, \
    expiration_date, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct QuoteRow {
    id: Uuid,
    quote_number: String,
    product_id: Uuid,
    user_id: Uuid,
    coverage_amount: Decimal,
    base_price: Decimal,
    final_price: Decimal,
    currency: String,
    payment_frequency: String,
    status: String,
    valid_until: DateTime<Utc>,
    risk_factors: Vec<String>,
    discount: Decimal,
    tax: Decimal,
    effective_date: DateTime<Utc>,
    expiration_date: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<QuoteRow> for Quote {
    type Error = PortError;

    fn try_from(row: QuoteRow) -> Result<Self, Self::Error> {
        Ok(Quote {
            id: QuoteId::from_uuid(row.id),
            quote_number: row.quote_number,
            product_id: ProductId::from_uuid(row.product_id),
            user_id: CustomerId::from_uuid(row.user_id),
            coverage_amount: row.coverage_amount,
            base_price: row.base_price,
            final_price: row.final_price,
            currency: parse_column("currency", &row.currency)?,
            payment_frequency: parse_column("payment_frequency", &row.payment_frequency)?,
            status: parse_column("status", &row.status)?,
            valid_until: row.valid_until,
            risk_factors: row.risk_factors,
            discount: row.discount,
            tax: row.tax,
            effective_date: row.effective_date,
            expiration_date: row.expiration_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn push_quote_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &QuoteFilter) {
    if let Some(user) = filter.user_id {
        builder.push(" AND user_id = ").push_bind(*user.as_uuid());
    }
    if let Some(product) = filter.product_id {
        builder.push(" AND product_id = ").push_bind(*product.as_uuid());
    }
    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(currency) = filter.currency {
        builder.push(" AND currency = ").push_bind(currency.code());
    }
}

#[derive(Debug, Clone)]
pub struct PgQuoteRepository {
    pool: PgPool,
}

impl PgQuoteRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl DomainPort for PgQuoteRepository {}

#[async_trait]
impl HealthCheckable for PgQuoteRepository {
    async fn health_check(&self) -> HealthCheckResult {
        probe(&self.pool, "postgres-quotes").await
    }
}

#[async_trait]
impl QuoteRepository for PgQuoteRepository {
    async fn create(&self, ctx: &Context, quote: &Quote) -> Result<Quote, PortError> {
        let sql = format!(
            "INSERT INTO quotes ({QUOTE_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18) \
             RETURNING {QUOTE_COLUMNS}"
        );
        run(
            ctx,
            sqlx::query_as::<_, QuoteRow>(&sql)
                .bind(*quote.id.as_uuid())
                .bind(&quote.quote_number)
                .bind(*quote.product_id.as_uuid())
                .bind(*quote.user_id.as_uuid())
                .bind(quote.coverage_amount)
                .bind(quote.base_price)
                .bind(quote.final_price)
                .bind(quote.currency.code())
                .bind(quote.payment_frequency.as_str())
                .bind(quote.status.as_str())
                .bind(quote.valid_until)
                .bind(&quote.risk_factors)
                .bind(quote.discount)
                .bind(quote.tax)
                .bind(quote.effective_date)
                .bind(quote.expiration_date)
                .bind(quote.created_at)
                .bind(quote.updated_at)
                .fetch_one(&self.pool),
        )
        .await?
        .try_into()
    }

    async fn get_by_id(&self, ctx: &Context, id: QuoteId) -> Result<Quote, PortError> {
        let sql = format!("SELECT {QUOTE_COLUMNS} FROM quotes WHERE id = $1 AND deleted_at IS NULL");
        run_one(
            ctx,
            "Quote",
            id,
            sqlx::query_as::<_, QuoteRow>(&sql).bind(*id.as_uuid()).fetch_optional(&self.pool),
        )
        .await?
        .try_into()
    }

    async fn get_by_number(&self, ctx: &Context, quote_number: &str) -> Result<Quote, PortError> {
        let sql = format!("SELECT {QUOTE_COLUMNS} FROM quotes WHERE quote_number = $1 AND deleted_at IS NULL");
        run_one(
            ctx,
            "Quote",
            quote_number,
            sqlx::query_as::<_, QuoteRow>(&sql).bind(quote_number).fetch_optional(&self.pool),
        )
        .await?
        .try_into()
    }

    async fn list(&self, ctx: &Context, filter: &QuoteFilter, limit: u32, offset: u32) -> Result<Vec<Quote>, PortError> {
        let mut builder = QueryBuilder::new(format!("SELECT {QUOTE_COLUMNS} FROM quotes WHERE deleted_at IS NULL"));
        push_quote_filter(&mut builder, filter);
        builder
            .push(" ORDER BY created_at, id LIMIT ")
            .push_bind(i64::from(limit))
            .push(" OFFSET ")
            .push_bind(i64::from(offset));
        let rows = run(ctx, builder.build_query_as::<QuoteRow>().fetch_all(&self.pool)).await?;
        rows.into_iter().map(Quote::try_from).collect()
    }

    async fn count(&self, ctx: &Context, filter: &QuoteFilter) -> Result<u64, PortError> {
        let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM quotes WHERE deleted_at IS NULL");
        push_quote_filter(&mut builder, filter);
        let count: i64 = run(ctx, builder.build_query_scalar().fetch_one(&self.pool)).await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn update(&self, ctx: &Context, quote: &Quote) -> Result<Quote, PortError> {
        let sql = format!(
            "UPDATE quotes SET coverage_amount = $2, base_price = $3, final_price = $4, currency = $5, \
             payment_frequency = $6, status = $7, valid_until = $8, risk_factors = $9, discount = $10, \
             tax = $11, effective_date = $12, expiration_date = $13, updated_at = $14 \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {QUOTE_COLUMNS}"
        );
        run_one(
            ctx,
            "Quote",
            quote.id,
            sqlx::query_as::<_, QuoteRow>(&sql)
                .bind(*quote.id.as_uuid())
                .bind(quote.coverage_amount)
                .bind(quote.base_price)
                .bind(quote.final_price)
                .bind(quote.currency.code())
                .bind(quote.payment_frequency.as_str())
                .bind(quote.status.as_str())
                .bind(quote.valid_until)
                .bind(&quote.risk_factors)
                .bind(quote.discount)
                .bind(quote.tax)
                .bind(quote.effective_date)
                .bind(quote.expiration_date)
                .bind(Utc::now())
                .fetch_optional(&self.pool),
        )
        .await?
        .try_into()
    }

    async fn soft_delete(&self, ctx: &Context, id: QuoteId) -> Result<(), PortError> {
        soft_delete(&self.pool, ctx, "quotes", "Quote", *id.as_uuid()).await
    }
}

// ============================================================================
// Policies
// ============================================================================

const POLICY_COLUMNS: &str = "id, policy_number, product_id, user_id, quote_id, premium, coverage_amount, \
    currency, payment_frequency, status, effective_date, expiration_date, renewal_date, auto_renew, \
    grace_period_end, renewed_from, cancelled_at, cancellation_reason, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct PolicyRow {
    id: Uuid,
    policy_number: String,
    product_id: Uuid,
    user_id: Uuid,
    quote_id: Option<Uuid>,
    premium: Decimal,
    coverage_amount: Decimal,
    currency: String,
    payment_frequency: String,
    status: String,
    effective_date: DateTime<Utc>,
    expiration_date: DateTime<Utc>,
    renewal_date: Option<DateTime<Utc>>,
    auto_renew: bool,
    grace_period_end: Option<DateTime<Utc>>,
    renewed_from: Option<Uuid>,
    cancelled_at: Option<DateTime<Utc>>,
    cancellation_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PolicyRow> for Policy {
    type Error = PortError;

    fn try_from(row: PolicyRow) -> Result<Self, Self::Error> {
        Ok(Policy {
            id: PolicyId::from_uuid(row.id),
            policy_number: row.policy_number,
            product_id: ProductId::from_uuid(row.product_id),
            user_id: CustomerId::from_uuid(row.user_id),
            quote_id: row.quote_id.map(QuoteId::from_uuid),
            premium: row.premium,
            coverage_amount: row.coverage_amount,
            currency: parse_column("currency", &row.currency)?,
            payment_frequency: parse_column("payment_frequency", &row.payment_frequency)?,
            status: parse_column("status", &row.status)?,
            effective_date: row.effective_date,
            expiration_date: row.expiration_date,
            renewal_date: row.renewal_date,
            auto_renew: row.auto_renew,
            grace_period_end: row.grace_period_end,
            renewed_from: row.renewed_from.map(PolicyId::from_uuid),
            cancelled_at: row.cancelled_at,
            cancellation_reason: row.cancellation_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn push_policy_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &PolicyFilter) {
    if let Some(user) = filter.user_id {
        builder.push(" AND user_id = ").push_bind(*user.as_uuid());
    }
    if let Some(product) = filter.product_id {
        builder.push(" AND product_id = ").push_bind(*product.as_uuid());
    }
    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(currency) = filter.currency {
        builder.push(" AND currency = ").push_bind(currency.code());
    }
}

/// PostgreSQL-backed [`PolicyRepository`]
///
/// `UPDATE` never touches `product_id`, `user_id` or `policy_number`.
#[derive(Debug, Clone)]
pub struct PgPolicyRepository {
    pool: PgPool,
}

impl PgPolicyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn select_where(&self, ctx: &Context, clause: &str, binds: &[DateTime<Utc>]) -> Result<Vec<Policy>, PortError> {
        let sql = format!("SELECT {POLICY_COLUMNS} FROM policies WHERE deleted_at IS NULL AND {clause}");
        let mut query = sqlx::query_as::<_, PolicyRow>(&sql);
        for value in binds {
            query = query.bind(*value);
        }
        let rows = run(ctx, query.fetch_all(&self.pool)).await?;
        rows.into_iter().map(Policy::try_from).collect()
    }
}

impl DomainPort for PgPolicyRepository {}

#[async_trait]
impl HealthCheckable for PgPolicyRepository {
    async fn health_check(&self) -> HealthCheckResult {
        probe(&self.pool, "postgres-policies").await
    }
}

#[async_trait]
impl PolicyRepository for PgPolicyRepository {
    #[instrument(skip(self, ctx, policy), fields(policy_id = %policy.id))]
    async fn create(&self, ctx: &Context, policy: &Policy) -> Result<Policy, PortError> {
        let sql = format!(
            "INSERT INTO policies ({POLICY_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20) \
             RETURNING {POLICY_COLUMNS}"
        );
        let row = run(
            ctx,
            sqlx::query_as::<_, PolicyRow>(&sql)
                .bind(*policy.id.as_uuid())
                .bind(&policy.policy_number)
                .bind(*policy.product_id.as_uuid())
                .bind(*policy.user_id.as_uuid())
                .bind(policy.quote_id.map(|id| *id.as_uuid()))
                .bind(policy.premium)
                .bind(policy.coverage_amount)
                .bind(policy.currency.code())
                .bind(policy.payment_frequency.as_str())
                .bind(policy.status.as_str())
                .bind(policy.effective_date)
                .bind(policy.expiration_date)
                .bind(policy.renewal_date)
                .bind(policy.auto_renew)
                .bind(policy.grace_period_end)
                .bind(policy.renewed_from.map(|id| *id.as_uuid()))
                .bind(policy.cancelled_at)
                .bind(&policy.cancellation_reason)
                .bind(policy.created_at)
                .bind(policy.updated_at)
                .fetch_one(&self.pool),
        )
        .await?;
        debug!("Policy inserted");
        row.try_into()
    }

    async fn get_by_id(&self, ctx: &Context, id: PolicyId) -> Result<Policy, PortError> {
        let sql = format!("SELECT {POLICY_COLUMNS} FROM policies WHERE id = $1 AND deleted_at IS NULL");
        run_one(
            ctx,
            "Policy",
            id,
            sqlx::query_as::<_, PolicyRow>(&sql).bind(*id.as_uuid()).fetch_optional(&self.pool),
        )
        .await?
        .try_into()
    }

    async fn get_by_number(&self, ctx: &Context, policy_number: &str) -> Result<Policy, PortError> {
        let sql = format!("SELECT {POLICY_COLUMNS} FROM policies WHERE policy_number = $1 AND deleted_at IS NULL");
        run_one(
            ctx,
            "Policy",
            policy_number,
            sqlx::query_as::<_, PolicyRow>(&sql).bind(policy_number).fetch_optional(&self.pool),
        )
        .await?
        .try_into()
    }

    async fn list(&self, ctx: &Context, filter: &PolicyFilter, limit: u32, offset: u32) -> Result<Vec<Policy>, PortError> {
        let mut builder = QueryBuilder::new(format!("SELECT {POLICY_COLUMNS} FROM policies WHERE deleted_at IS NULL"));
        push_policy_filter(&mut builder, filter);
        builder
            .push(" ORDER BY created_at, id LIMIT ")
            .push_bind(i64::from(limit))
            .push(" OFFSET ")
            .push_bind(i64::from(offset));
        let rows = run(ctx, builder.build_query_as::<PolicyRow>().fetch_all(&self.pool)).await?;
        rows.into_iter().map(Policy::try_from).collect()
    }

    async fn count(&self, ctx: &Context, filter: &PolicyFilter) -> Result<u64, PortError> {
        let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM policies WHERE deleted_at IS NULL");
        push_policy_filter(&mut builder, filter);
        let count: i64 = run(ctx, builder.build_query_scalar().fetch_one(&self.pool)).await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    #[instrument(skip(self, ctx, policy), fields(policy_id = %policy.id))]
    async fn update(&self, ctx: &Context, policy: &Policy) -> Result<Policy, PortError> {
        let sql = format!(
            "UPDATE policies SET quote_id = $2, premium = $3, coverage_amount = $4, currency = $5, \
             payment_frequency = $6, status = $7, effective_date = $8, expiration_date = $9, \
             renewal_date = $10, auto_renew = $11, grace_period_end = $12, renewed_from = $13, \
             cancelled_at = $14, cancellation_reason = $15, updated_at = $16 \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {POLICY_COLUMNS}"
        );
        run_one(
            ctx,
            "Policy",
            policy.id,
            sqlx::query_as::<_, PolicyRow>(&sql)
                .bind(*policy.id.as_uuid())
                .bind(policy.quote_id.map(|id| *id.as_uuid()))
                .bind(policy.premium)
                .bind(policy.coverage_amount)
                .bind(policy.currency.code())
                .bind(policy.payment_frequency.as_str())
                .bind(policy.status.as_str())
                .bind(policy.effective_date)
                .bind(policy.expiration_date)
                .bind(policy.renewal_date)
                .bind(policy.auto_renew)
                .bind(policy.grace_period_end)
                .bind(policy.renewed_from.map(|id| *id.as_uuid()))
                .bind(policy.cancelled_at)
                .bind(&policy.cancellation_reason)
                .bind(Utc::now())
                .fetch_optional(&self.pool),
        )
        .await?
        .try_into()
    }

    async fn soft_delete(&self, ctx: &Context, id: PolicyId) -> Result<(), PortError> {
        soft_delete(&self.pool, ctx, "policies", "Policy", *id.as_uuid()).await
    }

    async fn find_expired_active(&self, ctx: &Context, as_of: DateTime<Utc>) -> Result<Vec<Policy>, PortError> {
        let clause = format!(
            "status = '{}' AND expiration_date < $1 ORDER BY expiration_date, id",
            PolicyStatus::Active
        );
        self.select_where(ctx, &clause, &[as_of]).await
    }

    async fn find_grace_period_elapsed(&self, ctx: &Context, as_of: DateTime<Utc>) -> Result<Vec<Policy>, PortError> {
        let clause = format!(
            "status = '{}' AND grace_period_end IS NOT NULL AND grace_period_end < $1 ORDER BY grace_period_end, id",
            PolicyStatus::Pending
        );
        self.select_where(ctx, &clause, &[as_of]).await
    }

    async fn find_expiring_between(
        &self,
        ctx: &Context,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Policy>, PortError> {
        let clause = format!(
            "status = '{}' AND expiration_date >= $1 AND expiration_date <= $2 ORDER BY expiration_date, id",
            PolicyStatus::Active
        );
        self.select_where(ctx, &clause, &[from, to]).await
    }

    async fn find_auto_renewal_candidates(
        &self,
        ctx: &Context,
        as_of: DateTime<Utc>,
        window_days: u32,
    ) -> Result<Vec<Policy>, PortError> {
        let clause = format!(
            "status = '{}' AND auto_renew AND renewal_date IS NULL \
             AND expiration_date >= $1 AND expiration_date <= $2 ORDER BY expiration_date, id",
            PolicyStatus::Active
        );
        let until = as_of + Duration::days(i64::from(window_days));
        self.select_where(ctx, &clause, &[as_of, until]).await
    }
}
