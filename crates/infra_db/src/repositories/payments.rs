//! PostgreSQL payment adapter
//!
//! Payments are never deleted; refunds and failures are state on the row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::instrument;
use uuid::Uuid;

use core_kernel::{
    ClaimId, Context, CustomerId, DomainPort, HealthCheckResult, HealthCheckable, PaymentId, PolicyId, PortError,
    SubscriptionId,
};
use domain_billing::{Payment, PaymentFilter, PaymentRepository};

use crate::error::{parse_column, run, run_one};
use crate::pool::probe;

const COLUMNS: &str = "id, user_id, policy_id, subscription_id, claim_id, amount, currency, status, \
    payment_method, description, transaction_id, processed_at, failed_at, failure_reason, refund_amount, \
    refunded_at, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    user_id: Uuid,
    policy_id: Option<Uuid>,
    subscription_id: Option<Uuid>,
    claim_id: Option<Uuid>,
    amount: Decimal,
    currency: String,
    status: String,
    payment_method: String,
    description: Option<String>,
    transaction_id: Option<String>,
    processed_at: Option<DateTime<Utc>>,
    failed_at: Option<DateTime<Utc>>,
    failure_reason: Option<String>,
    refund_amount: Decimal,
    refunded_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = PortError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Payment {
            id: PaymentId::from_uuid(row.id),
            user_id: CustomerId::from_uuid(row.user_id),
            policy_id: row.policy_id.map(PolicyId::from_uuid),
            subscription_id: row.subscription_id.map(SubscriptionId::from_uuid),
            claim_id: row.claim_id.map(ClaimId::from_uuid),
            amount: row.amount,
            currency: parse_column("currency", &row.currency)?,
            status: parse_column("status", &row.status)?,
            payment_method: row.payment_method,
            description: row.description,
            transaction_id: row.transaction_id,
            processed_at: row.processed_at,
            failed_at: row.failed_at,
            failure_reason: row.failure_reason,
            refund_amount: row.refund_amount,
            refunded_at: row.refunded_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &PaymentFilter) {
    if let Some(user) = filter.user_id {
        builder.push(" AND user_id = ").push_bind(*user.as_uuid());
    }
    if let Some(policy) = filter.policy_id {
        builder.push(" AND policy_id = ").push_bind(*policy.as_uuid());
    }
    if let Some(claim) = filter.claim_id {
        builder.push(" AND claim_id = ").push_bind(*claim.as_uuid());
    }
    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status.as_str());
    }
}

#[derive(Debug, Clone)]
pub struct PgPaymentRepository {
    pool: PgPool,
}

impl PgPaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl DomainPort for PgPaymentRepository {}

#[async_trait]
impl HealthCheckable for PgPaymentRepository {
    async fn health_check(&self) -> HealthCheckResult {
        probe(&self.pool, "postgres-payments").await
    }
}

#[async_trait]
impl PaymentRepository for PgPaymentRepository {
    #[instrument(skip(self, ctx, payment), fields(payment_id = %payment.id, amount = %payment.amount))]
    async fn create(&self, ctx: &Context, payment: &Payment) -> Result<Payment, PortError> {
        let sql = format!(
            "INSERT INTO payments ({COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18) \
             RETURNING {COLUMNS}"
        );
        run(
            ctx,
            sqlx::query_as::<_, PaymentRow>(&sql)
                .bind(*payment.id.as_uuid())
                .bind(*payment.user_id.as_uuid())
                .bind(payment.policy_id.map(|id| *id.as_uuid()))
                .bind(payment.subscription_id.map(|id| *id.as_uuid()))
                .bind(payment.claim_id.map(|id| *id.as_uuid()))
                .bind(payment.amount)
                .bind(payment.currency.code())
                .bind(payment.status.as_str())
                .bind(&payment.payment_method)
                .bind(&payment.description)
                .bind(&payment.transaction_id)
                .bind(payment.processed_at)
                .bind(payment.failed_at)
                .bind(&payment.failure_reason)
                .bind(payment.refund_amount)
                .bind(payment.refunded_at)
                .bind(payment.created_at)
                .bind(payment.updated_at)
                .fetch_one(&self.pool),
        )
        .await?
        .try_into()
    }

    async fn get_by_id(&self, ctx: &Context, id: PaymentId) -> Result<Payment, PortError> {
        let sql = format!("SELECT {COLUMNS} FROM payments WHERE id = $1");
        run_one(
            ctx,
            "Payment",
            id,
            sqlx::query_as::<_, PaymentRow>(&sql).bind(*id.as_uuid()).fetch_optional(&self.pool),
        )
        .await?
        .try_into()
    }

    async fn list(&self, ctx: &Context, filter: &PaymentFilter, limit: u32, offset: u32) -> Result<Vec<Payment>, PortError> {
        let mut builder = QueryBuilder::new(format!("SELECT {COLUMNS} FROM payments WHERE TRUE"));
        push_filter(&mut builder, filter);
        builder
            .push(" ORDER BY created_at, id LIMIT ")
            .push_bind(i64::from(limit))
            .push(" OFFSET ")
            .push_bind(i64::from(offset));
        let rows = run(ctx, builder.build_query_as::<PaymentRow>().fetch_all(&self.pool)).await?;
        rows.into_iter().map(Payment::try_from).collect()
    }

    async fn count(&self, ctx: &Context, filter: &PaymentFilter) -> Result<u64, PortError> {
        let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM payments WHERE TRUE");
        push_filter(&mut builder, filter);
        let count: i64 = run(ctx, builder.build_query_scalar().fetch_one(&self.pool)).await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    #[instrument(skip(self, ctx, payment), fields(payment_id = %payment.id, status = %payment.status))]
    async fn update(&self, ctx: &Context, payment: &Payment) -> Result<Payment, PortError> {
        let sql = format!(
            "UPDATE payments SET status = $2, description = $3, transaction_id = $4, processed_at = $5, \
             failed_at = $6, failure_reason = $7, refund_amount = $8, refunded_at = $9, updated_at = $10 \
             WHERE id = $1 RETURNING {COLUMNS}"
        );
        run_one(
            ctx,
            "Payment",
            payment.id,
            sqlx::query_as::<_, PaymentRow>(&sql)
                .bind(*payment.id.as_uuid())
                .bind(payment.status.as_str())
                .bind(&payment.description)
                .bind(&payment.transaction_id)
                .bind(payment.processed_at)
                .bind(payment.failed_at)
                .bind(&payment.failure_reason)
                .bind(payment.refund_amount)
                .bind(payment.refunded_at)
                .bind(Utc::now())
                .fetch_optional(&self.pool),
        )
        .await?
        .try_into()
    }
}
