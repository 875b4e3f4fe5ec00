//! PostgreSQL adapters for claims and their workflows

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, instrument};
use uuid::Uuid;

use core_kernel::{
    ClaimId, Context, CustomerId, DomainPort, HealthCheckResult, HealthCheckable, PolicyId, PortError, WorkflowId,
};
use domain_claims::{Claim, ClaimDocument, ClaimFilter, ClaimRepository, Stage, Workflow, WorkflowRepository};

use crate::error::{parse_column, run, run_one, DatabaseError};
use crate::pool::probe;

const CLAIM_COLUMNS: &str = "id, claim_number, policy_id, user_id, title, description, claim_amount, \
    paid_amount, currency, status, incident_date, reported_date, resolved_date, denial_reason, documents, \
    created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct ClaimRow {
    id: Uuid,
    claim_number: String,
    policy_id: Uuid,
    user_id: Uuid,
    title: String,
    description: String,
    claim_amount: Decimal,
    paid_amount: Decimal,
    currency: String,
    status: String,
    incident_date: DateTime<Utc>,
    reported_date: DateTime<Utc>,
    resolved_date: Option<DateTime<Utc>>,
    denial_reason: Option<String>,
    documents: Json<Vec<ClaimDocument>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ClaimRow> for Claim {
    type Error = PortError;

    fn try_from(row: ClaimRow) -> Result<Self, Self::Error> {
        Ok(Claim {
            id: ClaimId::from_uuid(row.id),
            claim_number: row.claim_number,
            policy_id: PolicyId::from_uuid(row.policy_id),
            user_id: CustomerId::from_uuid(row.user_id),
            title: row.title,
            description: row.description,
            claim_amount: row.claim_amount,
            paid_amount: row.paid_amount,
            currency: parse_column("currency", &row.currency)?,
            status: parse_column("status", &row.status)?,
            incident_date: row.incident_date,
            reported_date: row.reported_date,
            resolved_date: row.resolved_date,
            denial_reason: row.denial_reason,
            documents: row.documents.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn push_claim_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &ClaimFilter) {
    if let Some(user) = filter.user_id {
        builder.push(" AND user_id = ").push_bind(*user.as_uuid());
    }
    if let Some(policy) = filter.policy_id {
        builder.push(" AND policy_id = ").push_bind(*policy.as_uuid());
    }
    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(currency) = filter.currency {
        builder.push(" AND currency = ").push_bind(currency.code());
    }
}

/// PostgreSQL-backed [`ClaimRepository`]
///
/// `claim_number`, `policy_id`, `user_id`, `incident_date` and
/// `reported_date` are written once at insert time.
#[derive(Debug, Clone)]
pub struct PgClaimRepository {
    pool: PgPool,
}

impl PgClaimRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl DomainPort for PgClaimRepository {}

#[async_trait]
impl HealthCheckable for PgClaimRepository {
    async fn health_check(&self) -> HealthCheckResult {
        probe(&self.pool, "postgres-claims").await
    }
}

#[async_trait]
impl ClaimRepository for PgClaimRepository {
    #[instrument(skip(self, ctx, claim), fields(claim_id = %claim.id))]
    async fn create(&self, ctx: &Context, claim: &Claim) -> Result<Claim, PortError> {
        let sql = format!(
            "INSERT INTO claims ({CLAIM_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17) \
             RETURNING {CLAIM_COLUMNS}"
        );
        let row = run(
            ctx,
            sqlx::query_as::<_, ClaimRow>(&sql)
                .bind(*claim.id.as_uuid())
                .bind(&claim.claim_number)
                .bind(*claim.policy_id.as_uuid())
                .bind(*claim.user_id.as_uuid())
                .bind(&claim.title)
                .bind(&claim.description)
                .bind(claim.claim_amount)
                .bind(claim.paid_amount)
                .bind(claim.currency.code())
                .bind(claim.status.as_str())
                .bind(claim.incident_date)
                .bind(claim.reported_date)
                .bind(claim.resolved_date)
                .bind(&claim.denial_reason)
                .bind(Json(&claim.documents))
                .bind(claim.created_at)
                .bind(claim.updated_at)
                .fetch_one(&self.pool),
        )
        .await?;
        debug!("Claim inserted");
        row.try_into()
    }

    async fn get_by_id(&self, ctx: &Context, id: ClaimId) -> Result<Claim, PortError> {
        let sql = format!("SELECT {CLAIM_COLUMNS} FROM claims WHERE id = $1 AND deleted_at IS NULL");
        run_one(
            ctx,
            "Claim",
            id,
            sqlx::query_as::<_, ClaimRow>(&sql).bind(*id.as_uuid()).fetch_optional(&self.pool),
        )
        .await?
        .try_into()
    }

    async fn get_by_number(&self, ctx: &Context, claim_number: &str) -> Result<Claim, PortError> {
        let sql = format!("SELECT {CLAIM_COLUMNS} FROM claims WHERE claim_number = $1 AND deleted_at IS NULL");
        run_one(
            ctx,
            "Claim",
            claim_number,
            sqlx::query_as::<_, ClaimRow>(&sql).bind(claim_number).fetch_optional(&self.pool),
        )
        .await?
        .try_into()
    }

    async fn list(&self, ctx: &Context, filter: &ClaimFilter, limit: u32, offset: u32) -> Result<Vec<Claim>, PortError> {
        let mut builder = QueryBuilder::new(format!("SELECT {CLAIM_COLUMNS} FROM claims WHERE deleted_at IS NULL"));
        push_claim_filter(&mut builder, filter);
        builder
            .push(" ORDER BY created_at, id LIMIT ")
            .push_bind(i64::from(limit))
            .push(" OFFSET ")
            .push_bind(i64::from(offset));
        let rows = run(ctx, builder.build_query_as::<ClaimRow>().fetch_all(&self.pool)).await?;
        rows.into_iter().map(Claim::try_from).collect()
    }

    async fn count(&self, ctx: &Context, filter: &ClaimFilter) -> Result<u64, PortError> {
        let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM claims WHERE deleted_at IS NULL");
        push_claim_filter(&mut builder, filter);
        let count: i64 = run(ctx, builder.build_query_scalar().fetch_one(&self.pool)).await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    #[instrument(skip(self, ctx, claim), fields(claim_id = %claim.id, status = %claim.status))]
    async fn update(&self, ctx: &Context, claim: &Claim) -> Result<Claim, PortError> {
        let sql = format!(
            "UPDATE claims SET title = $2, description = $3, claim_amount = $4, paid_amount = $5, \
             currency = $6, status = $7, resolved_date = $8, denial_reason = $9, documents = $10, \
             updated_at = $11 \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {CLAIM_COLUMNS}"
        );
        run_one(
            ctx,
            "Claim",
            claim.id,
            sqlx::query_as::<_, ClaimRow>(&sql)
                .bind(*claim.id.as_uuid())
                .bind(&claim.title)
                .bind(&claim.description)
                .bind(claim.claim_amount)
                .bind(claim.paid_amount)
                .bind(claim.currency.code())
                .bind(claim.status.as_str())
                .bind(claim.resolved_date)
                .bind(&claim.denial_reason)
                .bind(Json(&claim.documents))
                .bind(Utc::now())
                .fetch_optional(&self.pool),
        )
        .await?
        .try_into()
    }

    async fn soft_delete(&self, ctx: &Context, id: ClaimId) -> Result<(), PortError> {
        let result = run(
            ctx,
            sqlx::query("UPDATE claims SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL")
                .bind(*id.as_uuid())
                .execute(&self.pool),
        )
        .await?;
        if result.rows_affected() == 0 {
            return Err(PortError::not_found("Claim", id));
        }
        Ok(())
    }
}

// ============================================================================
// Workflows
// ============================================================================

const WORKFLOW_COLUMNS: &str =
    "claim_id, workflow_id, status, current_stage, stages, created_at, updated_at, completed_at";

#[derive(Debug, sqlx::FromRow)]
struct WorkflowRow {
    claim_id: Uuid,
    workflow_id: Uuid,
    status: String,
    current_stage: i32,
    stages: Json<Vec<Stage>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<WorkflowRow> for Workflow {
    type Error = PortError;

    fn try_from(row: WorkflowRow) -> Result<Self, Self::Error> {
        let current_stage = usize::try_from(row.current_stage).map_err(|e| {
            PortError::from(DatabaseError::SerializationError(format!("current_stage: {e}")))
        })?;
        Ok(Workflow {
            id: WorkflowId::from_uuid(row.workflow_id),
            claim_id: ClaimId::from_uuid(row.claim_id),
            stages: row.stages.0,
            current_stage,
            status: parse_column("status", &row.status)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
            completed_at: row.completed_at,
        })
    }
}

/// Stores one workflow document per claim
#[derive(Debug, Clone)]
pub struct PgWorkflowRepository {
    pool: PgPool,
}

impl PgWorkflowRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl DomainPort for PgWorkflowRepository {}

#[async_trait]
impl HealthCheckable for PgWorkflowRepository {
    async fn health_check(&self) -> HealthCheckResult {
        probe(&self.pool, "postgres-workflows").await
    }
}

#[async_trait]
impl WorkflowRepository for PgWorkflowRepository {
    #[instrument(skip(self, ctx, workflow), fields(claim_id = %workflow.claim_id, status = %workflow.status))]
    async fn save(&self, ctx: &Context, workflow: &Workflow) -> Result<Workflow, PortError> {
        let current_stage = i32::try_from(workflow.current_stage)
            .map_err(|_| PortError::validation_field("stage index out of range", "current_stage"))?;
        let sql = format!(
            "INSERT INTO claim_workflows ({WORKFLOW_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (claim_id) DO UPDATE SET status = EXCLUDED.status, \
             current_stage = EXCLUDED.current_stage, stages = EXCLUDED.stages, \
             updated_at = EXCLUDED.updated_at, completed_at = EXCLUDED.completed_at \
             RETURNING {WORKFLOW_COLUMNS}"
        );
        run(
            ctx,
            sqlx::query_as::<_, WorkflowRow>(&sql)
                .bind(*workflow.claim_id.as_uuid())
                .bind(*workflow.id.as_uuid())
                .bind(workflow.status.as_str())
                .bind(current_stage)
                .bind(Json(&workflow.stages))
                .bind(workflow.created_at)
                .bind(workflow.updated_at)
                .bind(workflow.completed_at)
                .fetch_one(&self.pool),
        )
        .await?
        .try_into()
    }

    async fn get_by_claim(&self, ctx: &Context, claim_id: ClaimId) -> Result<Workflow, PortError> {
        let sql = format!("SELECT {WORKFLOW_COLUMNS} FROM claim_workflows WHERE claim_id = $1");
        run_one(
            ctx,
            "Workflow",
            claim_id,
            sqlx::query_as::<_, WorkflowRow>(&sql)
                .bind(*claim_id.as_uuid())
                .fetch_optional(&self.pool),
        )
        .await?
        .try_into()
    }
}
