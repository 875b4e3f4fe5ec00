//! PostgreSQL customer adapter

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, instrument};
use uuid::Uuid;

use core_kernel::{Context, CustomerId, DomainPort, HealthCheckResult, HealthCheckable, PortError};
use domain_party::{Address, Customer, CustomerFilter, CustomerRepository};

use crate::error::{parse_column, run, run_one};
use crate::pool::probe;

const COLUMNS: &str = "id, email, first_name, last_name, phone, date_of_birth, status, kyc_status, \
    aml_status, risk_profile, customer_tier, addresses, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: Uuid,
    email: String,
    first_name: String,
    last_name: String,
    phone: Option<String>,
    date_of_birth: Option<NaiveDate>,
    status: String,
    kyc_status: String,
    aml_status: String,
    risk_profile: String,
    customer_tier: String,
    addresses: Json<Vec<Address>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CustomerRow> for Customer {
    type Error = PortError;

    fn try_from(row: CustomerRow) -> Result<Self, Self::Error> {
        Ok(Customer {
            id: CustomerId::from_uuid(row.id),
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            phone: row.phone,
            date_of_birth: row.date_of_birth,
            status: parse_column("status", &row.status)?,
            kyc_status: parse_column("kyc_status", &row.kyc_status)?,
            aml_status: parse_column("aml_status", &row.aml_status)?,
            risk_profile: parse_column("risk_profile", &row.risk_profile)?,
            customer_tier: parse_column("customer_tier", &row.customer_tier)?,
            addresses: row.addresses.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &CustomerFilter) {
    if let Some(email) = &filter.email {
        builder.push(" AND lower(email) = lower(").push_bind(email.clone()).push(")");
    }
    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(kyc) = filter.kyc_status {
        builder.push(" AND kyc_status = ").push_bind(kyc.as_str());
    }
    if let Some(tier) = filter.customer_tier {
        builder.push(" AND customer_tier = ").push_bind(tier.as_str());
    }
}

/// PostgreSQL-backed [`CustomerRepository`]
#[derive(Debug, Clone)]
pub struct PgCustomerRepository {
    pool: PgPool,
}

impl PgCustomerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl DomainPort for PgCustomerRepository {}

#[async_trait]
impl HealthCheckable for PgCustomerRepository {
    async fn health_check(&self) -> HealthCheckResult {
        probe(&self.pool, "postgres-customers").await
    }
}

#[async_trait]
impl CustomerRepository for PgCustomerRepository {
    #[instrument(skip(self, ctx, customer), fields(customer_id = %customer.id))]
    async fn create(&self, ctx: &Context, customer: &Customer) -> Result<Customer, PortError> {
        let sql = format!(
            "INSERT INTO customers ({COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             RETURNING {COLUMNS}"
        );
        let row = run(
            ctx,
            sqlx::query_as::<_, CustomerRow>(&sql)
                .bind(*customer.id.as_uuid())
                .bind(&customer.email)
                .bind(&customer.first_name)
                .bind(&customer.last_name)
                .bind(&customer.phone)
                .bind(customer.date_of_birth)
                .bind(customer.status.as_str())
                .bind(customer.kyc_status.as_str())
                .bind(customer.aml_status.as_str())
                .bind(customer.risk_profile.as_str())
                .bind(customer.customer_tier.as_str())
                .bind(Json(&customer.addresses))
                .bind(customer.created_at)
                .bind(customer.updated_at)
                .fetch_one(&self.pool),
        )
        .await?;
        debug!("Customer inserted");
        row.try_into()
    }

    async fn get_by_id(&self, ctx: &Context, id: CustomerId) -> Result<Customer, PortError> {
        let sql = format!("SELECT {COLUMNS} FROM customers WHERE id = $1 AND deleted_at IS NULL");
        run_one(
            ctx,
            "Customer",
            id,
            sqlx::query_as::<_, CustomerRow>(&sql)
                .bind(*id.as_uuid())
                .fetch_optional(&self.pool),
        )
        .await?
        .try_into()
    }

    async fn get_by_email(&self, ctx: &Context, email: &str) -> Result<Customer, PortError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM customers WHERE lower(email) = lower($1) AND deleted_at IS NULL"
        );
        run_one(
            ctx,
            "Customer",
            email,
            sqlx::query_as::<_, CustomerRow>(&sql)
                .bind(email)
                .fetch_optional(&self.pool),
        )
        .await?
        .try_into()
    }

    async fn list(
        &self,
        ctx: &Context,
        filter: &CustomerFilter,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Customer>, PortError> {
        let mut builder = QueryBuilder::new(format!("SELECT {COLUMNS} FROM customers WHERE deleted_at IS NULL"));
        push_filter(&mut builder, filter);
        builder
            .push(" ORDER BY created_at, id LIMIT ")
            .push_bind(i64::from(limit))
            .push(" OFFSET ")
            .push_bind(i64::from(offset));
        let rows = run(ctx, builder.build_query_as::<CustomerRow>().fetch_all(&self.pool)).await?;
        rows.into_iter().map(Customer::try_from).collect()
    }

    async fn count(&self, ctx: &Context, filter: &CustomerFilter) -> Result<u64, PortError> {
        let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM customers WHERE deleted_at IS NULL");
        push_filter(&mut builder, filter);
        let count: i64 = run(ctx, builder.build_query_scalar().fetch_one(&self.pool)).await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    #[instrument(skip(self, ctx, customer), fields(customer_id = %customer.id))]
    async fn update(&self, ctx: &Context, customer: &Customer) -> Result<Customer, PortError> {
        let sql = format!(
            "UPDATE customers SET email = $2, first_name = $3, last_name = $4, phone = $5, \
             date_of_birth = $6, status = $7, kyc_status = $8, aml_status = $9, risk_profile = $10, \
             customer_tier = $11, addresses = $12, updated_at = $13 \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {COLUMNS}"
        );
        run_one(
            ctx,
            "Customer",
            customer.id,
            sqlx::query_as::<_, CustomerRow>(&sql)
                .bind(*customer.id.as_uuid())
                .bind(&customer.email)
                .bind(&customer.first_name)
                .bind(&customer.last_name)
                .bind(&customer.phone)
                .bind(customer.date_of_birth)
                .bind(customer.status.as_str())
                .bind(customer.kyc_status.as_str())
                .bind(customer.aml_status.as_str())
                .bind(customer.risk_profile.as_str())
                .bind(customer.customer_tier.as_str())
                .bind(Json(&customer.addresses))
                .bind(Utc::now())
                .fetch_optional(&self.pool),
        )
        .await?
        .try_into()
    }

    async fn soft_delete(&self, ctx: &Context, id: CustomerId) -> Result<(), PortError> {
        let result = run(
            ctx,
            sqlx::query("UPDATE customers SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL")
                .bind(*id.as_uuid())
                .execute(&self.pool),
        )
        .await?;
        if result.rows_affected() == 0 {
            return Err(PortError::not_found("Customer", id));
        }
        Ok(())
    }
}
