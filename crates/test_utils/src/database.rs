//! Database Test Utilities
//!
//! Starts PostgreSQL in a container, applies the schema migrations and hands
//! out the repository adapters. Needs a Docker daemon.

use std::sync::Arc;

use once_cell::sync::Lazy;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

use infra_db::{
    create_pool, run_migrations, DatabaseConfig, DatabasePool, PgClaimRepository, PgCustomerRepository,
    PgPaymentRepository, PgPolicyRepository, PgProductRepository, PgQuoteRepository, PgWorkflowRepository,
};

/// Image tag, overridable with `TEST_POSTGRES_TAG`
static POSTGRES_TAG: Lazy<String> =
    Lazy::new(|| std::env::var("TEST_POSTGRES_TAG").unwrap_or_else(|_| "16-alpine".to_string()));
const POSTGRES_USER: &str = "postgres";
const POSTGRES_PASSWORD: &str = "postgres";
const POSTGRES_DB: &str = "postgres";

/// Tables in dependency order, children first
const TABLES: [&str; 7] = [
    "claim_workflows",
    "payments",
    "claims",
    "policies",
    "quotes",
    "products",
    "customers",
];

pub type TestResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// A migrated PostgreSQL container
pub struct TestDatabase {
    _container: ContainerAsync<Postgres>,
    pub url: String,
    pub pool: DatabasePool,
}

impl TestDatabase {
    pub async fn new() -> TestResult<Self> {
        let container = Postgres::default().with_tag(POSTGRES_TAG.as_str()).start().await?;
        let host = container.get_host().await?;
        let port = container.get_host_port_ipv4(5432).await?;
        let url = format!("postgres://{POSTGRES_USER}:{POSTGRES_PASSWORD}@{host}:{port}/{POSTGRES_DB}");

        let pool = create_pool(DatabaseConfig::new(&url).max_connections(5).min_connections(1)).await?;
        run_migrations(&pool).await?;

        Ok(Self {
            _container: container,
            url,
            pool,
        })
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    /// Empties every table, keeping the schema
    pub async fn clear_data(&self) -> TestResult<()> {
        for table in TABLES {
            sqlx::query(&format!("TRUNCATE TABLE {table} CASCADE"))
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    pub fn customers(&self) -> PgCustomerRepository {
        PgCustomerRepository::new(self.pool.clone())
    }

    pub fn products(&self) -> PgProductRepository {
        PgProductRepository::new(self.pool.clone())
    }

    pub fn quotes(&self) -> PgQuoteRepository {
        PgQuoteRepository::new(self.pool.clone())
    }

    pub fn policies(&self) -> PgPolicyRepository {
        PgPolicyRepository::new(self.pool.clone())
    }

    pub fn claims(&self) -> PgClaimRepository {
        PgClaimRepository::new(self.pool.clone())
    }

    pub fn workflows(&self) -> PgWorkflowRepository {
        PgWorkflowRepository::new(self.pool.clone())
    }

    pub fn payments(&self) -> PgPaymentRepository {
        PgPaymentRepository::new(self.pool.clone())
    }
}

static SHARED_TEST_DB: OnceCell<Arc<TestDatabase>> = OnceCell::const_new();

/// A container shared by every test in the process
///
/// Tests using it must not assume empty tables.
pub async fn shared_test_database() -> TestResult<Arc<TestDatabase>> {
    SHARED_TEST_DB
        .get_or_try_init(|| async { TestDatabase::new().await.map(Arc::new) })
        .await
        .cloned()
}
