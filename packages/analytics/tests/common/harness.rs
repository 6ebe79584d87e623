//! Test harness with testcontainers for Postgres integration testing.
//!
//! One container is shared by all tests; the schema and form/task fixtures
//! are loaded once. Tests isolate their rows by a per-harness workflow.

use analytics::{load_schema, AnalyticsConfig, PgExecutor, Schema};
use anyhow::{Context, Result};
use sqlx::PgPool;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use uuid::Uuid;

struct SharedTestInfra {
    db_url: String,
    // Keep the container alive for the entire test run
    _postgres: ContainerAsync<Postgres>,
}

static SHARED_INFRA: OnceCell<SharedTestInfra> = OnceCell::const_new();

impl SharedTestInfra {
    async fn init() -> Result<Self> {
        // Run tests with: RUST_LOG=analytics=debug cargo test -- --ignored --nocapture
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let postgres = Postgres::default()
            .with_tag("16")
            .start()
            .await
            .context("Failed to start Postgres container")?;

        let pg_host = postgres.get_host().await?;
        let pg_port = postgres.get_host_port_ipv4(5432).await?;
        let db_url = format!(
            "postgresql://postgres:postgres@{}:{}/postgres",
            pg_host, pg_port
        );

        let pool = PgPool::connect(&db_url)
            .await
            .context("Failed to connect to Postgres for setup")?;
        sqlx::raw_sql(include_str!("../fixtures/schema.sql"))
            .execute(&pool)
            .await
            .context("Failed to load schema fixture")?;

        Ok(Self {
            db_url,
            _postgres: postgres,
        })
    }

    async fn get() -> &'static Self {
        SHARED_INFRA
            .get_or_init(|| async {
                Self::init()
                    .await
                    .expect("Failed to initialize shared test infrastructure")
            })
            .await
    }
}

/// Per-test context: a fresh pool and a workflow id unique to the test.
///
/// ```ignore
/// #[tokio::test]
/// #[ignore = "requires docker"]
/// async fn my_test() {
///     let ctx = TestHarness::new().await.unwrap();
///     let executor = ctx.executor();
/// }
/// ```
pub struct TestHarness {
    pub db_pool: PgPool,
    pub workflow: String,
}

impl TestHarness {
    pub async fn new() -> Result<Self> {
        let infra = SharedTestInfra::get().await;
        let db_pool = PgPool::connect(&infra.db_url)
            .await
            .context("Failed to connect to test database")?;

        Ok(Self {
            db_pool,
            workflow: format!("wf-{}", Uuid::new_v4()),
        })
    }

    pub fn executor(&self) -> PgExecutor {
        PgExecutor::from_pool(self.db_pool.clone())
    }

    pub async fn schema(&self) -> Schema {
        let config = AnalyticsConfig::new().with_meta_fields(["region", "priority"]);
        load_schema(&self.db_pool, &config)
            .await
            .expect("Failed to load schema")
    }
}
