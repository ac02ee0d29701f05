//! Test harness with testcontainers for integration testing.
//!
//! One Postgres container is shared by every test in the binary. Each test
//! gets its own freshly migrated database on that server, so workers and
//! sweeps in one test never see another test's jobs.

use std::sync::Arc;

use anyhow::{Context, Result};
use screening_core::build_registry;
use screening_core::server::{build_app, AppState};
use screening_core::kernel::jobs::{JobWorker, JobWorkerConfig, PostgresJobQueue, ProcessedJob};
use screening_core::kernel::{ServerDeps, TestDependencies};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use test_context::AsyncTestContext;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use uuid::Uuid;

use super::http::ApiClient;

/// Lease used by test queues.
pub const TEST_LEASE_MS: i64 = 60_000;

/// Shared test infrastructure that persists across all tests.
struct SharedTestInfra {
    server_url: String,
    // Keep the container alive for the entire test run
    _postgres: ContainerAsync<Postgres>,
}

static SHARED_INFRA: OnceCell<SharedTestInfra> = OnceCell::const_new();

impl SharedTestInfra {
    async fn init() -> Result<Self> {
        // Run tests with: RUST_LOG=debug cargo test -- --nocapture
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let postgres = Postgres::default()
            .with_tag("16")
            .with_cmd(["-c", "max_connections=500"])
            .start()
            .await
            .context("Failed to start Postgres container")?;

        let pg_host = postgres.get_host().await?;
        let pg_port = postgres.get_host_port_ipv4(5432).await?;
        let server_url = format!("postgresql://postgres:postgres@{}:{}", pg_host, pg_port);

        Ok(Self {
            server_url,
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

    /// Create an empty database and run migrations on it.
    async fn fresh_database(&self) -> Result<PgPool> {
        let name = format!("screening_{}", Uuid::new_v4().simple());

        let admin = PgPool::connect(&format!("{}/postgres", self.server_url))
            .await
            .context("Failed to connect to Postgres")?;
        sqlx::query(&format!("CREATE DATABASE {name}"))
            .execute(&admin)
            .await
            .context("Failed to create test database")?;
        admin.close().await;

        let pool = PgPoolOptions::new()
            .max_connections(20)
            .connect(&format!("{}/{}", self.server_url, name))
            .await
            .context("Failed to connect to test database")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to run migrations")?;

        Ok(pool)
    }
}

/// Test harness that manages test infrastructure.
///
/// ```ignore
/// use test_context::test_context;
///
/// #[test_context(TestHarness)]
/// #[tokio::test]
/// async fn my_test(ctx: &TestHarness) {
///     let worker = ctx.worker(&TestDependencies::new());
///     // ... test code
/// }
/// ```
pub struct TestHarness {
    /// Database pool - use this for test fixtures.
    pub db_pool: PgPool,
}

impl AsyncTestContext for TestHarness {
    async fn setup() -> Self {
        Self::new().await.expect("Failed to create test harness")
    }

    async fn teardown(self) {
        self.db_pool.close().await;
    }
}

impl TestHarness {
    pub async fn new() -> Result<Self> {
        let infra = SharedTestInfra::get().await;
        let db_pool = infra.fresh_database().await?;
        Ok(Self { db_pool })
    }

    pub fn queue(&self) -> PostgresJobQueue {
        PostgresJobQueue::new(self.db_pool.clone(), TEST_LEASE_MS)
    }

    pub fn server_deps(&self, deps: &TestDependencies) -> Arc<ServerDeps> {
        deps.clone().into_server_deps(self.db_pool.clone())
    }

    /// A worker over this database with every job handler registered.
    pub fn worker(&self, deps: &TestDependencies) -> JobWorker {
        JobWorker::new(
            self.queue(),
            Arc::new(build_registry()),
            self.server_deps(deps),
            JobWorkerConfig::with_worker_id("test-worker"),
        )
    }

    /// HTTP client over the full router.
    pub fn api(&self, deps: &TestDependencies) -> ApiClient {
        let state = AppState::new(self.server_deps(deps), self.queue());
        ApiClient::new(build_app(state))
    }

    /// Process jobs until nothing is eligible.
    pub async fn drain(&self, worker: &JobWorker) -> Result<Vec<ProcessedJob>> {
        let mut processed = Vec::new();
        for _ in 0..100 {
            match worker.run_once("test-worker-0").await? {
                Some(job) => processed.push(job),
                None => return Ok(processed),
            }
        }
        anyhow::bail!("queue did not drain after 100 jobs")
    }

    /// Make every pending job eligible now, skipping retry backoff.
    pub async fn make_due(&self) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE jobs SET scheduled_for = NOW() - INTERVAL '1 second' WHERE status = 'pending'",
        )
        .execute(&self.db_pool)
        .await?;
        Ok(result.rows_affected())
    }
}
