// Main entry point for the screening server: HTTP API, job worker and
// scheduled sweeps in one process.

use std::sync::Arc;

use anyhow::{Context, Result};
use screening_core::kernel::jobs::{JobWorker, PostgresJobQueue};
use screening_core::kernel::{
    start_scheduler, HttpCollaborator, HttpFactExtractor, HttpInterviewChannel, HttpResumeParser,
    HttpTalentSystem, ServerDeps,
};
use screening_core::server::{build_app, AppState};
use screening_core::{build_registry, Config};
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,screening_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting application screening server");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    // Connect to database
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections((config.worker_concurrency as u32 + 6).max(10))
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations complete");

    // Collaborators
    let urls = &config.collaborators;
    let deps = Arc::new(ServerDeps::new(
        pool.clone(),
        Arc::new(HttpTalentSystem::new(HttpCollaborator::new(&urls.talent_system, urls.timeout)?)),
        Arc::new(HttpResumeParser::new(HttpCollaborator::new(&urls.resume_parser, urls.timeout)?)),
        Arc::new(HttpFactExtractor::new(HttpCollaborator::new(&urls.fact_extractor, urls.timeout)?)),
        Arc::new(HttpInterviewChannel::new(HttpCollaborator::new(
            &urls.interview_channel,
            urls.timeout,
        )?)),
        config.pipeline_settings(),
    ));

    let shutdown = CancellationToken::new();

    // Job worker
    let queue = PostgresJobQueue::new(pool.clone(), config.job_lease_ms);
    let worker = Arc::new(JobWorker::new(
        queue.clone(),
        Arc::new(build_registry()),
        deps.clone(),
        config.worker_config(),
    ));
    let worker_handle = tokio::spawn(worker.run(shutdown.clone()));

    // Scheduled sweeps
    let mut scheduler = start_scheduler(deps.clone(), config.scheduler_config())
        .await
        .context("Failed to start scheduler")?;

    // HTTP server
    let app = build_app(AppState::new(deps, queue));
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            wait_for_signal().await;
            tracing::info!("Shutdown signal received");
            server_shutdown.cancel();
        })
        .await
        .context("Server error")?;

    shutdown.cancel();
    if let Err(e) = scheduler.shutdown().await {
        tracing::warn!(error = %e, "scheduler shutdown failed");
    }
    match worker_handle.await {
        Ok(Err(e)) => tracing::error!(error = %e, "job worker exited with error"),
        Err(e) => tracing::error!(error = %e, "job worker task panicked"),
        Ok(Ok(())) => {}
    }

    tracing::info!("Server stopped");
    Ok(())
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
