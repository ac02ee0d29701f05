//! Application setup and server configuration.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{header::CONTENT_TYPE, Method},
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::kernel::jobs::PostgresJobQueue;
use crate::kernel::ServerDeps;
use crate::server::routes::{
    advance_handler, health_handler, hold_handler, interview_completed_handler,
    live_interview_handler, mark_skipped_handler, queue_handler, reconsider_handler,
    reject_handler, remove_hold_handler, restart_handler, retry_job_handler,
    skip_to_review_handler,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub queue: PostgresJobQueue,
    pub server_deps: Arc<ServerDeps>,
}

impl AppState {
    pub fn new(server_deps: Arc<ServerDeps>, queue: PostgresJobQueue) -> Self {
        Self {
            db_pool: server_deps.db_pool.clone(),
            queue,
            server_deps,
        }
    }
}

/// Build the Axum application router
pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE]);

    let decisions = Router::new()
        .route("/:id/advance", post(advance_handler))
        .route("/:id/reject", post(reject_handler))
        .route("/:id/hold", post(hold_handler))
        .route("/:id/remove-hold", post(remove_hold_handler))
        .route("/:id/reconsider", post(reconsider_handler))
        .route("/:id/live-interview", post(live_interview_handler));

    let admin = Router::new()
        .route("/queue", get(queue_handler))
        .route("/jobs/:id/retry", post(retry_job_handler))
        .route("/applications/:id/restart", post(restart_handler))
        .route("/applications/:id/skip-to-review", post(skip_to_review_handler))
        .route("/applications/:id/mark-skipped", post(mark_skipped_handler));

    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/webhooks/interviews/:id/completed",
            post(interview_completed_handler),
        )
        .nest("/applications", decisions)
        .nest("/admin", admin)
        // Middleware layers (applied in reverse order - last added runs first)
        .layer(Extension(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
