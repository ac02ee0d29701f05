//! Operator endpoints: inspect the dead-letter queue and errored
//! applications, and recover them.

use axum::{
    extract::{Extension, Path, Query},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::{ApplicationId, JobId};
use crate::domains::applications::actions::{recover, retry_dead_job};
use crate::domains::applications::models::{Application, Decision, DecisionAction};
use crate::kernel::jobs::Job;
use crate::server::app::AppState;
use crate::server::error::{ApiError, ApiResult};

const DEFAULT_QUEUE_LIMIT: i64 = 100;
const MAX_QUEUE_LIMIT: i64 = 1000;

#[derive(Debug, Deserialize)]
pub struct QueueParams {
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct QueueView {
    pub dead_jobs: Vec<Job>,
    pub errored_applications: Vec<Application>,
    pub next_run_time: Option<DateTime<Utc>>,
}

/// Dead jobs and applications parked in `error`.
pub async fn queue_handler(
    Extension(state): Extension<AppState>,
    Query(params): Query<QueueParams>,
) -> ApiResult<Json<QueueView>> {
    let limit = params.limit.unwrap_or(DEFAULT_QUEUE_LIMIT);
    if limit < 1 {
        return Err(ApiError::BadRequest("limit must be at least 1".into()));
    }
    let limit = limit.min(MAX_QUEUE_LIMIT);

    let dead_jobs = state.queue.list_dead(limit).await?;
    let errored_applications = Application::find_errored(limit, &state.db_pool).await?;
    let next_run_time = state.queue.next_run_time().await?;

    Ok(Json(QueueView {
        dead_jobs,
        errored_applications,
        next_run_time,
    }))
}

pub async fn retry_job_handler(
    Extension(state): Extension<AppState>,
    Path(job_id): Path<JobId>,
) -> ApiResult<Json<Job>> {
    let job = retry_dead_job(job_id, &state.queue).await?;
    Ok(Json(job))
}

#[derive(Debug, Deserialize)]
pub struct RecoveryInput {
    pub actor: String,
    #[serde(default)]
    pub comment: Option<String>,
}

async fn run_recovery(
    state: AppState,
    application_id: ApplicationId,
    action: DecisionAction,
    input: RecoveryInput,
) -> ApiResult<Json<Decision>> {
    let decision = recover(
        application_id,
        action,
        &input.actor,
        input.comment,
        &state.db_pool,
    )
    .await?;
    Ok(Json(decision))
}

pub async fn restart_handler(
    Extension(state): Extension<AppState>,
    Path(application_id): Path<ApplicationId>,
    Json(input): Json<RecoveryInput>,
) -> ApiResult<Json<Decision>> {
    run_recovery(state, application_id, DecisionAction::Restart, input).await
}

pub async fn skip_to_review_handler(
    Extension(state): Extension<AppState>,
    Path(application_id): Path<ApplicationId>,
    Json(input): Json<RecoveryInput>,
) -> ApiResult<Json<Decision>> {
    run_recovery(state, application_id, DecisionAction::SkipToReview, input).await
}

pub async fn mark_skipped_handler(
    Extension(state): Extension<AppState>,
    Path(application_id): Path<ApplicationId>,
    Json(input): Json<RecoveryInput>,
) -> ApiResult<Json<Decision>> {
    run_recovery(state, application_id, DecisionAction::MarkSkipped, input).await
}
