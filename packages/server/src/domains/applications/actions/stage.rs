//! Stage orchestration around a claimed job.
//!
//! Each function commits the job row change, the application transition
//! and any follow-up enqueue in a single transaction. When the application
//! is no longer where the stage expects it, the transaction is rolled back
//! and the job is marked `failed` with the reason.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::{info, warn};

use crate::common::ApplicationId;
use crate::domains::applications::error::{ApplicationError, ApplicationResult, InvalidStateError};
use crate::domains::applications::machines::{stage_for, Stage};
use crate::domains::applications::models::{Application, ApplicationStatus};
use crate::kernel::jobs::{enqueue, Job, JobError, JobResolution, JobType, NewJob};

/// A job with a stage always names an application.
fn stage_target(job: &Job) -> Option<(&'static Stage, ApplicationId)> {
    let stage = stage_for(job.job_type)?;
    let application_id = job.application_id()?;
    Some((stage, application_id))
}

/// Move the application into the stage's in-progress status.
///
/// Returns the origin status recorded on the job. `Ok(None)` for jobs that
/// do not drive an application stage.
pub async fn begin_stage(job: &Job, pool: &PgPool) -> ApplicationResult<Option<ApplicationStatus>> {
    let Some(stage) = stage_for(job.job_type) else {
        return Ok(None);
    };
    let application_id = job.application_id().ok_or_else(|| {
        ApplicationError::Validation(format!("{} job {} has no application", job.job_type, job.id))
    })?;

    let mut tx = pool.begin().await?;
    let current = Application::lock_status(application_id, &mut tx).await?;

    if !stage.can_begin_from(current) {
        return Err(InvalidStateError {
            application_id,
            expected: stage.begin_from(),
            actual: current,
        }
        .into());
    }

    if current != stage.in_progress {
        Application::transition(application_id, &[current], stage.in_progress, &mut tx).await?;
    }

    let observed = stage.accepted.contains(&current).then_some(current);
    let origin = Job::record_origin(job.id, observed, &mut tx).await?;
    tx.commit().await?;

    Ok(origin)
}

/// Success: job completed, application to the success status, next job queued.
pub async fn complete_stage(job: &Job, worker_id: &str, pool: &PgPool) -> Result<JobResolution> {
    let mut tx = pool.begin().await?;
    let outcome = apply_success(job, worker_id, &mut tx).await;
    finish(tx, outcome, job, pool).await
}

/// Transient failure: retry later or dead-letter, and put the application
/// back where the stage found it.
pub async fn retry_stage(
    job: &Job,
    worker_id: &str,
    origin: Option<ApplicationStatus>,
    error: &JobError,
    pool: &PgPool,
) -> Result<JobResolution> {
    let mut tx = pool.begin().await?;
    let outcome = apply_retry(job, worker_id, origin, error, &mut tx).await;
    finish(tx, outcome, job, pool).await
}

/// Permanent failure: dead-letter, then take the stage fallback.
pub async fn fail_stage(job: &Job, worker_id: &str, error: &JobError, pool: &PgPool) -> Result<JobResolution> {
    let mut tx = pool.begin().await?;
    let outcome = apply_permanent(job, worker_id, error, &mut tx).await;
    finish(tx, outcome, job, pool).await
}

async fn apply_success(job: &Job, worker_id: &str, conn: &mut PgConnection) -> ApplicationResult<JobResolution> {
    if !Job::mark_completed(job.id, worker_id, &mut *conn).await? {
        return Ok(JobResolution::Lost);
    }

    if let Some((stage, application_id)) = stage_target(job) {
        let step = stage.on_success;
        advance(stage, application_id, step.status, step.next_job, conn).await?;
    }

    Ok(JobResolution::Completed)
}

async fn apply_retry(
    job: &Job,
    worker_id: &str,
    origin: Option<ApplicationStatus>,
    error: &JobError,
    conn: &mut PgConnection,
) -> ApplicationResult<JobResolution> {
    let attempts = job.attempts + 1;
    let message = error.to_string();

    let resolution = if attempts < job.max_attempts {
        let delay = job
            .job_type
            .backoff()
            .delay_with_hint(attempts.max(1) as u32, error.retry_after());
        let scheduled_for = next_run_at(delay);
        if !Job::schedule_retry(job.id, worker_id, &message, scheduled_for, &mut *conn).await? {
            return Ok(JobResolution::Lost);
        }
        JobResolution::Retrying { scheduled_for }
    } else {
        if !Job::mark_dead(job.id, worker_id, &message, true, &mut *conn).await? {
            return Ok(JobResolution::Lost);
        }
        JobResolution::Dead
    };

    if let Some((stage, application_id)) = stage_target(job) {
        let restore = stage.restore_to(origin.or(job.origin_status));
        Application::transition(application_id, &[stage.in_progress], restore, &mut *conn).await?;
    }

    Ok(resolution)
}

async fn apply_permanent(
    job: &Job,
    worker_id: &str,
    error: &JobError,
    conn: &mut PgConnection,
) -> ApplicationResult<JobResolution> {
    if !Job::mark_dead(job.id, worker_id, &error.to_string(), true, &mut *conn).await? {
        return Ok(JobResolution::Lost);
    }

    if let Some((stage, application_id)) = stage_target(job) {
        let step = stage.on_permanent;
        advance(stage, application_id, step.status, step.next_job, conn).await?;
    }

    Ok(JobResolution::Dead)
}

/// A reclaimed job that already used up its attempts. Dead-letter it and
/// restore the application if the crashed attempt left it in progress.
pub async fn bury_exhausted(job: &Job, worker_id: &str, pool: &PgPool) -> Result<JobResolution> {
    let message = format!("lease expired after {} attempts", job.attempts);
    let mut tx = pool.begin().await?;

    if !Job::mark_dead(job.id, worker_id, &message, false, &mut tx).await? {
        return Ok(JobResolution::Lost);
    }

    if let Some((stage, application_id)) = stage_target(job) {
        let restore = stage.restore_to(job.origin_status);
        match Application::transition(application_id, &[stage.in_progress], restore, &mut tx).await {
            Ok(_) | Err(ApplicationError::InvalidState(_)) => {}
            Err(err) => return Err(err.into()),
        }
    }

    tx.commit().await?;
    Ok(JobResolution::Dead)
}

/// Mark a job obsolete because its application moved on.
pub async fn mark_obsolete(job: &Job, err: &InvalidStateError, pool: &PgPool) -> Result<JobResolution> {
    warn!(
        job_id = %job.id,
        job_type = %job.job_type,
        application_id = %err.application_id,
        error = %err,
        "job no longer applies to its application"
    );
    let mut conn = pool.acquire().await?;
    Job::mark_failed(job.id, &err.to_string(), &mut conn).await?;
    Ok(JobResolution::Failed)
}

async fn advance(
    stage: &Stage,
    application_id: ApplicationId,
    to: ApplicationStatus,
    next_job: Option<JobType>,
    conn: &mut PgConnection,
) -> ApplicationResult<()> {
    Application::transition(application_id, &[stage.in_progress], to, &mut *conn).await?;

    if let Some(next) = next_job {
        let result = enqueue(NewJob::for_application(next, application_id), &mut *conn).await?;
        info!(
            application_id = %application_id,
            status = %to,
            next_job = %next,
            created = result.is_created(),
            "stage advanced"
        );
    } else {
        info!(application_id = %application_id, status = %to, "stage advanced");
    }

    Ok(())
}

fn next_run_at(delay: std::time::Duration) -> DateTime<Utc> {
    let delay = chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::hours(24));
    Utc::now() + delay
}

/// Commit a resolution. An invalid application state rolls back and records
/// the job as failed instead.
async fn finish(
    tx: Transaction<'_, Postgres>,
    outcome: ApplicationResult<JobResolution>,
    job: &Job,
    pool: &PgPool,
) -> Result<JobResolution> {
    match outcome {
        Ok(resolution) => {
            tx.commit().await?;
            Ok(resolution)
        }
        Err(ApplicationError::InvalidState(err)) => {
            tx.rollback().await?;
            mark_obsolete(job, &err, pool).await
        }
        Err(err) => Err(err.into()),
    }
}
