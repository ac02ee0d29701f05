//! Operator recovery for applications that errored or went quiet.

use sqlx::PgPool;
use tracing::info;

use crate::common::{ApplicationId, JobId};
use crate::domains::applications::error::{ApplicationError, ApplicationResult, InvalidStateError};
use crate::domains::applications::machines::{can_recover_from, recovery_target};
use crate::domains::applications::models::{
    Application, ApplicationStatus, Decision, DecisionAction, NewDecision,
};
use crate::kernel::jobs::{enqueue, Job, NewJob, PostgresJobQueue};

/// Apply a recovery action. Pending jobs for the application are
/// superseded; a running job makes the application busy.
pub async fn recover(
    application_id: ApplicationId,
    action: DecisionAction,
    actor: &str,
    comment: Option<String>,
    pool: &PgPool,
) -> ApplicationResult<Decision> {
    let target = recovery_target(action)
        .ok_or_else(|| ApplicationError::Validation(format!("{action} is not a recovery action")))?;
    if actor.trim().is_empty() {
        return Err(ApplicationError::Validation("actor is required".into()));
    }

    let mut tx = pool.begin().await?;
    let from = Application::lock_status(application_id, &mut tx).await?;

    if !can_recover_from(from) {
        let mut expected = vec![ApplicationStatus::Error];
        expected.extend(ApplicationStatus::MACHINE);
        return Err(InvalidStateError {
            application_id,
            expected,
            actual: from,
        }
        .into());
    }

    let entity_id = application_id.into_uuid();
    if Job::has_running(entity_id, &mut tx).await? {
        return Err(ApplicationError::Busy(application_id));
    }

    let superseded =
        Job::supersede_pending(entity_id, &format!("superseded by {action}"), &mut tx).await?;

    if action == DecisionAction::Restart {
        Application::clear_artifacts(application_id, &mut tx).await?;
    }

    Application::transition(application_id, &[from], target.status, &mut tx).await?;

    if let Some(next) = target.next_job {
        enqueue(NewJob::for_application(next, application_id), &mut tx).await?;
    }

    let decision = Decision::record(
        NewDecision::builder()
            .application_id(application_id)
            .action(action)
            .actor(actor)
            .from_status(from)
            .to_status(target.status)
            .comment(comment)
            .build(),
        &mut tx,
    )
    .await?;

    tx.commit().await?;

    info!(
        application_id = %application_id,
        action = %action,
        from = %from,
        to = %target.status,
        superseded,
        "application recovered"
    );

    Ok(decision)
}

pub async fn restart(application_id: ApplicationId, actor: &str, pool: &PgPool) -> ApplicationResult<Decision> {
    recover(application_id, DecisionAction::Restart, actor, None, pool).await
}

pub async fn skip_to_review(
    application_id: ApplicationId,
    actor: &str,
    pool: &PgPool,
) -> ApplicationResult<Decision> {
    recover(application_id, DecisionAction::SkipToReview, actor, None, pool).await
}

pub async fn mark_skipped(
    application_id: ApplicationId,
    actor: &str,
    pool: &PgPool,
) -> ApplicationResult<Decision> {
    recover(application_id, DecisionAction::MarkSkipped, actor, None, pool).await
}

/// Put a dead job back in the queue with a fresh attempt budget.
pub async fn retry_dead_job(job_id: JobId, queue: &PostgresJobQueue) -> ApplicationResult<Job> {
    if let Some(job) = queue.retry_dead(job_id).await? {
        return Ok(job);
    }

    let mut conn = queue.pool().acquire().await?;
    match Job::find_optional(job_id, &mut conn).await? {
        None => Err(ApplicationError::Missing(format!("job {job_id}"))),
        Some(job) => Err(ApplicationError::Conflict(format!(
            "job {job_id} is {:?}; only dead jobs without an in-flight replacement can be retried",
            job.status
        ))),
    }
}
