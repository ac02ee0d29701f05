use serde::Serialize;
use sqlx::PgPool;
use tracing::info;

use crate::common::{ApplicationId, InterviewId, JobId};
use crate::domains::applications::machines::INTERVIEW_COMPLETION_SOURCES;
use crate::domains::applications::models::{Application, ApplicationStatus};
use crate::domains::applications::{ApplicationError, ApplicationResult};
use crate::domains::interviews::models::{Interview, InterviewStatus};
use crate::kernel::jobs::{enqueue, Job, JobType, NewJob};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum InterviewCompletion {
    /// The application moved to `interview_received` and transcription was queued.
    Accepted {
        application_id: ApplicationId,
        transcribe_job_id: JobId,
    },
    /// The interview was already completed; nothing changed.
    AlreadyCompleted { application_id: ApplicationId },
}

/// The interview channel reports a finished interview.
///
/// Marks the interview completed, moves the application to
/// `interview_received` and enqueues transcription, all in one transaction.
/// The application may still be in the send stage: a send job that is
/// finishing or waiting to retry is superseded and fails on its next
/// transition. Repeated deliveries are acknowledged without effect.
pub async fn on_interview_completed(
    interview_id: InterviewId,
    pool: &PgPool,
) -> ApplicationResult<InterviewCompletion> {
    let mut tx = pool.begin().await?;

    let Some(interview) = Interview::mark_completed(interview_id, &mut tx).await? else {
        drop(tx);
        let existing = Interview::find_by_id(interview_id, pool)
            .await?
            .ok_or_else(|| ApplicationError::Missing(format!("interview {interview_id}")))?;

        return match existing.status {
            InterviewStatus::Completed => Ok(InterviewCompletion::AlreadyCompleted {
                application_id: existing.application_id,
            }),
            other => Err(ApplicationError::Conflict(format!(
                "interview {interview_id} is {other:?} and cannot be completed"
            ))),
        };
    };

    let application_id = interview.application_id;
    Application::transition(
        application_id,
        &INTERVIEW_COMPLETION_SOURCES,
        ApplicationStatus::InterviewReceived,
        &mut tx,
    )
    .await?;

    let superseded = Job::supersede_pending(
        application_id.into_uuid(),
        "superseded by interview completion",
        &mut tx,
    )
    .await?;

    let job = enqueue(
        NewJob::for_application(JobType::Transcribe, application_id),
        &mut tx,
    )
    .await?;

    tx.commit().await?;

    info!(
        interview_id = %interview_id,
        application_id = %application_id,
        job_id = %job.job_id(),
        superseded,
        "interview completed, transcription queued"
    );

    Ok(InterviewCompletion::Accepted {
        application_id,
        transcribe_job_id: job.job_id(),
    })
}
