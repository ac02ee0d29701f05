//! Job handlers for interviews.
//!
//! ```text
//! send_interview → invitation sent    → interview_sent (webhook completes it)
//! transcribe     → transcript stored  → interview_ready_for_review
//! ```

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::common::ApplicationId;
use crate::domains::applications::models::Application;
use crate::domains::interviews::models::{Interview, InterviewStatus};
use crate::kernel::jobs::{JobError, JobResultExt};
use crate::kernel::{InterviewInvitation, ServerDeps};

/// Send an interview invitation.
///
/// An invitation created or sent by an earlier attempt is reused, so a retry
/// does not mint a second token. A retry after a timed-out send may still
/// email the candidate twice.
pub async fn handle_send_interview(
    application_id: ApplicationId,
    deps: Arc<ServerDeps>,
) -> Result<(), JobError> {
    let pool = deps.pool();
    let application = Application::find_by_id(application_id, pool).await?;

    let candidate_email = application
        .candidate_email
        .clone()
        .filter(|email| !email.trim().is_empty())
        .ok_or_else(|| JobError::permanent("candidate has no email address"))?;

    let now = Utc::now();
    let reusable = Interview::find_latest(application_id, pool)
        .await?
        .filter(|interview| {
            matches!(interview.status, InterviewStatus::Created | InterviewStatus::Sent)
                && interview.expires_at > now
        });

    let interview = match reusable {
        Some(interview) => interview,
        None => {
            let ttl = chrono::Duration::from_std(deps.settings.interview_ttl).permanent()?;
            let mut conn = pool.acquire().await?;
            Interview::create(application_id, now + ttl, &mut conn).await?
        }
    };

    let invitation = InterviewInvitation {
        interview_id: interview.id,
        token: interview.token.clone(),
        candidate_name: application.candidate_name.clone(),
        candidate_email,
        job_title: application.job_title.clone(),
        expires_at: interview.expires_at,
    };

    deps.interviews.send_invitation(&invitation).await?;
    Interview::mark_sent(interview.id, pool).await?;

    info!(
        application_id = %application_id,
        interview_id = %interview.id,
        expires_at = %interview.expires_at,
        "interview invitation sent"
    );
    Ok(())
}

/// Transcribe the candidate's completed interview.
pub async fn handle_transcribe(application_id: ApplicationId, deps: Arc<ServerDeps>) -> Result<(), JobError> {
    let pool = deps.pool();
    let interview = Interview::find_latest_completed(application_id, pool)
        .await?
        .ok_or_else(|| JobError::permanent("application has no completed interview"))?;

    if interview.transcript.is_some() {
        info!(interview_id = %interview.id, "transcript already stored");
        return Ok(());
    }

    let transcript = deps.interviews.transcribe(interview.id).await?;
    Interview::set_transcript(interview.id, &transcript, pool).await?;

    info!(
        application_id = %application_id,
        interview_id = %interview.id,
        chars = transcript.len(),
        "interview transcribed"
    );
    Ok(())
}
