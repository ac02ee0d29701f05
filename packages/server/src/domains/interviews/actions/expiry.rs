use anyhow::Result;
use sqlx::PgPool;
use tracing::{debug, info};

use crate::common::ApplicationId;
use crate::domains::applications::models::{Application, ApplicationStatus};
use crate::domains::applications::ApplicationError;
use crate::domains::interviews::models::Interview;

/// Expire sent invitations past their deadline and move their applications
/// `interview_sent → interview_expired`.
///
/// Returns the applications that moved.
pub async fn expire_interviews(pool: &PgPool) -> Result<Vec<ApplicationId>> {
    let mut tx = pool.begin().await?;
    let expired = Interview::expire_overdue(&mut tx).await?;

    let mut moved = Vec::with_capacity(expired.len());
    for interview in &expired {
        match Application::transition(
            interview.application_id,
            &[ApplicationStatus::InterviewSent],
            ApplicationStatus::InterviewExpired,
            &mut tx,
        )
        .await
        {
            Ok(_) => moved.push(interview.application_id),
            Err(ApplicationError::InvalidState(err)) => {
                debug!(interview_id = %interview.id, error = %err, "expired interview's application already moved");
            }
            Err(err) => return Err(err.into()),
        }
    }

    tx.commit().await?;

    if !expired.is_empty() {
        info!(
            interviews = expired.len(),
            applications = moved.len(),
            "expired overdue interviews"
        );
    }

    Ok(moved)
}
