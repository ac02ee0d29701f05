//! Test fixtures for creating test data.
//!
//! These fixtures use the model methods directly to create test data.
//! Statuses are forced with raw SQL only to set up a starting point.

use anyhow::Result;
use screening_core::common::ApplicationId;
use screening_core::domains::applications::models::{Application, ApplicationStatus, UpsertOutcome};
use screening_core::kernel::jobs::Job;
use screening_core::kernel::TalentRecord;
use sqlx::PgPool;

pub fn talent_record(candidate_ref: &str) -> TalentRecord {
    TalentRecord {
        candidate_ref: candidate_ref.to_string(),
        candidate_name: format!("Candidate {candidate_ref}"),
        candidate_email: format!("{}@example.com", candidate_ref.to_lowercase()),
        job_title: "Backend Engineer".to_string(),
        job_description: Some("Build and run Postgres-backed services.".to_string()),
        external_status: Some("applied".to_string()),
    }
}

/// Create an application in `new`, as a sync would.
pub async fn create_application(pool: &PgPool, candidate_ref: &str) -> Result<Application> {
    let mut conn = pool.acquire().await?;
    match Application::upsert_from_record(&talent_record(candidate_ref), &mut conn).await? {
        UpsertOutcome::Inserted(application) => Ok(application),
        UpsertOutcome::Updated { application, .. } => Ok(application),
    }
}

/// Create an application and force it into `status`.
pub async fn create_application_in(
    pool: &PgPool,
    candidate_ref: &str,
    status: ApplicationStatus,
) -> Result<Application> {
    let application = create_application(pool, candidate_ref).await?;
    force_status(pool, application.id, status).await?;
    reload(pool, application.id).await
}

pub async fn force_status(pool: &PgPool, id: ApplicationId, status: ApplicationStatus) -> Result<()> {
    sqlx::query("UPDATE applications SET status = $2, status_changed_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(status)
        .execute(pool)
        .await?;
    Ok(())
}

/// Pretend the application entered its current status `minutes` ago.
pub async fn backdate_status(pool: &PgPool, id: ApplicationId, minutes: i64) -> Result<()> {
    sqlx::query(
        "UPDATE applications SET status_changed_at = NOW() - make_interval(mins => $2) WHERE id = $1",
    )
    .bind(id)
    .bind(minutes as i32)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn reload(pool: &PgPool, id: ApplicationId) -> Result<Application> {
    Application::find_by_id(id, pool).await
}

pub async fn status_of(pool: &PgPool, id: ApplicationId) -> Result<ApplicationStatus> {
    Ok(reload(pool, id).await?.status)
}

pub async fn jobs_for(pool: &PgPool, id: ApplicationId) -> Result<Vec<Job>> {
    Job::find_by_entity(id.into_uuid(), pool).await
}
