//! Job model for the application processing queue.

use std::fmt;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use typed_builder::TypedBuilder;
use uuid::Uuid;

use super::backoff::BackoffPolicy;
use crate::common::{ApplicationId, JobId};
use crate::domains::applications::models::ApplicationStatus;

// ============================================================================
// Enums
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "job_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Completed,
    /// Obsolete: the application left the status the stage expects.
    Failed,
    /// Retries exhausted or permanent failure. Needs an operator.
    Dead,
}

impl JobStatus {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Running)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "job_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Sync,
    Download,
    Extract,
    Summarize,
    SendInterview,
    Transcribe,
}

impl JobType {
    pub const ALL: [JobType; 6] = [
        JobType::Sync,
        JobType::Download,
        JobType::Extract,
        JobType::Summarize,
        JobType::SendInterview,
        JobType::Transcribe,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Sync => "sync",
            JobType::Download => "download",
            JobType::Extract => "extract",
            JobType::Summarize => "summarize",
            JobType::SendInterview => "send_interview",
            JobType::Transcribe => "transcribe",
        }
    }

    /// Higher claims first. Candidate-facing work outranks back-office work.
    pub fn default_priority(&self) -> i32 {
        match self {
            JobType::SendInterview => 20,
            JobType::Transcribe => 15,
            JobType::Download | JobType::Extract | JobType::Summarize => 10,
            JobType::Sync => 0,
        }
    }

    /// Execution budget before the worker gives up and treats the attempt as transient.
    pub fn timeout(&self) -> Duration {
        match self {
            JobType::Sync => Duration::from_secs(300),
            JobType::Download => Duration::from_secs(120),
            JobType::Extract | JobType::Summarize => Duration::from_secs(180),
            JobType::SendInterview => Duration::from_secs(60),
            JobType::Transcribe => Duration::from_secs(600),
        }
    }

    /// Talent-system calls are rate limited and get long fixed delays;
    /// AI and interview calls back off exponentially.
    pub fn backoff(&self) -> BackoffPolicy {
        match self {
            JobType::Sync | JobType::Download => BackoffPolicy::Fixed {
                delay: Duration::from_secs(120),
            },
            JobType::Extract | JobType::Summarize => BackoffPolicy::Exponential {
                base: Duration::from_secs(10),
                max: Duration::from_secs(15 * 60),
                jitter: 0.25,
            },
            JobType::SendInterview => BackoffPolicy::Exponential {
                base: Duration::from_secs(30),
                max: Duration::from_secs(30 * 60),
                jitter: 0.25,
            },
            JobType::Transcribe => BackoffPolicy::Exponential {
                base: Duration::from_secs(60),
                max: Duration::from_secs(60 * 60),
                jitter: 0.25,
            },
        }
    }

    /// What a retry after a timed-out attempt may repeat on the outside world.
    pub fn duplicate_effect_risk(&self) -> &'static str {
        match self {
            JobType::Sync => "none: upserts keyed by candidate reference",
            JobType::Download => "none: overwrites the stored resume text",
            JobType::Extract => "extra AI spend only",
            JobType::Summarize => "duplicate summary attachment at the talent system",
            JobType::SendInterview => "candidate may receive the invitation twice",
            JobType::Transcribe => "extra transcription spend only",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Job Model
// ============================================================================

#[derive(FromRow, Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub job_type: JobType,
    pub entity_id: Uuid,
    pub status: JobStatus,
    pub priority: i32,

    pub attempts: i32,
    pub max_attempts: i32,
    pub last_error: Option<String>,
    /// Application status seen when the stage began; restored on retry.
    pub origin_status: Option<ApplicationStatus>,

    // Lease management
    pub worker_id: Option<String>,
    pub lease_expires_at: Option<DateTime<Utc>>,

    // Timestamps
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub scheduled_for: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A job waiting to be inserted.
#[derive(Debug, Clone, TypedBuilder)]
pub struct NewJob {
    pub job_type: JobType,
    #[builder(setter(into))]
    pub entity_id: Uuid,
    #[builder(default, setter(strip_option))]
    pub priority: Option<i32>,
    #[builder(default, setter(strip_option))]
    pub not_before: Option<DateTime<Utc>>,
    #[builder(default = 3)]
    pub max_attempts: i32,
}

impl NewJob {
    /// Stage job for an application, with the type's default priority.
    pub fn for_application(job_type: JobType, application_id: ApplicationId) -> Self {
        Self::builder()
            .job_type(job_type)
            .entity_id(application_id.into_uuid())
            .build()
    }

    /// System-wide talent-system sync.
    pub fn sync() -> Self {
        Self::builder()
            .job_type(JobType::Sync)
            .entity_id(Uuid::nil())
            .build()
    }

    pub fn priority_or_default(&self) -> i32 {
        self.priority
            .unwrap_or_else(|| self.job_type.default_priority())
    }
}

const JOB_COLUMNS: &str = "id, job_type, entity_id, status, priority, attempts, max_attempts, \
     last_error, origin_status, worker_id, lease_expires_at, created_at, started_at, \
     completed_at, scheduled_for, updated_at";

impl Job {
    /// The application this job acts on, or None for system-wide jobs.
    pub fn application_id(&self) -> Option<ApplicationId> {
        if self.entity_id.is_nil() {
            None
        } else {
            Some(ApplicationId::from_uuid(self.entity_id))
        }
    }

    /// Whether the job is claimable right now.
    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Pending && self.scheduled_for <= now
    }

    pub fn has_attempts_left(&self) -> bool {
        self.attempts < self.max_attempts
    }

    pub async fn find_by_id(id: JobId, pool: &PgPool) -> Result<Self> {
        let job = sqlx::query_as::<_, Self>(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1"))
            .bind(id)
            .fetch_one(pool)
            .await?;

        Ok(job)
    }

    pub async fn find_optional(id: JobId, conn: &mut PgConnection) -> Result<Option<Self>> {
        let job = sqlx::query_as::<_, Self>(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1"))
            .bind(id)
            .fetch_optional(conn)
            .await?;

        Ok(job)
    }

    /// All jobs ever created for an entity, oldest first.
    pub async fn find_by_entity(entity_id: Uuid, pool: &PgPool) -> Result<Vec<Self>> {
        let jobs = sqlx::query_as::<_, Self>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE entity_id = $1 ORDER BY created_at ASC, id ASC"
        ))
        .bind(entity_id)
        .fetch_all(pool)
        .await?;

        Ok(jobs)
    }

    /// The pending or running job for (entity, type), if any.
    pub async fn find_in_flight(
        entity_id: Uuid,
        job_type: JobType,
        conn: &mut PgConnection,
    ) -> Result<Option<Self>> {
        let job = sqlx::query_as::<_, Self>(&format!(
            r#"
            SELECT {JOB_COLUMNS} FROM jobs
            WHERE entity_id = $1 AND job_type = $2 AND status IN ('pending', 'running')
            LIMIT 1
            "#
        ))
        .bind(entity_id)
        .bind(job_type)
        .fetch_optional(conn)
        .await?;

        Ok(job)
    }

    /// Dead-lettered jobs, most recent first.
    pub async fn find_dead(limit: i64, pool: &PgPool) -> Result<Vec<Self>> {
        let jobs = sqlx::query_as::<_, Self>(&format!(
            r#"
            SELECT {JOB_COLUMNS} FROM jobs
            WHERE status = 'dead'
            ORDER BY updated_at DESC
            LIMIT $1
            "#
        ))
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(jobs)
    }

    /// Find the next scheduled run time for any pending job.
    pub async fn find_next_run_time(pool: &PgPool) -> Result<Option<DateTime<Utc>>> {
        let next = sqlx::query_scalar::<_, DateTime<Utc>>(
            r#"
            SELECT scheduled_for
            FROM jobs
            WHERE status = 'pending'
            ORDER BY scheduled_for ASC
            LIMIT 1
            "#,
        )
        .fetch_optional(pool)
        .await?;

        Ok(next)
    }

    /// Start time of the most recent successful job of a type. `started_at`
    /// is stamped on claim, before the handler calls out, so nothing changed
    /// during that run falls behind the returned instant.
    pub async fn last_completed_start(job_type: JobType, pool: &PgPool) -> Result<Option<DateTime<Utc>>> {
        let at = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
            "SELECT MAX(started_at) FROM jobs WHERE job_type = $1 AND status = 'completed'",
        )
        .bind(job_type)
        .fetch_one(pool)
        .await?;

        Ok(at)
    }

    /// Insert unless an in-flight row exists for the same (entity, type).
    ///
    /// Returns None when the partial unique index rejected the row.
    pub(super) async fn insert_if_absent(new: &NewJob, conn: &mut PgConnection) -> Result<Option<JobId>> {
        let id = sqlx::query_scalar::<_, JobId>(
            r#"
            INSERT INTO jobs (id, job_type, entity_id, status, priority, max_attempts, scheduled_for)
            VALUES ($1, $2, $3, 'pending', $4, $5, COALESCE($6, NOW()))
            ON CONFLICT (entity_id, job_type) WHERE status IN ('pending', 'running') DO NOTHING
            RETURNING id
            "#,
        )
        .bind(JobId::new())
        .bind(new.job_type)
        .bind(new.entity_id)
        .bind(new.priority_or_default())
        .bind(new.max_attempts)
        .bind(new.not_before)
        .fetch_optional(conn)
        .await?;

        Ok(id)
    }

    /// Claim jobs atomically using FOR UPDATE SKIP LOCKED.
    ///
    /// Also reclaims running jobs whose lease expired; a reclaim counts as an attempt.
    pub(super) async fn claim(
        limit: i64,
        worker_id: &str,
        lease_duration_ms: i64,
        conn: &mut PgConnection,
    ) -> Result<Vec<Self>> {
        let jobs = sqlx::query_as::<_, Self>(&format!(
            r#"
            WITH next_jobs AS (
                SELECT id
                FROM jobs
                WHERE (status = 'pending' AND scheduled_for <= NOW())
                   OR (status = 'running' AND lease_expires_at < NOW())
                ORDER BY priority DESC, scheduled_for ASC, created_at ASC
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE jobs
            SET
                attempts = CASE WHEN jobs.status = 'running' THEN jobs.attempts + 1 ELSE jobs.attempts END,
                status = 'running',
                started_at = NOW(),
                lease_expires_at = NOW() + ($2 || ' milliseconds')::INTERVAL,
                worker_id = $3,
                updated_at = NOW()
            FROM next_jobs
            WHERE jobs.id = next_jobs.id
            RETURNING {}
            "#,
            prefixed_columns("jobs")
        ))
        .bind(limit)
        .bind(lease_duration_ms.to_string())
        .bind(worker_id)
        .fetch_all(conn)
        .await?;

        Ok(jobs)
    }

    /// Extend the lease of a running job owned by `worker_id`.
    pub(super) async fn extend_lease(
        id: JobId,
        worker_id: &str,
        lease_duration_ms: i64,
        pool: &PgPool,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET lease_expires_at = NOW() + ($1 || ' milliseconds')::INTERVAL,
                updated_at = NOW()
            WHERE id = $2 AND status = 'running' AND worker_id = $3
            "#,
        )
        .bind(lease_duration_ms.to_string())
        .bind(id)
        .bind(worker_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Record the application status a stage started from. Keeps the first
    /// value when a reclaimed job begins again. Returns the recorded origin.
    pub async fn record_origin(
        id: JobId,
        origin: Option<ApplicationStatus>,
        conn: &mut PgConnection,
    ) -> Result<Option<ApplicationStatus>> {
        let recorded = sqlx::query_scalar::<_, Option<ApplicationStatus>>(
            r#"
            UPDATE jobs
            SET origin_status = COALESCE(origin_status, $1), updated_at = NOW()
            WHERE id = $2
            RETURNING origin_status
            "#,
        )
        .bind(origin)
        .bind(id)
        .fetch_one(conn)
        .await?;

        Ok(recorded)
    }

    /// Mark a running job completed. Returns false if this worker no longer owns it.
    pub async fn mark_completed(id: JobId, worker_id: &str, conn: &mut PgConnection) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'completed',
                completed_at = NOW(),
                lease_expires_at = NULL,
                updated_at = NOW()
            WHERE id = $1 AND status = 'running' AND worker_id = $2
            "#,
        )
        .bind(id)
        .bind(worker_id)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Return a running job to pending for another attempt.
    pub async fn schedule_retry(
        id: JobId,
        worker_id: &str,
        error: &str,
        scheduled_for: DateTime<Utc>,
        conn: &mut PgConnection,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'pending',
                attempts = attempts + 1,
                last_error = $1,
                scheduled_for = $2,
                worker_id = NULL,
                lease_expires_at = NULL,
                updated_at = NOW()
            WHERE id = $3 AND status = 'running' AND worker_id = $4
            "#,
        )
        .bind(error)
        .bind(scheduled_for)
        .bind(id)
        .bind(worker_id)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Dead-letter a running job. `count_attempt` is false when the attempt
    /// was already counted (a reclaimed job that ran out of attempts).
    pub async fn mark_dead(
        id: JobId,
        worker_id: &str,
        error: &str,
        count_attempt: bool,
        conn: &mut PgConnection,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'dead',
                attempts = attempts + CASE WHEN $1 THEN 1 ELSE 0 END,
                last_error = $2,
                completed_at = NOW(),
                lease_expires_at = NULL,
                updated_at = NOW()
            WHERE id = $3 AND status = 'running' AND worker_id = $4
            "#,
        )
        .bind(count_attempt)
        .bind(error)
        .bind(id)
        .bind(worker_id)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Mark a running job obsolete.
    pub async fn mark_failed(id: JobId, error: &str, conn: &mut PgConnection) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'failed',
                last_error = $1,
                completed_at = NOW(),
                lease_expires_at = NULL,
                updated_at = NOW()
            WHERE id = $2 AND status IN ('pending', 'running')
            "#,
        )
        .bind(error)
        .bind(id)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Fail every pending job for an entity with `reason`.
    pub async fn supersede_pending(entity_id: Uuid, reason: &str, conn: &mut PgConnection) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'failed',
                last_error = $1,
                completed_at = NOW(),
                updated_at = NOW()
            WHERE entity_id = $2 AND status = 'pending'
            "#,
        )
        .bind(reason)
        .bind(entity_id)
        .execute(conn)
        .await?;

        Ok(result.rows_affected())
    }

    /// Whether any job for the entity is currently running.
    pub async fn has_running(entity_id: Uuid, conn: &mut PgConnection) -> Result<bool> {
        let running = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM jobs WHERE entity_id = $1 AND status = 'running')",
        )
        .bind(entity_id)
        .fetch_one(conn)
        .await?;

        Ok(running)
    }

    /// Put a dead job back in the queue with a fresh attempt budget.
    ///
    /// Returns None when the job is not dead or another job of the same
    /// stage is already in flight.
    pub async fn revive(id: JobId, conn: &mut PgConnection) -> Result<Option<Self>> {
        let job = sqlx::query_as::<_, Self>(&format!(
            r#"
            UPDATE jobs
            SET status = 'pending',
                attempts = 0,
                scheduled_for = NOW(),
                completed_at = NULL,
                origin_status = NULL,
                worker_id = NULL,
                updated_at = NOW()
            WHERE id = $1
              AND status = 'dead'
              AND NOT EXISTS (
                  SELECT 1 FROM jobs other
                  WHERE other.entity_id = jobs.entity_id
                    AND other.job_type = jobs.job_type
                    AND other.status IN ('pending', 'running')
              )
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_optional(conn)
        .await?;

        Ok(job)
    }
}

fn prefixed_columns(table: &str) -> String {
    JOB_COLUMNS
        .split(',')
        .map(|column| format!("{}.{}", table, column.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}
