//! PostgreSQL-backed job queue.
//!
//! `enqueue` takes a bare connection so callers can insert the next job in
//! the same transaction that advances the application.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info};
use uuid::Uuid;

use super::job::{Job, NewJob};
use crate::common::JobId;

/// Result type for enqueue operations that handles idempotency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueResult {
    /// Job was enqueued, returns new job ID
    Created(JobId),
    /// A pending or running job already exists for the same entity and type
    Duplicate(JobId),
}

impl EnqueueResult {
    /// Get the job ID regardless of whether it was created or duplicate
    pub fn job_id(&self) -> JobId {
        match self {
            EnqueueResult::Created(id) | EnqueueResult::Duplicate(id) => *id,
        }
    }

    /// Returns true if this was a newly created job
    pub fn is_created(&self) -> bool {
        matches!(self, EnqueueResult::Created(_))
    }
}

/// Insert a pending job unless one is already in flight for (entity, type).
///
/// Safe to call inside an open transaction.
pub async fn enqueue(new: NewJob, conn: &mut PgConnection) -> Result<EnqueueResult> {
    if let Some(id) = Job::insert_if_absent(&new, &mut *conn).await? {
        debug!(
            job_id = %id,
            job_type = %new.job_type,
            entity_id = %new.entity_id,
            "job enqueued"
        );
        return Ok(EnqueueResult::Created(id));
    }

    // The in-flight row can finish between the failed insert and this read.
    // Retry once so a caller never sees a spurious error.
    match Job::find_in_flight(new.entity_id, new.job_type, &mut *conn).await? {
        Some(existing) => Ok(EnqueueResult::Duplicate(existing.id)),
        None => match Job::insert_if_absent(&new, &mut *conn).await? {
            Some(id) => Ok(EnqueueResult::Created(id)),
            None => Job::find_in_flight(new.entity_id, new.job_type, &mut *conn)
                .await?
                .map(|existing| EnqueueResult::Duplicate(existing.id))
                .ok_or_else(|| {
                    anyhow!(
                        "enqueue of {} for {} conflicted without an in-flight row",
                        new.job_type,
                        new.entity_id
                    )
                }),
        },
    }
}

/// Queue operations used by workers and the admin surface.
#[derive(Clone)]
pub struct PostgresJobQueue {
    pool: PgPool,
    lease_duration_ms: i64,
}

impl PostgresJobQueue {
    pub fn new(pool: PgPool, lease_duration_ms: i64) -> Self {
        Self {
            pool,
            lease_duration_ms,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn lease_duration_ms(&self) -> i64 {
        self.lease_duration_ms
    }

    pub async fn enqueue(&self, new: NewJob) -> Result<EnqueueResult> {
        let mut conn = self.pool.acquire().await?;
        enqueue(new, &mut conn).await
    }

    /// Claim up to `limit` jobs for processing.
    ///
    /// Uses `FOR UPDATE SKIP LOCKED` so concurrent workers get disjoint jobs.
    pub async fn claim(&self, worker_id: &str, limit: i64) -> Result<Vec<Job>> {
        let mut conn = self.pool.acquire().await?;
        let jobs = Job::claim(limit, worker_id, self.lease_duration_ms, &mut conn).await?;
        if !jobs.is_empty() {
            debug!(worker_id = %worker_id, count = jobs.len(), "claimed jobs");
        }
        Ok(jobs)
    }

    /// Claim the single highest-priority eligible job. Never blocks.
    pub async fn claim_next(&self, worker_id: &str) -> Result<Option<Job>> {
        Ok(self.claim(worker_id, 1).await?.into_iter().next())
    }

    /// Extend the lease of a running job.
    ///
    /// Returns false if the job is no longer owned by this worker.
    pub async fn heartbeat(&self, job_id: JobId, worker_id: &str) -> Result<bool> {
        Job::extend_lease(job_id, worker_id, self.lease_duration_ms, &self.pool).await
    }

    pub async fn next_run_time(&self) -> Result<Option<DateTime<Utc>>> {
        Job::find_next_run_time(&self.pool).await
    }

    pub async fn find_by_entity(&self, entity_id: Uuid) -> Result<Vec<Job>> {
        Job::find_by_entity(entity_id, &self.pool).await
    }

    pub async fn list_dead(&self, limit: i64) -> Result<Vec<Job>> {
        Job::find_dead(limit, &self.pool).await
    }

    /// Re-queue a dead job with a fresh attempt budget.
    ///
    /// Returns None if the job is not dead or its stage is already in flight.
    pub async fn retry_dead(&self, job_id: JobId) -> Result<Option<Job>> {
        let mut conn = self.pool.acquire().await?;
        let revived = Job::revive(job_id, &mut conn).await?;
        if let Some(job) = &revived {
            info!(job_id = %job.id, job_type = %job.job_type, "dead job re-queued");
        }
        Ok(revived)
    }
}
