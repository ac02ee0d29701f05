//! Job worker service for processing application stages.
//!
//! The `JobWorker` runs a fixed number of slots. Each slot:
//! - Claims the next job via `PostgresJobQueue` (SKIP LOCKED)
//! - Moves the application into the stage's in-progress status
//! - Runs the registered handler under the job type's timeout, heartbeating the lease
//! - Resolves the outcome: complete, retry, dead-letter or mark obsolete
//!
//! # Architecture
//!
//! ```text
//! JobWorker
//!     │
//!     ├─► claim (PostgresJobQueue)
//!     ├─► begin_stage (application → in progress)
//!     ├─► JobRegistry.execute(job_type, entity_id) + heartbeat
//!     └─► complete_stage | retry_stage | fail_stage (one transaction each)
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::error::JobError;
use super::job::{Job, JobType};
use super::queue::PostgresJobQueue;
use super::registry::SharedJobRegistry;
use crate::common::JobId;
use crate::domains::applications::actions::stage;
use crate::domains::applications::error::ApplicationError;
use crate::kernel::ServerDeps;

/// How a claimed job ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobResolution {
    Completed,
    Retrying { scheduled_for: DateTime<Utc> },
    Dead,
    /// The application moved on; the job no longer applies.
    Failed,
    /// Another worker reclaimed the job after our lease expired.
    Lost,
    /// Bookkeeping failed before the handler ran; the lease will expire
    /// and the job will be reclaimed.
    Abandoned,
}

/// A job processed by `run_once`.
#[derive(Debug, Clone, Copy)]
pub struct ProcessedJob {
    pub job_id: JobId,
    pub job_type: JobType,
    pub resolution: JobResolution,
}

/// Configuration for the job worker.
#[derive(Debug, Clone)]
pub struct JobWorkerConfig {
    /// Number of concurrent claim/execute loops
    pub concurrency: usize,
    /// How long an idle slot sleeps before polling again
    pub poll_interval: Duration,
    /// How often to extend the lease of a running job
    pub heartbeat_interval: Duration,
    /// Overrides every job type's own timeout when set
    pub job_timeout: Option<Duration>,
    /// Worker ID prefix for this instance; slots append their index
    pub worker_id: String,
}

impl Default for JobWorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            poll_interval: Duration::from_secs(2),
            heartbeat_interval: Duration::from_secs(30),
            job_timeout: None,
            worker_id: format!("worker-{}", Uuid::new_v4()),
        }
    }
}

impl JobWorkerConfig {
    /// Create a new config with a specific worker ID.
    pub fn with_worker_id(worker_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            ..Default::default()
        }
    }

    /// Cap the heartbeat at a third of the lease, so a live job is always
    /// extended well before another worker could reclaim it.
    pub fn fit_to_lease(mut self, lease: Duration) -> Self {
        self.heartbeat_interval = self
            .heartbeat_interval
            .min(lease / 3)
            .max(Duration::from_millis(1));
        self
    }

    pub fn timeout_for(&self, job_type: JobType) -> Duration {
        self.job_timeout.unwrap_or_else(|| job_type.timeout())
    }
}

pub struct JobWorker {
    queue: PostgresJobQueue,
    registry: SharedJobRegistry,
    deps: Arc<ServerDeps>,
    config: JobWorkerConfig,
}

impl JobWorker {
    pub fn new(
        queue: PostgresJobQueue,
        registry: SharedJobRegistry,
        deps: Arc<ServerDeps>,
        config: JobWorkerConfig,
    ) -> Self {
        let lease = Duration::from_millis(queue.lease_duration_ms().max(0) as u64);
        Self {
            queue,
            registry,
            deps,
            config: config.fit_to_lease(lease),
        }
    }

    pub fn config(&self) -> &JobWorkerConfig {
        &self.config
    }

    /// Claim and fully process at most one job. `Ok(None)` when nothing was eligible.
    pub async fn run_once(&self, worker_id: &str) -> Result<Option<ProcessedJob>> {
        let Some(job) = self.queue.claim_next(worker_id).await? else {
            return Ok(None);
        };

        let job_id = job.id;
        let job_type = job.job_type;
        let resolution = self.process(job, worker_id).await?;

        Ok(Some(ProcessedJob {
            job_id,
            job_type,
            resolution,
        }))
    }

    /// Process a single claimed job.
    async fn process(&self, job: Job, worker_id: &str) -> Result<JobResolution> {
        let pool = self.queue.pool();

        if !job.has_attempts_left() {
            warn!(
                job_id = %job.id,
                job_type = %job.job_type,
                attempt = job.attempts,
                "reclaimed job has no attempts left"
            );
            return stage::bury_exhausted(&job, worker_id, pool).await;
        }

        let origin = match stage::begin_stage(&job, pool).await {
            Ok(origin) => origin,
            Err(ApplicationError::InvalidState(err)) => {
                return stage::mark_obsolete(&job, &err, pool).await;
            }
            Err(err @ (ApplicationError::NotFound(_) | ApplicationError::Validation(_))) => {
                error!(job_id = %job.id, job_type = %job.job_type, error = %err, "job cannot start");
                let mut conn = pool.acquire().await?;
                Job::mark_dead(job.id, worker_id, &err.to_string(), true, &mut conn).await?;
                return Ok(JobResolution::Dead);
            }
            Err(err) => {
                error!(job_id = %job.id, job_type = %job.job_type, error = %err, "failed to begin stage");
                return Ok(JobResolution::Abandoned);
            }
        };

        debug!(
            job_id = %job.id,
            job_type = %job.job_type,
            entity_id = %job.entity_id,
            attempt = job.attempts + 1,
            "executing job"
        );

        let result = self.execute_with_heartbeat(&job, worker_id).await;

        let resolution = match &result {
            Ok(()) => stage::complete_stage(&job, worker_id, pool).await?,
            Err(err) if err.is_transient() => {
                warn!(
                    job_id = %job.id,
                    job_type = %job.job_type,
                    attempt = job.attempts + 1,
                    error = %err,
                    "job failed, will retry if attempts remain"
                );
                stage::retry_stage(&job, worker_id, origin, err, pool).await?
            }
            Err(err) => {
                warn!(job_id = %job.id, job_type = %job.job_type, error = %err, "job failed permanently");
                stage::fail_stage(&job, worker_id, err, pool).await?
            }
        };

        match resolution {
            JobResolution::Completed => {
                info!(job_id = %job.id, job_type = %job.job_type, "job succeeded")
            }
            JobResolution::Dead => {
                error!(job_id = %job.id, job_type = %job.job_type, "job dead-lettered")
            }
            JobResolution::Lost => {
                warn!(job_id = %job.id, job_type = %job.job_type, "lease lost before resolution")
            }
            JobResolution::Retrying { scheduled_for } => {
                debug!(job_id = %job.id, scheduled_for = %scheduled_for, "job rescheduled")
            }
            JobResolution::Failed | JobResolution::Abandoned => {}
        }

        Ok(resolution)
    }

    /// Run the handler under the type's timeout while extending the lease.
    async fn execute_with_heartbeat(&self, job: &Job, worker_id: &str) -> Result<(), JobError> {
        let cancel = CancellationToken::new();
        let _stop_heartbeat = cancel.clone().drop_guard();

        let queue = self.queue.clone();
        let heartbeat_interval = self.config.heartbeat_interval;
        let job_id = job.id;
        let owner = worker_id.to_string();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(heartbeat_interval);
            interval.tick().await; // Skip first immediate tick

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        match queue.heartbeat(job_id, &owner).await {
                            Ok(true) => {}
                            Ok(false) => {
                                warn!(job_id = %job_id, "heartbeat found job no longer owned");
                                break;
                            }
                            Err(e) => warn!(job_id = %job_id, error = %e, "heartbeat failed"),
                        }
                    }
                }
            }
        });

        let timeout = self.config.timeout_for(job.job_type);
        let execution = self
            .registry
            .execute(job.job_type, job.entity_id, self.deps.clone());

        match tokio::time::timeout(timeout, execution).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    job_id = %job.id,
                    job_type = %job.job_type,
                    timeout_secs = timeout.as_secs(),
                    retry_risk = job.job_type.duplicate_effect_risk(),
                    "job timed out"
                );
                Err(JobError::transient(format!(
                    "{} timed out after {}s",
                    job.job_type,
                    timeout.as_secs()
                )))
            }
        }
    }

    /// Run every slot until `shutdown` is cancelled. In-flight jobs finish first.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) -> Result<()> {
        info!(
            worker_id = %self.config.worker_id,
            concurrency = self.config.concurrency,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "job worker starting"
        );

        let slots = (0..self.config.concurrency.max(1)).map(|slot| {
            let worker = self.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { worker.run_slot(slot, shutdown).await })
        });

        for result in futures::future::join_all(slots).await {
            if let Err(e) = result {
                error!(error = %e, "worker slot panicked");
            }
        }

        info!(worker_id = %self.config.worker_id, "job worker stopped");
        Ok(())
    }

    async fn run_slot(&self, slot: usize, shutdown: CancellationToken) {
        let worker_id = format!("{}-{}", self.config.worker_id, slot);

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            let idle = match self.run_once(&worker_id).await {
                Ok(Some(_)) => None,
                Ok(None) => Some(self.config.poll_interval),
                Err(e) => {
                    error!(worker_id = %worker_id, error = %e, "job processing failed");
                    Some(Duration::from_secs(1))
                }
            };

            if let Some(wait) = idle {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(wait) => {}
                }
            }
        }
    }
}
