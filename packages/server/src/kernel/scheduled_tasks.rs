//! Scheduled background tasks using tokio-cron-scheduler.
//!
//! Two independent sweeps on fixed intervals:
//! - Eligibility: enqueue the talent-system sync, downloads for new
//!   applications, and route advancing applications
//! - Stuck/expiry: flag quiet pipeline work as `error` and expire overdue
//!   interview invitations
//!
//! # Architecture
//!
//! Sweeps never run stage work themselves. They only enqueue jobs or make
//! conditional status changes, so running them on several replicas at once
//! is harmless.
//!
//! ```text
//! Scheduler (every ELIGIBILITY_SWEEP_SECS)
//!     └─► run_eligibility_sweep() → enqueue sync / download / send_interview
//!
//! Scheduler (every STUCK_SWEEP_SECS)
//!     └─► run_stuck_sweep() → error flags + interview expiry
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::domains::applications::actions::{run_eligibility_sweep, run_stuck_sweep};
use crate::kernel::ServerDeps;

/// Sweep intervals.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub eligibility_interval: Duration,
    pub stuck_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            eligibility_interval: Duration::from_secs(60),
            stuck_interval: Duration::from_secs(300),
        }
    }
}

/// Start all scheduled tasks
pub async fn start_scheduler(deps: Arc<ServerDeps>, config: SchedulerConfig) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let eligibility_deps = deps.clone();
    let eligibility_job = Job::new_repeated_async(config.eligibility_interval, move |_uuid, _lock| {
        let deps = eligibility_deps.clone();
        Box::pin(async move {
            if let Err(e) = run_eligibility_sweep(&deps).await {
                tracing::error!(error = %e, "eligibility sweep failed");
            }
        })
    })?;

    scheduler.add(eligibility_job).await?;

    let stuck_deps = deps.clone();
    let stuck_job = Job::new_repeated_async(config.stuck_interval, move |_uuid, _lock| {
        let deps = stuck_deps.clone();
        Box::pin(async move {
            if let Err(e) = run_stuck_sweep(&deps).await {
                tracing::error!(error = %e, "stuck sweep failed");
            }
        })
    })?;

    scheduler.add(stuck_job).await?;
    scheduler.start().await?;

    tracing::info!(
        eligibility_secs = config.eligibility_interval.as_secs(),
        stuck_secs = config.stuck_interval.as_secs(),
        "scheduled sweeps started"
    );
    Ok(scheduler)
}
