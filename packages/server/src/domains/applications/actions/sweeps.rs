//! Periodic sweeps run by the scheduler.

use anyhow::Result;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::domains::applications::error::ApplicationError;
use crate::domains::applications::machines::{route_advancing, stuck_candidates, AdvancingRoute};
use crate::domains::applications::models::{Application, ApplicationStatus};
use crate::domains::interviews::actions::expire_interviews;
use crate::kernel::jobs::{enqueue, JobType, NewJob};
use crate::kernel::ServerDeps;

const SWEEP_BATCH: i64 = 500;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EligibilityReport {
    pub sync_enqueued: bool,
    pub downloads_enqueued: usize,
    pub interviews_enqueued: usize,
    pub advanced: usize,
    pub live_interviews: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StuckReport {
    pub flagged: Vec<(crate::common::ApplicationId, ApplicationStatus)>,
    pub interviews_expired: usize,
}

/// Enqueue work that became eligible: the talent-system sync, downloads for
/// new applications, and routing for advancing ones.
pub async fn run_eligibility_sweep(deps: &ServerDeps) -> Result<EligibilityReport> {
    let pool = deps.pool();
    let mut report = EligibilityReport::default();
    let mut conn = pool.acquire().await?;

    report.sync_enqueued = enqueue(NewJob::sync(), &mut conn).await?.is_created();

    for application_id in Application::find_awaiting_download(SWEEP_BATCH, pool).await? {
        let result = enqueue(
            NewJob::for_application(JobType::Download, application_id),
            &mut conn,
        )
        .await?;
        if result.is_created() {
            report.downloads_enqueued += 1;
        }
    }

    for application in Application::find_advancing(SWEEP_BATCH, pool).await? {
        let route = route_advancing(deps.settings.interviews_enabled, application.human_requested);

        let Some(to) = route.target() else {
            let result = enqueue(
                NewJob::for_application(JobType::SendInterview, application.id),
                &mut conn,
            )
            .await?;
            if result.is_created() {
                report.interviews_enqueued += 1;
            }
            continue;
        };

        match Application::transition(application.id, &[ApplicationStatus::Advancing], to, &mut conn).await {
            Ok(_) => match route {
                AdvancingRoute::LiveInterview => report.live_interviews += 1,
                _ => report.advanced += 1,
            },
            Err(ApplicationError::InvalidState(err)) => {
                debug!(application_id = %application.id, error = %err, "advancing application moved on");
            }
            Err(err) => return Err(err.into()),
        }
    }

    if report != EligibilityReport::default() {
        info!(
            sync_enqueued = report.sync_enqueued,
            downloads = report.downloads_enqueued,
            interviews = report.interviews_enqueued,
            advanced = report.advanced,
            live_interviews = report.live_interviews,
            "eligibility sweep"
        );
    }

    Ok(report)
}

/// Flag stuck pipeline work as `error` and expire overdue interviews.
/// Applications waiting on a human are never flagged.
pub async fn run_stuck_sweep(deps: &ServerDeps) -> Result<StuckReport> {
    let pool = deps.pool();
    let timeout = chrono::Duration::from_std(deps.settings.stuck_timeout)?;
    let cutoff = Utc::now() - timeout;
    let statuses = stuck_candidates(deps.settings.human_wait_statuses());

    let mut tx = pool.begin().await?;
    let flagged = Application::flag_stuck(&statuses, cutoff, &mut tx).await?;
    tx.commit().await?;

    for (application_id, status) in &flagged {
        warn!(
            application_id = %application_id,
            stuck_in = %status,
            "application stuck, flagged as error"
        );
    }

    let expired = expire_interviews(pool).await?;

    Ok(StuckReport {
        flagged,
        interviews_expired: expired.len(),
    })
}
