//! Server dependencies for job handlers and actions (using traits for testability)
//!
//! All external collaborators sit behind `Base*` traits so tests can swap in
//! the mocks from `test_dependencies`.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;

use crate::domains::applications::models::ApplicationStatus;
use crate::kernel::{BaseFactExtractor, BaseInterviewChannel, BaseResumeParser, BaseTalentSystem};

// =============================================================================
// PipelineSettings
// =============================================================================

/// Tunables for the pipeline that handlers and sweeps consult.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub interviews_enabled: bool,
    pub interview_ttl: Duration,
    pub stuck_timeout: Duration,
    /// Always a superset of `ApplicationStatus::REQUIRED_HUMAN_WAIT`.
    human_wait_statuses: Vec<ApplicationStatus>,
}

impl PipelineSettings {
    pub fn new(
        interviews_enabled: bool,
        interview_ttl: Duration,
        stuck_timeout: Duration,
        extra_human_wait: impl IntoIterator<Item = ApplicationStatus>,
    ) -> Self {
        Self {
            interviews_enabled,
            interview_ttl,
            stuck_timeout,
            human_wait_statuses: union_human_wait(extra_human_wait),
        }
    }

    pub fn human_wait_statuses(&self) -> &[ApplicationStatus] {
        &self.human_wait_statuses
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::new(
            true,
            Duration::from_secs(72 * 3600),
            Duration::from_secs(30 * 60),
            [ApplicationStatus::LiveInterviewPending],
        )
    }
}

/// Merge a configured list with the statuses that always wait on a human.
pub fn union_human_wait(
    extra: impl IntoIterator<Item = ApplicationStatus>,
) -> Vec<ApplicationStatus> {
    let mut seen = HashSet::new();
    ApplicationStatus::REQUIRED_HUMAN_WAIT
        .into_iter()
        .chain(extra)
        .filter(|status| seen.insert(*status))
        .collect()
}

// =============================================================================
// ServerDeps
// =============================================================================

/// Server dependencies accessible to job handlers and actions.
#[derive(Clone)]
pub struct ServerDeps {
    pub db_pool: PgPool,
    pub talent: Arc<dyn BaseTalentSystem>,
    pub resume_parser: Arc<dyn BaseResumeParser>,
    pub extractor: Arc<dyn BaseFactExtractor>,
    pub interviews: Arc<dyn BaseInterviewChannel>,
    pub settings: PipelineSettings,
}

impl ServerDeps {
    pub fn new(
        db_pool: PgPool,
        talent: Arc<dyn BaseTalentSystem>,
        resume_parser: Arc<dyn BaseResumeParser>,
        extractor: Arc<dyn BaseFactExtractor>,
        interviews: Arc<dyn BaseInterviewChannel>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            db_pool,
            talent,
            resume_parser,
            extractor,
            interviews,
            settings,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.db_pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_statuses_survive_an_empty_list() {
        let statuses = union_human_wait([]);
        for required in ApplicationStatus::REQUIRED_HUMAN_WAIT {
            assert!(statuses.contains(&required));
        }
    }

    #[test]
    fn configured_statuses_are_added_once() {
        let statuses = union_human_wait([
            ApplicationStatus::OnHold,
            ApplicationStatus::InterviewExpired,
            ApplicationStatus::InterviewExpired,
        ]);
        assert_eq!(statuses.len(), 4);
        assert!(statuses.contains(&ApplicationStatus::InterviewExpired));
    }
}
