//! Application state machine
//!
//! Pure decision logic - NO IO, only state transitions.
//!
//! - Pipeline: new → download → extract → summarize → ready_for_review
//! - Interview: advancing → send_interview → (webhook) → transcribe → interview_ready_for_review
//! - Human decisions and operator recovery on top of both

use crate::domains::applications::models::{ApplicationStatus, DecisionAction};
use crate::kernel::jobs::JobType;

use ApplicationStatus as S;

/// Where an application goes when a stage ends, and what runs next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub status: ApplicationStatus,
    pub next_job: Option<JobType>,
}

/// One row of the stage table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    pub job_type: JobType,
    pub accepted: &'static [ApplicationStatus],
    pub in_progress: ApplicationStatus,
    pub on_success: Step,
    pub on_permanent: Step,
}

const fn step(status: ApplicationStatus, next_job: Option<JobType>) -> Step {
    Step { status, next_job }
}

pub static STAGES: [Stage; 5] = [
    Stage {
        job_type: JobType::Download,
        accepted: &[S::New],
        in_progress: S::Downloading,
        on_success: step(S::Downloaded, Some(JobType::Extract)),
        on_permanent: step(S::NoResume, Some(JobType::Summarize)),
    },
    Stage {
        job_type: JobType::Extract,
        accepted: &[S::Downloaded],
        in_progress: S::Extracting,
        on_success: step(S::Extracted, Some(JobType::Summarize)),
        on_permanent: step(S::ExtractionFailed, Some(JobType::Summarize)),
    },
    Stage {
        job_type: JobType::Summarize,
        accepted: &[S::Extracted, S::ExtractionFailed, S::NoResume],
        in_progress: S::GeneratingSummary,
        on_success: step(S::ReadyForReview, None),
        on_permanent: step(S::ReadyForReview, None),
    },
    Stage {
        job_type: JobType::SendInterview,
        accepted: &[S::Advancing],
        in_progress: S::InterviewSending,
        on_success: step(S::InterviewSent, None),
        on_permanent: step(S::Error, None),
    },
    Stage {
        job_type: JobType::Transcribe,
        accepted: &[S::InterviewReceived],
        in_progress: S::Transcribing,
        on_success: step(S::InterviewReadyForReview, None),
        on_permanent: step(S::InterviewReadyForReview, None),
    },
];

/// The stage a job type drives, or None for jobs with no application (sync).
pub fn stage_for(job_type: JobType) -> Option<&'static Stage> {
    STAGES.iter().find(|stage| stage.job_type == job_type)
}

impl Stage {
    /// Statuses the stage may begin from. Includes its own in-progress
    /// status so a job reclaimed after a crash can pick up again.
    pub fn begin_from(&self) -> Vec<ApplicationStatus> {
        let mut statuses = self.accepted.to_vec();
        statuses.push(self.in_progress);
        statuses
    }

    pub fn can_begin_from(&self, status: ApplicationStatus) -> bool {
        self.accepted.contains(&status) || status == self.in_progress
    }

    /// Status to restore after a transient failure. Falls back to the first
    /// accepted status when the origin was never recorded or was the
    /// in-progress status itself.
    pub fn restore_to(&self, origin: Option<ApplicationStatus>) -> ApplicationStatus {
        match origin {
            Some(status) if self.accepted.contains(&status) => status,
            _ => self.accepted[0],
        }
    }
}

// =============================================================================
// Human decisions
// =============================================================================

/// Review status an application returns to, depending on whether the
/// candidate already completed an interview.
pub fn review_status(interviewed: bool) -> ApplicationStatus {
    if interviewed {
        S::InterviewReadyForReview
    } else {
        S::ReadyForReview
    }
}

/// Statuses a human decision may start from.
pub fn decision_sources(action: DecisionAction) -> &'static [ApplicationStatus] {
    match action {
        DecisionAction::Advance => &[S::ReadyForReview, S::InterviewReadyForReview, S::LiveInterviewPending],
        DecisionAction::Reject => &[
            S::ReadyForReview,
            S::InterviewReadyForReview,
            S::OnHold,
            S::LiveInterviewPending,
            S::InterviewExpired,
        ],
        DecisionAction::Hold => &[S::ReadyForReview, S::InterviewReadyForReview],
        DecisionAction::RemoveHold => &[S::OnHold],
        DecisionAction::Reconsider => &[S::Rejected],
        DecisionAction::RequestLiveInterview => &[S::InterviewReadyForReview],
        DecisionAction::Restart | DecisionAction::SkipToReview | DecisionAction::MarkSkipped => &[],
    }
}

/// Target status of a human decision, or None when `from` does not accept it.
pub fn decide(action: DecisionAction, from: ApplicationStatus, interviewed: bool) -> Option<ApplicationStatus> {
    if !decision_sources(action).contains(&from) {
        return None;
    }

    let to = match action {
        DecisionAction::Advance => match from {
            S::ReadyForReview => S::Advancing,
            _ => S::Advanced,
        },
        DecisionAction::Reject => S::Rejected,
        DecisionAction::Hold => S::OnHold,
        DecisionAction::RemoveHold | DecisionAction::Reconsider => review_status(interviewed),
        DecisionAction::RequestLiveInterview => S::LiveInterviewPending,
        DecisionAction::Restart | DecisionAction::SkipToReview | DecisionAction::MarkSkipped => {
            return None
        }
    };
    Some(to)
}

// =============================================================================
// Scheduler routing
// =============================================================================

/// What the eligibility sweep does with an `advancing` application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvancingRoute {
    /// Interviews are off; the candidate moves on directly.
    Advance,
    /// A recruiter asked to talk to the candidate in person.
    LiveInterview,
    SendInterview,
}

pub fn route_advancing(interviews_enabled: bool, human_requested: bool) -> AdvancingRoute {
    if !interviews_enabled {
        AdvancingRoute::Advance
    } else if human_requested {
        AdvancingRoute::LiveInterview
    } else {
        AdvancingRoute::SendInterview
    }
}

impl AdvancingRoute {
    pub fn target(&self) -> Option<ApplicationStatus> {
        match self {
            AdvancingRoute::Advance => Some(S::Advanced),
            AdvancingRoute::LiveInterview => Some(S::LiveInterviewPending),
            AdvancingRoute::SendInterview => None,
        }
    }
}

/// Statuses a completed interview moves the application out of. The send job
/// marks the invitation sent before its own transition commits, and a send
/// that timed out after delivering leaves the application in `advancing`
/// with the invitation still live.
pub const INTERVIEW_COMPLETION_SOURCES: [ApplicationStatus; 3] =
    [S::InterviewSent, S::InterviewSending, S::Advancing];

/// Statuses the stuck sweep may flag: machine statuses not configured as
/// waiting on a human.
pub fn stuck_candidates(human_wait: &[ApplicationStatus]) -> Vec<ApplicationStatus> {
    ApplicationStatus::MACHINE
        .into_iter()
        .filter(|status| !human_wait.contains(status))
        .collect()
}

// =============================================================================
// Operator recovery
// =============================================================================

/// Recovery is for errored applications and pipeline work that went quiet.
pub fn can_recover_from(status: ApplicationStatus) -> bool {
    status == S::Error || status.is_machine()
}

pub fn recovery_target(action: DecisionAction) -> Option<Step> {
    match action {
        DecisionAction::Restart => Some(step(S::New, Some(JobType::Download))),
        DecisionAction::SkipToReview => Some(step(S::ReadyForReview, None)),
        DecisionAction::MarkSkipped => Some(step(S::Skipped, None)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_has_no_stage() {
        assert!(stage_for(JobType::Sync).is_none());
        for job_type in JobType::ALL.into_iter().filter(|t| *t != JobType::Sync) {
            assert!(stage_for(job_type).is_some(), "{job_type} has no stage");
        }
    }

    #[test]
    fn every_in_progress_status_is_a_machine_status() {
        for stage in &STAGES {
            assert!(stage.in_progress.is_machine());
            assert!(!stage.accepted.contains(&stage.in_progress));
        }
    }

    #[test]
    fn happy_path_chains_from_new_to_review() {
        let mut status = S::New;
        let mut job = Some(JobType::Download);
        let mut visited = vec![status];
        while let Some(job_type) = job {
            let stage = stage_for(job_type).unwrap();
            assert!(stage.can_begin_from(status), "{job_type} cannot begin from {status}");
            visited.push(stage.in_progress);
            status = stage.on_success.status;
            visited.push(status);
            job = stage.on_success.next_job;
        }
        assert_eq!(status, S::ReadyForReview);
        assert_eq!(
            visited,
            vec![
                S::New,
                S::Downloading,
                S::Downloaded,
                S::Extracting,
                S::Extracted,
                S::GeneratingSummary,
                S::ReadyForReview
            ]
        );
    }

    #[test]
    fn permanent_failures_still_reach_review() {
        for start in [JobType::Download, JobType::Extract] {
            let mut job = Some(start);
            let mut status = S::New;
            while let Some(job_type) = job {
                let stage = stage_for(job_type).unwrap();
                status = stage.on_permanent.status;
                job = stage.on_permanent.next_job;
            }
            assert_eq!(status, S::ReadyForReview);
        }
    }

    #[test]
    fn missing_resume_flows_into_summary() {
        let download = stage_for(JobType::Download).unwrap();
        assert_eq!(download.on_permanent, step(S::NoResume, Some(JobType::Summarize)));
        assert!(stage_for(JobType::Summarize).unwrap().can_begin_from(S::NoResume));
    }

    #[test]
    fn send_interview_failure_parks_in_error() {
        let stage = stage_for(JobType::SendInterview).unwrap();
        assert_eq!(stage.on_permanent.status, S::Error);
    }

    #[test]
    fn reclaimed_job_may_begin_from_in_progress() {
        let stage = stage_for(JobType::Extract).unwrap();
        assert!(stage.can_begin_from(S::Extracting));
        assert!(!stage.can_begin_from(S::ReadyForReview));
        assert_eq!(stage.begin_from(), vec![S::Downloaded, S::Extracting]);
    }

    #[test]
    fn restore_prefers_recorded_origin() {
        let stage = stage_for(JobType::Summarize).unwrap();
        assert_eq!(stage.restore_to(Some(S::NoResume)), S::NoResume);
        assert_eq!(stage.restore_to(Some(S::GeneratingSummary)), S::Extracted);
        assert_eq!(stage.restore_to(None), S::Extracted);
    }

    #[test]
    fn advance_depends_on_source() {
        assert_eq!(decide(DecisionAction::Advance, S::ReadyForReview, false), Some(S::Advancing));
        assert_eq!(decide(DecisionAction::Advance, S::InterviewReadyForReview, true), Some(S::Advanced));
        assert_eq!(decide(DecisionAction::Advance, S::LiveInterviewPending, true), Some(S::Advanced));
        assert_eq!(decide(DecisionAction::Advance, S::OnHold, false), None);
    }

    #[test]
    fn reject_is_allowed_from_every_review_status() {
        for from in [
            S::ReadyForReview,
            S::InterviewReadyForReview,
            S::OnHold,
            S::LiveInterviewPending,
            S::InterviewExpired,
        ] {
            assert_eq!(decide(DecisionAction::Reject, from, false), Some(S::Rejected));
        }
        assert_eq!(decide(DecisionAction::Reject, S::Extracting, false), None);
        assert_eq!(decide(DecisionAction::Reject, S::Rejected, false), None);
    }

    #[test]
    fn remove_hold_and_reconsider_use_derived_review_status() {
        assert_eq!(decide(DecisionAction::RemoveHold, S::OnHold, false), Some(S::ReadyForReview));
        assert_eq!(decide(DecisionAction::RemoveHold, S::OnHold, true), Some(S::InterviewReadyForReview));
        assert_eq!(decide(DecisionAction::Reconsider, S::Rejected, true), Some(S::InterviewReadyForReview));
        assert_eq!(decide(DecisionAction::Reconsider, S::ReadyForReview, false), None);
    }

    #[test]
    fn live_interview_only_after_interview_review() {
        assert_eq!(
            decide(DecisionAction::RequestLiveInterview, S::InterviewReadyForReview, true),
            Some(S::LiveInterviewPending)
        );
        assert_eq!(decide(DecisionAction::RequestLiveInterview, S::ReadyForReview, false), None);
    }

    #[test]
    fn recovery_actions_are_not_human_decisions() {
        assert_eq!(decide(DecisionAction::Restart, S::Error, false), None);
        assert_eq!(recovery_target(DecisionAction::Restart), Some(step(S::New, Some(JobType::Download))));
        assert_eq!(recovery_target(DecisionAction::Advance), None);
    }

    #[test]
    fn recovery_only_from_error_or_pipeline_statuses() {
        assert!(can_recover_from(S::Error));
        assert!(can_recover_from(S::Extracting));
        assert!(!can_recover_from(S::ReadyForReview));
        assert!(!can_recover_from(S::Advanced));
    }

    #[test]
    fn advancing_routes() {
        assert_eq!(route_advancing(false, true), AdvancingRoute::Advance);
        assert_eq!(route_advancing(true, true), AdvancingRoute::LiveInterview);
        assert_eq!(route_advancing(true, false), AdvancingRoute::SendInterview);
        assert_eq!(AdvancingRoute::SendInterview.target(), None);
    }

    #[test]
    fn interview_completion_covers_the_send_window() {
        let send = stage_for(JobType::SendInterview).unwrap();
        assert!(INTERVIEW_COMPLETION_SOURCES.contains(&send.on_success.status));
        assert!(INTERVIEW_COMPLETION_SOURCES.contains(&send.in_progress));
        for status in send.accepted {
            assert!(INTERVIEW_COMPLETION_SOURCES.contains(status));
        }
        assert!(!INTERVIEW_COMPLETION_SOURCES.contains(&S::InterviewExpired));
    }

    #[test]
    fn stuck_candidates_exclude_configured_waits() {
        let candidates = stuck_candidates(&[S::ReadyForReview, S::Advancing]);
        assert!(!candidates.contains(&S::Advancing));
        assert!(candidates.contains(&S::Extracting));
        for status in ApplicationStatus::REQUIRED_HUMAN_WAIT {
            assert!(!candidates.contains(&status));
        }
    }
}
