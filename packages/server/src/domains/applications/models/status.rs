//! Application status vocabulary.
//!
//! Statuses fall into four classes:
//! - machine statuses, advanced automatically by job completions
//! - human-wait statuses, suspended until a recruiter decides
//! - terminal statuses, retained for audit
//! - `error`, parked for operator recovery

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "application_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    New,
    Downloading,
    Downloaded,
    NoResume,
    Extracting,
    Extracted,
    ExtractionFailed,
    GeneratingSummary,
    ReadyForReview,
    Advancing,
    OnHold,
    Rejected,
    InterviewSending,
    InterviewSent,
    InterviewReceived,
    Transcribing,
    InterviewReadyForReview,
    LiveInterviewPending,
    InterviewExpired,
    Advanced,
    Error,
    Skipped,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 22] = [
        Self::New,
        Self::Downloading,
        Self::Downloaded,
        Self::NoResume,
        Self::Extracting,
        Self::Extracted,
        Self::ExtractionFailed,
        Self::GeneratingSummary,
        Self::ReadyForReview,
        Self::Advancing,
        Self::OnHold,
        Self::Rejected,
        Self::InterviewSending,
        Self::InterviewSent,
        Self::InterviewReceived,
        Self::Transcribing,
        Self::InterviewReadyForReview,
        Self::LiveInterviewPending,
        Self::InterviewExpired,
        Self::Advanced,
        Self::Error,
        Self::Skipped,
    ];

    /// Statuses that must always be treated as waiting on a human, whatever
    /// the configured exclusion list says.
    pub const REQUIRED_HUMAN_WAIT: [ApplicationStatus; 3] = [
        Self::ReadyForReview,
        Self::InterviewReadyForReview,
        Self::OnHold,
    ];

    /// Statuses the pipeline moves through on its own. An application sitting
    /// in one of these for too long without a job is stuck.
    pub const MACHINE: [ApplicationStatus; 12] = [
        Self::New,
        Self::Downloading,
        Self::Downloaded,
        Self::NoResume,
        Self::Extracting,
        Self::Extracted,
        Self::ExtractionFailed,
        Self::GeneratingSummary,
        Self::Advancing,
        Self::InterviewSending,
        Self::InterviewReceived,
        Self::Transcribing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Downloading => "downloading",
            Self::Downloaded => "downloaded",
            Self::NoResume => "no_resume",
            Self::Extracting => "extracting",
            Self::Extracted => "extracted",
            Self::ExtractionFailed => "extraction_failed",
            Self::GeneratingSummary => "generating_summary",
            Self::ReadyForReview => "ready_for_review",
            Self::Advancing => "advancing",
            Self::OnHold => "on_hold",
            Self::Rejected => "rejected",
            Self::InterviewSending => "interview_sending",
            Self::InterviewSent => "interview_sent",
            Self::InterviewReceived => "interview_received",
            Self::Transcribing => "transcribing",
            Self::InterviewReadyForReview => "interview_ready_for_review",
            Self::LiveInterviewPending => "live_interview_pending",
            Self::InterviewExpired => "interview_expired",
            Self::Advanced => "advanced",
            Self::Error => "error",
            Self::Skipped => "skipped",
        }
    }

    pub fn is_machine(&self) -> bool {
        Self::MACHINE.contains(self)
    }

    pub fn is_human_wait(&self) -> bool {
        matches!(
            self,
            Self::ReadyForReview
                | Self::InterviewReadyForReview
                | Self::OnHold
                | Self::LiveInterviewPending
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Advanced | Self::Rejected | Self::Skipped)
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown application status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for ApplicationStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == needle)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}
