// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Stage handlers in the domains decide what to call and what to store.
//
// Naming convention: Base* for trait names (e.g., BaseTalentSystem, BaseFactExtractor)

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::common::InterviewId;

// =============================================================================
// Provider errors
// =============================================================================

/// Failure reported by an external collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("rate limited")]
    RateLimited { retry_after: Option<Duration> },

    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid request: {0}")]
    Invalid(String),

    #[error("unparseable response: {0}")]
    Parse(String),
}

impl ProviderError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited { .. }
                | ProviderError::Timeout
                | ProviderError::Network(_)
                | ProviderError::Unavailable(_)
        )
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ProviderError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

// =============================================================================
// Talent System (source of applications)
// =============================================================================

/// A candidate application as reported by the talent system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TalentRecord {
    pub candidate_ref: String,
    pub candidate_name: String,
    pub candidate_email: String,
    pub job_title: String,
    #[serde(default)]
    pub job_description: Option<String>,
    /// Status as the talent system sees it. A change means a human acted
    /// there and the pipeline should stop touching the application.
    #[serde(default)]
    pub external_status: Option<String>,
}

#[async_trait]
pub trait BaseTalentSystem: Send + Sync {
    /// Applications created or changed since `since` (everything when None).
    async fn fetch_new_or_changed(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> ProviderResult<Vec<TalentRecord>>;

    /// Resume bytes, or None when the candidate did not attach one.
    async fn download_resume(&self, candidate_ref: &str) -> ProviderResult<Option<Vec<u8>>>;

    /// Attach a document to the candidate's record. Returns the document id.
    async fn upload_attachment(
        &self,
        candidate_ref: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> ProviderResult<String>;
}

// =============================================================================
// Resume Parser
// =============================================================================

#[async_trait]
pub trait BaseResumeParser: Send + Sync {
    /// Plain text of a resume document.
    async fn parse(&self, bytes: &[u8]) -> ProviderResult<String>;
}

// =============================================================================
// AI extraction and summarization
// =============================================================================

/// Facts pulled out of a resume. The shape belongs to the extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StructuredFacts(pub serde_json::Value);

/// Everything the summarizer gets to see about a candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryRequest {
    pub candidate_name: String,
    pub job_title: String,
    pub job_description: Option<String>,
    pub resume_text: Option<String>,
    pub facts: Option<StructuredFacts>,
}

#[async_trait]
pub trait BaseFactExtractor: Send + Sync {
    /// `ProviderError::Parse` when the model output cannot be read as facts.
    async fn extract(
        &self,
        resume_text: &str,
        job_description: Option<&str>,
    ) -> ProviderResult<StructuredFacts>;

    async fn summarize(&self, request: &SummaryRequest) -> ProviderResult<String>;
}

// =============================================================================
// Interview Channel
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewInvitation {
    pub interview_id: InterviewId,
    pub token: String,
    pub candidate_name: String,
    pub candidate_email: String,
    pub job_title: String,
    pub expires_at: DateTime<Utc>,
}

#[async_trait]
pub trait BaseInterviewChannel: Send + Sync {
    async fn send_invitation(&self, invitation: &InterviewInvitation) -> ProviderResult<()>;

    /// Transcript of a completed interview.
    async fn transcribe(&self, interview_id: InterviewId) -> ProviderResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(ProviderError::RateLimited { retry_after: None }.is_transient());
        assert!(ProviderError::Timeout.is_transient());
        assert!(!ProviderError::NotFound("x".into()).is_transient());
        assert!(!ProviderError::Parse("x".into()).is_transient());
    }

    #[test]
    fn talent_record_tolerates_missing_optionals() {
        let record: TalentRecord = serde_json::from_str(
            r#"{"candidate_ref":"C-1","candidate_name":"Ada","candidate_email":"ada@example.com","job_title":"Engineer"}"#,
        )
        .unwrap();
        assert_eq!(record.job_description, None);
        assert_eq!(record.external_status, None);
    }
}
