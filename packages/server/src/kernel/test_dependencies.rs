// TestDependencies - mock implementations for testing
//
// Provides mock collaborators that can be injected into ServerDeps for tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::{
    BaseFactExtractor, BaseInterviewChannel, BaseResumeParser, BaseTalentSystem,
    InterviewInvitation, PipelineSettings, ProviderError, ProviderResult, ServerDeps,
    StructuredFacts, SummaryRequest, TalentRecord,
};
use crate::common::InterviewId;

// =============================================================================
// Failure scripting
// =============================================================================

/// Errors a mock operation returns before it starts succeeding.
///
/// Queued errors are returned first, one per call. After the queue drains the
/// `always` error (if any) is returned on every call.
#[derive(Default)]
struct FailureScript {
    queued: Vec<ProviderError>,
    always: Option<ProviderError>,
}

impl FailureScript {
    fn next(&mut self) -> Option<ProviderError> {
        if !self.queued.is_empty() {
            return Some(self.queued.remove(0));
        }
        self.always.clone()
    }
}

// =============================================================================
// Mock Talent System
// =============================================================================

pub struct MockTalentSystem {
    batches: Arc<Mutex<Vec<Vec<TalentRecord>>>>,
    resumes: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    default_resume: Option<Vec<u8>>,
    download_failures: Arc<Mutex<FailureScript>>,
    upload_failures: Arc<Mutex<FailureScript>>,
    fetch_calls: Arc<Mutex<Vec<Option<DateTime<Utc>>>>>,
    download_calls: Arc<Mutex<Vec<String>>>,
    uploads: Arc<Mutex<Vec<(String, String, Vec<u8>)>>>,
}

impl MockTalentSystem {
    pub fn new() -> Self {
        Self {
            batches: Arc::new(Mutex::new(Vec::new())),
            resumes: Arc::new(Mutex::new(HashMap::new())),
            default_resume: Some(b"%PDF mock resume".to_vec()),
            download_failures: Arc::new(Mutex::new(FailureScript::default())),
            upload_failures: Arc::new(Mutex::new(FailureScript::default())),
            fetch_calls: Arc::new(Mutex::new(Vec::new())),
            download_calls: Arc::new(Mutex::new(Vec::new())),
            uploads: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a batch returned by the next sync. Later syncs return nothing.
    pub fn with_batch(self, records: Vec<TalentRecord>) -> Self {
        self.batches.lock().unwrap().push(records);
        self
    }

    pub fn with_resume(self, candidate_ref: &str, bytes: &[u8]) -> Self {
        self.resumes
            .lock()
            .unwrap()
            .insert(candidate_ref.to_string(), bytes.to_vec());
        self
    }

    /// Candidates without an explicit resume get none.
    pub fn without_default_resume(mut self) -> Self {
        self.default_resume = None;
        self
    }

    pub fn with_download_error(self, error: ProviderError) -> Self {
        self.download_failures.lock().unwrap().queued.push(error);
        self
    }

    pub fn with_download_always_failing(self, error: ProviderError) -> Self {
        self.download_failures.lock().unwrap().always = Some(error);
        self
    }

    pub fn with_upload_error(self, error: ProviderError) -> Self {
        self.upload_failures.lock().unwrap().queued.push(error);
        self
    }

    pub fn fetch_calls(&self) -> Vec<Option<DateTime<Utc>>> {
        self.fetch_calls.lock().unwrap().clone()
    }

    pub fn download_calls(&self) -> Vec<String> {
        self.download_calls.lock().unwrap().clone()
    }

    /// Attachments uploaded as (candidate_ref, file_name, bytes).
    pub fn uploads(&self) -> Vec<(String, String, Vec<u8>)> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl BaseTalentSystem for MockTalentSystem {
    async fn fetch_new_or_changed(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> ProviderResult<Vec<TalentRecord>> {
        self.fetch_calls.lock().unwrap().push(since);

        let mut batches = self.batches.lock().unwrap();
        if batches.is_empty() {
            Ok(Vec::new())
        } else {
            Ok(batches.remove(0))
        }
    }

    async fn download_resume(&self, candidate_ref: &str) -> ProviderResult<Option<Vec<u8>>> {
        self.download_calls
            .lock()
            .unwrap()
            .push(candidate_ref.to_string());

        if let Some(error) = self.download_failures.lock().unwrap().next() {
            return Err(error);
        }

        let explicit = self.resumes.lock().unwrap().get(candidate_ref).cloned();
        Ok(explicit.or_else(|| self.default_resume.clone()))
    }

    async fn upload_attachment(
        &self,
        candidate_ref: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> ProviderResult<String> {
        if let Some(error) = self.upload_failures.lock().unwrap().next() {
            return Err(error);
        }

        let mut uploads = self.uploads.lock().unwrap();
        uploads.push((candidate_ref.to_string(), file_name.to_string(), bytes));
        Ok(format!("doc-{}", uploads.len()))
    }
}

// =============================================================================
// Mock Resume Parser
// =============================================================================

pub struct MockResumeParser {
    text: String,
    failures: Arc<Mutex<FailureScript>>,
    calls: Arc<Mutex<usize>>,
}

impl MockResumeParser {
    pub fn new() -> Self {
        Self {
            text: "Senior engineer. Ten years of Rust and Postgres.".to_string(),
            failures: Arc::new(Mutex::new(FailureScript::default())),
            calls: Arc::new(Mutex::new(0)),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_error(self, error: ProviderError) -> Self {
        self.failures.lock().unwrap().queued.push(error);
        self
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl BaseResumeParser for MockResumeParser {
    async fn parse(&self, _bytes: &[u8]) -> ProviderResult<String> {
        *self.calls.lock().unwrap() += 1;

        if let Some(error) = self.failures.lock().unwrap().next() {
            return Err(error);
        }
        Ok(self.text.clone())
    }
}

// =============================================================================
// Mock Fact Extractor
// =============================================================================

pub struct MockFactExtractor {
    facts: serde_json::Value,
    summary: String,
    extract_failures: Arc<Mutex<FailureScript>>,
    summarize_failures: Arc<Mutex<FailureScript>>,
    extract_calls: Arc<Mutex<Vec<(String, Option<String>)>>>,
    summarize_calls: Arc<Mutex<Vec<SummaryRequest>>>,
}

impl MockFactExtractor {
    pub fn new() -> Self {
        Self {
            facts: serde_json::json!({
                "years_experience": 10,
                "skills": ["rust", "postgres"],
            }),
            summary: "Strong systems background; matches the role.".to_string(),
            extract_failures: Arc::new(Mutex::new(FailureScript::default())),
            summarize_failures: Arc::new(Mutex::new(FailureScript::default())),
            extract_calls: Arc::new(Mutex::new(Vec::new())),
            summarize_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_facts(mut self, facts: serde_json::Value) -> Self {
        self.facts = facts;
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_extract_error(self, error: ProviderError) -> Self {
        self.extract_failures.lock().unwrap().queued.push(error);
        self
    }

    pub fn with_extract_always_failing(self, error: ProviderError) -> Self {
        self.extract_failures.lock().unwrap().always = Some(error);
        self
    }

    pub fn with_summarize_error(self, error: ProviderError) -> Self {
        self.summarize_failures.lock().unwrap().queued.push(error);
        self
    }

    pub fn extract_calls(&self) -> Vec<(String, Option<String>)> {
        self.extract_calls.lock().unwrap().clone()
    }

    pub fn summarize_calls(&self) -> Vec<SummaryRequest> {
        self.summarize_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl BaseFactExtractor for MockFactExtractor {
    async fn extract(
        &self,
        resume_text: &str,
        job_description: Option<&str>,
    ) -> ProviderResult<StructuredFacts> {
        self.extract_calls
            .lock()
            .unwrap()
            .push((resume_text.to_string(), job_description.map(str::to_string)));

        if let Some(error) = self.extract_failures.lock().unwrap().next() {
            return Err(error);
        }
        Ok(StructuredFacts(self.facts.clone()))
    }

    async fn summarize(&self, request: &SummaryRequest) -> ProviderResult<String> {
        self.summarize_calls.lock().unwrap().push(request.clone());

        if let Some(error) = self.summarize_failures.lock().unwrap().next() {
            return Err(error);
        }
        Ok(self.summary.clone())
    }
}

// =============================================================================
// Mock Interview Channel
// =============================================================================

pub struct MockInterviewChannel {
    transcript: String,
    send_failures: Arc<Mutex<FailureScript>>,
    transcribe_failures: Arc<Mutex<FailureScript>>,
    invitations: Arc<Mutex<Vec<InterviewInvitation>>>,
    transcribe_calls: Arc<Mutex<Vec<InterviewId>>>,
}

impl MockInterviewChannel {
    pub fn new() -> Self {
        Self {
            transcript: "Q: Tell us about yourself.\nA: I build databases.".to_string(),
            send_failures: Arc::new(Mutex::new(FailureScript::default())),
            transcribe_failures: Arc::new(Mutex::new(FailureScript::default())),
            invitations: Arc::new(Mutex::new(Vec::new())),
            transcribe_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_transcript(mut self, transcript: impl Into<String>) -> Self {
        self.transcript = transcript.into();
        self
    }

    pub fn with_send_error(self, error: ProviderError) -> Self {
        self.send_failures.lock().unwrap().queued.push(error);
        self
    }

    pub fn with_transcribe_error(self, error: ProviderError) -> Self {
        self.transcribe_failures.lock().unwrap().queued.push(error);
        self
    }

    pub fn invitations(&self) -> Vec<InterviewInvitation> {
        self.invitations.lock().unwrap().clone()
    }

    pub fn transcribe_calls(&self) -> Vec<InterviewId> {
        self.transcribe_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl BaseInterviewChannel for MockInterviewChannel {
    async fn send_invitation(&self, invitation: &InterviewInvitation) -> ProviderResult<()> {
        if let Some(error) = self.send_failures.lock().unwrap().next() {
            return Err(error);
        }
        self.invitations.lock().unwrap().push(invitation.clone());
        Ok(())
    }

    async fn transcribe(&self, interview_id: InterviewId) -> ProviderResult<String> {
        self.transcribe_calls.lock().unwrap().push(interview_id);

        if let Some(error) = self.transcribe_failures.lock().unwrap().next() {
            return Err(error);
        }
        Ok(self.transcript.clone())
    }
}

// =============================================================================
// TestDependencies - Builder for test dependencies
// =============================================================================

#[derive(Clone)]
pub struct TestDependencies {
    pub talent: Arc<MockTalentSystem>,
    pub resume_parser: Arc<MockResumeParser>,
    pub extractor: Arc<MockFactExtractor>,
    pub interviews: Arc<MockInterviewChannel>,
    pub settings: PipelineSettings,
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            talent: Arc::new(MockTalentSystem::new()),
            resume_parser: Arc::new(MockResumeParser::new()),
            extractor: Arc::new(MockFactExtractor::new()),
            interviews: Arc::new(MockInterviewChannel::new()),
            settings: PipelineSettings::default(),
        }
    }

    /// Set a mock talent system
    pub fn mock_talent(mut self, talent: MockTalentSystem) -> Self {
        self.talent = Arc::new(talent);
        self
    }

    /// Set a mock resume parser
    pub fn mock_parser(mut self, parser: MockResumeParser) -> Self {
        self.resume_parser = Arc::new(parser);
        self
    }

    /// Set a mock fact extractor
    pub fn mock_extractor(mut self, extractor: MockFactExtractor) -> Self {
        self.extractor = Arc::new(extractor);
        self
    }

    /// Set a mock interview channel
    pub fn mock_interviews(mut self, interviews: MockInterviewChannel) -> Self {
        self.interviews = Arc::new(interviews);
        self
    }

    pub fn settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Convert into ServerDeps for testing
    pub fn into_server_deps(self, db_pool: PgPool) -> Arc<ServerDeps> {
        Arc::new(ServerDeps::new(
            db_pool,
            self.talent,
            self.resume_parser,
            self.extractor,
            self.interviews,
            self.settings,
        ))
    }

    /// ServerDeps over a pool that never connects, for tests that do not
    /// touch the database. Must be called inside a tokio runtime.
    pub fn into_server_deps_lazy(self) -> Arc<ServerDeps> {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .expect("static database url parses");
        self.into_server_deps(pool)
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for MockTalentSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for MockResumeParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for MockFactExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for MockInterviewChannel {
    fn default() -> Self {
        Self::new()
    }
}
