//! JSON-over-HTTP adapters for the external collaborators.
//!
//! Each collaborator runs as a sidecar service behind a base URL. Transport
//! and status failures are mapped onto `ProviderError` so handlers can tell
//! transient from permanent without looking at HTTP details.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::traits::{
    BaseFactExtractor, BaseInterviewChannel, BaseResumeParser, BaseTalentSystem,
    InterviewInvitation, ProviderError, ProviderResult, StructuredFacts, SummaryRequest,
    TalentRecord,
};
use crate::common::InterviewId;

/// Shared HTTP plumbing for one sidecar.
#[derive(Clone)]
pub struct HttpCollaborator {
    client: Client,
    base_url: String,
}

impl HttpCollaborator {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send(&self, request: RequestBuilder) -> ProviderResult<Response> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = retry_after(&response);
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        Err(classify_status(status, retry_after, body))
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> ProviderResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .send(self.client.post(self.url(path)).json(body))
            .await?;
        response.json::<R>().await.map_err(decode_error)
    }
}

/// Map a non-success HTTP status onto the provider error taxonomy.
pub fn classify_status(status: StatusCode, retry_after: Option<Duration>, body: String) -> ProviderError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited { retry_after },
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ProviderError::Timeout,
        StatusCode::NOT_FOUND => ProviderError::NotFound(body),
        StatusCode::UNPROCESSABLE_ENTITY => ProviderError::Parse(body),
        s if s.is_server_error() => ProviderError::Unavailable(format!("{}: {}", s.as_u16(), body)),
        s => ProviderError::Invalid(format!("{}: {}", s.as_u16(), body)),
    }
}

fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Network(err.to_string())
    }
}

fn decode_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Parse(err.to_string())
    }
}

// =============================================================================
// Talent system
// =============================================================================

pub struct HttpTalentSystem(HttpCollaborator);

impl HttpTalentSystem {
    pub fn new(collaborator: HttpCollaborator) -> Self {
        Self(collaborator)
    }
}

#[derive(Serialize)]
struct ChangesRequest {
    since: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct AttachmentResponse {
    doc_id: String,
}

#[async_trait]
impl BaseTalentSystem for HttpTalentSystem {
    async fn fetch_new_or_changed(&self, since: Option<DateTime<Utc>>) -> ProviderResult<Vec<TalentRecord>> {
        self.0.post_json("applications/changes", &ChangesRequest { since }).await
    }

    async fn download_resume(&self, candidate_ref: &str) -> ProviderResult<Option<Vec<u8>>> {
        let request = self
            .0
            .client
            .get(self.0.url(&format!("candidates/{candidate_ref}/resume")));

        match self.0.send(request).await {
            Ok(response) if response.status() == StatusCode::NO_CONTENT => Ok(None),
            Ok(response) => {
                let bytes = response.bytes().await.map_err(transport_error)?;
                Ok((!bytes.is_empty()).then(|| bytes.to_vec()))
            }
            Err(ProviderError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn upload_attachment(
        &self,
        candidate_ref: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> ProviderResult<String> {
        let request = self
            .0
            .client
            .post(self.0.url(&format!("candidates/{candidate_ref}/attachments")))
            .query(&[("file_name", file_name)])
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes);

        let response = self.0.send(request).await?;
        let body = response
            .json::<AttachmentResponse>()
            .await
            .map_err(decode_error)?;
        Ok(body.doc_id)
    }
}

// =============================================================================
// Resume parser
// =============================================================================

pub struct HttpResumeParser(HttpCollaborator);

impl HttpResumeParser {
    pub fn new(collaborator: HttpCollaborator) -> Self {
        Self(collaborator)
    }
}

#[derive(Deserialize)]
struct ParseResponse {
    text: String,
}

#[async_trait]
impl BaseResumeParser for HttpResumeParser {
    async fn parse(&self, bytes: &[u8]) -> ProviderResult<String> {
        let request = self
            .0
            .client
            .post(self.0.url("parse"))
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes.to_vec());

        let response = self.0.send(request).await?;
        let body = response.json::<ParseResponse>().await.map_err(decode_error)?;
        Ok(body.text)
    }
}

// =============================================================================
// Fact extractor
// =============================================================================

pub struct HttpFactExtractor(HttpCollaborator);

impl HttpFactExtractor {
    pub fn new(collaborator: HttpCollaborator) -> Self {
        Self(collaborator)
    }
}

#[derive(Serialize)]
struct ExtractRequest<'a> {
    resume_text: &'a str,
    job_description: Option<&'a str>,
}

#[derive(Deserialize)]
struct SummaryResponse {
    summary: String,
}

#[async_trait]
impl BaseFactExtractor for HttpFactExtractor {
    async fn extract(
        &self,
        resume_text: &str,
        job_description: Option<&str>,
    ) -> ProviderResult<StructuredFacts> {
        let request = ExtractRequest {
            resume_text,
            job_description,
        };
        let facts: serde_json::Value = self.0.post_json("extract", &request).await?;
        if !facts.is_object() {
            return Err(ProviderError::Parse("facts must be a JSON object".into()));
        }
        Ok(StructuredFacts(facts))
    }

    async fn summarize(&self, request: &SummaryRequest) -> ProviderResult<String> {
        let response: SummaryResponse = self.0.post_json("summarize", request).await?;
        Ok(response.summary)
    }
}

// =============================================================================
// Interview channel
// =============================================================================

pub struct HttpInterviewChannel(HttpCollaborator);

impl HttpInterviewChannel {
    pub fn new(collaborator: HttpCollaborator) -> Self {
        Self(collaborator)
    }
}

#[derive(Deserialize)]
struct TranscriptResponse {
    transcript: String,
}

#[async_trait]
impl BaseInterviewChannel for HttpInterviewChannel {
    async fn send_invitation(&self, invitation: &InterviewInvitation) -> ProviderResult<()> {
        let request = self.0.client.post(self.0.url("invitations")).json(invitation);
        self.0.send(request).await?;
        Ok(())
    }

    async fn transcribe(&self, interview_id: InterviewId) -> ProviderResult<String> {
        let response: TranscriptResponse = self
            .0
            .post_json(&format!("interviews/{interview_id}/transcript"), &())
            .await?;
        Ok(response.transcript)
    }
}
