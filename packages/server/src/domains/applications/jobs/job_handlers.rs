//! Job handlers for the screening pipeline.
//!
//! Handlers call collaborators and store stage artifacts. They never change
//! the application status or enqueue the next stage; the worker does both
//! from the stage table once the handler returns.
//!
//! ## Pipeline Flow
//!
//! ```text
//! sync      → upsert applications         → new applications get a download job
//! download  → resume text                 → extract (or summarize when there is no resume)
//! extract   → structured facts            → summarize
//! summarize → summary + talent attachment → ready_for_review
//! ```

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::common::ApplicationId;
use crate::domains::applications::models::{Application, UpsertOutcome};
use crate::kernel::jobs::{enqueue, Job, JobError, JobType, NewJob};
use crate::kernel::{ProviderError, ServerDeps, StructuredFacts, SummaryRequest};

pub const SUMMARY_FILE_NAME: &str = "screening-summary.txt";

/// Pull new and changed applications from the talent system.
pub async fn handle_sync(deps: Arc<ServerDeps>) -> Result<(), JobError> {
    let pool = deps.pool();
    let since = Job::last_completed_start(JobType::Sync, pool).await?;
    let records = deps.talent.fetch_new_or_changed(since).await?;

    let mut inserted = 0usize;
    let mut externally_changed = 0usize;

    for record in &records {
        let mut tx = pool.begin().await?;
        match Application::upsert_from_record(record, &mut tx).await? {
            UpsertOutcome::Inserted(application) => {
                enqueue(
                    NewJob::for_application(JobType::Download, application.id),
                    &mut tx,
                )
                .await?;
                inserted += 1;
            }
            UpsertOutcome::Updated {
                application,
                external_changed: true,
            } => {
                warn!(
                    application_id = %application.id,
                    external_status = ?application.external_status,
                    "status changed in talent system, pipeline will skip application"
                );
                externally_changed += 1;
            }
            UpsertOutcome::Updated { .. } => {}
        }
        tx.commit().await?;
    }

    info!(
        fetched = records.len(),
        inserted,
        externally_changed,
        since = ?since,
        "talent system sync complete"
    );
    Ok(())
}

/// Download and parse the resume. No resume is a permanent failure, which
/// routes the application to `no_resume`.
pub async fn handle_download(application_id: ApplicationId, deps: Arc<ServerDeps>) -> Result<(), JobError> {
    let application = Application::find_by_id(application_id, deps.pool()).await?;

    let bytes = deps
        .talent
        .download_resume(&application.candidate_ref)
        .await?
        .ok_or_else(|| JobError::permanent("candidate has no resume attached"))?;

    let text = deps.resume_parser.parse(&bytes).await?;
    if text.trim().is_empty() {
        return Err(JobError::permanent("resume contains no text"));
    }

    Application::set_resume_text(application_id, &text, deps.pool()).await?;
    debug!(application_id = %application_id, chars = text.len(), "resume stored");
    Ok(())
}

/// Extract structured facts from the resume against the job description.
pub async fn handle_extract(application_id: ApplicationId, deps: Arc<ServerDeps>) -> Result<(), JobError> {
    let application = Application::find_by_id(application_id, deps.pool()).await?;

    let resume_text = application
        .resume_text
        .as_deref()
        .ok_or_else(|| JobError::permanent("application has no resume text"))?;
    let job_description = Some(application.job_description.as_str()).filter(|d| !d.is_empty());

    let facts = deps.extractor.extract(resume_text, job_description).await?;

    Application::set_facts(application_id, &facts.0, deps.pool()).await?;
    debug!(application_id = %application_id, "facts stored");
    Ok(())
}

/// Summarize the candidate and attach the summary in the talent system.
///
/// A summary that was already attached is not uploaded again on retry.
pub async fn handle_summarize(application_id: ApplicationId, deps: Arc<ServerDeps>) -> Result<(), JobError> {
    let application = Application::find_by_id(application_id, deps.pool()).await?;

    if application.summary_doc_id.is_some() && application.summary.is_some() {
        info!(application_id = %application_id, "summary already attached");
        return Ok(());
    }

    let request = SummaryRequest {
        candidate_name: application.candidate_name.clone(),
        job_title: application.job_title.clone(),
        job_description: Some(application.job_description.clone()).filter(|d| !d.is_empty()),
        resume_text: application.resume_text.clone(),
        facts: application.facts.clone().map(StructuredFacts),
    };

    let summary = deps.extractor.summarize(&request).await?;
    if summary.trim().is_empty() {
        return Err(ProviderError::Parse("empty summary".into()).into());
    }
    Application::set_summary(application_id, &summary, deps.pool()).await?;

    let doc_id = deps
        .talent
        .upload_attachment(
            &application.candidate_ref,
            SUMMARY_FILE_NAME,
            summary.into_bytes(),
        )
        .await?;
    Application::set_summary_doc_id(application_id, &doc_id, deps.pool()).await?;

    info!(application_id = %application_id, doc_id = %doc_id, "summary attached");
    Ok(())
}
