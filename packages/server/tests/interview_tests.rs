//! Interview flow: advancing applications are routed by the eligibility
//! sweep, invitations go out, webhooks complete them and transcripts land
//! back in review.

mod common;

use std::time::Duration;

use common::*;
use screening_core::domains::applications::actions::{decisions, stage};
use screening_core::domains::applications::actions::{run_eligibility_sweep, run_stuck_sweep, DecisionInput};
use screening_core::domains::applications::models::ApplicationStatus;
use screening_core::domains::applications::ApplicationError;
use screening_core::domains::interviews::actions::{on_interview_completed, InterviewCompletion};
use screening_core::domains::interviews::jobs::handle_send_interview;
use screening_core::domains::interviews::models::{Interview, InterviewStatus};
use screening_core::kernel::jobs::{Job, JobResolution, JobStatus, JobType, NewJob};
use screening_core::kernel::test_dependencies::MockInterviewChannel;
use screening_core::kernel::{PipelineSettings, ProviderError, TestDependencies};
use test_context::test_context;

/// An application the recruiter just advanced out of first review.
async fn advanced_application(
    ctx: &TestHarness,
    candidate_ref: &str,
    input: DecisionInput,
) -> screening_core::common::ApplicationId {
    let application = create_application_in(&ctx.db_pool, candidate_ref, ApplicationStatus::ReadyForReview)
        .await
        .unwrap();
    decisions::advance(application.id, input, &ctx.db_pool)
        .await
        .unwrap();
    assert_eq!(
        status_of(&ctx.db_pool, application.id).await.unwrap(),
        ApplicationStatus::Advancing
    );
    application.id
}

#[test_context(TestHarness)]
#[tokio::test]
async fn interview_round_trip(ctx: &TestHarness) {
    let deps = TestDependencies::new()
        .mock_interviews(MockInterviewChannel::new().with_transcript("Q: Why Rust?\nA: Lifetimes."));
    let server_deps = ctx.server_deps(&deps);
    let worker = ctx.worker(&deps);
    let application_id = advanced_application(ctx, "C-900", DecisionInput::by("recruiter@example.com")).await;

    let report = run_eligibility_sweep(&server_deps).await.unwrap();
    assert_eq!(report.interviews_enqueued, 1);
    assert!(report.sync_enqueued);

    ctx.drain(&worker).await.unwrap();
    assert_eq!(
        status_of(&ctx.db_pool, application_id).await.unwrap(),
        ApplicationStatus::InterviewSent
    );

    let invitations = deps.interviews.invitations();
    assert_eq!(invitations.len(), 1);
    assert_eq!(invitations[0].candidate_email, "c-900@example.com");

    let interview = Interview::find_latest(application_id, &ctx.db_pool)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(interview.id, invitations[0].interview_id);
    assert_eq!(interview.status, InterviewStatus::Sent);
    assert!(interview.expires_at > chrono::Utc::now() + chrono::Duration::hours(71));

    let completion = on_interview_completed(interview.id, &ctx.db_pool).await.unwrap();
    let InterviewCompletion::Accepted {
        application_id: completed_for,
        ..
    } = completion
    else {
        panic!("expected first delivery to be accepted, got {completion:?}");
    };
    assert_eq!(completed_for, application_id);
    assert_eq!(
        status_of(&ctx.db_pool, application_id).await.unwrap(),
        ApplicationStatus::InterviewReceived
    );

    // Redelivery is acknowledged without effect
    let again = on_interview_completed(interview.id, &ctx.db_pool).await.unwrap();
    assert_eq!(again, InterviewCompletion::AlreadyCompleted { application_id });

    ctx.drain(&worker).await.unwrap();
    assert_eq!(
        status_of(&ctx.db_pool, application_id).await.unwrap(),
        ApplicationStatus::InterviewReadyForReview
    );
    let interview = Interview::find_by_id(interview.id, &ctx.db_pool)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(interview.transcript.as_deref(), Some("Q: Why Rust?\nA: Lifetimes."));

    let transcribes: Vec<_> = jobs_for(&ctx.db_pool, application_id)
        .await
        .unwrap()
        .into_iter()
        .filter(|job| job.job_type == JobType::Transcribe)
        .collect();
    assert_eq!(transcribes.len(), 1);
    assert_eq!(transcribes[0].status, JobStatus::Completed);

    // Interviewed candidates can now be advanced for good
    decisions::advance(application_id, DecisionInput::by("recruiter@example.com"), &ctx.db_pool)
        .await
        .unwrap();
    assert_eq!(
        status_of(&ctx.db_pool, application_id).await.unwrap(),
        ApplicationStatus::Advanced
    );
}

#[test_context(TestHarness)]
#[tokio::test]
async fn advancing_skips_interview_when_disabled(ctx: &TestHarness) {
    let deps = TestDependencies::new().settings(PipelineSettings::new(
        false,
        Duration::from_secs(72 * 3600),
        Duration::from_secs(30 * 60),
        [],
    ));
    let server_deps = ctx.server_deps(&deps);
    let application_id = advanced_application(ctx, "C-901", DecisionInput::by("recruiter")).await;

    let report = run_eligibility_sweep(&server_deps).await.unwrap();

    assert_eq!(report.advanced, 1);
    assert_eq!(report.interviews_enqueued, 0);
    assert_eq!(
        status_of(&ctx.db_pool, application_id).await.unwrap(),
        ApplicationStatus::Advanced
    );
    assert!(jobs_for(&ctx.db_pool, application_id)
        .await
        .unwrap()
        .is_empty());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn live_interview_request_waits_for_a_human(ctx: &TestHarness) {
    let deps = TestDependencies::new();
    let server_deps = ctx.server_deps(&deps);
    let input = DecisionInput {
        live_interview: true,
        ..DecisionInput::by("recruiter")
    };
    let application_id = advanced_application(ctx, "C-902", input).await;
    assert!(reload(&ctx.db_pool, application_id).await.unwrap().human_requested);

    let report = run_eligibility_sweep(&server_deps).await.unwrap();
    assert_eq!(report.live_interviews, 1);
    assert_eq!(
        status_of(&ctx.db_pool, application_id).await.unwrap(),
        ApplicationStatus::LiveInterviewPending
    );

    // Waiting on a human is never stuck
    backdate_status(&ctx.db_pool, application_id, 24 * 60).await.unwrap();
    let stuck = run_stuck_sweep(&server_deps).await.unwrap();
    assert!(stuck.flagged.is_empty());

    decisions::advance(application_id, DecisionInput::by("recruiter"), &ctx.db_pool)
        .await
        .unwrap();
    assert_eq!(
        status_of(&ctx.db_pool, application_id).await.unwrap(),
        ApplicationStatus::Advanced
    );
}

#[test_context(TestHarness)]
#[tokio::test]
async fn undeliverable_invitation_is_an_error(ctx: &TestHarness) {
    let deps = TestDependencies::new().mock_interviews(
        MockInterviewChannel::new().with_send_error(ProviderError::Invalid("mailbox does not exist".into())),
    );
    let server_deps = ctx.server_deps(&deps);
    let worker = ctx.worker(&deps);
    let application_id = advanced_application(ctx, "C-903", DecisionInput::by("recruiter")).await;

    run_eligibility_sweep(&server_deps).await.unwrap();
    ctx.drain(&worker).await.unwrap();

    assert_eq!(
        status_of(&ctx.db_pool, application_id).await.unwrap(),
        ApplicationStatus::Error
    );
    assert!(deps.interviews.invitations().is_empty());

    // The errored application shows up for operators, and the sweep does not
    // queue another invitation.
    let report = run_eligibility_sweep(&server_deps).await.unwrap();
    assert_eq!(report.interviews_enqueued, 0);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn overdue_interview_expires(ctx: &TestHarness) {
    let deps = TestDependencies::new();
    let server_deps = ctx.server_deps(&deps);
    let worker = ctx.worker(&deps);
    let application_id = advanced_application(ctx, "C-904", DecisionInput::by("recruiter")).await;

    run_eligibility_sweep(&server_deps).await.unwrap();
    ctx.drain(&worker).await.unwrap();
    let interview = Interview::find_latest(application_id, &ctx.db_pool)
        .await
        .unwrap()
        .unwrap();

    sqlx::query("UPDATE interviews SET expires_at = NOW() - INTERVAL '1 minute' WHERE id = $1")
        .bind(interview.id)
        .execute(&ctx.db_pool)
        .await
        .unwrap();

    let report = run_stuck_sweep(&server_deps).await.unwrap();
    assert_eq!(report.interviews_expired, 1);
    assert_eq!(
        status_of(&ctx.db_pool, application_id).await.unwrap(),
        ApplicationStatus::InterviewExpired
    );

    // A late webhook for an expired interview is refused
    let err = on_interview_completed(interview.id, &ctx.db_pool)
        .await
        .unwrap_err();
    assert!(matches!(err, ApplicationError::Conflict(_)), "{err:?}");

    // The recruiter can still close it out
    decisions::reject(
        application_id,
        DecisionInput::by("recruiter").with_reason("no_show"),
        &ctx.db_pool,
    )
    .await
    .unwrap();
    let application = reload(&ctx.db_pool, application_id).await.unwrap();
    assert_eq!(application.status, ApplicationStatus::Rejected);
    assert_eq!(application.rejection_reason_code.as_deref(), Some("no_show"));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn webhook_for_unknown_interview_is_missing(ctx: &TestHarness) {
    let err = on_interview_completed(screening_core::common::InterviewId::new(), &ctx.db_pool)
        .await
        .unwrap_err();
    assert!(matches!(err, ApplicationError::Missing(_)), "{err:?}");
}

#[test_context(TestHarness)]
#[tokio::test]
async fn completion_while_the_send_job_finishes(ctx: &TestHarness) {
    let deps = TestDependencies::new();
    let server_deps = ctx.server_deps(&deps);
    let worker = ctx.worker(&deps);
    let application_id = advanced_application(ctx, "C-905", DecisionInput::by("recruiter")).await;
    ctx.queue()
        .enqueue(NewJob::for_application(JobType::SendInterview, application_id))
        .await
        .unwrap();

    // The invitation goes out, but the send job has not committed yet
    let job = ctx.queue().claim_next("slow-worker").await.unwrap().unwrap();
    assert_eq!(job.job_type, JobType::SendInterview);
    stage::begin_stage(&job, &ctx.db_pool).await.unwrap();
    handle_send_interview(application_id, server_deps.clone())
        .await
        .unwrap();
    assert_eq!(
        status_of(&ctx.db_pool, application_id).await.unwrap(),
        ApplicationStatus::InterviewSending
    );
    let interview = Interview::find_latest(application_id, &ctx.db_pool)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(interview.status, InterviewStatus::Sent);

    let completion = on_interview_completed(interview.id, &ctx.db_pool).await.unwrap();
    assert!(matches!(completion, InterviewCompletion::Accepted { .. }), "{completion:?}");
    assert_eq!(
        status_of(&ctx.db_pool, application_id).await.unwrap(),
        ApplicationStatus::InterviewReceived
    );

    // The send job finds the application already past its stage
    let resolution = stage::complete_stage(&job, "slow-worker", &ctx.db_pool)
        .await
        .unwrap();
    assert_eq!(resolution, JobResolution::Failed);

    ctx.drain(&worker).await.unwrap();
    assert_eq!(
        status_of(&ctx.db_pool, application_id).await.unwrap(),
        ApplicationStatus::InterviewReadyForReview
    );
    assert_eq!(deps.interviews.invitations().len(), 1);
    assert_eq!(deps.interviews.transcribe_calls(), vec![interview.id]);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn completion_while_a_send_retry_waits(ctx: &TestHarness) {
    let deps = TestDependencies::new();
    let worker = ctx.worker(&deps);
    let application_id = advanced_application(ctx, "C-906", DecisionInput::by("recruiter")).await;

    // An earlier attempt delivered the invitation and then timed out, so the
    // application is back in advancing with a retry queued
    let mut conn = ctx.db_pool.acquire().await.unwrap();
    let interview = Interview::create(
        application_id,
        chrono::Utc::now() + chrono::Duration::hours(24),
        &mut conn,
    )
    .await
    .unwrap();
    drop(conn);
    Interview::mark_sent(interview.id, &ctx.db_pool).await.unwrap();
    let retry = ctx
        .queue()
        .enqueue(NewJob::for_application(JobType::SendInterview, application_id))
        .await
        .unwrap();

    let completion = on_interview_completed(interview.id, &ctx.db_pool).await.unwrap();
    assert!(matches!(completion, InterviewCompletion::Accepted { .. }), "{completion:?}");
    assert_eq!(
        status_of(&ctx.db_pool, application_id).await.unwrap(),
        ApplicationStatus::InterviewReceived
    );

    let retry = Job::find_by_id(retry.job_id(), &ctx.db_pool).await.unwrap();
    assert_eq!(retry.status, JobStatus::Failed);
    assert!(retry
        .last_error
        .as_deref()
        .unwrap()
        .contains("interview completion"));

    ctx.drain(&worker).await.unwrap();
    assert_eq!(
        status_of(&ctx.db_pool, application_id).await.unwrap(),
        ApplicationStatus::InterviewReadyForReview
    );
    assert!(deps.interviews.invitations().is_empty());
}
