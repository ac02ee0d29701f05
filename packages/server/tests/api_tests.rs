//! HTTP surface: decisions, webhooks and operator endpoints through the
//! router, including error mapping.

mod common;

use axum::http::StatusCode;
use common::*;
use screening_core::domains::applications::models::ApplicationStatus;
use screening_core::domains::interviews::models::Interview;
use screening_core::kernel::jobs::{JobType, NewJob};
use screening_core::kernel::TestDependencies;
use serde_json::json;
use test_context::test_context;

#[test_context(TestHarness)]
#[tokio::test]
async fn health_reports_database(ctx: &TestHarness) {
    let api = ctx.api(&TestDependencies::new());

    let response = api.get("/health").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.get("status"), json!("healthy"));
    assert_eq!(response.get("database.status"), json!("ok"));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn advance_and_conflicting_reject(ctx: &TestHarness) {
    let api = ctx.api(&TestDependencies::new());
    let application = create_application_in(&ctx.db_pool, "H-1", ApplicationStatus::ReadyForReview)
        .await
        .unwrap();

    let response = api
        .post(
            &format!("/applications/{}/advance", application.id),
            json!({ "actor": "alice" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
    assert_eq!(response.get("action"), json!("advance"));
    assert_eq!(response.get("from_status"), json!("ready_for_review"));
    assert_eq!(response.get("to_status"), json!("advancing"));

    let response = api
        .post(
            &format!("/applications/{}/reject", application.id),
            json!({ "actor": "bob", "reason_code": "not_qualified" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.get("code"), json!("invalid_state"));
    assert_eq!(response.get("actual_status"), json!("advancing"));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn decision_errors_map_to_statuses(ctx: &TestHarness) {
    let api = ctx.api(&TestDependencies::new());
    let application = create_application_in(&ctx.db_pool, "H-2", ApplicationStatus::ReadyForReview)
        .await
        .unwrap();

    let missing_reason = api
        .post(
            &format!("/applications/{}/reject", application.id),
            json!({ "actor": "alice" }),
        )
        .await;
    assert_eq!(missing_reason.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(missing_reason.get("code"), json!("validation"));

    let unknown = api
        .post(
            &format!("/applications/{}/hold", screening_core::common::ApplicationId::new()),
            json!({ "actor": "alice" }),
        )
        .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);
    assert_eq!(unknown.get("code"), json!("not_found"));

    let bad_id = api
        .post("/applications/not-a-uuid/hold", json!({ "actor": "alice" }))
        .await;
    assert_eq!(bad_id.status, StatusCode::BAD_REQUEST);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn interview_webhook_is_idempotent(ctx: &TestHarness) {
    let api = ctx.api(&TestDependencies::new());
    let application = create_application_in(&ctx.db_pool, "H-3", ApplicationStatus::InterviewSent)
        .await
        .unwrap();
    let mut conn = ctx.db_pool.acquire().await.unwrap();
    let interview = Interview::create(
        application.id,
        chrono::Utc::now() + chrono::Duration::hours(24),
        &mut conn,
    )
    .await
    .unwrap();
    drop(conn);
    Interview::mark_sent(interview.id, &ctx.db_pool).await.unwrap();

    let path = format!("/webhooks/interviews/{}/completed", interview.id);
    let first = api.post(&path, json!({})).await;
    assert_eq!(first.status, StatusCode::ACCEPTED);
    assert_eq!(first.get("outcome"), json!("accepted"));

    let second = api.post(&path, json!({})).await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.get("outcome"), json!("already_completed"));

    let transcribes = jobs_for(&ctx.db_pool, application.id)
        .await
        .unwrap()
        .into_iter()
        .filter(|job| job.job_type == JobType::Transcribe)
        .count();
    assert_eq!(transcribes, 1);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn operator_queue_and_recovery(ctx: &TestHarness) {
    let api = ctx.api(&TestDependencies::new());
    let errored = create_application_in(&ctx.db_pool, "H-4", ApplicationStatus::Error)
        .await
        .unwrap();
    let dead = ctx
        .queue()
        .enqueue(NewJob::for_application(JobType::Extract, errored.id))
        .await
        .unwrap();
    sqlx::query("UPDATE jobs SET status = 'dead', attempts = 3, last_error = 'boom', completed_at = NOW() WHERE id = $1")
        .bind(dead.job_id())
        .execute(&ctx.db_pool)
        .await
        .unwrap();

    let queue = api.get("/admin/queue").await;
    assert_eq!(queue.status, StatusCode::OK);
    assert_eq!(queue.get("dead_jobs").as_array().unwrap().len(), 1);
    assert_eq!(queue.get("errored_applications").as_array().unwrap().len(), 1);

    let bad_limit = api.get("/admin/queue?limit=0").await;
    assert_eq!(bad_limit.status, StatusCode::BAD_REQUEST);
    assert_eq!(bad_limit.get("code"), json!("bad_request"));

    let blank_actor = api
        .post(
            &format!("/admin/applications/{}/restart", errored.id),
            json!({ "actor": " " }),
        )
        .await;
    assert_eq!(blank_actor.status, StatusCode::UNPROCESSABLE_ENTITY);

    let restarted = api
        .post(
            &format!("/admin/applications/{}/restart", errored.id),
            json!({ "actor": "ops", "comment": "collaborator fixed" }),
        )
        .await;
    assert_eq!(restarted.status, StatusCode::OK, "{:?}", restarted.body);
    assert_eq!(restarted.get("to_status"), json!("new"));

    // Restart supersedes only pending work; the dead extract can still be revived
    let retried = api
        .post(&format!("/admin/jobs/{}/retry", dead.job_id()), json!({}))
        .await;
    assert_eq!(retried.status, StatusCode::OK);
    assert_eq!(retried.get("status"), json!("pending"));

    let again = api
        .post(&format!("/admin/jobs/{}/retry", dead.job_id()), json!({}))
        .await;
    assert_eq!(again.status, StatusCode::CONFLICT);
    assert_eq!(again.get("code"), json!("conflict"));

    let unknown = api
        .post(
            &format!("/admin/jobs/{}/retry", screening_core::common::JobId::new()),
            json!({}),
        )
        .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn recovery_of_reviewable_application_is_a_conflict(ctx: &TestHarness) {
    let api = ctx.api(&TestDependencies::new());
    let application = create_application_in(&ctx.db_pool, "H-5", ApplicationStatus::ReadyForReview)
        .await
        .unwrap();

    let response = api
        .post(
            &format!("/admin/applications/{}/mark-skipped", application.id),
            json!({ "actor": "ops" }),
        )
        .await;

    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.get("actual_status"), json!("ready_for_review"));
}
