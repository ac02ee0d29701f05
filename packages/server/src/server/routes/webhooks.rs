use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    Json,
};

use crate::common::InterviewId;
use crate::domains::interviews::actions::{on_interview_completed, InterviewCompletion};
use crate::server::app::AppState;
use crate::server::error::ApiResult;

/// The interview channel reports a completed interview.
///
/// 202 when transcription was queued, 200 for a repeated delivery.
pub async fn interview_completed_handler(
    Extension(state): Extension<AppState>,
    Path(interview_id): Path<InterviewId>,
) -> ApiResult<(StatusCode, Json<InterviewCompletion>)> {
    let completion = on_interview_completed(interview_id, &state.db_pool).await?;
    let status = match completion {
        InterviewCompletion::Accepted { .. } => StatusCode::ACCEPTED,
        InterviewCompletion::AlreadyCompleted { .. } => StatusCode::OK,
    };
    Ok((status, Json(completion)))
}
