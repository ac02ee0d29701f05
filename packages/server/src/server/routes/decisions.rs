//! Human decision endpoints. Each call is one conditional transition plus
//! one audit entry.

use axum::{
    extract::{Extension, Path},
    Json,
};

use crate::common::ApplicationId;
use crate::domains::applications::actions::{apply_decision, DecisionInput};
use crate::domains::applications::models::{Decision, DecisionAction};
use crate::server::app::AppState;
use crate::server::error::ApiResult;

async fn decide(
    state: AppState,
    application_id: ApplicationId,
    action: DecisionAction,
    input: DecisionInput,
) -> ApiResult<Json<Decision>> {
    let decision = apply_decision(application_id, action, input, &state.db_pool).await?;
    Ok(Json(decision))
}

pub async fn advance_handler(
    Extension(state): Extension<AppState>,
    Path(application_id): Path<ApplicationId>,
    Json(input): Json<DecisionInput>,
) -> ApiResult<Json<Decision>> {
    decide(state, application_id, DecisionAction::Advance, input).await
}

pub async fn reject_handler(
    Extension(state): Extension<AppState>,
    Path(application_id): Path<ApplicationId>,
    Json(input): Json<DecisionInput>,
) -> ApiResult<Json<Decision>> {
    decide(state, application_id, DecisionAction::Reject, input).await
}

pub async fn hold_handler(
    Extension(state): Extension<AppState>,
    Path(application_id): Path<ApplicationId>,
    Json(input): Json<DecisionInput>,
) -> ApiResult<Json<Decision>> {
    decide(state, application_id, DecisionAction::Hold, input).await
}

pub async fn remove_hold_handler(
    Extension(state): Extension<AppState>,
    Path(application_id): Path<ApplicationId>,
    Json(input): Json<DecisionInput>,
) -> ApiResult<Json<Decision>> {
    decide(state, application_id, DecisionAction::RemoveHold, input).await
}

pub async fn reconsider_handler(
    Extension(state): Extension<AppState>,
    Path(application_id): Path<ApplicationId>,
    Json(input): Json<DecisionInput>,
) -> ApiResult<Json<Decision>> {
    decide(state, application_id, DecisionAction::Reconsider, input).await
}

pub async fn live_interview_handler(
    Extension(state): Extension<AppState>,
    Path(application_id): Path<ApplicationId>,
    Json(input): Json<DecisionInput>,
) -> ApiResult<Json<Decision>> {
    decide(state, application_id, DecisionAction::RequestLiveInterview, input).await
}
