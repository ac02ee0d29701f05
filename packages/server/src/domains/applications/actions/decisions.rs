//! Human decisions on applications.
//!
//! Each call is one conditional status update plus one decision log entry,
//! committed together. Two recruiters acting on the same application race
//! on the conditional update; the loser gets `InvalidStateError`.

use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;

use crate::common::ApplicationId;
use crate::domains::applications::error::{ApplicationError, ApplicationResult, InvalidStateError};
use crate::domains::applications::machines::{decide, decision_sources};
use crate::domains::applications::models::{
    Application, Decision, DecisionAction, NewDecision,
};
use crate::domains::interviews::models::Interview;

/// Who decided, and why.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DecisionInput {
    pub actor: String,
    #[serde(default)]
    pub reason_code: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    /// On advance: route the candidate to a live interview instead of the
    /// automated one.
    #[serde(default)]
    pub live_interview: bool,
}

impl DecisionInput {
    pub fn by(actor: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            ..Default::default()
        }
    }

    pub fn with_reason(mut self, reason_code: impl Into<String>) -> Self {
        self.reason_code = Some(reason_code.into());
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    fn validate(&self, action: DecisionAction) -> ApplicationResult<()> {
        if action.is_recovery() {
            return Err(ApplicationError::Validation(format!(
                "{action} is an operator recovery action"
            )));
        }
        if self.actor.trim().is_empty() {
            return Err(ApplicationError::Validation("actor is required".into()));
        }
        if action == DecisionAction::Reject && is_blank(&self.reason_code) {
            return Err(ApplicationError::Validation(
                "reject requires a reason code".into(),
            ));
        }
        if action == DecisionAction::Reconsider && is_blank(&self.comment) {
            return Err(ApplicationError::Validation(
                "reconsider requires a comment".into(),
            ));
        }
        Ok(())
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

/// Apply a human decision.
pub async fn apply_decision(
    application_id: ApplicationId,
    action: DecisionAction,
    input: DecisionInput,
    pool: &PgPool,
) -> ApplicationResult<Decision> {
    input.validate(action)?;

    let mut tx = pool.begin().await?;

    let application = Application::find_optional(application_id, &mut tx)
        .await?
        .ok_or(ApplicationError::NotFound(application_id))?;
    let from = application.status;

    let interviewed = match action {
        DecisionAction::RemoveHold | DecisionAction::Reconsider => {
            Interview::has_completed(application_id, &mut tx).await?
        }
        _ => false,
    };

    let to = decide(action, from, interviewed).ok_or_else(|| InvalidStateError {
        application_id,
        expected: decision_sources(action).to_vec(),
        actual: from,
    })?;

    // Conditional on the status we based the decision on.
    Application::transition(application_id, &[from], to, &mut tx).await?;

    match action {
        DecisionAction::Reject => {
            if let Some(reason) = &input.reason_code {
                Application::set_rejection_reason(application_id, reason, &mut tx).await?;
            }
        }
        DecisionAction::Advance if input.live_interview => {
            Application::set_human_requested(application_id, true, &mut tx).await?;
        }
        _ => {}
    }

    let decision = Decision::record(
        NewDecision::builder()
            .application_id(application_id)
            .action(action)
            .actor(input.actor)
            .from_status(from)
            .to_status(to)
            .reason_code(input.reason_code)
            .comment(input.comment)
            .build(),
        &mut tx,
    )
    .await?;

    tx.commit().await?;

    info!(
        application_id = %application_id,
        action = %action,
        from = %from,
        to = %to,
        actor = %decision.actor,
        "decision recorded"
    );

    Ok(decision)
}

pub async fn advance(
    application_id: ApplicationId,
    input: DecisionInput,
    pool: &PgPool,
) -> ApplicationResult<Decision> {
    apply_decision(application_id, DecisionAction::Advance, input, pool).await
}

pub async fn reject(
    application_id: ApplicationId,
    input: DecisionInput,
    pool: &PgPool,
) -> ApplicationResult<Decision> {
    apply_decision(application_id, DecisionAction::Reject, input, pool).await
}

pub async fn hold(
    application_id: ApplicationId,
    input: DecisionInput,
    pool: &PgPool,
) -> ApplicationResult<Decision> {
    apply_decision(application_id, DecisionAction::Hold, input, pool).await
}

pub async fn remove_hold(
    application_id: ApplicationId,
    input: DecisionInput,
    pool: &PgPool,
) -> ApplicationResult<Decision> {
    apply_decision(application_id, DecisionAction::RemoveHold, input, pool).await
}

/// Audit only: the talent system is not told.
pub async fn reconsider(
    application_id: ApplicationId,
    input: DecisionInput,
    pool: &PgPool,
) -> ApplicationResult<Decision> {
    apply_decision(application_id, DecisionAction::Reconsider, input, pool).await
}

pub async fn request_live_interview(
    application_id: ApplicationId,
    input: DecisionInput,
    pool: &PgPool,
) -> ApplicationResult<Decision> {
    apply_decision(application_id, DecisionAction::RequestLiveInterview, input, pool).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconsider_without_comment_is_rejected() {
        let err = DecisionInput::by("r@example.com")
            .validate(DecisionAction::Reconsider)
            .unwrap_err();
        assert!(matches!(err, ApplicationError::Validation(_)));

        let blank = DecisionInput::by("r@example.com").with_comment("   ");
        assert!(blank.validate(DecisionAction::Reconsider).is_err());

        let ok = DecisionInput::by("r@example.com").with_comment("new info from hiring manager");
        assert!(ok.validate(DecisionAction::Reconsider).is_ok());
    }

    #[test]
    fn reject_requires_reason_code() {
        assert!(DecisionInput::by("r").validate(DecisionAction::Reject).is_err());
        assert!(DecisionInput::by("r")
            .with_reason("not_qualified")
            .validate(DecisionAction::Reject)
            .is_ok());
    }

    #[test]
    fn actor_is_required() {
        assert!(DecisionInput::by(" ").validate(DecisionAction::Hold).is_err());
    }

    #[test]
    fn recovery_actions_are_not_accepted_here() {
        assert!(DecisionInput::by("ops").validate(DecisionAction::Restart).is_err());
    }

    #[test]
    fn input_deserializes_with_defaults() {
        let input: DecisionInput = serde_json::from_str(r#"{"actor":"r@example.com"}"#).unwrap();
        assert!(input.reason_code.is_none());
        assert!(!input.live_interview);
    }
}
