use std::fmt;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use typed_builder::TypedBuilder;

use super::status::ApplicationStatus;
use crate::common::{ApplicationId, DecisionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "decision_action", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    Advance,
    Reject,
    Hold,
    RemoveHold,
    Reconsider,
    RequestLiveInterview,
    // Operator recovery
    Restart,
    SkipToReview,
    MarkSkipped,
}

impl DecisionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionAction::Advance => "advance",
            DecisionAction::Reject => "reject",
            DecisionAction::Hold => "hold",
            DecisionAction::RemoveHold => "remove_hold",
            DecisionAction::Reconsider => "reconsider",
            DecisionAction::RequestLiveInterview => "request_live_interview",
            DecisionAction::Restart => "restart",
            DecisionAction::SkipToReview => "skip_to_review",
            DecisionAction::MarkSkipped => "mark_skipped",
        }
    }

    pub fn is_recovery(&self) -> bool {
        matches!(
            self,
            DecisionAction::Restart | DecisionAction::SkipToReview | DecisionAction::MarkSkipped
        )
    }
}

impl fmt::Display for DecisionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only audit entry for a human action.
#[derive(FromRow, Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub id: DecisionId,
    pub application_id: ApplicationId,
    pub action: DecisionAction,
    pub actor: String,
    pub from_status: ApplicationStatus,
    pub to_status: ApplicationStatus,
    pub reason_code: Option<String>,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct NewDecision {
    pub application_id: ApplicationId,
    pub action: DecisionAction,
    #[builder(setter(into))]
    pub actor: String,
    pub from_status: ApplicationStatus,
    pub to_status: ApplicationStatus,
    #[builder(default, setter(into))]
    pub reason_code: Option<String>,
    #[builder(default, setter(into))]
    pub comment: Option<String>,
}

impl Decision {
    pub async fn record(new: NewDecision, conn: &mut PgConnection) -> Result<Self> {
        let decision = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO decisions (
                id, application_id, action, actor, from_status, to_status, reason_code, comment
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(DecisionId::new())
        .bind(new.application_id)
        .bind(new.action)
        .bind(&new.actor)
        .bind(new.from_status)
        .bind(new.to_status)
        .bind(&new.reason_code)
        .bind(&new.comment)
        .fetch_one(conn)
        .await?;

        Ok(decision)
    }

    pub async fn find_for_application(application_id: ApplicationId, pool: &PgPool) -> Result<Vec<Self>> {
        let decisions = sqlx::query_as::<_, Self>(
            "SELECT * FROM decisions WHERE application_id = $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(application_id)
        .fetch_all(pool)
        .await?;

        Ok(decisions)
    }
}
