use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::common::{ApplicationId, InterviewId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "interview_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InterviewStatus {
    Created,
    Sent,
    Completed,
    Expired,
}

/// Token-based interview invitation for a candidate.
#[derive(FromRow, Debug, Clone, Serialize, Deserialize)]
pub struct Interview {
    pub id: InterviewId,
    pub application_id: ApplicationId,
    pub token: String,
    pub status: InterviewStatus,
    pub transcript: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Interview {
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == InterviewStatus::Sent && self.expires_at < now
    }

    pub async fn create(
        application_id: ApplicationId,
        expires_at: DateTime<Utc>,
        conn: &mut PgConnection,
    ) -> Result<Self> {
        let interview = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO interviews (id, application_id, token, status, expires_at)
            VALUES ($1, $2, $3, 'created', $4)
            RETURNING *
            "#,
        )
        .bind(InterviewId::new())
        .bind(application_id)
        .bind(Uuid::new_v4().simple().to_string())
        .bind(expires_at)
        .fetch_one(conn)
        .await?;

        Ok(interview)
    }

    pub async fn find_by_id(id: InterviewId, pool: &PgPool) -> Result<Option<Self>> {
        let interview = sqlx::query_as::<_, Self>("SELECT * FROM interviews WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(interview)
    }

    /// Most recent invitation for an application.
    pub async fn find_latest(application_id: ApplicationId, pool: &PgPool) -> Result<Option<Self>> {
        let interview = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM interviews
            WHERE application_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(application_id)
        .fetch_optional(pool)
        .await?;
        Ok(interview)
    }

    /// Most recent completed interview for an application.
    pub async fn find_latest_completed(
        application_id: ApplicationId,
        pool: &PgPool,
    ) -> Result<Option<Self>> {
        let interview = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM interviews
            WHERE application_id = $1 AND status = 'completed'
            ORDER BY completed_at DESC
            LIMIT 1
            "#,
        )
        .bind(application_id)
        .fetch_optional(pool)
        .await?;
        Ok(interview)
    }

    /// Whether the candidate has finished an interview. Derived, never stored
    /// on the application.
    pub async fn has_completed(application_id: ApplicationId, conn: &mut PgConnection) -> Result<bool> {
        let completed = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM interviews WHERE application_id = $1 AND status = 'completed')",
        )
        .bind(application_id)
        .fetch_one(conn)
        .await?;
        Ok(completed)
    }

    pub async fn mark_sent(id: InterviewId, pool: &PgPool) -> Result<()> {
        sqlx::query(
            "UPDATE interviews SET status = 'sent', sent_at = COALESCE(sent_at, NOW()) WHERE id = $1 AND status IN ('created', 'sent')",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// `sent → completed`. Returns None when the interview was not awaiting
    /// completion (already completed, expired or never sent).
    pub async fn mark_completed(id: InterviewId, conn: &mut PgConnection) -> Result<Option<Self>> {
        let interview = sqlx::query_as::<_, Self>(
            r#"
            UPDATE interviews
            SET status = 'completed', completed_at = NOW()
            WHERE id = $1 AND status = 'sent'
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await?;
        Ok(interview)
    }

    pub async fn set_transcript(id: InterviewId, transcript: &str, pool: &PgPool) -> Result<()> {
        sqlx::query("UPDATE interviews SET transcript = $2 WHERE id = $1")
            .bind(id)
            .bind(transcript)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Flip sent invitations past their deadline to `expired`.
    pub async fn expire_overdue(conn: &mut PgConnection) -> Result<Vec<Self>> {
        let expired = sqlx::query_as::<_, Self>(
            r#"
            UPDATE interviews
            SET status = 'expired'
            WHERE status = 'sent' AND expires_at < NOW()
            RETURNING *
            "#,
        )
        .fetch_all(conn)
        .await?;
        Ok(expired)
    }
}
