use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};

use super::status::ApplicationStatus;
use crate::common::ApplicationId;
use crate::domains::applications::error::{ApplicationError, ApplicationResult, InvalidStateError};
use crate::kernel::TalentRecord;

/// A candidate's application moving through screening.
#[derive(FromRow, Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub candidate_ref: String,
    pub candidate_name: String,
    pub candidate_email: Option<String>,
    pub job_title: String,
    pub job_description: String,
    pub external_status: Option<String>,

    pub status: ApplicationStatus,
    pub status_changed_at: DateTime<Utc>,

    pub workday_status_changed: bool,
    pub rejection_reason_code: Option<String>,
    pub human_requested: bool,

    pub resume_text: Option<String>,
    pub facts: Option<serde_json::Value>,
    pub summary: Option<String>,
    pub summary_doc_id: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What a talent-system sync did to the local row.
#[derive(Debug, Clone)]
pub enum UpsertOutcome {
    Inserted(Application),
    /// Known application. `external_changed` is set when the talent system
    /// reported a different status than last time.
    Updated {
        application: Application,
        external_changed: bool,
    },
}

impl Application {
    pub async fn find_by_id(id: ApplicationId, pool: &PgPool) -> Result<Self> {
        let application = sqlx::query_as::<_, Self>("SELECT * FROM applications WHERE id = $1")
            .bind(id)
            .fetch_one(pool)
            .await?;
        Ok(application)
    }

    pub async fn find_optional(id: ApplicationId, conn: &mut PgConnection) -> Result<Option<Self>> {
        let application = sqlx::query_as::<_, Self>("SELECT * FROM applications WHERE id = $1")
            .bind(id)
            .fetch_optional(conn)
            .await?;
        Ok(application)
    }

    pub async fn find_by_candidate_ref(candidate_ref: &str, pool: &PgPool) -> Result<Option<Self>> {
        let application =
            sqlx::query_as::<_, Self>("SELECT * FROM applications WHERE candidate_ref = $1")
                .bind(candidate_ref)
                .fetch_optional(pool)
                .await?;
        Ok(application)
    }

    pub async fn find_by_status(status: ApplicationStatus, limit: i64, pool: &PgPool) -> Result<Vec<Self>> {
        let applications = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM applications
            WHERE status = $1
            ORDER BY status_changed_at ASC
            LIMIT $2
            "#,
        )
        .bind(status)
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(applications)
    }

    /// Current status, row-locked until the transaction ends.
    pub async fn lock_status(
        id: ApplicationId,
        conn: &mut PgConnection,
    ) -> ApplicationResult<ApplicationStatus> {
        sqlx::query_scalar::<_, ApplicationStatus>(
            "SELECT status FROM applications WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or(ApplicationError::NotFound(id))
    }

    /// Move to `to` only if the current status is one of `expected`.
    ///
    /// This is the only way application status changes.
    pub async fn transition(
        id: ApplicationId,
        expected: &[ApplicationStatus],
        to: ApplicationStatus,
        conn: &mut PgConnection,
    ) -> ApplicationResult<Self> {
        let updated = sqlx::query_as::<_, Self>(
            r#"
            UPDATE applications
            SET status = $3,
                status_changed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND status = ANY($2)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(expected)
        .bind(to)
        .fetch_optional(&mut *conn)
        .await?;

        if let Some(application) = updated {
            tracing::debug!(
                application_id = %id,
                status = %to,
                "application status changed"
            );
            return Ok(application);
        }

        let actual = sqlx::query_scalar::<_, ApplicationStatus>(
            "SELECT status FROM applications WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(ApplicationError::NotFound(id))?;

        Err(InvalidStateError {
            application_id: id,
            expected: expected.to_vec(),
            actual,
        }
        .into())
    }

    /// Insert a new application or refresh a known one from the talent system.
    pub async fn upsert_from_record(record: &TalentRecord, conn: &mut PgConnection) -> Result<UpsertOutcome> {
        let previous = sqlx::query_as::<_, (ApplicationId, Option<String>)>(
            "SELECT id, external_status FROM applications WHERE candidate_ref = $1 FOR UPDATE",
        )
        .bind(&record.candidate_ref)
        .fetch_optional(&mut *conn)
        .await?;

        match previous {
            None => {
                let application = sqlx::query_as::<_, Self>(
                    r#"
                    INSERT INTO applications (
                        id, candidate_ref, candidate_name, candidate_email,
                        job_title, job_description, external_status, status
                    )
                    VALUES ($1, $2, $3, $4, $5, COALESCE($6, ''), $7, 'new')
                    RETURNING *
                    "#,
                )
                .bind(ApplicationId::new())
                .bind(&record.candidate_ref)
                .bind(&record.candidate_name)
                .bind(&record.candidate_email)
                .bind(&record.job_title)
                .bind(&record.job_description)
                .bind(&record.external_status)
                .fetch_one(&mut *conn)
                .await?;
                Ok(UpsertOutcome::Inserted(application))
            }
            Some((id, previous_external)) => {
                let external_changed = record.external_status.is_some()
                    && previous_external.is_some()
                    && record.external_status != previous_external;

                let application = sqlx::query_as::<_, Self>(
                    r#"
                    UPDATE applications
                    SET candidate_name = $2,
                        candidate_email = $3,
                        job_title = $4,
                        job_description = COALESCE($5, job_description),
                        external_status = COALESCE($6, external_status),
                        workday_status_changed = workday_status_changed OR $7,
                        updated_at = NOW()
                    WHERE id = $1
                    RETURNING *
                    "#,
                )
                .bind(id)
                .bind(&record.candidate_name)
                .bind(&record.candidate_email)
                .bind(&record.job_title)
                .bind(&record.job_description)
                .bind(&record.external_status)
                .bind(external_changed)
                .fetch_one(&mut *conn)
                .await?;
                Ok(UpsertOutcome::Updated {
                    application,
                    external_changed,
                })
            }
        }
    }

    /// `new` applications with no in-flight download and none dead-lettered
    /// since they last changed status.
    pub async fn find_awaiting_download(limit: i64, pool: &PgPool) -> Result<Vec<ApplicationId>> {
        let ids = sqlx::query_scalar::<_, ApplicationId>(
            r#"
            SELECT a.id FROM applications a
            WHERE a.status = 'new'
              AND NOT a.workday_status_changed
              AND NOT EXISTS (
                  SELECT 1 FROM jobs j
                  WHERE j.entity_id = a.id
                    AND j.job_type = 'download'
                    AND (
                        j.status IN ('pending', 'running')
                        OR (j.status = 'dead' AND j.completed_at >= a.status_changed_at)
                    )
              )
            ORDER BY a.created_at ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(ids)
    }

    /// `advancing` applications the eligibility sweep should route. Skips
    /// those whose interview send was dead-lettered since they last moved.
    pub async fn find_advancing(limit: i64, pool: &PgPool) -> Result<Vec<Self>> {
        let applications = sqlx::query_as::<_, Self>(
            r#"
            SELECT a.* FROM applications a
            WHERE a.status = 'advancing'
              AND NOT a.workday_status_changed
              AND NOT EXISTS (
                  SELECT 1 FROM jobs j
                  WHERE j.entity_id = a.id
                    AND j.job_type = 'send_interview'
                    AND j.status = 'dead'
                    AND j.completed_at >= a.status_changed_at
              )
            ORDER BY a.status_changed_at ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(applications)
    }

    /// Flag applications that sat in a pipeline status past `cutoff` with no
    /// job queued or running, none dead-lettered since the last status change
    /// and none finished since `cutoff`. Applications whose status changed in
    /// the talent system are left alone, the same as by the eligibility sweep.
    ///
    /// Returns (id, status it was stuck in).
    pub async fn flag_stuck(
        statuses: &[ApplicationStatus],
        cutoff: DateTime<Utc>,
        conn: &mut PgConnection,
    ) -> Result<Vec<(ApplicationId, ApplicationStatus)>> {
        let rows = sqlx::query_as::<_, (ApplicationId, ApplicationStatus)>(
            r#"
            WITH stuck AS (
                SELECT a.id, a.status
                FROM applications a
                WHERE a.status = ANY($1)
                  AND a.status_changed_at < $2
                  AND NOT a.workday_status_changed
                  AND NOT EXISTS (
                      SELECT 1 FROM jobs j
                      WHERE j.entity_id = a.id
                        AND (
                            j.status IN ('pending', 'running')
                            OR (j.status = 'dead' AND j.completed_at >= a.status_changed_at)
                            OR (j.status = 'completed' AND j.completed_at >= $2)
                        )
                  )
                FOR UPDATE OF a SKIP LOCKED
            )
            UPDATE applications
            SET status = 'error',
                status_changed_at = NOW(),
                updated_at = NOW()
            FROM stuck
            WHERE applications.id = stuck.id AND applications.status = stuck.status
            RETURNING stuck.id, stuck.status
            "#,
        )
        .bind(statuses)
        .bind(cutoff)
        .fetch_all(conn)
        .await?;
        Ok(rows)
    }

    pub async fn set_resume_text(id: ApplicationId, text: &str, pool: &PgPool) -> Result<()> {
        sqlx::query("UPDATE applications SET resume_text = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(text)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn set_facts(id: ApplicationId, facts: &serde_json::Value, pool: &PgPool) -> Result<()> {
        sqlx::query("UPDATE applications SET facts = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(facts)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn set_summary(id: ApplicationId, summary: &str, pool: &PgPool) -> Result<()> {
        sqlx::query("UPDATE applications SET summary = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(summary)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn set_summary_doc_id(id: ApplicationId, doc_id: &str, pool: &PgPool) -> Result<()> {
        sqlx::query("UPDATE applications SET summary_doc_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(doc_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn set_rejection_reason(
        id: ApplicationId,
        reason_code: &str,
        conn: &mut PgConnection,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE applications SET rejection_reason_code = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(reason_code)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn set_human_requested(
        id: ApplicationId,
        requested: bool,
        conn: &mut PgConnection,
    ) -> Result<()> {
        sqlx::query("UPDATE applications SET human_requested = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(requested)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Drop stage artifacts before a restart from the beginning.
    pub async fn clear_artifacts(id: ApplicationId, conn: &mut PgConnection) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE applications
            SET resume_text = NULL,
                facts = NULL,
                summary = NULL,
                summary_doc_id = NULL,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Applications parked in `error`, oldest first.
    pub async fn find_errored(limit: i64, pool: &PgPool) -> Result<Vec<Self>> {
        Self::find_by_status(ApplicationStatus::Error, limit, pool).await
    }
}
