//! Transmission job queue model.
//!
//! One job per transmission request. Jobs are claimed with
//! `FOR UPDATE SKIP LOCKED` so multiple worker instances cannot race on a
//! row, and rescheduled with exponential backoff until attempts exhaust.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Job lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// Database representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// A queued document transmission.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DteTransmissionJob {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub document_id: Uuid,
    pub environment: String,
    /// Reception API credentials the job was enqueued with, encrypted at rest.
    pub api_token_encrypted: String,
    pub status: String,
    pub attempt_count: i32,
    pub max_attempts: i32,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl DteTransmissionJob {
    /// Enqueue a transmission job for a document.
    pub async fn enqueue(
        pool: &sqlx::PgPool,
        tenant_id: Uuid,
        document_id: Uuid,
        environment: &str,
        max_attempts: i32,
        api_token_encrypted: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO dte_transmission_jobs (
                tenant_id, document_id, environment, max_attempts, api_token_encrypted
            )
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(document_id)
        .bind(environment)
        .bind(max_attempts)
        .bind(api_token_encrypted)
        .fetch_one(pool)
        .await
    }

    /// Claim up to `batch_size` due jobs, oldest first.
    ///
    /// Flips claimed rows to `running`, stamps `started_at` and increments
    /// the attempt counter. Rows stuck in `running` past the visibility
    /// timeout (a worker crashed mid-attempt) are reclaimed the same way.
    pub async fn claim_due(
        pool: &sqlx::PgPool,
        batch_size: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            UPDATE dte_transmission_jobs SET
                status = 'running',
                started_at = NOW(),
                attempt_count = attempt_count + 1
            WHERE id IN (
                SELECT id FROM dte_transmission_jobs
                WHERE (status = 'pending'
                       AND (next_attempt_at IS NULL OR next_attempt_at <= NOW()))
                   OR (status = 'running'
                       AND started_at < NOW() - INTERVAL '10 minutes')
                ORDER BY created_at
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING *
            "#,
        )
        .bind(batch_size)
        .fetch_all(pool)
        .await
    }

    /// Finalize a job as completed.
    pub async fn mark_completed(pool: &sqlx::PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE dte_transmission_jobs
            SET status = 'completed', last_error = NULL, completed_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Reschedule a failed attempt for a later retry.
    pub async fn reschedule(
        pool: &sqlx::PgPool,
        id: Uuid,
        next_attempt_at: DateTime<Utc>,
        error: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE dte_transmission_jobs
            SET status = 'pending', next_attempt_at = $2, last_error = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(next_attempt_at)
        .bind(error)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Finalize a job as failed after exhausting its attempts.
    pub async fn mark_failed(
        pool: &sqlx::PgPool,
        id: Uuid,
        error: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE dte_transmission_jobs
            SET status = 'failed', last_error = $2, completed_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(pool)
        .await?;

        Ok(())
    }
}
