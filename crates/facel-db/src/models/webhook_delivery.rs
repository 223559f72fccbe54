//! Webhook delivery model and state machine.
//!
//! A delivery is one unit of outbound work: one event payload bound for one
//! subscribed endpoint. The `idempotency_key` UNIQUE constraint enforces
//! at-most-once enqueue per logical event/endpoint pair; the dispatcher is
//! the only writer after creation, except for the manual-retry escape hatch.
//!
//! Valid transitions:
//! `pending → sending → delivered`
//! `pending|sending → failed → sending → … → dead_letter`
//! `failed|dead_letter → pending` (manual retry only)

use chrono::{DateTime, Utc};
use facel_core::{TenantAware, TenantId};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Delivery lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Sending,
    Delivered,
    Failed,
    DeadLetter,
}

impl DeliveryStatus {
    /// Database representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Sending => "sending",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Failed => "failed",
            DeliveryStatus::DeadLetter => "dead_letter",
        }
    }

    /// True for states the dispatcher never picks up again on its own.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeliveryStatus::Delivered | DeliveryStatus::DeadLetter)
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DeliveryStatus::Pending),
            "sending" => Ok(DeliveryStatus::Sending),
            "delivered" => Ok(DeliveryStatus::Delivered),
            "failed" => Ok(DeliveryStatus::Failed),
            "dead_letter" => Ok(DeliveryStatus::DeadLetter),
            other => Err(format!("unknown delivery status: {other}")),
        }
    }
}

/// One attempted transmission of an event payload to one endpoint.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WebhookDelivery {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub endpoint_id: Uuid,
    pub event_type: String,
    pub idempotency_key: String,
    pub payload: serde_json::Value,
    pub request_headers: serde_json::Value,
    pub status: String,
    pub attempt_count: i32,
    pub max_attempts: i32,
    pub response_status: Option<i32>,
    pub response_headers: Option<serde_json::Value>,
    pub response_body: Option<String>,
    pub error_message: Option<String>,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TenantAware for WebhookDelivery {
    fn tenant_id(&self) -> TenantId {
        TenantId::from_uuid(self.tenant_id)
    }
}

/// Request to create a pending delivery.
#[derive(Debug, Clone)]
pub struct CreateWebhookDelivery {
    pub tenant_id: Uuid,
    pub endpoint_id: Uuid,
    pub event_type: String,
    pub idempotency_key: String,
    pub payload: serde_json::Value,
    pub request_headers: serde_json::Value,
    pub max_attempts: i32,
}

/// Aggregate delivery counts over a trailing window.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DeliveryStats {
    pub total: i64,
    pub delivered: i64,
    pub dead_letter: i64,
}

impl DeliveryStats {
    /// Delivered share of completed work, in [0, 1]. `None` when no data.
    #[must_use]
    pub fn success_rate(&self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            #[allow(clippy::cast_precision_loss)]
            Some(self.delivered as f64 / self.total as f64)
        }
    }
}

impl WebhookDelivery {
    /// Create a pending delivery, suppressing duplicates by idempotency key.
    ///
    /// Returns `None` when a delivery with the same key already exists; the
    /// UNIQUE constraint is the only guard needed under concurrent triggers.
    pub async fn create(
        pool: &sqlx::PgPool,
        input: CreateWebhookDelivery,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO webhook_deliveries (
                tenant_id, endpoint_id, event_type, idempotency_key,
                payload, request_headers, max_attempts
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (idempotency_key) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(input.tenant_id)
        .bind(input.endpoint_id)
        .bind(&input.event_type)
        .bind(&input.idempotency_key)
        .bind(&input.payload)
        .bind(&input.request_headers)
        .bind(input.max_attempts)
        .fetch_optional(pool)
        .await
    }

    /// Claim up to `batch_size` due deliveries, oldest first.
    ///
    /// Atomically flips claimed rows to `sending`, increments the attempt
    /// counter and stamps `sent_at`. `FOR UPDATE SKIP LOCKED` keeps
    /// concurrent dispatcher instances from double-sending a row. Rows
    /// stuck in `sending` past the visibility timeout (a dispatcher crashed
    /// between claim and outcome) are reclaimed as a fresh attempt.
    pub async fn claim_due(
        pool: &sqlx::PgPool,
        batch_size: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            UPDATE webhook_deliveries SET
                status = 'sending',
                attempt_count = attempt_count + 1,
                sent_at = NOW()
            WHERE id IN (
                SELECT id FROM webhook_deliveries
                WHERE status = 'pending'
                   OR (status = 'failed' AND next_retry_at <= NOW())
                   OR (status = 'sending'
                       AND sent_at < NOW() - INTERVAL '10 minutes')
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

    /// Finalize a delivery as succeeded.
    pub async fn mark_delivered(
        pool: &sqlx::PgPool,
        tenant_id: Uuid,
        id: Uuid,
        response_status: i32,
        response_headers: &serde_json::Value,
        response_body: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE webhook_deliveries SET
                status = 'delivered',
                response_status = $3,
                response_headers = $4,
                response_body = $5,
                error_message = NULL,
                next_retry_at = NULL,
                completed_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(response_status)
        .bind(response_headers)
        .bind(response_body)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Record a retriable failure and schedule the next attempt.
    #[allow(clippy::too_many_arguments)]
    pub async fn mark_failed(
        pool: &sqlx::PgPool,
        tenant_id: Uuid,
        id: Uuid,
        error_message: &str,
        response_status: Option<i32>,
        response_headers: Option<&serde_json::Value>,
        response_body: Option<&str>,
        next_retry_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE webhook_deliveries SET
                status = 'failed',
                error_message = $3,
                response_status = $4,
                response_headers = $5,
                response_body = $6,
                next_retry_at = $7
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(error_message)
        .bind(response_status)
        .bind(response_headers)
        .bind(response_body)
        .bind(next_retry_at)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Finalize a delivery as dead-lettered.
    #[allow(clippy::too_many_arguments)]
    pub async fn mark_dead_letter(
        pool: &sqlx::PgPool,
        tenant_id: Uuid,
        id: Uuid,
        error_message: &str,
        response_status: Option<i32>,
        response_headers: Option<&serde_json::Value>,
        response_body: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE webhook_deliveries SET
                status = 'dead_letter',
                error_message = $3,
                response_status = $4,
                response_headers = $5,
                response_body = $6,
                next_retry_at = NULL,
                completed_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(error_message)
        .bind(response_status)
        .bind(response_headers)
        .bind(response_body)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Manual retry: reset a failed or dead-lettered delivery to pending.
    ///
    /// Clears the schedule and error message but keeps `attempt_count`
    /// so aggregate history is preserved. Returns the updated row, or
    /// `None` when the delivery is missing or not in a retryable state.
    pub async fn reset_for_retry(
        pool: &sqlx::PgPool,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            UPDATE webhook_deliveries SET
                status = 'pending',
                next_retry_at = NULL,
                error_message = NULL,
                completed_at = NULL
            WHERE id = $1 AND tenant_id = $2
              AND status IN ('failed', 'dead_letter')
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await
    }

    /// Find a delivery by ID within a tenant.
    pub async fn find_by_id(
        pool: &sqlx::PgPool,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM webhook_deliveries
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await
    }

    /// List deliveries for a tenant, newest first, with optional filters.
    pub async fn list_by_tenant(
        pool: &sqlx::PgPool,
        tenant_id: Uuid,
        status: Option<&str>,
        endpoint_id: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut query = String::from(
            r#"
            SELECT * FROM webhook_deliveries
            WHERE tenant_id = $1
            "#,
        );
        let mut param_count = 1;

        if status.is_some() {
            param_count += 1;
            query.push_str(&format!(" AND status = ${param_count}"));
        }
        if endpoint_id.is_some() {
            param_count += 1;
            query.push_str(&format!(" AND endpoint_id = ${param_count}"));
        }

        query.push_str(&format!(
            " ORDER BY created_at DESC LIMIT ${} OFFSET ${}",
            param_count + 1,
            param_count + 2
        ));

        let mut q = sqlx::query_as::<_, WebhookDelivery>(&query).bind(tenant_id);
        if let Some(status) = status {
            q = q.bind(status.to_string());
        }
        if let Some(endpoint_id) = endpoint_id {
            q = q.bind(endpoint_id);
        }

        q.bind(limit).bind(offset).fetch_all(pool).await
    }

    /// Count deliveries for a tenant with the same optional filters.
    pub async fn count_by_tenant(
        pool: &sqlx::PgPool,
        tenant_id: Uuid,
        status: Option<&str>,
        endpoint_id: Option<Uuid>,
    ) -> Result<i64, sqlx::Error> {
        let mut query = String::from(
            r#"
            SELECT COUNT(*) FROM webhook_deliveries
            WHERE tenant_id = $1
            "#,
        );
        let mut param_count = 1;

        if status.is_some() {
            param_count += 1;
            query.push_str(&format!(" AND status = ${param_count}"));
        }
        if endpoint_id.is_some() {
            param_count += 1;
            query.push_str(&format!(" AND endpoint_id = ${param_count}"));
        }

        let mut q = sqlx::query_scalar::<_, i64>(&query).bind(tenant_id);
        if let Some(status) = status {
            q = q.bind(status.to_string());
        }
        if let Some(endpoint_id) = endpoint_id {
            q = q.bind(endpoint_id);
        }

        q.fetch_one(pool).await
    }

    /// Aggregate counts since a cutoff, optionally per endpoint.
    pub async fn stats_since(
        pool: &sqlx::PgPool,
        tenant_id: Uuid,
        endpoint_id: Option<Uuid>,
        since: DateTime<Utc>,
    ) -> Result<DeliveryStats, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE status = 'delivered') AS delivered,
                COUNT(*) FILTER (WHERE status = 'dead_letter') AS dead_letter
            FROM webhook_deliveries
            WHERE tenant_id = $1
              AND created_at >= $2
              AND ($3::uuid IS NULL OR endpoint_id = $3)
            "#,
        )
        .bind(tenant_id)
        .bind(since)
        .bind(endpoint_id)
        .fetch_one(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            DeliveryStatus::Pending,
            DeliveryStatus::Sending,
            DeliveryStatus::Delivered,
            DeliveryStatus::Failed,
            DeliveryStatus::DeadLetter,
        ] {
            assert_eq!(status.as_str().parse::<DeliveryStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_unknown_status_rejected() {
        assert!("abandoned".parse::<DeliveryStatus>().is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(DeliveryStatus::Delivered.is_terminal());
        assert!(DeliveryStatus::DeadLetter.is_terminal());
        assert!(!DeliveryStatus::Pending.is_terminal());
        assert!(!DeliveryStatus::Failed.is_terminal());
        assert!(!DeliveryStatus::Sending.is_terminal());
    }

    #[test]
    fn test_success_rate() {
        let stats = DeliveryStats {
            total: 4,
            delivered: 3,
            dead_letter: 1,
        };
        assert_eq!(stats.success_rate(), Some(0.75));

        let empty = DeliveryStats {
            total: 0,
            delivered: 0,
            dead_letter: 0,
        };
        assert_eq!(empty.success_rate(), None);
    }
}
