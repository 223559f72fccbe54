//! Webhook endpoint model.
//!
//! A tenant-owned HTTP destination for webhook deliveries. The shared
//! secret is stored encrypted; deleting an endpoint cascades its
//! subscriptions and delivery history.

use chrono::{DateTime, Utc};
use facel_core::{TenantAware, TenantId};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A tenant-owned webhook destination.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WebhookEndpoint {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub url: String,
    /// AES-256-GCM encrypted shared secret, base64(nonce || ciphertext).
    pub secret_encrypted: String,
    pub active: bool,
    pub timeout_secs: i32,
    pub max_attempts: i32,
    pub base_delay_secs: i32,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TenantAware for WebhookEndpoint {
    fn tenant_id(&self) -> TenantId {
        TenantId::from_uuid(self.tenant_id)
    }
}

/// Request to create a new endpoint.
#[derive(Debug, Clone)]
pub struct CreateWebhookEndpoint {
    pub url: String,
    pub secret_encrypted: String,
    pub active: bool,
    pub timeout_secs: i32,
    pub max_attempts: i32,
    pub base_delay_secs: i32,
}

/// Request to update an endpoint. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateWebhookEndpoint {
    pub url: Option<String>,
    pub active: Option<bool>,
    pub timeout_secs: Option<i32>,
    pub max_attempts: Option<i32>,
    pub base_delay_secs: Option<i32>,
}

impl WebhookEndpoint {
    /// Find an endpoint by ID within a tenant.
    pub async fn find_by_id(
        pool: &sqlx::PgPool,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM webhook_endpoints
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await
    }

    /// List endpoints for a tenant with pagination.
    pub async fn list_by_tenant(
        pool: &sqlx::PgPool,
        tenant_id: Uuid,
        active_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        if active_only {
            sqlx::query_as(
                r#"
                SELECT * FROM webhook_endpoints
                WHERE tenant_id = $1 AND active = TRUE
                ORDER BY created_at LIMIT $2 OFFSET $3
                "#,
            )
            .bind(tenant_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
        } else {
            sqlx::query_as(
                r#"
                SELECT * FROM webhook_endpoints
                WHERE tenant_id = $1
                ORDER BY created_at LIMIT $2 OFFSET $3
                "#,
            )
            .bind(tenant_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
        }
    }

    /// Count endpoints in a tenant.
    pub async fn count_by_tenant(
        pool: &sqlx::PgPool,
        tenant_id: Uuid,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM webhook_endpoints WHERE tenant_id = $1
            "#,
        )
        .bind(tenant_id)
        .fetch_one(pool)
        .await
    }

    /// Create a new endpoint.
    pub async fn create(
        pool: &sqlx::PgPool,
        tenant_id: Uuid,
        input: CreateWebhookEndpoint,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO webhook_endpoints (
                tenant_id, url, secret_encrypted, active,
                timeout_secs, max_attempts, base_delay_secs
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(&input.url)
        .bind(&input.secret_encrypted)
        .bind(input.active)
        .bind(input.timeout_secs)
        .bind(input.max_attempts)
        .bind(input.base_delay_secs)
        .fetch_one(pool)
        .await
    }

    /// Update an endpoint. Returns `None` if it does not exist in the tenant.
    pub async fn update(
        pool: &sqlx::PgPool,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdateWebhookEndpoint,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            UPDATE webhook_endpoints SET
                url = COALESCE($3, url),
                active = COALESCE($4, active),
                timeout_secs = COALESCE($5, timeout_secs),
                max_attempts = COALESCE($6, max_attempts),
                base_delay_secs = COALESCE($7, base_delay_secs),
                updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(input.url)
        .bind(input.active)
        .bind(input.timeout_secs)
        .bind(input.max_attempts)
        .bind(input.base_delay_secs)
        .fetch_optional(pool)
        .await
    }

    /// Replace the stored encrypted secret.
    pub async fn set_secret(
        pool: &sqlx::PgPool,
        tenant_id: Uuid,
        id: Uuid,
        secret_encrypted: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE webhook_endpoints
            SET secret_encrypted = $3, updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(secret_encrypted)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Stamp the endpoint as used after a successful delivery.
    pub async fn touch_last_used(
        pool: &sqlx::PgPool,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE webhook_endpoints SET last_used_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Delete an endpoint; subscriptions and deliveries cascade.
    pub async fn delete(
        pool: &sqlx::PgPool,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM webhook_endpoints WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
