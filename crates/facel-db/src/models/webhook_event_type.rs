//! Webhook event type catalog.
//!
//! Immutable reference data naming the triggerable business events
//! (e.g. `dte.created`). Seeded idempotently on startup.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A catalog entry for a triggerable business event.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WebhookEventType {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl WebhookEventType {
    /// Insert an event type if it does not exist yet (upsert by name).
    pub async fn upsert(
        pool: &sqlx::PgPool,
        name: &str,
        description: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO webhook_event_types (name, description)
            VALUES ($1, $2)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(name)
        .bind(description)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Resolve an event type by name.
    pub async fn find_by_name(
        pool: &sqlx::PgPool,
        name: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM webhook_event_types WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(pool)
        .await
    }

    /// List the full catalog.
    pub async fn list_all(pool: &sqlx::PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM webhook_event_types ORDER BY name
            "#,
        )
        .fetch_all(pool)
        .await
    }
}
