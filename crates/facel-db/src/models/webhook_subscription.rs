//! Webhook subscription model.
//!
//! Many-to-many join of endpoint and event type. An endpoint receives a
//! delivery only for event types it subscribes to, and only while active.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::webhook_endpoint::WebhookEndpoint;

/// A subscription of one endpoint to one event type.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WebhookSubscription {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub endpoint_id: Uuid,
    pub event_type_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl WebhookSubscription {
    /// Replace the subscription set of an endpoint with the given event types.
    ///
    /// Runs in a transaction so concurrent readers never observe a
    /// half-replaced set.
    pub async fn replace_for_endpoint(
        pool: &sqlx::PgPool,
        tenant_id: Uuid,
        endpoint_id: Uuid,
        event_type_ids: &[Uuid],
    ) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r#"
            DELETE FROM webhook_subscriptions
            WHERE tenant_id = $1 AND endpoint_id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(endpoint_id)
        .execute(&mut *tx)
        .await?;

        for event_type_id in event_type_ids {
            sqlx::query(
                r#"
                INSERT INTO webhook_subscriptions (tenant_id, endpoint_id, event_type_id)
                VALUES ($1, $2, $3)
                ON CONFLICT (endpoint_id, event_type_id) DO NOTHING
                "#,
            )
            .bind(tenant_id)
            .bind(endpoint_id)
            .bind(event_type_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await
    }

    /// Find the active endpoints of a tenant subscribed to an event type.
    pub async fn find_subscribed_endpoints(
        pool: &sqlx::PgPool,
        tenant_id: Uuid,
        event_type_name: &str,
    ) -> Result<Vec<WebhookEndpoint>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT e.* FROM webhook_endpoints e
            JOIN webhook_subscriptions s ON s.endpoint_id = e.id
            JOIN webhook_event_types t ON t.id = s.event_type_id
            WHERE e.tenant_id = $1 AND t.name = $2 AND e.active = TRUE
            ORDER BY e.created_at
            "#,
        )
        .bind(tenant_id)
        .bind(event_type_name)
        .fetch_all(pool)
        .await
    }

    /// List the event type names an endpoint subscribes to.
    pub async fn event_type_names_for_endpoint(
        pool: &sqlx::PgPool,
        tenant_id: Uuid,
        endpoint_id: Uuid,
    ) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT t.name FROM webhook_event_types t
            JOIN webhook_subscriptions s ON s.event_type_id = t.id
            WHERE s.tenant_id = $1 AND s.endpoint_id = $2
            ORDER BY t.name
            "#,
        )
        .bind(tenant_id)
        .bind(endpoint_id)
        .fetch_all(pool)
        .await
    }
}
