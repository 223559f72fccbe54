//! Event trigger: fan-out of business events into pending deliveries.
//!
//! Triggering is the write side of the outbox. It only inserts rows; the
//! dispatcher picks them up on its next tick. A trigger never fails the
//! calling business operation.

use chrono::Utc;
use facel_core::{EndpointId, TenantId};
use facel_db::models::{CreateWebhookDelivery, WebhookDelivery, WebhookEndpoint, WebhookSubscription};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::WebhookError;
use crate::idempotency;
use crate::models::{headers, WebhookPayload};

/// Event type used for synthetic test deliveries.
pub const PING_EVENT: &str = "test.ping";

/// Enqueues deliveries for subscribed endpoints when business events occur.
#[derive(Debug, Clone)]
pub struct TriggerService {
    pool: PgPool,
}

impl TriggerService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fan an event out to every active subscribed endpoint.
    ///
    /// Infallible by contract: enqueue errors are logged and swallowed so a
    /// webhook problem can never fail the business operation that emitted
    /// the event. Returns the number of deliveries actually enqueued.
    pub async fn trigger_event(
        &self,
        tenant_id: TenantId,
        event_type: &str,
        data: serde_json::Value,
        correlation_id: Option<&str>,
    ) -> usize {
        match self
            .try_trigger(tenant_id, event_type, data, correlation_id)
            .await
        {
            Ok(count) => count,
            Err(e) => {
                tracing::error!(
                    target: "webhook_delivery",
                    tenant_id = %tenant_id,
                    event_type = %event_type,
                    error = %e,
                    "Failed to enqueue webhook deliveries"
                );
                0
            }
        }
    }

    async fn try_trigger(
        &self,
        tenant_id: TenantId,
        event_type: &str,
        data: serde_json::Value,
        correlation_id: Option<&str>,
    ) -> Result<usize, WebhookError> {
        let endpoints = WebhookSubscription::find_subscribed_endpoints(
            &self.pool,
            *tenant_id.as_uuid(),
            event_type,
        )
        .await?;

        if endpoints.is_empty() {
            return Ok(0);
        }

        let now = Utc::now();
        let mut enqueued = 0;

        for endpoint in &endpoints {
            let created = self
                .enqueue_for_endpoint(tenant_id, endpoint, event_type, &data, correlation_id, now)
                .await?;

            if let Some(delivery) = created {
                enqueued += 1;
                tracing::debug!(
                    target: "webhook_delivery",
                    tenant_id = %tenant_id,
                    delivery_id = %delivery.id,
                    endpoint_id = %endpoint.id,
                    event_type = %event_type,
                    "Enqueued webhook delivery"
                );
            } else {
                tracing::debug!(
                    target: "webhook_delivery",
                    tenant_id = %tenant_id,
                    endpoint_id = %endpoint.id,
                    event_type = %event_type,
                    "Duplicate trigger suppressed by idempotency key"
                );
            }
        }

        Ok(enqueued)
    }

    /// Enqueue a synthetic `test.ping` delivery for one endpoint.
    ///
    /// Bypasses the subscription check so tenants can verify an endpoint
    /// before subscribing it to real events.
    pub async fn trigger_ping(
        &self,
        tenant_id: TenantId,
        endpoint_id: EndpointId,
    ) -> Result<Uuid, WebhookError> {
        let endpoint =
            WebhookEndpoint::find_by_id(&self.pool, *tenant_id.as_uuid(), *endpoint_id.as_uuid())
                .await?
                .ok_or(WebhookError::EndpointNotFound)?;

        let data = serde_json::json!({ "message": "ping" });
        let delivery = self
            .enqueue_for_endpoint(tenant_id, &endpoint, PING_EVENT, &data, None, Utc::now())
            .await?
            .ok_or_else(|| WebhookError::Internal("ping enqueue collided".to_string()))?;

        Ok(delivery.id)
    }

    async fn enqueue_for_endpoint(
        &self,
        tenant_id: TenantId,
        endpoint: &WebhookEndpoint,
        event_type: &str,
        data: &serde_json::Value,
        correlation_id: Option<&str>,
        now: chrono::DateTime<Utc>,
    ) -> Result<Option<WebhookDelivery>, WebhookError> {
        let key = idempotency::compute_key(
            *tenant_id.as_uuid(),
            endpoint.id,
            event_type,
            correlation_id,
            now,
        );

        let payload = WebhookPayload {
            event: event_type.to_string(),
            timestamp: now,
            tenant_id: *tenant_id.as_uuid(),
            data: data.clone(),
            correlation_id: correlation_id.map(str::to_string),
        };
        let payload = serde_json::to_value(&payload)
            .map_err(|e| WebhookError::Internal(format!("failed to serialize payload: {e}")))?;

        // Signature and timestamp headers are computed per attempt; only the
        // static part of the header set is recorded here.
        let request_headers = serde_json::json!({
            headers::CONTENT_TYPE: "application/json",
            headers::EVENT: event_type,
        });

        let created = WebhookDelivery::create(
            &self.pool,
            CreateWebhookDelivery {
                tenant_id: *tenant_id.as_uuid(),
                endpoint_id: endpoint.id,
                event_type: event_type.to_string(),
                idempotency_key: key,
                payload,
                request_headers,
                max_attempts: endpoint.max_attempts,
            },
        )
        .await?;

        Ok(created)
    }
}
