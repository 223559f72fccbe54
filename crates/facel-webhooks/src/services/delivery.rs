//! Delivery execution: maps send outcomes onto the delivery state machine.

use std::time::Duration;

use facel_core::{DeliveryId, TenantId};
use facel_db::models::{WebhookDelivery, WebhookEndpoint};
use sqlx::PgPool;

use crate::crypto;
use crate::error::WebhookError;
use crate::retry::{random_jitter_ms, RetryPolicy};
use crate::sender::{DeliverySender, ResponseSnapshot, SendOutcome, SendRequest};

/// Executes claimed deliveries and applies the resulting state transitions.
#[derive(Debug, Clone)]
pub struct DeliveryService {
    pool: PgPool,
    sender: DeliverySender,
    /// AES-256 key for endpoint secrets at rest.
    secret_key: Vec<u8>,
}

impl DeliveryService {
    pub fn new(pool: PgPool, secret_key: Vec<u8>) -> Result<Self, WebhookError> {
        Ok(Self {
            pool,
            sender: DeliverySender::new()?,
            secret_key,
        })
    }

    /// Execute one claimed delivery (already in `sending` state) to completion
    /// of this attempt.
    pub async fn process(&self, delivery: &WebhookDelivery) -> Result<(), WebhookError> {
        let endpoint = WebhookEndpoint::find_by_id(
            &self.pool,
            delivery.tenant_id,
            delivery.endpoint_id,
        )
        .await?;

        let Some(endpoint) = endpoint else {
            // Endpoint deleted between claim and send; nothing left to retry
            // against.
            WebhookDelivery::mark_dead_letter(
                &self.pool,
                delivery.tenant_id,
                delivery.id,
                "endpoint no longer exists",
                None,
                None,
                None,
            )
            .await?;
            return Ok(());
        };

        let secret = crypto::decrypt_secret(&endpoint.secret_encrypted, &self.secret_key)?;

        let body = serde_json::to_vec(&delivery.payload)
            .map_err(|e| WebhookError::Internal(format!("failed to serialize payload: {e}")))?;

        let request = SendRequest {
            url: endpoint.url.clone(),
            secret,
            event_type: delivery.event_type.clone(),
            delivery_id: delivery.id.to_string(),
            body,
            timeout: Duration::from_secs(u64::try_from(endpoint.timeout_secs).unwrap_or(30)),
        };

        let outcome = self.sender.send(&request).await;

        match outcome {
            SendOutcome::Success(response) => {
                self.handle_success(delivery, &endpoint, &response).await
            }
            SendOutcome::Retriable { error, response } => {
                self.handle_retriable(delivery, &endpoint, &error, response.as_ref())
                    .await
            }
            SendOutcome::Permanent { error, response } => {
                self.dead_letter(delivery, &error, response.as_ref()).await
            }
        }
    }

    async fn handle_success(
        &self,
        delivery: &WebhookDelivery,
        endpoint: &WebhookEndpoint,
        response: &ResponseSnapshot,
    ) -> Result<(), WebhookError> {
        WebhookDelivery::mark_delivered(
            &self.pool,
            delivery.tenant_id,
            delivery.id,
            response.status,
            &response.headers,
            &response.body,
        )
        .await?;

        WebhookEndpoint::touch_last_used(&self.pool, delivery.tenant_id, endpoint.id).await?;

        tracing::info!(
            target: "webhook_delivery",
            tenant_id = %delivery.tenant_id,
            delivery_id = %delivery.id,
            endpoint_id = %endpoint.id,
            event_type = %delivery.event_type,
            attempt = delivery.attempt_count,
            status = response.status,
            "Webhook delivered"
        );

        Ok(())
    }

    async fn handle_retriable(
        &self,
        delivery: &WebhookDelivery,
        endpoint: &WebhookEndpoint,
        error: &str,
        response: Option<&ResponseSnapshot>,
    ) -> Result<(), WebhookError> {
        let policy = RetryPolicy::new(i64::from(endpoint.base_delay_secs), delivery.max_attempts);

        if policy.is_exhausted(delivery.attempt_count) {
            return self.dead_letter(delivery, error, response).await;
        }

        let next_retry_at =
            policy.next_retry_at(delivery.attempt_count, chrono::Utc::now(), random_jitter_ms());

        WebhookDelivery::mark_failed(
            &self.pool,
            delivery.tenant_id,
            delivery.id,
            error,
            response.map(|r| r.status),
            response.map(|r| &r.headers),
            response.map(|r| r.body.as_str()),
            next_retry_at,
        )
        .await?;

        tracing::warn!(
            target: "webhook_delivery",
            tenant_id = %delivery.tenant_id,
            delivery_id = %delivery.id,
            endpoint_id = %endpoint.id,
            attempt = delivery.attempt_count,
            max_attempts = delivery.max_attempts,
            next_retry_at = %next_retry_at,
            error = %error,
            "Webhook delivery failed, retry scheduled"
        );

        Ok(())
    }

    async fn dead_letter(
        &self,
        delivery: &WebhookDelivery,
        error: &str,
        response: Option<&ResponseSnapshot>,
    ) -> Result<(), WebhookError> {
        WebhookDelivery::mark_dead_letter(
            &self.pool,
            delivery.tenant_id,
            delivery.id,
            error,
            response.map(|r| r.status),
            response.map(|r| &r.headers),
            response.map(|r| r.body.as_str()),
        )
        .await?;

        tracing::error!(
            target: "webhook_delivery",
            tenant_id = %delivery.tenant_id,
            delivery_id = %delivery.id,
            endpoint_id = %delivery.endpoint_id,
            attempt = delivery.attempt_count,
            error = %error,
            "Webhook delivery dead-lettered"
        );

        Ok(())
    }

    /// Manually requeue a failed or dead-lettered delivery.
    pub async fn retry_delivery(
        &self,
        tenant_id: TenantId,
        delivery_id: DeliveryId,
    ) -> Result<WebhookDelivery, WebhookError> {
        let reset = WebhookDelivery::reset_for_retry(
            &self.pool,
            *tenant_id.as_uuid(),
            *delivery_id.as_uuid(),
        )
        .await?;

        if let Some(delivery) = reset {
            tracing::info!(
                target: "webhook_delivery",
                tenant_id = %tenant_id,
                delivery_id = %delivery.id,
                "Delivery manually requeued"
            );
            return Ok(delivery);
        }

        // Distinguish missing from not-retryable for the API response.
        match WebhookDelivery::find_by_id(&self.pool, *tenant_id.as_uuid(), *delivery_id.as_uuid())
            .await?
        {
            Some(_) => Err(WebhookError::DeliveryNotRetryable),
            None => Err(WebhookError::DeliveryNotFound),
        }
    }
}
