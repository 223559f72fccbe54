//! Endpoint management: CRUD, subscriptions and secret lifecycle.

use facel_core::{EndpointId, TenantId};
use facel_db::models::{
    CreateWebhookEndpoint, UpdateWebhookEndpoint, WebhookEndpoint, WebhookEventType,
    WebhookSubscription,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::crypto;
use crate::error::WebhookError;
use crate::models::{CreateEndpointRequest, UpdateEndpointRequest};
use crate::validation::validate_endpoint_url;

const MAX_TIMEOUT_SECS: i32 = 120;
const MAX_ATTEMPT_LIMIT: i32 = 10;
const MAX_BASE_DELAY_SECS: i32 = 3600;

/// An endpoint together with its subscribed event type names.
#[derive(Debug, Clone)]
pub struct EndpointWithSubscriptions {
    pub endpoint: WebhookEndpoint,
    pub event_types: Vec<String>,
}

/// Manages tenant webhook endpoints and their subscriptions.
#[derive(Debug, Clone)]
pub struct EndpointService {
    pool: PgPool,
    /// AES-256 key for endpoint secrets at rest.
    secret_key: Vec<u8>,
    /// Permit plain-http destinations (development only).
    allow_http: bool,
}

impl EndpointService {
    pub fn new(pool: PgPool, secret_key: Vec<u8>) -> Self {
        Self {
            pool,
            secret_key,
            allow_http: false,
        }
    }

    /// Allow plain-http endpoint URLs. Development only.
    #[must_use]
    pub fn with_allow_http(mut self, allow_http: bool) -> Self {
        self.allow_http = allow_http;
        self
    }

    /// Create an endpoint and its subscriptions.
    ///
    /// Returns the created endpoint and the plaintext secret, which is shown
    /// to the caller exactly once and stored only encrypted.
    pub async fn create_endpoint(
        &self,
        tenant_id: TenantId,
        request: CreateEndpointRequest,
    ) -> Result<(EndpointWithSubscriptions, String), WebhookError> {
        validate_endpoint_url(&request.url, self.allow_http)?;
        validate_delivery_settings(
            request.timeout_secs,
            request.max_attempts,
            request.base_delay_secs,
        )?;
        let event_type_ids = self.resolve_event_type_ids(&request.event_types).await?;

        let secret = crypto::generate_secret();
        let secret_encrypted = crypto::encrypt_secret(&secret, &self.secret_key)?;

        let endpoint = WebhookEndpoint::create(
            &self.pool,
            *tenant_id.as_uuid(),
            CreateWebhookEndpoint {
                url: request.url,
                secret_encrypted,
                active: request.active,
                timeout_secs: request.timeout_secs,
                max_attempts: request.max_attempts,
                base_delay_secs: request.base_delay_secs,
            },
        )
        .await?;

        WebhookSubscription::replace_for_endpoint(
            &self.pool,
            *tenant_id.as_uuid(),
            endpoint.id,
            &event_type_ids,
        )
        .await?;

        tracing::info!(
            target: "webhook_delivery",
            tenant_id = %tenant_id,
            endpoint_id = %endpoint.id,
            event_types = request.event_types.len(),
            "Webhook endpoint created"
        );

        Ok((
            EndpointWithSubscriptions {
                endpoint,
                event_types: request.event_types,
            },
            secret,
        ))
    }

    /// Fetch one endpoint with its subscriptions.
    pub async fn get_endpoint(
        &self,
        tenant_id: TenantId,
        endpoint_id: EndpointId,
    ) -> Result<EndpointWithSubscriptions, WebhookError> {
        let endpoint =
            WebhookEndpoint::find_by_id(&self.pool, *tenant_id.as_uuid(), *endpoint_id.as_uuid())
                .await?
                .ok_or(WebhookError::EndpointNotFound)?;

        let event_types = WebhookSubscription::event_type_names_for_endpoint(
            &self.pool,
            *tenant_id.as_uuid(),
            endpoint.id,
        )
        .await?;

        Ok(EndpointWithSubscriptions {
            endpoint,
            event_types,
        })
    }

    /// List a tenant's endpoints with their subscriptions.
    pub async fn list_endpoints(
        &self,
        tenant_id: TenantId,
        active_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<EndpointWithSubscriptions>, i64), WebhookError> {
        let endpoints = WebhookEndpoint::list_by_tenant(
            &self.pool,
            *tenant_id.as_uuid(),
            active_only,
            limit.clamp(1, 200),
            offset.max(0),
        )
        .await?;
        let total = WebhookEndpoint::count_by_tenant(&self.pool, *tenant_id.as_uuid()).await?;

        let mut items = Vec::with_capacity(endpoints.len());
        for endpoint in endpoints {
            let event_types = WebhookSubscription::event_type_names_for_endpoint(
                &self.pool,
                *tenant_id.as_uuid(),
                endpoint.id,
            )
            .await?;
            items.push(EndpointWithSubscriptions {
                endpoint,
                event_types,
            });
        }

        Ok((items, total))
    }

    /// Update an endpoint's settings and, when given, its subscription set.
    pub async fn update_endpoint(
        &self,
        tenant_id: TenantId,
        endpoint_id: EndpointId,
        request: UpdateEndpointRequest,
    ) -> Result<EndpointWithSubscriptions, WebhookError> {
        if let Some(url) = &request.url {
            validate_endpoint_url(url, self.allow_http)?;
        }
        validate_delivery_settings(
            request.timeout_secs.unwrap_or(1),
            request.max_attempts.unwrap_or(1),
            request.base_delay_secs.unwrap_or(1),
        )?;

        let event_type_ids = match &request.event_types {
            Some(names) => Some(self.resolve_event_type_ids(names).await?),
            None => None,
        };

        let endpoint = WebhookEndpoint::update(
            &self.pool,
            *tenant_id.as_uuid(),
            *endpoint_id.as_uuid(),
            UpdateWebhookEndpoint {
                url: request.url,
                active: request.active,
                timeout_secs: request.timeout_secs,
                max_attempts: request.max_attempts,
                base_delay_secs: request.base_delay_secs,
            },
        )
        .await?
        .ok_or(WebhookError::EndpointNotFound)?;

        if let Some(ids) = event_type_ids {
            WebhookSubscription::replace_for_endpoint(
                &self.pool,
                *tenant_id.as_uuid(),
                endpoint.id,
                &ids,
            )
            .await?;
        }

        let event_types = WebhookSubscription::event_type_names_for_endpoint(
            &self.pool,
            *tenant_id.as_uuid(),
            endpoint.id,
        )
        .await?;

        Ok(EndpointWithSubscriptions {
            endpoint,
            event_types,
        })
    }

    /// Delete an endpoint. Subscriptions and delivery history cascade.
    pub async fn delete_endpoint(
        &self,
        tenant_id: TenantId,
        endpoint_id: EndpointId,
    ) -> Result<(), WebhookError> {
        let deleted =
            WebhookEndpoint::delete(&self.pool, *tenant_id.as_uuid(), *endpoint_id.as_uuid())
                .await?;

        if !deleted {
            return Err(WebhookError::EndpointNotFound);
        }

        tracing::info!(
            target: "webhook_delivery",
            tenant_id = %tenant_id,
            endpoint_id = %endpoint_id,
            "Webhook endpoint deleted"
        );

        Ok(())
    }

    /// Replace an endpoint's subscription set.
    pub async fn replace_subscriptions(
        &self,
        tenant_id: TenantId,
        endpoint_id: EndpointId,
        event_types: Vec<String>,
    ) -> Result<EndpointWithSubscriptions, WebhookError> {
        let endpoint =
            WebhookEndpoint::find_by_id(&self.pool, *tenant_id.as_uuid(), *endpoint_id.as_uuid())
                .await?
                .ok_or(WebhookError::EndpointNotFound)?;

        let ids = self.resolve_event_type_ids(&event_types).await?;
        WebhookSubscription::replace_for_endpoint(
            &self.pool,
            *tenant_id.as_uuid(),
            endpoint.id,
            &ids,
        )
        .await?;

        Ok(EndpointWithSubscriptions {
            endpoint,
            event_types,
        })
    }

    /// Rotate the endpoint's shared secret. Returns the new plaintext secret
    /// exactly once; deliveries claimed after this point sign with it.
    pub async fn rotate_secret(
        &self,
        tenant_id: TenantId,
        endpoint_id: EndpointId,
    ) -> Result<String, WebhookError> {
        let secret = crypto::generate_secret();
        let secret_encrypted = crypto::encrypt_secret(&secret, &self.secret_key)?;

        let updated = WebhookEndpoint::set_secret(
            &self.pool,
            *tenant_id.as_uuid(),
            *endpoint_id.as_uuid(),
            &secret_encrypted,
        )
        .await?;

        if !updated {
            return Err(WebhookError::EndpointNotFound);
        }

        tracing::info!(
            target: "webhook_delivery",
            tenant_id = %tenant_id,
            endpoint_id = %endpoint_id,
            "Webhook endpoint secret rotated"
        );

        Ok(secret)
    }

    async fn resolve_event_type_ids(&self, names: &[String]) -> Result<Vec<Uuid>, WebhookError> {
        let mut ids = Vec::with_capacity(names.len());
        for name in names {
            let event_type = WebhookEventType::find_by_name(&self.pool, name)
                .await?
                .ok_or_else(|| WebhookError::UnknownEventType(name.clone()))?;
            ids.push(event_type.id);
        }
        Ok(ids)
    }
}

fn validate_delivery_settings(
    timeout_secs: i32,
    max_attempts: i32,
    base_delay_secs: i32,
) -> Result<(), WebhookError> {
    if !(1..=MAX_TIMEOUT_SECS).contains(&timeout_secs) {
        return Err(WebhookError::Validation(format!(
            "timeout_secs must be between 1 and {MAX_TIMEOUT_SECS}"
        )));
    }
    if !(1..=MAX_ATTEMPT_LIMIT).contains(&max_attempts) {
        return Err(WebhookError::Validation(format!(
            "max_attempts must be between 1 and {MAX_ATTEMPT_LIMIT}"
        )));
    }
    if !(1..=MAX_BASE_DELAY_SECS).contains(&base_delay_secs) {
        return Err(WebhookError::Validation(format!(
            "base_delay_secs must be between 1 and {MAX_BASE_DELAY_SECS}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_bounds() {
        assert!(validate_delivery_settings(30, 5, 60).is_ok());
        assert!(validate_delivery_settings(0, 5, 60).is_err());
        assert!(validate_delivery_settings(30, 0, 60).is_err());
        assert!(validate_delivery_settings(30, 11, 60).is_err());
        assert!(validate_delivery_settings(30, 5, 0).is_err());
        assert!(validate_delivery_settings(30, 5, 3601).is_err());
    }
}
