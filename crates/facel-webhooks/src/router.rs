//! Axum router setup for the webhook management API.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use sqlx::PgPool;

use crate::error::WebhookError;
use crate::handlers::{deliveries, endpoints, inbound};
use crate::services::{DeliveryService, EndpointService, TriggerService};

/// Shared state for webhook handlers.
#[derive(Clone)]
pub struct WebhooksState {
    pub endpoint_service: Arc<EndpointService>,
    pub trigger_service: Arc<TriggerService>,
    pub delivery_service: Arc<DeliveryService>,
    /// Shared secret for the inbound purchase receiver, if enabled.
    pub inbound_secret: Option<String>,
    pool: PgPool,
}

impl WebhooksState {
    pub fn new(
        pool: PgPool,
        encryption_key: Vec<u8>,
        allow_http: bool,
        inbound_secret: Option<String>,
    ) -> Result<Self, WebhookError> {
        Ok(Self {
            endpoint_service: Arc::new(
                EndpointService::new(pool.clone(), encryption_key.clone())
                    .with_allow_http(allow_http),
            ),
            trigger_service: Arc::new(TriggerService::new(pool.clone())),
            delivery_service: Arc::new(DeliveryService::new(pool.clone(), encryption_key)?),
            inbound_secret,
            pool,
        })
    }

    /// Get a reference to the database pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Creates the webhook router with all routes.
pub fn webhooks_router(state: WebhooksState) -> Router {
    Router::new()
        // Endpoint CRUD
        .route(
            "/webhooks/endpoints",
            post(endpoints::create_endpoint_handler).get(endpoints::list_endpoints_handler),
        )
        .route(
            "/webhooks/endpoints/{id}",
            get(endpoints::get_endpoint_handler)
                .patch(endpoints::update_endpoint_handler)
                .delete(endpoints::delete_endpoint_handler),
        )
        .route(
            "/webhooks/endpoints/{id}/subscriptions",
            axum::routing::put(endpoints::replace_subscriptions_handler),
        )
        .route(
            "/webhooks/endpoints/{id}/rotate-secret",
            post(endpoints::rotate_secret_handler),
        )
        .route(
            "/webhooks/endpoints/{id}/stats",
            get(deliveries::endpoint_stats_handler),
        )
        .route(
            "/webhooks/endpoints/{id}/ping",
            post(endpoints::ping_endpoint_handler),
        )
        // Event types
        .route(
            "/webhooks/event-types",
            get(endpoints::list_event_types_handler),
        )
        // Delivery history and manual retry
        .route(
            "/webhooks/deliveries",
            get(deliveries::list_deliveries_handler),
        )
        .route(
            "/webhooks/deliveries/{id}",
            get(deliveries::get_delivery_handler),
        )
        .route(
            "/webhooks/deliveries/{id}/retry",
            post(deliveries::retry_delivery_handler),
        )
        .route("/webhooks/stats", get(deliveries::delivery_stats_handler))
        // Inbound receiver
        .route(
            "/inbound/purchases",
            post(inbound::inbound_purchase_handler),
        )
        .with_state(state)
}
