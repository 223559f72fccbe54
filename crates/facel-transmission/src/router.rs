//! Axum router setup for the transmission API.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use sqlx::PgPool;

use crate::client::{ApiCredentials, TransmitClient};
use crate::handlers;
use crate::service::TransmissionService;
use crate::status::StatusService;

/// Shared state for transmission handlers.
#[derive(Clone)]
pub struct TransmissionState {
    pub service: Arc<TransmissionService>,
    pub status: Arc<StatusService>,
    /// Deployment-level reception API credentials, used when a request
    /// does not carry its own token.
    pub default_credentials: ApiCredentials,
}

impl TransmissionState {
    pub fn new(
        pool: PgPool,
        client: Arc<dyn TransmitClient>,
        secret_key: Vec<u8>,
        default_credentials: ApiCredentials,
    ) -> Self {
        Self {
            service: Arc::new(TransmissionService::new(
                pool.clone(),
                client.clone(),
                secret_key,
            )),
            status: Arc::new(StatusService::new(pool, client)),
            default_credentials,
        }
    }
}

/// Creates the transmission router with all routes.
pub fn transmission_router(state: TransmissionState) -> Router {
    Router::new()
        .route(
            "/dte/{id}/transmit",
            post(handlers::transmit_document_handler),
        )
        .route("/dte/{id}/status", get(handlers::document_status_handler))
        .with_state(state)
}
