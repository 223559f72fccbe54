//! Transmission status queries.
//!
//! Local state is authoritative once a document is known; the remote
//! system is only consulted for documents this instance has no record of
//! (e.g. submitted by another system against the same taxpayer).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use facel_core::TenantId;
use facel_db::models::{DteDocument, DteStatus};
use serde::Serialize;
use sqlx::PgPool;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::client::{ApiCredentials, RemoteStatus, TransmitClient};
use crate::error::TransmissionError;

/// Where a status answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StatusSource {
    Local,
    Remote,
}

/// Answer to a status query.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StatusReport {
    pub generation_code: Uuid,
    pub status: String,
    pub reception_seal: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub observations: serde_json::Value,
    pub source: StatusSource,
}

/// Answers status queries from local state with a remote fallback.
#[derive(Clone)]
pub struct StatusService {
    pool: PgPool,
    client: Arc<dyn TransmitClient>,
}

impl StatusService {
    pub fn new(pool: PgPool, client: Arc<dyn TransmitClient>) -> Self {
        Self { pool, client }
    }

    /// Resolve the transmission status of a generation code. The remote
    /// fallback authenticates with the supplied credentials.
    pub async fn query(
        &self,
        tenant_id: TenantId,
        generation_code: Uuid,
        credentials: &ApiCredentials,
        environment: &str,
    ) -> Result<StatusReport, TransmissionError> {
        if let Some(document) =
            DteDocument::find_by_generation_code(&self.pool, *tenant_id.as_uuid(), generation_code)
                .await?
        {
            return Ok(StatusReport {
                generation_code,
                status: document.status,
                reception_seal: document.reception_seal,
                processed_at: document.processed_at,
                observations: document.observations,
                source: StatusSource::Local,
            });
        }

        let remote = self
            .client
            .query_status(generation_code, credentials, environment)
            .await?;

        let status = match remote {
            RemoteStatus::Procesado => DteStatus::Procesado,
            RemoteStatus::Rechazado => DteStatus::Rechazado,
            RemoteStatus::NoEncontrado => return Err(TransmissionError::DocumentNotFound),
        };

        Ok(StatusReport {
            generation_code,
            status: status.as_str().to_string(),
            reception_seal: None,
            processed_at: None,
            observations: serde_json::json!([]),
            source: StatusSource::Remote,
        })
    }
}
