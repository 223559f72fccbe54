//! Transmission API handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use facel_core::TenantId;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::client::ApiCredentials;
use crate::error::ApiResult;
use crate::router::TransmissionState;
use crate::status::StatusReport;

/// Submission mode selector.
#[derive(Debug, Clone, Copy, Default, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransmitMode {
    /// Enqueue a background job with bounded retries.
    #[default]
    Async,
    /// Perform the external call inline and return the verdict.
    Sync,
}

/// Request to transmit a document.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct TransmitDocumentRequest {
    #[serde(default)]
    pub mode: TransmitMode,
    /// Tenant-specific reception API token. Falls back to the
    /// deployment-level credentials when absent.
    #[serde(default)]
    pub api_token: Option<String>,
}

/// Response for an enqueued or completed transmission.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TransmitDocumentResponse {
    pub document_id: Uuid,
    /// Present in async mode.
    pub job_id: Option<Uuid>,
    /// Present in sync mode.
    pub status: Option<String>,
    pub reception_seal: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub observations: Vec<String>,
}

/// Query for status lookups.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct StatusPathQuery {
    #[serde(default = "default_environment")]
    pub environment: String,
}

fn default_environment() -> String {
    "00".to_string()
}

/// Transmit a registered document.
#[utoipa::path(
    post,
    path = "/dte/{id}/transmit",
    tag = "Transmission",
    params(("id" = Uuid, Path, description = "Document ID")),
    request_body = TransmitDocumentRequest,
    responses(
        (status = 202, description = "Job enqueued (async mode)", body = TransmitDocumentResponse),
        (status = 200, description = "Verdict applied (sync mode)", body = TransmitDocumentResponse),
        (status = 404, description = "Document not found"),
        (status = 409, description = "Document already transmitted"),
        (status = 502, description = "Reception service unreachable (sync mode)"),
    )
)]
pub async fn transmit_document_handler(
    State(state): State<TransmissionState>,
    Extension(tenant_id): Extension<TenantId>,
    Path(id): Path<Uuid>,
    Json(request): Json<TransmitDocumentRequest>,
) -> ApiResult<(StatusCode, Json<TransmitDocumentResponse>)> {
    let credentials = request
        .api_token
        .as_deref()
        .map(ApiCredentials::new)
        .unwrap_or_else(|| state.default_credentials.clone());

    match request.mode {
        TransmitMode::Async => {
            let job = state
                .service
                .transmit_async(tenant_id, id, &credentials)
                .await?;
            Ok((
                StatusCode::ACCEPTED,
                Json(TransmitDocumentResponse {
                    document_id: id,
                    job_id: Some(job.id),
                    status: None,
                    reception_seal: None,
                    processed_at: None,
                    observations: vec![],
                }),
            ))
        }
        TransmitMode::Sync => {
            let receipt = state
                .service
                .transmit_sync(tenant_id, id, &credentials)
                .await?;
            let status = match receipt.status {
                crate::client::ReceiptStatus::Procesado => "PROCESADO",
                crate::client::ReceiptStatus::Rechazado => "RECHAZADO",
            };
            Ok((
                StatusCode::OK,
                Json(TransmitDocumentResponse {
                    document_id: id,
                    job_id: None,
                    status: Some(status.to_string()),
                    reception_seal: receipt.reception_seal,
                    processed_at: Some(receipt.processed_at),
                    observations: receipt.observations,
                }),
            ))
        }
    }
}

/// Query the transmission status of a generation code.
#[utoipa::path(
    get,
    path = "/dte/{id}/status",
    tag = "Transmission",
    params(
        ("id" = Uuid, Path, description = "Document generation code"),
        StatusPathQuery,
    ),
    responses(
        (status = 200, description = "Transmission status", body = StatusReport),
        (status = 404, description = "Unknown locally and remotely"),
        (status = 502, description = "Reception service unreachable"),
    )
)]
pub async fn document_status_handler(
    State(state): State<TransmissionState>,
    Extension(tenant_id): Extension<TenantId>,
    Path(generation_code): Path<Uuid>,
    Query(query): Query<StatusPathQuery>,
) -> ApiResult<Json<StatusReport>> {
    let report = state
        .status
        .query(
            tenant_id,
            generation_code,
            &state.default_credentials,
            &query.environment,
        )
        .await?;

    Ok(Json(report))
}
