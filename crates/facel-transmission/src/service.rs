//! Transmission orchestration.
//!
//! Two submission modes share the same state transitions: `transmit_sync`
//! performs the external call inline and `transmit_async` enqueues a job
//! for the worker. All transitions land here so the document lifecycle is
//! identical either way.

use std::sync::Arc;

use facel_core::TenantId;
use facel_db::models::{DteAuditLog, DteDocument, DteStatus, DteTransmissionJob};
use facel_webhooks::{crypto, TriggerService};
use sqlx::PgPool;
use uuid::Uuid;

use crate::client::{
    ApiCredentials, ReceiptStatus, TransmitClient, TransmitReceipt, TransmitRequest,
};
use crate::error::TransmissionError;

/// Attempt budget for queued transmissions.
pub const ASYNC_MAX_ATTEMPTS: i32 = 3;

const AUDIT_ACTION: &str = "transmit";

/// Drives document submissions against the reception API.
#[derive(Clone)]
pub struct TransmissionService {
    pool: PgPool,
    client: Arc<dyn TransmitClient>,
    trigger: TriggerService,
    secret_key: Vec<u8>,
}

impl TransmissionService {
    pub fn new(pool: PgPool, client: Arc<dyn TransmitClient>, secret_key: Vec<u8>) -> Self {
        let trigger = TriggerService::new(pool.clone());
        Self {
            pool,
            client,
            trigger,
            secret_key,
        }
    }

    /// Enqueue a document for background transmission. The supplied
    /// credentials travel with the job, encrypted at rest, so the worker
    /// authenticates as the requesting tenant.
    pub async fn transmit_async(
        &self,
        tenant_id: TenantId,
        document_id: Uuid,
        credentials: &ApiCredentials,
    ) -> Result<DteTransmissionJob, TransmissionError> {
        let document = self.load_pending(tenant_id, document_id).await?;

        let api_token_encrypted = crypto::encrypt_secret(&credentials.token, &self.secret_key)
            .map_err(|e| {
                TransmissionError::Internal(format!("failed to encrypt credentials: {e}"))
            })?;

        let job = DteTransmissionJob::enqueue(
            &self.pool,
            *tenant_id.as_uuid(),
            document.id,
            &document.environment,
            ASYNC_MAX_ATTEMPTS,
            &api_token_encrypted,
        )
        .await?;

        tracing::info!(
            target: "dte_transmission",
            tenant_id = %tenant_id,
            document_id = %document.id,
            job_id = %job.id,
            "Transmission job enqueued"
        );

        Ok(job)
    }

    /// Submit a document inline and apply the verdict. No automatic retry;
    /// a transport failure surfaces to the caller.
    pub async fn transmit_sync(
        &self,
        tenant_id: TenantId,
        document_id: Uuid,
        credentials: &ApiCredentials,
    ) -> Result<TransmitReceipt, TransmissionError> {
        let document = self.load_pending(tenant_id, document_id).await?;

        DteDocument::increment_attempts(&self.pool, *tenant_id.as_uuid(), document.id).await?;

        match self
            .client
            .transmit(&request_for(&document, credentials.clone()))
            .await
        {
            Ok(receipt) => {
                self.apply_receipt(&document, &receipt).await?;
                Ok(receipt)
            }
            Err(e) => {
                self.record_attempt_failure(&document, &e.to_string())
                    .await?;
                Err(e)
            }
        }
    }

    /// Apply a definitive verdict to the document.
    pub(crate) async fn apply_receipt(
        &self,
        document: &DteDocument,
        receipt: &TransmitReceipt,
    ) -> Result<(), TransmissionError> {
        let observations = serde_json::json!(receipt.observations);

        match receipt.status {
            ReceiptStatus::Procesado => {
                let seal = receipt.reception_seal.as_deref().ok_or_else(|| {
                    TransmissionError::InvalidResponse(
                        "accepted receipt carries no reception seal".to_string(),
                    )
                })?;

                DteDocument::mark_procesado(
                    &self.pool,
                    document.tenant_id,
                    document.id,
                    seal,
                    receipt.processed_at,
                    &observations,
                )
                .await?;

                DteAuditLog::append(
                    &self.pool,
                    document.tenant_id,
                    document.id,
                    AUDIT_ACTION,
                    DteStatus::Procesado.as_str(),
                    &format!("accepted with seal {seal}"),
                )
                .await?;

                tracing::info!(
                    target: "dte_transmission",
                    tenant_id = %document.tenant_id,
                    document_id = %document.id,
                    generation_code = %document.generation_code,
                    "Document accepted by reception service"
                );

                self.trigger
                    .trigger_event(
                        TenantId::from_uuid(document.tenant_id),
                        "dte.processed",
                        event_data(document, Some(seal), &receipt.observations),
                        Some(&document.generation_code.to_string()),
                    )
                    .await;
            }
            ReceiptStatus::Rechazado => {
                DteDocument::mark_rechazado(
                    &self.pool,
                    document.tenant_id,
                    document.id,
                    &observations,
                )
                .await?;

                DteAuditLog::append(
                    &self.pool,
                    document.tenant_id,
                    document.id,
                    AUDIT_ACTION,
                    DteStatus::Rechazado.as_str(),
                    &format!("rejected: {}", receipt.observations.join("; ")),
                )
                .await?;

                tracing::warn!(
                    target: "dte_transmission",
                    tenant_id = %document.tenant_id,
                    document_id = %document.id,
                    generation_code = %document.generation_code,
                    "Document rejected by reception service"
                );

                self.trigger
                    .trigger_event(
                        TenantId::from_uuid(document.tenant_id),
                        "dte.rejected",
                        event_data(document, None, &receipt.observations),
                        Some(&document.generation_code.to_string()),
                    )
                    .await;
            }
        }

        Ok(())
    }

    /// Append an audit row for a failed attempt with no verdict.
    pub(crate) async fn record_attempt_failure(
        &self,
        document: &DteDocument,
        error: &str,
    ) -> Result<(), TransmissionError> {
        DteAuditLog::append(
            &self.pool,
            document.tenant_id,
            document.id,
            AUDIT_ACTION,
            "ERROR",
            error,
        )
        .await?;
        Ok(())
    }

    /// Exhaustion: the attempt budget is spent without a verdict. The
    /// document is marked rejected with a terminal audit row.
    pub(crate) async fn finalize_exhausted(
        &self,
        document: &DteDocument,
        error: &str,
    ) -> Result<(), TransmissionError> {
        let observations =
            serde_json::json!([format!("transmission attempts exhausted: {error}")]);

        DteDocument::mark_rechazado(&self.pool, document.tenant_id, document.id, &observations)
            .await?;

        DteAuditLog::append(
            &self.pool,
            document.tenant_id,
            document.id,
            AUDIT_ACTION,
            DteStatus::Rechazado.as_str(),
            &format!("attempts exhausted: {error}"),
        )
        .await?;

        tracing::error!(
            target: "dte_transmission",
            tenant_id = %document.tenant_id,
            document_id = %document.id,
            generation_code = %document.generation_code,
            error = %error,
            "Transmission attempts exhausted, document rejected"
        );

        self.trigger
            .trigger_event(
                TenantId::from_uuid(document.tenant_id),
                "dte.rejected",
                event_data(document, None, &[]),
                Some(&document.generation_code.to_string()),
            )
            .await;

        Ok(())
    }

    pub(crate) fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub(crate) fn client(&self) -> &Arc<dyn TransmitClient> {
        &self.client
    }

    /// Recover the credentials a job was enqueued with.
    pub(crate) fn job_credentials(
        &self,
        job: &DteTransmissionJob,
    ) -> Result<ApiCredentials, TransmissionError> {
        let token = crypto::decrypt_secret(&job.api_token_encrypted, &self.secret_key)
            .map_err(|e| {
                TransmissionError::Internal(format!("failed to decrypt job credentials: {e}"))
            })?;
        Ok(ApiCredentials::new(token))
    }

    async fn load_pending(
        &self,
        tenant_id: TenantId,
        document_id: Uuid,
    ) -> Result<DteDocument, TransmissionError> {
        let document = DteDocument::find_by_id(&self.pool, *tenant_id.as_uuid(), document_id)
            .await?
            .ok_or(TransmissionError::DocumentNotFound)?;

        if document.status != DteStatus::Pendiente.as_str() {
            return Err(TransmissionError::AlreadyTransmitted);
        }

        Ok(document)
    }
}

pub(crate) fn request_for(
    document: &DteDocument,
    credentials: ApiCredentials,
) -> TransmitRequest {
    TransmitRequest {
        generation_code: document.generation_code,
        control_number: document.control_number.clone(),
        document_type: document.document_type.clone(),
        environment: document.environment.clone(),
        credentials,
    }
}

fn event_data(
    document: &DteDocument,
    reception_seal: Option<&str>,
    observations: &[String],
) -> serde_json::Value {
    serde_json::json!({
        "generation_code": document.generation_code,
        "control_number": document.control_number,
        "document_type": document.document_type,
        "reception_seal": reception_seal,
        "observations": observations,
    })
}
