//! Transmission queue tests against a live PostgreSQL instance.
//!
//! Run with: cargo test --features integration
//! The reception API is replaced by a scripted fake; no network involved.

#![cfg(feature = "integration")]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use facel_core::TenantId;
use facel_db::models::{
    CreateDteDocument, DteAuditLog, DteDocument, DteStatus, DteTransmissionJob, JobStatus,
};
use facel_transmission::client::{
    ApiCredentials, ReceiptStatus, RemoteStatus, TransmitClient, TransmitReceipt, TransmitRequest,
};
use facel_transmission::status::{StatusService, StatusSource};
use facel_transmission::worker::{TransmissionWorker, TransmissionWorkerConfig};
use facel_transmission::{TransmissionError, TransmissionService};

// ---------------------------------------------------------------------------
// Scripted fake client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Scripted {
    Accept(&'static str),
    Reject(&'static str),
    Fail(&'static str),
}

struct FakeClient {
    script: Mutex<VecDeque<Scripted>>,
    remote_status: RemoteStatus,
    /// Bearer tokens observed on transmit calls, in order.
    seen_tokens: Mutex<Vec<String>>,
}

impl FakeClient {
    fn new(script: Vec<Scripted>) -> Arc<Self> {
        Self::with_remote_status(script, RemoteStatus::NoEncontrado)
    }

    fn with_remote_status(script: Vec<Scripted>, remote_status: RemoteStatus) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            remote_status,
            seen_tokens: Mutex::new(Vec::new()),
        })
    }

    fn seen_tokens(&self) -> Vec<String> {
        self.seen_tokens.lock().unwrap().clone()
    }
}

#[async_trait]
impl TransmitClient for FakeClient {
    async fn transmit(
        &self,
        request: &TransmitRequest,
    ) -> Result<TransmitReceipt, TransmissionError> {
        self.seen_tokens
            .lock()
            .unwrap()
            .push(request.credentials.token.clone());

        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Scripted::Fail("script exhausted"));

        match next {
            Scripted::Accept(seal) => Ok(TransmitReceipt {
                status: ReceiptStatus::Procesado,
                reception_seal: Some(seal.to_string()),
                processed_at: Utc::now(),
                observations: vec![],
            }),
            Scripted::Reject(reason) => Ok(TransmitReceipt {
                status: ReceiptStatus::Rechazado,
                reception_seal: None,
                processed_at: Utc::now(),
                observations: vec![reason.to_string()],
            }),
            Scripted::Fail(message) => Err(TransmissionError::Remote(message.to_string())),
        }
    }

    async fn query_status(
        &self,
        _generation_code: Uuid,
        _credentials: &ApiCredentials,
        _environment: &str,
    ) -> Result<RemoteStatus, TransmissionError> {
        Ok(self.remote_status)
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

async fn test_pool() -> PgPool {
    let url = std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .expect("TEST_DATABASE_URL or DATABASE_URL must be set for integration tests");

    let pool = PgPool::connect(&url).await.expect("failed to connect");
    facel_db::run_migrations(&pool)
        .await
        .expect("migrations failed");
    facel_db::bootstrap::seed_event_types(&pool)
        .await
        .expect("seeding event types failed");
    pool
}

fn secret_key() -> Vec<u8> {
    vec![0x42; 32]
}

fn credentials() -> ApiCredentials {
    ApiCredentials::new("tenant-token")
}

fn service(pool: &PgPool, client: Arc<dyn TransmitClient>) -> TransmissionService {
    TransmissionService::new(pool.clone(), client, secret_key())
}

async fn create_document(pool: &PgPool, tenant_id: TenantId) -> DteDocument {
    DteDocument::create(
        pool,
        *tenant_id.as_uuid(),
        CreateDteDocument {
            generation_code: Uuid::new_v4(),
            control_number: format!("DTE-01-00000001-{}", &Uuid::new_v4().simple().to_string()[..12]),
            document_type: "01".to_string(),
            environment: "00".to_string(),
        },
    )
    .await
    .expect("document creation failed")
}

fn worker(pool: &PgPool, client: Arc<dyn TransmitClient>) -> TransmissionWorker {
    // Zero base delay keeps retried attempts due within a second.
    let config = TransmissionWorkerConfig {
        poll_interval: Duration::from_millis(100),
        batch_size: 20,
        base_delay_secs: 0,
    };
    TransmissionWorker::new(pool.clone(), service(pool, client), config)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_accepted_document_marked_procesado() {
    let pool = test_pool().await;
    let tenant = TenantId::new();
    let document = create_document(&pool, tenant).await;

    let client = FakeClient::new(vec![Scripted::Accept("SELLO-OK-1")]);
    let job = service(&pool, client.clone())
        .transmit_async(tenant, document.id, &credentials())
        .await
        .unwrap();

    worker(&pool, client).tick().await;

    let document = DteDocument::find_by_id(&pool, *tenant.as_uuid(), document.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(document.status, DteStatus::Procesado.as_str());
    assert_eq!(document.reception_seal.as_deref(), Some("SELLO-OK-1"));
    assert!(document.processed_at.is_some());
    assert_eq!(document.attempt_count, 1);

    let jobs: Vec<DteTransmissionJob> =
        sqlx::query_as("SELECT * FROM dte_transmission_jobs WHERE id = $1")
            .bind(job.id)
            .fetch_all(&pool)
            .await
            .unwrap();
    assert_eq!(jobs[0].status, JobStatus::Completed.as_str());

    let audit = DteAuditLog::list_for_document(&pool, *tenant.as_uuid(), document.id)
        .await
        .unwrap();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].status, "PROCESADO");
}

#[tokio::test]
async fn test_worker_authenticates_with_job_credentials() {
    let pool = test_pool().await;
    let tenant = TenantId::new();
    let document = create_document(&pool, tenant).await;

    let client = FakeClient::new(vec![Scripted::Accept("SELLO-CRED")]);
    let tenant_credentials = ApiCredentials::new("tenant-a-token");
    let job = service(&pool, client.clone())
        .transmit_async(tenant, document.id, &tenant_credentials)
        .await
        .unwrap();

    // The queued row stores the token encrypted, never in the clear.
    assert!(!job.api_token_encrypted.is_empty());
    assert!(!job.api_token_encrypted.contains("tenant-a-token"));

    worker(&pool, client.clone()).tick().await;

    assert_eq!(client.seen_tokens(), vec!["tenant-a-token".to_string()]);

    let document = DteDocument::find_by_id(&pool, *tenant.as_uuid(), document.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(document.status, DteStatus::Procesado.as_str());
}

#[tokio::test]
async fn test_rejection_is_terminal_without_retry() {
    let pool = test_pool().await;
    let tenant = TenantId::new();
    let document = create_document(&pool, tenant).await;

    let client = FakeClient::new(vec![Scripted::Reject("firma inválida")]);
    service(&pool, client.clone())
        .transmit_async(tenant, document.id, &credentials())
        .await
        .unwrap();

    let w = worker(&pool, client);
    w.tick().await;
    // A second tick must find nothing to do.
    w.tick().await;

    let document = DteDocument::find_by_id(&pool, *tenant.as_uuid(), document.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(document.status, DteStatus::Rechazado.as_str());
    assert_eq!(document.attempt_count, 1, "a definitive rejection is not retried");
    assert_eq!(document.observations, serde_json::json!(["firma inválida"]));

    let audit = DteAuditLog::list_for_document(&pool, *tenant.as_uuid(), document.id)
        .await
        .unwrap();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].status, "RECHAZADO");
}

#[tokio::test]
async fn test_exhaustion_leaves_full_audit_trail() {
    let pool = test_pool().await;
    let tenant = TenantId::new();
    let document = create_document(&pool, tenant).await;

    let client = FakeClient::new(vec![
        Scripted::Fail("connection reset"),
        Scripted::Fail("connection reset"),
        Scripted::Fail("connection reset"),
    ]);
    let job = service(&pool, client.clone())
        .transmit_async(tenant, document.id, &credentials())
        .await
        .unwrap();
    assert_eq!(job.max_attempts, 3);

    let w = worker(&pool, client);
    for _ in 0..3 {
        w.tick().await;
        // Wait out the rescheduled jitter before the next claim.
        tokio::time::sleep(Duration::from_millis(1200)).await;
    }

    let document = DteDocument::find_by_id(&pool, *tenant.as_uuid(), document.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(document.status, DteStatus::Rechazado.as_str());
    assert_eq!(document.attempt_count, 3);

    let jobs: Vec<DteTransmissionJob> =
        sqlx::query_as("SELECT * FROM dte_transmission_jobs WHERE id = $1")
            .bind(job.id)
            .fetch_all(&pool)
            .await
            .unwrap();
    assert_eq!(jobs[0].status, JobStatus::Failed.as_str());
    assert_eq!(jobs[0].attempt_count, 3);

    // One failure row per attempt plus the terminal rejection row.
    let audit = DteAuditLog::list_for_document(&pool, *tenant.as_uuid(), document.id)
        .await
        .unwrap();
    assert_eq!(audit.len(), 4);
    assert_eq!(audit.iter().filter(|a| a.status == "ERROR").count(), 3);
    assert_eq!(audit.last().unwrap().status, "RECHAZADO");
}

#[tokio::test]
async fn test_stale_running_job_is_reclaimed() {
    let pool = test_pool().await;
    let tenant = TenantId::new();
    let document = create_document(&pool, tenant).await;

    let client = FakeClient::new(vec![Scripted::Accept("SELLO-RECLAIM")]);
    let job = service(&pool, client.clone())
        .transmit_async(tenant, document.id, &credentials())
        .await
        .unwrap();

    // Simulate a worker that claimed the job and died before recording an
    // outcome: the row sits in `running` with an old claim timestamp.
    sqlx::query(
        r#"
        UPDATE dte_transmission_jobs
        SET status = 'running', started_at = NOW() - INTERVAL '20 minutes',
            attempt_count = 1
        WHERE id = $1
        "#,
    )
    .bind(job.id)
    .execute(&pool)
    .await
    .unwrap();

    worker(&pool, client).tick().await;

    let document = DteDocument::find_by_id(&pool, *tenant.as_uuid(), document.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(document.status, DteStatus::Procesado.as_str());

    let jobs: Vec<DteTransmissionJob> =
        sqlx::query_as("SELECT * FROM dte_transmission_jobs WHERE id = $1")
            .bind(job.id)
            .fetch_all(&pool)
            .await
            .unwrap();
    assert_eq!(jobs[0].status, JobStatus::Completed.as_str());
    assert_eq!(jobs[0].attempt_count, 2, "the reclaim counts as a new attempt");
}

#[tokio::test]
async fn test_sync_transmit_applies_verdict_inline() {
    let pool = test_pool().await;
    let tenant = TenantId::new();
    let document = create_document(&pool, tenant).await;

    let client = FakeClient::new(vec![Scripted::Accept("SELLO-SYNC")]);

    let receipt = service(&pool, client)
        .transmit_sync(tenant, document.id, &credentials())
        .await
        .unwrap();
    assert_eq!(receipt.status, ReceiptStatus::Procesado);

    let document = DteDocument::find_by_id(&pool, *tenant.as_uuid(), document.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(document.status, DteStatus::Procesado.as_str());
    assert_eq!(document.reception_seal.as_deref(), Some("SELLO-SYNC"));
}

#[tokio::test]
async fn test_sync_transport_failure_keeps_document_pending() {
    let pool = test_pool().await;
    let tenant = TenantId::new();
    let document = create_document(&pool, tenant).await;

    let client = FakeClient::new(vec![Scripted::Fail("timeout")]);

    let result = service(&pool, client)
        .transmit_sync(tenant, document.id, &credentials())
        .await;
    assert!(matches!(result, Err(TransmissionError::Remote(_))));

    let document = DteDocument::find_by_id(&pool, *tenant.as_uuid(), document.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(document.status, DteStatus::Pendiente.as_str());
    assert_eq!(document.attempt_count, 1);

    let audit = DteAuditLog::list_for_document(&pool, *tenant.as_uuid(), document.id)
        .await
        .unwrap();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].status, "ERROR");
}

#[tokio::test]
async fn test_settled_document_cannot_be_retransmitted() {
    let pool = test_pool().await;
    let tenant = TenantId::new();
    let document = create_document(&pool, tenant).await;

    let client = FakeClient::new(vec![Scripted::Accept("SELLO-ONCE")]);
    let service = service(&pool, client);
    service
        .transmit_sync(tenant, document.id, &credentials())
        .await
        .unwrap();

    let again = service
        .transmit_async(tenant, document.id, &credentials())
        .await;
    assert!(matches!(again, Err(TransmissionError::AlreadyTransmitted)));
}

#[tokio::test]
async fn test_status_query_prefers_local_state() {
    let pool = test_pool().await;
    let tenant = TenantId::new();
    let document = create_document(&pool, tenant).await;

    let client = FakeClient::with_remote_status(
        vec![Scripted::Accept("SELLO-LOCAL")],
        RemoteStatus::Rechazado,
    );
    service(&pool, client.clone())
        .transmit_sync(tenant, document.id, &credentials())
        .await
        .unwrap();

    // The fake remote claims RECHAZADO; local PROCESADO state wins.
    let status = StatusService::new(pool.clone(), client);
    let report = status
        .query(tenant, document.generation_code, &credentials(), "00")
        .await
        .unwrap();

    assert_eq!(report.source, StatusSource::Local);
    assert_eq!(report.status, DteStatus::Procesado.as_str());
    assert_eq!(report.reception_seal.as_deref(), Some("SELLO-LOCAL"));
}

#[tokio::test]
async fn test_status_query_falls_back_to_remote() {
    let pool = test_pool().await;
    let tenant = TenantId::new();

    let client = FakeClient::with_remote_status(vec![], RemoteStatus::Procesado);
    let status = StatusService::new(pool.clone(), client);

    let report = status
        .query(tenant, Uuid::new_v4(), &credentials(), "00")
        .await
        .unwrap();
    assert_eq!(report.source, StatusSource::Remote);
    assert_eq!(report.status, DteStatus::Procesado.as_str());
}

#[tokio::test]
async fn test_status_query_unknown_everywhere_is_not_found() {
    let pool = test_pool().await;
    let tenant = TenantId::new();

    let client = FakeClient::with_remote_status(vec![], RemoteStatus::NoEncontrado);
    let status = StatusService::new(pool.clone(), client);

    let result = status.query(tenant, Uuid::new_v4(), &credentials(), "00").await;
    assert!(matches!(result, Err(TransmissionError::DocumentNotFound)));
}
