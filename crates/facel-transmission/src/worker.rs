//! Transmission queue worker.
//!
//! Polls `dte_transmission_jobs` for due work and drives each claimed job
//! through one attempt. Claims use `FOR UPDATE SKIP LOCKED`; the tick guard
//! keeps one instance from stacking ticks when the reception service is
//! slow.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use facel_db::models::{DteDocument, DteStatus, DteTransmissionJob};
use facel_webhooks::retry::{random_jitter_ms, RetryPolicy};
use sqlx::PgPool;
use tokio::time::interval;
use tracing::{debug, error, info, instrument, warn};

use crate::error::TransmissionError;
use crate::service::{request_for, TransmissionService};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct TransmissionWorkerConfig {
    /// How often to poll for due jobs.
    pub poll_interval: Duration,

    /// Maximum jobs claimed per tick.
    pub batch_size: i64,

    /// Base delay for the retry schedule, in seconds.
    pub base_delay_secs: i64,
}

impl Default for TransmissionWorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            batch_size: 20,
            base_delay_secs: 1,
        }
    }
}

/// Polls for due transmission jobs and executes them.
pub struct TransmissionWorker {
    pool: PgPool,
    service: TransmissionService,
    config: TransmissionWorkerConfig,
    shutdown: Arc<AtomicBool>,
    tick_in_flight: Arc<AtomicBool>,
}

impl TransmissionWorker {
    pub fn new(
        pool: PgPool,
        service: TransmissionService,
        config: TransmissionWorkerConfig,
    ) -> Self {
        Self {
            pool,
            service,
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
            tick_in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Run the poll loop until shutdown is requested.
    #[instrument(skip(self))]
    pub async fn run(&self) {
        info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            batch_size = self.config.batch_size,
            "Starting transmission worker"
        );

        let mut poll = interval(self.config.poll_interval);

        loop {
            poll.tick().await;

            if self.shutdown.load(Ordering::Relaxed) {
                info!("Worker shutdown requested, stopping poll loop");
                break;
            }

            if self
                .tick_in_flight
                .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_err()
            {
                debug!("Previous tick still in flight, skipping");
                continue;
            }

            self.tick().await;
            self.tick_in_flight.store(false, Ordering::Release);
        }

        info!("Worker stopped");
    }

    /// Request graceful shutdown.
    pub fn shutdown(&self) {
        info!("Shutdown requested");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Claim and execute one batch of due jobs.
    ///
    /// Public so operational tooling and tests can single-step the worker.
    pub async fn tick(&self) {
        let jobs = match DteTransmissionJob::claim_due(&self.pool, self.config.batch_size).await {
            Ok(jobs) => jobs,
            Err(e) => {
                error!(
                    target: "dte_transmission",
                    error = %e,
                    "Failed to claim due transmission jobs"
                );
                return;
            }
        };

        if jobs.is_empty() {
            return;
        }

        debug!(
            target: "dte_transmission",
            count = jobs.len(),
            "Claimed due transmission jobs"
        );

        for job in jobs {
            if let Err(e) = self.process_job(&job).await {
                error!(
                    target: "dte_transmission",
                    job_id = %job.id,
                    error = %e,
                    "Transmission job processing failed"
                );
            }
        }
    }

    async fn process_job(&self, job: &DteTransmissionJob) -> Result<(), TransmissionError> {
        let document =
            DteDocument::find_by_id(&self.pool, job.tenant_id, job.document_id).await?;

        let Some(document) = document else {
            DteTransmissionJob::mark_failed(&self.pool, job.id, "document no longer exists")
                .await?;
            return Ok(());
        };

        // Another path (sync submission, concurrent job) already settled the
        // document; the job has nothing left to do.
        if document.status != DteStatus::Pendiente.as_str() {
            DteTransmissionJob::mark_completed(&self.pool, job.id).await?;
            return Ok(());
        }

        let credentials = match self.service.job_credentials(job) {
            Ok(credentials) => credentials,
            Err(e) => return self.handle_attempt_failure(job, &document, &e).await,
        };

        DteDocument::increment_attempts(&self.pool, job.tenant_id, document.id).await?;

        match self
            .service
            .client()
            .transmit(&request_for(&document, credentials))
            .await
        {
            Ok(receipt) => {
                self.service.apply_receipt(&document, &receipt).await?;
                DteTransmissionJob::mark_completed(&self.pool, job.id).await?;
                Ok(())
            }
            Err(e) => self.handle_attempt_failure(job, &document, &e).await,
        }
    }

    async fn handle_attempt_failure(
        &self,
        job: &DteTransmissionJob,
        document: &DteDocument,
        error: &TransmissionError,
    ) -> Result<(), TransmissionError> {
        let message = error.to_string();
        self.service
            .record_attempt_failure(document, &message)
            .await?;

        let policy = RetryPolicy::new(self.config.base_delay_secs, job.max_attempts);

        if policy.is_exhausted(job.attempt_count) {
            self.service.finalize_exhausted(document, &message).await?;
            DteTransmissionJob::mark_failed(&self.pool, job.id, &message).await?;
            return Ok(());
        }

        let next_attempt_at =
            policy.next_retry_at(job.attempt_count, chrono::Utc::now(), random_jitter_ms());
        DteTransmissionJob::reschedule(&self.pool, job.id, next_attempt_at, &message).await?;

        warn!(
            target: "dte_transmission",
            job_id = %job.id,
            document_id = %document.id,
            attempt = job.attempt_count,
            max_attempts = job.max_attempts,
            next_attempt_at = %next_attempt_at,
            error = %message,
            "Transmission attempt failed, retry scheduled"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_config_default() {
        let config = TransmissionWorkerConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.batch_size, 20);
        assert_eq!(config.base_delay_secs, 1);
    }
}
