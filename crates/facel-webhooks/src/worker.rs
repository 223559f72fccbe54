//! Delivery dispatcher.
//!
//! Background worker that polls the delivery table for due work, claims a
//! batch and executes the sends in parallel. Claims use `FOR UPDATE SKIP
//! LOCKED`, so multiple dispatcher instances never double-send a row; the
//! process-local tick guard only prevents one instance from stacking ticks
//! when a batch outlives the poll interval.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use facel_db::models::WebhookDelivery;
use sqlx::PgPool;
use tokio::sync::Semaphore;
use tokio::time::interval;
use tracing::{debug, error, info, instrument};

use crate::services::DeliveryService;

/// Dispatcher configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// How often to poll for due deliveries.
    pub poll_interval: Duration,

    /// Maximum deliveries claimed per tick.
    pub batch_size: i64,

    /// Number of concurrent sends.
    pub concurrency: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            batch_size: 50,
            concurrency: 8,
        }
    }
}

/// Polls for due deliveries and executes them.
pub struct DeliveryWorker {
    pool: PgPool,
    service: Arc<DeliveryService>,
    config: WorkerConfig,
    shutdown: Arc<AtomicBool>,
    tick_in_flight: Arc<AtomicBool>,
}

impl DeliveryWorker {
    pub fn new(pool: PgPool, service: DeliveryService, config: WorkerConfig) -> Self {
        Self {
            pool,
            service: Arc::new(service),
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
            concurrency = self.config.concurrency,
            "Starting webhook delivery worker"
        );

        let mut poll = interval(self.config.poll_interval);

        loop {
            poll.tick().await;

            if self.shutdown.load(Ordering::Relaxed) {
                info!("Worker shutdown requested, stopping poll loop");
                break;
            }

            // Single-flight: skip this tick if the previous one is still
            // draining its batch.
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

    /// Claim and execute one batch of due deliveries.
    ///
    /// Public so operational tooling and tests can single-step the
    /// dispatcher without the poll loop.
    pub async fn tick(&self) {
        let deliveries = match WebhookDelivery::claim_due(&self.pool, self.config.batch_size).await
        {
            Ok(deliveries) => deliveries,
            Err(e) => {
                error!(
                    target: "webhook_delivery",
                    error = %e,
                    "Failed to claim due deliveries"
                );
                return;
            }
        };

        if deliveries.is_empty() {
            return;
        }

        debug!(
            target: "webhook_delivery",
            count = deliveries.len(),
            "Claimed due deliveries"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut tasks = tokio::task::JoinSet::new();

        for delivery in deliveries {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let service = self.service.clone();

            tasks.spawn(async move {
                let _permit = permit;
                if let Err(e) = service.process(&delivery).await {
                    error!(
                        target: "webhook_delivery",
                        delivery_id = %delivery.id,
                        error = %e,
                        "Delivery processing failed"
                    );
                }
            });
        }

        // Drain the batch before releasing the tick guard.
        while tasks.join_next().await.is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_config_default() {
        let config = WorkerConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.concurrency, 8);
    }
}
