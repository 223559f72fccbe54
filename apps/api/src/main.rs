//! FACEL delivery API
//!
//! Management API for tenant webhook endpoints, the inbound purchase
//! receiver, and the DTE transmission queue, plus the background workers
//! that drive both delivery pipelines.

mod config;
mod health;
mod logging;
mod middleware;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use config::Config;
use facel_transmission::{
    transmission_router, ApiCredentials, HttpTransmitClient, TransmissionService,
    TransmissionState, TransmissionWorker, TransmissionWorkerConfig, TransmitClient,
};
use facel_webhooks::{
    webhooks_router, DeliveryService, DeliveryWorker, WebhooksState, WorkerConfig,
};
use health::{livez_handler, readyz_handler, HealthState};
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::info;

#[tokio::main]
async fn main() {
    // Load configuration (fail-fast on missing required values)
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    logging::init_logging(&config.rust_log);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.host,
        port = config.port,
        env = %config.app_env,
        "Starting facel API"
    );

    match config.validate_security_config() {
        Ok(warnings) => {
            for warning in &warnings {
                tracing::warn!(target: "security", "{}", warning);
            }
            if !warnings.is_empty() {
                tracing::warn!(
                    target: "security",
                    count = warnings.len(),
                    "Insecure default values detected (allowed in {} mode)",
                    config.app_env
                );
            }
        }
        Err(errors) => {
            for error in &errors {
                tracing::error!(target: "security", "{}", error);
            }
            eprintln!(
                "FATAL: {} insecure default(s) detected in production mode. \
                 Set proper values or use APP_ENV=development.",
                errors.len()
            );
            std::process::exit(1);
        }
    }

    // Create database connection pool
    let pool = match PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.database_url)
        .await
    {
        Ok(pool) => {
            info!("Database connection established");
            pool
        }
        Err(e) => {
            eprintln!("Failed to connect to database: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = facel_db::run_migrations(&pool).await {
        eprintln!("Failed to run database migrations: {e}");
        std::process::exit(1);
    }

    // Idempotent seed of the event type catalog
    if let Err(e) = facel_db::bootstrap::seed_event_types(&pool).await {
        eprintln!("Failed to seed event types: {e}");
        std::process::exit(1);
    }

    let webhooks_state = match WebhooksState::new(
        pool.clone(),
        config.webhook_encryption_key.to_vec(),
        config.allow_http_endpoints,
        config.inbound_webhook_secret.clone(),
    ) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("Failed to create webhooks state: {e}");
            std::process::exit(1);
        }
    };

    let transmit_client: Arc<dyn TransmitClient> = match HttpTransmitClient::new(
        config.reception_api_url.clone(),
        config.reception_timeout(),
    ) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            tracing::error!("Failed to create reception API client: {e}");
            std::process::exit(1);
        }
    };

    let reception_credentials = ApiCredentials::new(config.reception_api_token.clone());

    let transmission_state = TransmissionState::new(
        pool.clone(),
        transmit_client.clone(),
        config.webhook_encryption_key.to_vec(),
        reception_credentials,
    );

    // Start the webhook delivery dispatcher
    let delivery_worker = {
        let service = match DeliveryService::new(
            pool.clone(),
            config.webhook_encryption_key.to_vec(),
        ) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("Failed to create delivery service: {e}");
                std::process::exit(1);
            }
        };
        let worker = Arc::new(DeliveryWorker::new(
            pool.clone(),
            service,
            WorkerConfig {
                poll_interval: Duration::from_secs(config.webhook_worker.poll_interval_secs),
                batch_size: config.webhook_worker.batch_size,
                concurrency: config.webhook_worker.concurrency,
            },
        ));
        let runner = worker.clone();
        tokio::spawn(async move {
            runner.run().await;
        });
        info!("Webhook delivery worker started");
        worker
    };

    // Start the DTE transmission worker
    let transmission_worker = {
        let service = TransmissionService::new(
            pool.clone(),
            transmit_client.clone(),
            config.webhook_encryption_key.to_vec(),
        );
        let worker = Arc::new(TransmissionWorker::new(
            pool.clone(),
            service,
            TransmissionWorkerConfig {
                poll_interval: Duration::from_secs(
                    config.transmission_worker.poll_interval_secs,
                ),
                batch_size: config.transmission_worker.batch_size,
                base_delay_secs: config.transmission_worker.base_delay_secs,
            },
        ));
        let runner = worker.clone();
        tokio::spawn(async move {
            runner.run().await;
        });
        info!("DTE transmission worker started");
        worker
    };

    let shutting_down = Arc::new(AtomicBool::new(false));

    let health_routes = Router::new()
        .route("/livez", get(livez_handler))
        .route("/readyz", get(readyz_handler))
        .with_state(HealthState {
            pool: pool.clone(),
            shutting_down: shutting_down.clone(),
        });

    // Tenant-scoped API routes; the gateway authenticates upstream and
    // forwards the tenant in X-Tenant-ID.
    let api_routes = Router::new()
        .merge(webhooks_router(webhooks_state))
        .merge(transmission_router(transmission_state))
        .layer(axum::middleware::from_fn(
            middleware::tenant_extension_middleware,
        ));

    let app = Router::new()
        .merge(health_routes)
        .merge(api_routes)
        .layer(TraceLayer::new_for_http());

    // Bind and serve
    let addr = config.bind_addr();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind to address {addr}: {e}");
            std::process::exit(1);
        }
    };

    info!(%addr, "Server listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutting_down))
        .await
    {
        tracing::error!("Server error: {e}");
        std::process::exit(1);
    }

    // Stop the poll loops; in-flight ticks finish their claimed rows.
    delivery_worker.shutdown();
    transmission_worker.shutdown();
    info!("Server shutdown complete");
}

/// Graceful shutdown signal handler.
///
/// Sets the `shutting_down` flag before returning so the readiness probe
/// returns 503 to drain traffic before Axum stops accepting connections.
async fn shutdown_signal(shutting_down: Arc<AtomicBool>) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {e}");
                // Fall through - we still want to wait for terminate signal
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }

    shutting_down.store(true, Ordering::Release);
    info!("Readiness probe set to unhealthy, draining traffic");
}
