//! Liveness and readiness probes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use sqlx::PgPool;

/// Timeout for the readiness database ping.
const DB_PING_TIMEOUT: Duration = Duration::from_secs(2);

/// Shared state for the probe handlers.
#[derive(Clone)]
pub struct HealthState {
    pub pool: PgPool,
    /// Set during graceful shutdown so the readiness probe drains traffic.
    pub shutting_down: Arc<AtomicBool>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<&'static str>,
}

/// Liveness probe: returns 200 as long as the process is responsive.
pub async fn livez_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        database: None,
    })
}

/// Readiness probe: verifies the database pool and the shutdown flag.
///
/// Returns 503 when shutting down or when the database ping fails, so the
/// load balancer stops routing traffic to this instance.
pub async fn readyz_handler(
    State(state): State<HealthState>,
) -> (StatusCode, Json<HealthResponse>) {
    if state.shutting_down.load(Ordering::Acquire) {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "shutting_down",
                database: None,
            }),
        );
    }

    let ping = tokio::time::timeout(
        DB_PING_TIMEOUT,
        sqlx::query("SELECT 1").execute(&state.pool),
    )
    .await;

    match ping {
        Ok(Ok(_)) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                database: Some("ok"),
            }),
        ),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Readiness probe: database ping failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "degraded",
                    database: Some("unreachable"),
                }),
            )
        }
        Err(_) => {
            tracing::warn!("Readiness probe: database ping timed out");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "degraded",
                    database: Some("timeout"),
                }),
            )
        }
    }
}
