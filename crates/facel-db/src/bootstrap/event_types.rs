//! Event type catalog seeding.
//!
//! The catalog is immutable reference data; seeding is an upsert by name
//! and safe to run on every startup.

use crate::error::DbError;
use crate::models::WebhookEventType;
use sqlx::PgPool;

/// The built-in event catalog.
pub const EVENT_CATALOG: &[(&str, &str)] = &[
    ("dte.created", "A tax document was generated"),
    ("dte.processed", "A tax document was accepted by the tax authority"),
    ("dte.rejected", "A tax document was rejected by the tax authority"),
    ("dte.invalidated", "A processed tax document was invalidated"),
    ("purchase.received", "An inbound purchase notification was received"),
    ("test.ping", "Synthetic delivery for endpoint verification"),
];

/// Seed the event type catalog idempotently.
pub async fn seed_event_types(pool: &PgPool) -> Result<(), DbError> {
    for (name, description) in EVENT_CATALOG {
        WebhookEventType::upsert(pool, name, description).await?;
    }

    tracing::info!(count = EVENT_CATALOG.len(), "Event type catalog seeded");
    Ok(())
}
