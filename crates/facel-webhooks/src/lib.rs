//! Webhook delivery engine for tenant-configured event notifications.
//!
//! Provides the outbox-style event trigger, the polling delivery dispatcher
//! with HMAC-SHA256 signing, exponential backoff and dead-lettering, and
//! the tenant-facing management API.

pub mod crypto;
pub mod error;
pub mod handlers;
pub mod idempotency;
pub mod models;
pub mod retry;
pub mod router;
pub mod sender;
pub mod services;
pub mod validation;
pub mod worker;

pub use error::WebhookError;
pub use models::WebhookPayload;
pub use retry::RetryPolicy;
pub use router::{webhooks_router, WebhooksState};
pub use sender::{DeliverySender, SendOutcome};
pub use services::delivery::DeliveryService;
pub use services::endpoints::EndpointService;
pub use services::trigger::TriggerService;
pub use worker::{DeliveryWorker, WorkerConfig};
