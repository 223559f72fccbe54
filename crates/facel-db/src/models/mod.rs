//! Database entity models.
//!
//! Each model is a `FromRow` struct with associated query functions taking
//! `&PgPool`. Tenant-scoped queries always bind the tenant id.

pub mod dte_audit_log;
pub mod dte_document;
pub mod dte_transmission_job;
pub mod webhook_delivery;
pub mod webhook_endpoint;
pub mod webhook_event_type;
pub mod webhook_subscription;

pub use dte_audit_log::DteAuditLog;
pub use dte_document::{CreateDteDocument, DteDocument, DteStatus};
pub use dte_transmission_job::{DteTransmissionJob, JobStatus};
pub use webhook_delivery::{
    CreateWebhookDelivery, DeliveryStats, DeliveryStatus, WebhookDelivery,
};
pub use webhook_endpoint::{CreateWebhookEndpoint, UpdateWebhookEndpoint, WebhookEndpoint};
pub use webhook_event_type::WebhookEventType;
pub use webhook_subscription::WebhookSubscription;
