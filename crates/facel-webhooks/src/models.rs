//! Wire-format payloads and management API DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Outbound wire format
// ---------------------------------------------------------------------------

/// JSON envelope delivered to webhook endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebhookPayload {
    /// Event type name, e.g. `dte.created`.
    pub event: String,
    pub timestamp: DateTime<Utc>,
    pub tenant_id: Uuid,
    pub data: serde_json::Value,
    pub correlation_id: Option<String>,
}

/// Standard outbound header names.
pub mod headers {
    pub const CONTENT_TYPE: &str = "Content-Type";
    pub const USER_AGENT: &str = "User-Agent";
    pub const EVENT: &str = "X-Webhook-Event";
    pub const DELIVERY: &str = "X-Webhook-Delivery";
    pub const SIGNATURE: &str = "X-Webhook-Signature-256";
    pub const TIMESTAMP: &str = "X-Webhook-Timestamp";
    /// Signature header expected on the inbound purchase receiver.
    pub const INBOUND_SIGNATURE: &str = "X-Signature-256";
}

/// User-Agent value sent with every delivery.
pub const USER_AGENT_VALUE: &str = "facel-webhooks/1.0";

// ---------------------------------------------------------------------------
// Endpoint management DTOs
// ---------------------------------------------------------------------------

/// Request to create a webhook endpoint.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateEndpointRequest {
    pub url: String,
    /// Event type names to subscribe the endpoint to.
    #[serde(default)]
    pub event_types: Vec<String>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: i32,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i32,
    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: i32,
}

fn default_true() -> bool {
    true
}
fn default_timeout_secs() -> i32 {
    30
}
fn default_max_attempts() -> i32 {
    5
}
fn default_base_delay_secs() -> i32 {
    60
}

/// Request to update a webhook endpoint. Omitted fields are unchanged.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateEndpointRequest {
    pub url: Option<String>,
    pub event_types: Option<Vec<String>>,
    pub active: Option<bool>,
    pub timeout_secs: Option<i32>,
    pub max_attempts: Option<i32>,
    pub base_delay_secs: Option<i32>,
}

/// Endpoint representation; never carries the secret.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EndpointResponse {
    pub id: Uuid,
    pub url: String,
    pub active: bool,
    pub timeout_secs: i32,
    pub max_attempts: i32,
    pub base_delay_secs: i32,
    pub event_types: Vec<String>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Response for endpoint creation; the secret is returned exactly once.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EndpointCreatedResponse {
    #[serde(flatten)]
    pub endpoint: EndpointResponse,
    pub secret: String,
}

/// Response for secret rotation; the new secret is returned exactly once.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RotateSecretResponse {
    pub secret: String,
}

/// Request to replace an endpoint's subscription set.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ReplaceSubscriptionsRequest {
    pub event_types: Vec<String>,
}

/// Paginated endpoint listing.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EndpointListResponse {
    pub items: Vec<EndpointResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Pagination query for endpoint listing.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct ListEndpointsQuery {
    #[serde(default)]
    pub active_only: bool,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

/// Event type catalog entry.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EventTypeResponse {
    pub name: String,
    pub description: Option<String>,
}

// ---------------------------------------------------------------------------
// Delivery DTOs
// ---------------------------------------------------------------------------

/// Filterable query for delivery listing.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct ListDeliveriesQuery {
    pub status: Option<String>,
    pub endpoint_id: Option<Uuid>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

/// Delivery summary row.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeliveryResponse {
    pub id: Uuid,
    pub endpoint_id: Uuid,
    pub event_type: String,
    pub status: String,
    pub attempt_count: i32,
    pub max_attempts: i32,
    pub response_status: Option<i32>,
    pub error_message: Option<String>,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Full delivery snapshot including request and response payloads.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeliveryDetailResponse {
    pub id: Uuid,
    pub endpoint_id: Uuid,
    pub event_type: String,
    pub idempotency_key: String,
    pub status: String,
    pub attempt_count: i32,
    pub max_attempts: i32,
    pub payload: serde_json::Value,
    pub request_headers: serde_json::Value,
    pub response_status: Option<i32>,
    pub response_headers: Option<serde_json::Value>,
    pub response_body: Option<String>,
    pub error_message: Option<String>,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Paginated delivery listing.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeliveryListResponse {
    pub items: Vec<DeliveryResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Success-rate statistics over a trailing window.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StatsResponse {
    pub window_days: i64,
    pub total: i64,
    pub delivered: i64,
    pub dead_letter: i64,
    /// Delivered share of all deliveries in the window; absent when empty.
    pub success_rate: Option<f64>,
}

/// Query for statistics windows.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct StatsQuery {
    #[serde(default = "default_window_days")]
    pub window_days: i64,
    pub endpoint_id: Option<Uuid>,
}

fn default_window_days() -> i64 {
    7
}

/// Response for a synthetic ping delivery.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PingResponse {
    pub delivery_id: Uuid,
}

// ---------------------------------------------------------------------------
// Inbound third-party webhook
// ---------------------------------------------------------------------------

/// Payload accepted on the HMAC-secured inbound receiver.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InboundPurchase {
    pub purchase_id: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Acknowledgement returned for an accepted inbound payload.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InboundAccepted {
    pub accepted: bool,
    pub correlation_id: String,
}
