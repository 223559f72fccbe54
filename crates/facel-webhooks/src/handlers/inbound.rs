//! Inbound webhook receiver for third-party purchase notifications.
//!
//! Verifies the HMAC signature over the raw request bytes before parsing,
//! then re-emits the notification as a `purchase.received` event through
//! the regular trigger path.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Extension, Json,
};
use facel_core::TenantId;

use crate::crypto;
use crate::error::{ApiResult, WebhookError};
use crate::models::{headers, InboundAccepted, InboundPurchase};
use crate::router::WebhooksState;

/// Event type re-emitted for accepted inbound purchases.
pub const PURCHASE_EVENT: &str = "purchase.received";

/// Accept a signed purchase notification from the procurement provider.
#[utoipa::path(
    post,
    path = "/inbound/purchases",
    tag = "Webhooks",
    request_body = InboundPurchase,
    responses(
        (status = 202, description = "Notification accepted", body = InboundAccepted),
        (status = 401, description = "Missing or invalid signature"),
        (status = 400, description = "Malformed payload"),
    )
)]
pub async fn inbound_purchase_handler(
    State(state): State<WebhooksState>,
    Extension(tenant_id): Extension<TenantId>,
    header_map: HeaderMap,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<InboundAccepted>)> {
    let secret = state
        .inbound_secret
        .as_deref()
        .ok_or_else(|| WebhookError::Internal("inbound secret not configured".to_string()))?;

    let signature = header_map
        .get(headers::INBOUND_SIGNATURE)
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::InvalidSignature)?;

    if !crypto::verify_signature(signature, secret, &body) {
        tracing::warn!(
            target: "webhook_delivery",
            tenant_id = %tenant_id,
            "Inbound purchase rejected: signature mismatch"
        );
        return Err(WebhookError::InvalidSignature);
    }

    let purchase: InboundPurchase = serde_json::from_slice(&body)
        .map_err(|e| WebhookError::Validation(format!("malformed payload: {e}")))?;

    if purchase.purchase_id.is_empty() {
        return Err(WebhookError::Validation(
            "purchase_id must not be empty".to_string(),
        ));
    }

    state
        .trigger_service
        .trigger_event(
            tenant_id,
            PURCHASE_EVENT,
            purchase.data.clone(),
            Some(&purchase.purchase_id),
        )
        .await;

    Ok((
        StatusCode::ACCEPTED,
        Json(InboundAccepted {
            accepted: true,
            correlation_id: purchase.purchase_id,
        }),
    ))
}
