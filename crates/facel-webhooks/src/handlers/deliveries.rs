//! Delivery history and manual retry handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{Duration, Utc};
use facel_core::{DeliveryId, TenantId};
use facel_db::models::WebhookDelivery;
use uuid::Uuid;

use crate::error::{ApiResult, WebhookError};
use crate::models::{
    DeliveryDetailResponse, DeliveryListResponse, DeliveryResponse, ListDeliveriesQuery,
    StatsQuery, StatsResponse,
};
use crate::router::WebhooksState;

/// List deliveries, newest first, with optional status/endpoint filters.
#[utoipa::path(
    get,
    path = "/webhooks/deliveries",
    tag = "Webhooks",
    params(ListDeliveriesQuery),
    responses(
        (status = 200, description = "Paginated delivery list", body = DeliveryListResponse),
        (status = 400, description = "Unknown status filter"),
    )
)]
pub async fn list_deliveries_handler(
    State(state): State<WebhooksState>,
    Extension(tenant_id): Extension<TenantId>,
    Query(query): Query<ListDeliveriesQuery>,
) -> ApiResult<Json<DeliveryListResponse>> {
    if let Some(status) = query.status.as_deref() {
        status
            .parse::<facel_db::models::DeliveryStatus>()
            .map_err(WebhookError::Validation)?;
    }

    let limit = query.limit.clamp(1, 200);
    let offset = query.offset.max(0);
    let status = query.status.as_deref();

    let deliveries = WebhookDelivery::list_by_tenant(
        state.pool(),
        *tenant_id.as_uuid(),
        status,
        query.endpoint_id,
        limit,
        offset,
    )
    .await
    .map_err(WebhookError::Database)?;

    let total = WebhookDelivery::count_by_tenant(
        state.pool(),
        *tenant_id.as_uuid(),
        status,
        query.endpoint_id,
    )
    .await
    .map_err(WebhookError::Database)?;

    Ok(Json(DeliveryListResponse {
        items: deliveries.into_iter().map(delivery_to_response).collect(),
        total,
        limit,
        offset,
    }))
}

/// Get one delivery with full request and response detail.
#[utoipa::path(
    get,
    path = "/webhooks/deliveries/{id}",
    tag = "Webhooks",
    params(("id" = Uuid, Path, description = "Delivery ID")),
    responses(
        (status = 200, description = "Delivery details", body = DeliveryDetailResponse),
        (status = 404, description = "Delivery not found"),
    )
)]
pub async fn get_delivery_handler(
    State(state): State<WebhooksState>,
    Extension(tenant_id): Extension<TenantId>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DeliveryDetailResponse>> {
    let delivery = WebhookDelivery::find_by_id(state.pool(), *tenant_id.as_uuid(), id)
        .await
        .map_err(WebhookError::Database)?
        .ok_or(WebhookError::DeliveryNotFound)?;

    Ok(Json(delivery_to_detail_response(delivery)))
}

/// Requeue a failed or dead-lettered delivery.
#[utoipa::path(
    post,
    path = "/webhooks/deliveries/{id}/retry",
    tag = "Webhooks",
    params(("id" = Uuid, Path, description = "Delivery ID")),
    responses(
        (status = 202, description = "Delivery requeued", body = DeliveryResponse),
        (status = 404, description = "Delivery not found"),
        (status = 409, description = "Delivery not in a retryable state"),
    )
)]
pub async fn retry_delivery_handler(
    State(state): State<WebhooksState>,
    Extension(tenant_id): Extension<TenantId>,
    Path(id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<DeliveryResponse>)> {
    let delivery = state
        .delivery_service
        .retry_delivery(tenant_id, DeliveryId::from_uuid(id))
        .await?;

    Ok((StatusCode::ACCEPTED, Json(delivery_to_response(delivery))))
}

/// Delivery success statistics over a trailing window.
#[utoipa::path(
    get,
    path = "/webhooks/stats",
    tag = "Webhooks",
    params(StatsQuery),
    responses(
        (status = 200, description = "Delivery statistics", body = StatsResponse),
        (status = 400, description = "Invalid window"),
    )
)]
pub async fn delivery_stats_handler(
    State(state): State<WebhooksState>,
    Extension(tenant_id): Extension<TenantId>,
    Query(query): Query<StatsQuery>,
) -> ApiResult<Json<StatsResponse>> {
    if !(1..=90).contains(&query.window_days) {
        return Err(WebhookError::Validation(
            "window_days must be between 1 and 90".to_string(),
        ));
    }

    let since = Utc::now() - Duration::days(query.window_days);
    let stats = WebhookDelivery::stats_since(
        state.pool(),
        *tenant_id.as_uuid(),
        query.endpoint_id,
        since,
    )
    .await
    .map_err(WebhookError::Database)?;

    Ok(Json(StatsResponse {
        window_days: query.window_days,
        total: stats.total,
        delivered: stats.delivered,
        dead_letter: stats.dead_letter,
        success_rate: stats.success_rate(),
    }))
}

/// Delivery statistics for one endpoint over a trailing window.
#[utoipa::path(
    get,
    path = "/webhooks/endpoints/{id}/stats",
    tag = "Webhooks",
    params(("id" = Uuid, Path, description = "Endpoint ID"), StatsQuery),
    responses(
        (status = 200, description = "Delivery statistics", body = StatsResponse),
        (status = 404, description = "Endpoint not found"),
    )
)]
pub async fn endpoint_stats_handler(
    State(state): State<WebhooksState>,
    Extension(tenant_id): Extension<TenantId>,
    Path(id): Path<Uuid>,
    Query(query): Query<StatsQuery>,
) -> ApiResult<Json<StatsResponse>> {
    if !(1..=90).contains(&query.window_days) {
        return Err(WebhookError::Validation(
            "window_days must be between 1 and 90".to_string(),
        ));
    }

    facel_db::models::WebhookEndpoint::find_by_id(state.pool(), *tenant_id.as_uuid(), id)
        .await
        .map_err(WebhookError::Database)?
        .ok_or(WebhookError::EndpointNotFound)?;

    let since = Utc::now() - Duration::days(query.window_days);
    let stats =
        WebhookDelivery::stats_since(state.pool(), *tenant_id.as_uuid(), Some(id), since)
            .await
            .map_err(WebhookError::Database)?;

    Ok(Json(StatsResponse {
        window_days: query.window_days,
        total: stats.total,
        delivered: stats.delivered,
        dead_letter: stats.dead_letter,
        success_rate: stats.success_rate(),
    }))
}

fn delivery_to_response(d: WebhookDelivery) -> DeliveryResponse {
    DeliveryResponse {
        id: d.id,
        endpoint_id: d.endpoint_id,
        event_type: d.event_type,
        status: d.status,
        attempt_count: d.attempt_count,
        max_attempts: d.max_attempts,
        response_status: d.response_status,
        error_message: d.error_message,
        next_retry_at: d.next_retry_at,
        created_at: d.created_at,
        completed_at: d.completed_at,
    }
}

fn delivery_to_detail_response(d: WebhookDelivery) -> DeliveryDetailResponse {
    DeliveryDetailResponse {
        id: d.id,
        endpoint_id: d.endpoint_id,
        event_type: d.event_type,
        idempotency_key: d.idempotency_key,
        status: d.status,
        attempt_count: d.attempt_count,
        max_attempts: d.max_attempts,
        payload: d.payload,
        request_headers: d.request_headers,
        response_status: d.response_status,
        response_headers: d.response_headers,
        response_body: d.response_body,
        error_message: d.error_message,
        next_retry_at: d.next_retry_at,
        created_at: d.created_at,
        sent_at: d.sent_at,
        completed_at: d.completed_at,
    }
}
