//! Endpoint management handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use facel_core::{EndpointId, TenantId};
use facel_db::models::WebhookEventType;
use uuid::Uuid;

use crate::error::{ApiResult, WebhookError};
use crate::models::{
    CreateEndpointRequest, EndpointCreatedResponse, EndpointListResponse, EndpointResponse,
    EventTypeResponse, ListEndpointsQuery, PingResponse, ReplaceSubscriptionsRequest,
    RotateSecretResponse, UpdateEndpointRequest,
};
use crate::router::WebhooksState;
use crate::services::endpoints::EndpointWithSubscriptions;

/// Create a webhook endpoint.
#[utoipa::path(
    post,
    path = "/webhooks/endpoints",
    tag = "Webhooks",
    request_body = CreateEndpointRequest,
    responses(
        (status = 201, description = "Endpoint created; secret returned once", body = EndpointCreatedResponse),
        (status = 400, description = "Invalid URL, settings or event type"),
    )
)]
pub async fn create_endpoint_handler(
    State(state): State<WebhooksState>,
    Extension(tenant_id): Extension<TenantId>,
    Json(request): Json<CreateEndpointRequest>,
) -> ApiResult<(StatusCode, Json<EndpointCreatedResponse>)> {
    let (created, secret) = state
        .endpoint_service
        .create_endpoint(tenant_id, request)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(EndpointCreatedResponse {
            endpoint: endpoint_to_response(created),
            secret,
        }),
    ))
}

/// List the tenant's webhook endpoints.
#[utoipa::path(
    get,
    path = "/webhooks/endpoints",
    tag = "Webhooks",
    params(ListEndpointsQuery),
    responses(
        (status = 200, description = "Paginated endpoint list", body = EndpointListResponse),
    )
)]
pub async fn list_endpoints_handler(
    State(state): State<WebhooksState>,
    Extension(tenant_id): Extension<TenantId>,
    Query(query): Query<ListEndpointsQuery>,
) -> ApiResult<Json<EndpointListResponse>> {
    let limit = query.limit.clamp(1, 200);
    let offset = query.offset.max(0);

    let (items, total) = state
        .endpoint_service
        .list_endpoints(tenant_id, query.active_only, limit, offset)
        .await?;

    Ok(Json(EndpointListResponse {
        items: items.into_iter().map(endpoint_to_response).collect(),
        total,
        limit,
        offset,
    }))
}

/// Get one webhook endpoint.
#[utoipa::path(
    get,
    path = "/webhooks/endpoints/{id}",
    tag = "Webhooks",
    params(("id" = Uuid, Path, description = "Endpoint ID")),
    responses(
        (status = 200, description = "Endpoint details", body = EndpointResponse),
        (status = 404, description = "Endpoint not found"),
    )
)]
pub async fn get_endpoint_handler(
    State(state): State<WebhooksState>,
    Extension(tenant_id): Extension<TenantId>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<EndpointResponse>> {
    let found = state
        .endpoint_service
        .get_endpoint(tenant_id, EndpointId::from_uuid(id))
        .await?;

    Ok(Json(endpoint_to_response(found)))
}

/// Update a webhook endpoint.
#[utoipa::path(
    patch,
    path = "/webhooks/endpoints/{id}",
    tag = "Webhooks",
    params(("id" = Uuid, Path, description = "Endpoint ID")),
    request_body = UpdateEndpointRequest,
    responses(
        (status = 200, description = "Updated endpoint", body = EndpointResponse),
        (status = 400, description = "Invalid URL, settings or event type"),
        (status = 404, description = "Endpoint not found"),
    )
)]
pub async fn update_endpoint_handler(
    State(state): State<WebhooksState>,
    Extension(tenant_id): Extension<TenantId>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateEndpointRequest>,
) -> ApiResult<Json<EndpointResponse>> {
    let updated = state
        .endpoint_service
        .update_endpoint(tenant_id, EndpointId::from_uuid(id), request)
        .await?;

    Ok(Json(endpoint_to_response(updated)))
}

/// Delete a webhook endpoint and its delivery history.
#[utoipa::path(
    delete,
    path = "/webhooks/endpoints/{id}",
    tag = "Webhooks",
    params(("id" = Uuid, Path, description = "Endpoint ID")),
    responses(
        (status = 204, description = "Endpoint deleted"),
        (status = 404, description = "Endpoint not found"),
    )
)]
pub async fn delete_endpoint_handler(
    State(state): State<WebhooksState>,
    Extension(tenant_id): Extension<TenantId>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .endpoint_service
        .delete_endpoint(tenant_id, EndpointId::from_uuid(id))
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Replace the endpoint's subscription set.
#[utoipa::path(
    put,
    path = "/webhooks/endpoints/{id}/subscriptions",
    tag = "Webhooks",
    params(("id" = Uuid, Path, description = "Endpoint ID")),
    request_body = ReplaceSubscriptionsRequest,
    responses(
        (status = 200, description = "Updated endpoint", body = EndpointResponse),
        (status = 400, description = "Unknown event type"),
        (status = 404, description = "Endpoint not found"),
    )
)]
pub async fn replace_subscriptions_handler(
    State(state): State<WebhooksState>,
    Extension(tenant_id): Extension<TenantId>,
    Path(id): Path<Uuid>,
    Json(request): Json<ReplaceSubscriptionsRequest>,
) -> ApiResult<Json<EndpointResponse>> {
    let updated = state
        .endpoint_service
        .replace_subscriptions(tenant_id, EndpointId::from_uuid(id), request.event_types)
        .await?;

    Ok(Json(endpoint_to_response(updated)))
}

/// Rotate the endpoint's signing secret.
#[utoipa::path(
    post,
    path = "/webhooks/endpoints/{id}/rotate-secret",
    tag = "Webhooks",
    params(("id" = Uuid, Path, description = "Endpoint ID")),
    responses(
        (status = 200, description = "New secret, returned once", body = RotateSecretResponse),
        (status = 404, description = "Endpoint not found"),
    )
)]
pub async fn rotate_secret_handler(
    State(state): State<WebhooksState>,
    Extension(tenant_id): Extension<TenantId>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<RotateSecretResponse>> {
    let secret = state
        .endpoint_service
        .rotate_secret(tenant_id, EndpointId::from_uuid(id))
        .await?;

    Ok(Json(RotateSecretResponse { secret }))
}

/// Enqueue a synthetic `test.ping` delivery to verify an endpoint.
#[utoipa::path(
    post,
    path = "/webhooks/endpoints/{id}/ping",
    tag = "Webhooks",
    params(("id" = Uuid, Path, description = "Endpoint ID")),
    responses(
        (status = 202, description = "Ping delivery enqueued", body = PingResponse),
        (status = 404, description = "Endpoint not found"),
    )
)]
pub async fn ping_endpoint_handler(
    State(state): State<WebhooksState>,
    Extension(tenant_id): Extension<TenantId>,
    Path(id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<PingResponse>)> {
    let delivery_id = state
        .trigger_service
        .trigger_ping(tenant_id, EndpointId::from_uuid(id))
        .await?;

    Ok((StatusCode::ACCEPTED, Json(PingResponse { delivery_id })))
}

/// List the event type catalog.
#[utoipa::path(
    get,
    path = "/webhooks/event-types",
    tag = "Webhooks",
    responses(
        (status = 200, description = "Event type catalog", body = [EventTypeResponse]),
    )
)]
pub async fn list_event_types_handler(
    State(state): State<WebhooksState>,
) -> ApiResult<Json<Vec<EventTypeResponse>>> {
    let event_types = WebhookEventType::list_all(state.pool())
        .await
        .map_err(WebhookError::Database)?;

    Ok(Json(
        event_types
            .into_iter()
            .map(|t| EventTypeResponse {
                name: t.name,
                description: t.description,
            })
            .collect(),
    ))
}

fn endpoint_to_response(item: EndpointWithSubscriptions) -> EndpointResponse {
    let e = item.endpoint;
    EndpointResponse {
        id: e.id,
        url: e.url,
        active: e.active,
        timeout_secs: e.timeout_secs,
        max_attempts: e.max_attempts,
        base_delay_secs: e.base_delay_secs,
        event_types: item.event_types,
        last_used_at: e.last_used_at,
        created_at: e.created_at,
        updated_at: e.updated_at,
    }
}
