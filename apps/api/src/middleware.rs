//! Request middleware.
//!
//! Authentication happens upstream of this service; the gateway forwards the
//! resolved tenant in the `X-Tenant-ID` header. This middleware turns that
//! header into a typed request extension the handlers extract.

use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use facel_core::TenantId;
use serde_json::json;
use std::str::FromStr;

/// Header carrying the tenant resolved by the upstream gateway.
pub const TENANT_HEADER: &str = "X-Tenant-ID";

/// Inject `Extension<TenantId>` from the `X-Tenant-ID` header.
///
/// Requests without a valid tenant header are rejected with 400.
pub async fn tenant_extension_middleware(mut request: Request, next: Next) -> Response {
    let tenant_id = request
        .headers()
        .get(TENANT_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| TenantId::from_str(v).ok());

    match tenant_id {
        Some(tenant_id) => {
            request.extensions_mut().insert(tenant_id);
            next.run(request).await
        }
        None => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "invalid_tenant",
                "message": format!("Missing or invalid {TENANT_HEADER} header"),
            })),
        )
            .into_response(),
    }
}
