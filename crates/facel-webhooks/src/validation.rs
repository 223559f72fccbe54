//! Endpoint URL validation.

use url::Url;

use crate::error::WebhookError;

/// Validate a webhook destination URL.
///
/// Requires an absolute http(s) URL with a host; plain `http` and loopback
/// hosts are rejected unless `allow_http` is set (development mode).
pub fn validate_endpoint_url(raw: &str, allow_http: bool) -> Result<(), WebhookError> {
    let url = Url::parse(raw).map_err(|e| WebhookError::InvalidUrl(e.to_string()))?;

    match url.scheme() {
        "https" => {}
        "http" if allow_http => {}
        "http" => {
            return Err(WebhookError::InvalidUrl(
                "http URLs are not allowed".to_string(),
            ))
        }
        other => {
            return Err(WebhookError::InvalidUrl(format!(
                "unsupported scheme: {other}"
            )))
        }
    }

    let host = url
        .host_str()
        .ok_or_else(|| WebhookError::InvalidUrl("missing host".to_string()))?;

    if !allow_http && is_loopback_host(host) {
        return Err(WebhookError::InvalidUrl(format!(
            "loopback host not allowed: {host}"
        )));
    }

    Ok(())
}

fn is_loopback_host(host: &str) -> bool {
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }
    host.parse::<std::net::IpAddr>()
        .map(|ip| ip.is_loopback())
        .unwrap_or(false)
}
