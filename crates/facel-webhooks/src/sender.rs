//! HTTP execution of webhook deliveries.
//!
//! The sender performs one signed POST and classifies the result. It knows
//! nothing about the database; the dispatcher maps [`SendOutcome`] onto the
//! delivery state machine.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Utc;
use reqwest::redirect;

use crate::crypto::{sign_payload, SIGNATURE_PREFIX};
use crate::error::WebhookError;
use crate::models::{headers, USER_AGENT_VALUE};

/// Stored response bodies are truncated to this many bytes.
const MAX_STORED_BODY_BYTES: usize = 2000;

/// Response headers never persisted to the delivery record.
const REDACTED_HEADERS: &[&str] = &["set-cookie", "authorization", "proxy-authenticate"];

/// One outbound request, fully resolved (secret already decrypted).
#[derive(Debug, Clone)]
pub struct SendRequest {
    pub url: String,
    pub secret: String,
    pub event_type: String,
    pub delivery_id: String,
    /// Exact bytes to sign and send.
    pub body: Vec<u8>,
    pub timeout: Duration,
}

/// Snapshot of an HTTP response, sanitized for storage.
#[derive(Debug, Clone)]
pub struct ResponseSnapshot {
    pub status: i32,
    pub headers: serde_json::Value,
    pub body: String,
}

/// Classification of one send attempt.
#[derive(Debug, Clone)]
pub enum SendOutcome {
    /// 2xx response; the delivery is done.
    Success(ResponseSnapshot),
    /// Worth retrying: 5xx, 408, 429, timeout, connection failure.
    Retriable {
        error: String,
        response: Option<ResponseSnapshot>,
    },
    /// Never retried automatically: other 4xx, unexpected 3xx.
    Permanent {
        error: String,
        response: Option<ResponseSnapshot>,
    },
}

impl SendOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, SendOutcome::Success(_))
    }
}

/// Classify an HTTP status code for retry purposes.
///
/// 408 and 429 signal transient receiver conditions; every other 4xx is a
/// contract problem that repeating the identical request cannot fix.
#[must_use]
pub fn classify_status(status: u16) -> StatusClass {
    match status {
        200..=299 => StatusClass::Success,
        408 | 429 => StatusClass::Retriable,
        500..=599 => StatusClass::Retriable,
        _ => StatusClass::Permanent,
    }
}

/// Retry classification of a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    Retriable,
    Permanent,
}

/// Signing HTTP client for webhook deliveries.
///
/// Redirects are disabled so a signed payload is never replayed to a
/// location the tenant did not configure.
#[derive(Debug, Clone)]
pub struct DeliverySender {
    client: reqwest::Client,
}

impl DeliverySender {
    pub fn new() -> Result<Self, WebhookError> {
        let client = reqwest::Client::builder()
            .redirect(redirect::Policy::none())
            .user_agent(USER_AGENT_VALUE)
            .build()
            .map_err(|e| WebhookError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }

    /// Build the signed header set for a request, for storage alongside
    /// the delivery record.
    #[must_use]
    pub fn build_headers(request: &SendRequest) -> BTreeMap<String, String> {
        let signature = format!(
            "{SIGNATURE_PREFIX}{}",
            sign_payload(&request.secret, &request.body)
        );

        let mut map = BTreeMap::new();
        map.insert(headers::CONTENT_TYPE.to_string(), "application/json".to_string());
        map.insert(headers::USER_AGENT.to_string(), USER_AGENT_VALUE.to_string());
        map.insert(headers::EVENT.to_string(), request.event_type.clone());
        map.insert(headers::DELIVERY.to_string(), request.delivery_id.clone());
        map.insert(headers::SIGNATURE.to_string(), signature);
        map.insert(
            headers::TIMESTAMP.to_string(),
            Utc::now().timestamp().to_string(),
        );
        map
    }

    /// Execute one delivery attempt.
    pub async fn send(&self, request: &SendRequest) -> SendOutcome {
        let header_map = Self::build_headers(request);

        let mut builder = self
            .client
            .post(&request.url)
            .timeout(request.timeout)
            .body(request.body.clone());

        for (name, value) in &header_map {
            builder = builder.header(name, value);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                let error = if e.is_timeout() {
                    format!("request timed out after {:?}", request.timeout)
                } else if e.is_connect() {
                    format!("connection failed: {e}")
                } else {
                    format!("request failed: {e}")
                };
                return SendOutcome::Retriable {
                    error,
                    response: None,
                };
            }
        };

        let status = response.status().as_u16();
        let snapshot = snapshot_response(response).await;

        match classify_status(status) {
            StatusClass::Success => SendOutcome::Success(snapshot),
            StatusClass::Retriable => SendOutcome::Retriable {
                error: format!("received status {status}"),
                response: Some(snapshot),
            },
            StatusClass::Permanent => SendOutcome::Permanent {
                error: format!("received non-retriable status {status}"),
                response: Some(snapshot),
            },
        }
    }
}

/// Capture status, sanitized headers and a truncated body from a response.
async fn snapshot_response(response: reqwest::Response) -> ResponseSnapshot {
    let status = i32::from(response.status().as_u16());

    let mut header_map = serde_json::Map::new();
    for (name, value) in response.headers() {
        let name = name.as_str().to_ascii_lowercase();
        if REDACTED_HEADERS.contains(&name.as_str()) {
            continue;
        }
        if let Ok(value) = value.to_str() {
            header_map.insert(name, serde_json::Value::String(value.to_string()));
        }
    }

    let body = response.text().await.unwrap_or_default();
    let body = truncate_body(&body);

    ResponseSnapshot {
        status,
        headers: serde_json::Value::Object(header_map),
        body,
    }
}

/// Truncate a response body on a char boundary for storage.
fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_STORED_BODY_BYTES {
        return body.to_string();
    }
    let mut end = MAX_STORED_BODY_BYTES;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    body[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_2xx_is_success() {
        assert_eq!(classify_status(200), StatusClass::Success);
        assert_eq!(classify_status(201), StatusClass::Success);
        assert_eq!(classify_status(204), StatusClass::Success);
    }

    #[test]
    fn test_5xx_is_retriable() {
        assert_eq!(classify_status(500), StatusClass::Retriable);
        assert_eq!(classify_status(502), StatusClass::Retriable);
        assert_eq!(classify_status(503), StatusClass::Retriable);
    }

    #[test]
    fn test_timeout_and_rate_limit_are_retriable() {
        assert_eq!(classify_status(408), StatusClass::Retriable);
        assert_eq!(classify_status(429), StatusClass::Retriable);
    }

    #[test]
    fn test_other_4xx_is_permanent() {
        assert_eq!(classify_status(400), StatusClass::Permanent);
        assert_eq!(classify_status(401), StatusClass::Permanent);
        assert_eq!(classify_status(404), StatusClass::Permanent);
        assert_eq!(classify_status(410), StatusClass::Permanent);
    }

    #[test]
    fn test_redirects_are_permanent() {
        assert_eq!(classify_status(301), StatusClass::Permanent);
        assert_eq!(classify_status(302), StatusClass::Permanent);
    }

    #[test]
    fn test_headers_carry_signature_and_metadata() {
        let request = SendRequest {
            url: "https://example.com/hook".to_string(),
            secret: "whsec_test".to_string(),
            event_type: "dte.created".to_string(),
            delivery_id: "d-1".to_string(),
            body: br#"{"event":"dte.created"}"#.to_vec(),
            timeout: Duration::from_secs(30),
        };

        let headers = DeliverySender::build_headers(&request);

        assert_eq!(headers.get("X-Webhook-Event").unwrap(), "dte.created");
        assert_eq!(headers.get("X-Webhook-Delivery").unwrap(), "d-1");
        let signature = headers.get("X-Webhook-Signature-256").unwrap();
        assert!(signature.starts_with("sha256="));
        assert!(crate::crypto::verify_signature(
            signature,
            "whsec_test",
            &request.body
        ));
    }

    #[test]
    fn test_truncate_preserves_short_bodies() {
        assert_eq!(truncate_body("ok"), "ok");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let long = "á".repeat(2000);
        let truncated = truncate_body(&long);
        assert!(truncated.len() <= MAX_STORED_BODY_BYTES);
        assert!(truncated.is_char_boundary(truncated.len()));
    }
}
