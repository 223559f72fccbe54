//! Delivery sender tests against a mock receiver.
//!
//! Exercises outcome classification, signing headers, timeout handling and
//! response sanitization over real HTTP. No database required.

mod common;

use std::time::Duration;

use common::*;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use facel_webhooks::crypto;
use facel_webhooks::sender::{DeliverySender, SendOutcome};

#[tokio::test]
async fn test_2xx_response_is_success() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&mock_server)
        .await;

    let sender = DeliverySender::new().unwrap();
    let request = dte_created_request(&format!("{}/hook", mock_server.uri()));

    let outcome = sender.send(&request).await;

    match outcome {
        SendOutcome::Success(response) => {
            assert_eq!(response.status, 200);
            assert_eq!(response.body, "ok");
        }
        other => panic!("expected success, got {other:?}"),
    }
}

#[tokio::test]
async fn test_request_is_signed_over_exact_bytes() {
    let mock_server = MockServer::start().await;
    let capture = CaptureResponder::new();
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(capture.clone())
        .mount(&mock_server)
        .await;

    let sender = DeliverySender::new().unwrap();
    let request = dte_created_request(&format!("{}/hook", mock_server.uri()));

    let outcome = sender.send(&request).await;
    assert!(outcome.is_success());

    let captured = capture.requests();
    assert_eq!(captured.len(), 1);
    let received = &captured[0];

    // The receiver verifies the signature against the bytes it received.
    let signature = received.header("x-webhook-signature-256").unwrap();
    assert!(signature.starts_with("sha256="));
    assert!(crypto::verify_signature(signature, SECRET_1, &received.body));

    assert_eq!(received.header("x-webhook-event").unwrap(), "dte.created");
    assert_eq!(
        received.header("x-webhook-delivery").unwrap(),
        request.delivery_id
    );
    assert!(received.header("x-webhook-timestamp").is_some());
    assert_eq!(
        received.header("content-type").unwrap(),
        "application/json"
    );
}

#[tokio::test]
async fn test_signature_fails_against_wrong_secret() {
    let mock_server = MockServer::start().await;
    let capture = CaptureResponder::new();
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(capture.clone())
        .mount(&mock_server)
        .await;

    let sender = DeliverySender::new().unwrap();
    let request = dte_created_request(&format!("{}/hook", mock_server.uri()));
    sender.send(&request).await;

    let received = &capture.requests()[0];
    let signature = received.header("x-webhook-signature-256").unwrap();
    assert!(!crypto::verify_signature(
        signature,
        "whsec_wrong",
        &received.body
    ));
}

#[tokio::test]
async fn test_5xx_is_retriable() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let sender = DeliverySender::new().unwrap();
    let request = dte_created_request(&mock_server.uri());

    match sender.send(&request).await {
        SendOutcome::Retriable { response, .. } => {
            assert_eq!(response.unwrap().status, 503);
        }
        other => panic!("expected retriable, got {other:?}"),
    }
}

#[tokio::test]
async fn test_429_is_retriable() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&mock_server)
        .await;

    let sender = DeliverySender::new().unwrap();
    let request = dte_created_request(&mock_server.uri());

    assert!(matches!(
        sender.send(&request).await,
        SendOutcome::Retriable { .. }
    ));
}

#[tokio::test]
async fn test_4xx_is_permanent() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&mock_server)
        .await;

    let sender = DeliverySender::new().unwrap();
    let request = dte_created_request(&mock_server.uri());

    match sender.send(&request).await {
        SendOutcome::Permanent { response, .. } => {
            assert_eq!(response.unwrap().status, 410);
        }
        other => panic!("expected permanent, got {other:?}"),
    }
}

#[tokio::test]
async fn test_redirect_is_not_followed() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("Location", "https://elsewhere.example"),
        )
        .mount(&mock_server)
        .await;

    let sender = DeliverySender::new().unwrap();
    let request = dte_created_request(&mock_server.uri());

    // The signed payload must never be replayed to an unconfigured location.
    match sender.send(&request).await {
        SendOutcome::Permanent { response, .. } => {
            assert_eq!(response.unwrap().status, 302);
        }
        other => panic!("expected permanent, got {other:?}"),
    }
}

#[tokio::test]
async fn test_timeout_is_retriable() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(DelayedResponder::new(Duration::from_secs(5)))
        .mount(&mock_server)
        .await;

    let sender = DeliverySender::new().unwrap();
    let mut request = dte_created_request(&mock_server.uri());
    request.timeout = Duration::from_millis(200);

    match sender.send(&request).await {
        SendOutcome::Retriable { error, response } => {
            assert!(response.is_none());
            assert!(error.contains("timed out"));
        }
        other => panic!("expected retriable, got {other:?}"),
    }
}

#[tokio::test]
async fn test_connection_failure_is_retriable() {
    let sender = DeliverySender::new().unwrap();
    // Port 1 is unassigned; the connection is refused immediately.
    let request = dte_created_request("http://127.0.0.1:1/hook");

    match sender.send(&request).await {
        SendOutcome::Retriable { response, .. } => assert!(response.is_none()),
        other => panic!("expected retriable, got {other:?}"),
    }
}

#[tokio::test]
async fn test_response_body_is_truncated() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(10_000)))
        .mount(&mock_server)
        .await;

    let sender = DeliverySender::new().unwrap();
    let request = dte_created_request(&mock_server.uri());

    match sender.send(&request).await {
        SendOutcome::Success(response) => {
            assert_eq!(response.body.len(), 2000);
        }
        other => panic!("expected success, got {other:?}"),
    }
}

#[tokio::test]
async fn test_sensitive_response_headers_are_dropped() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Set-Cookie", "session=abc")
                .insert_header("X-Request-Id", "req-1"),
        )
        .mount(&mock_server)
        .await;

    let sender = DeliverySender::new().unwrap();
    let request = dte_created_request(&mock_server.uri());

    match sender.send(&request).await {
        SendOutcome::Success(response) => {
            let headers = response.headers.as_object().unwrap();
            assert!(!headers.contains_key("set-cookie"));
            assert_eq!(headers.get("x-request-id").unwrap(), "req-1");
        }
        other => panic!("expected success, got {other:?}"),
    }
}

#[tokio::test]
async fn test_receiver_sees_each_attempt() {
    let mock_server = MockServer::start().await;
    let failing = FailingResponder::fail_times(2);
    Mock::given(method("POST"))
        .respond_with(failing.clone())
        .mount(&mock_server)
        .await;

    let sender = DeliverySender::new().unwrap();
    let request = dte_created_request(&mock_server.uri());

    // Two retriable failures, then success, as the dispatcher would drive it.
    assert!(matches!(
        sender.send(&request).await,
        SendOutcome::Retriable { .. }
    ));
    assert!(matches!(
        sender.send(&request).await,
        SendOutcome::Retriable { .. }
    ));
    assert!(sender.send(&request).await.is_success());
    assert_eq!(failing.attempt_count(), 3);
}
