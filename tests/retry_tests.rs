//! Retry behaviour, driven through an in-memory transport.

mod common;

use authsignal::retry::RetryPolicy;
use authsignal::{Client, Error, RequestDescriptor, TransportErrorKind};
use common::{json_response, SpyTransport, AUTHORIZATION, SECRET, UNAVAILABLE_BODY};
use http::Method;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn client_with(transport: SpyTransport, retries: u32) -> Client<SpyTransport> {
    Client::builder()
        .secret(SECRET)
        .base_url("https://api.authsignal.com/v1")
        .retries(retries)
        .build_with_transport(transport)
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_backoff_doubles_between_attempts() {
    init_tracing();
    let transport = SpyTransport::always(503, UNAVAILABLE_BODY);
    let client = client_with(transport.clone(), 3);

    let start = Instant::now();
    let result = client.get::<serde_json::Value>("/users/abc").await;
    let elapsed = start.elapsed();

    assert!(matches!(result, Err(Error::Api(ref e)) if e.status.as_u16() == 503));
    assert_eq!(transport.calls(), 4);

    // 200ms + 400ms + 800ms
    assert!(elapsed >= Duration::from_millis(1400), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(1500), "elapsed {elapsed:?}");
    assert_eq!(
        RetryPolicy::default().worst_case_backoff(3),
        Duration::from_millis(1400)
    );
}

#[tokio::test(start_paused = true)]
async fn test_default_retries_add_at_most_600ms() {
    let transport = SpyTransport::failing(TransportErrorKind::ConnectionReset);
    let client = Client::builder()
        .secret(SECRET)
        .build_with_transport(transport.clone())
        .unwrap();

    let start = Instant::now();
    let result = client.get::<serde_json::Value>("/users/abc").await;
    let elapsed = start.elapsed();

    match result {
        Err(Error::Transport(e)) => assert_eq!(e.kind(), TransportErrorKind::ConnectionReset),
        _ => panic!("Expected Transport error, got {:?}", result),
    }
    assert_eq!(transport.calls(), 3);
    assert!(elapsed >= Duration::from_millis(600), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(700), "elapsed {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn test_custom_base_delay() {
    let transport = SpyTransport::always(500, UNAVAILABLE_BODY);
    let client = Client::builder()
        .secret(SECRET)
        .retries(2)
        .retry_policy(RetryPolicy::new().with_base_delay(Duration::from_millis(10)))
        .build_with_transport(transport.clone())
        .unwrap();

    let start = Instant::now();
    let _ = client.get::<serde_json::Value>("/users/abc").await;

    // 20ms + 40ms
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(60), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(70), "elapsed {elapsed:?}");
    assert_eq!(transport.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_observer_sees_each_retry() {
    let transport = SpyTransport::new(|attempt| match attempt {
        0 => Err(authsignal::TransportError::new(
            TransportErrorKind::ConnectRefused,
            "connection refused",
        )),
        1 => Ok(json_response(502, UNAVAILABLE_BODY)),
        _ => Ok(json_response(200, r#"{"isEnrolled":true}"#)),
    });

    let observed = Arc::new(Mutex::new(Vec::new()));
    let observed_clone = observed.clone();

    let client = Client::builder()
        .secret(SECRET)
        .on_retry(move |retry, error| {
            observed_clone
                .lock()
                .unwrap()
                .push((retry, error.map(|e| e.kind())));
        })
        .build_with_transport(transport.clone())
        .unwrap();

    let response = client.get::<serde_json::Value>("/users/abc").await.unwrap();

    assert_eq!(response.attempts, 3);
    assert_eq!(response.data["isEnrolled"], true);
    assert_eq!(transport.calls(), 3);
    assert_eq!(
        *observed.lock().unwrap(),
        vec![(1, Some(TransportErrorKind::ConnectRefused)), (2, None)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_observer_not_called_without_retry() {
    let calls = Arc::new(Mutex::new(0u32));
    let calls_clone = calls.clone();

    let client = Client::builder()
        .secret(SECRET)
        .on_retry(move |_, _| *calls_clone.lock().unwrap() += 1)
        .build_with_transport(SpyTransport::always(404, r#"{"error":"not_found"}"#))
        .unwrap();

    let err = client
        .get::<serde_json::Value>("/users/abc")
        .await
        .unwrap_err();

    assert_eq!(err.status().map(|s| s.as_u16()), Some(404));
    assert_eq!(*calls.lock().unwrap(), 0);
}

#[tokio::test]
async fn test_zero_retries_makes_single_attempt() {
    let transport = SpyTransport::failing(TransportErrorKind::ConnectRefused);
    let client = client_with(transport.clone(), 0);

    let result = client.get::<serde_json::Value>("/users/abc").await;

    assert!(matches!(result, Err(Error::Transport(_))));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn test_non_retryable_transport_failure_stops_immediately() {
    let transport = SpyTransport::failing(TransportErrorKind::Other);
    let client = client_with(transport.clone(), 5);

    let result = client.get::<serde_json::Value>("/users/abc").await;

    match result {
        Err(Error::Transport(e)) => {
            assert_eq!(e.kind(), TransportErrorKind::Other);
            assert!(!e.is_retryable());
        }
        _ => panic!("Expected Transport error, got {:?}", result),
    }
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_post_retried_on_connection_failure_but_not_on_5xx() {
    let refused = SpyTransport::failing(TransportErrorKind::ConnectRefused);
    let client = client_with(refused.clone(), 2);
    let _ = client
        .post::<_, serde_json::Value>("/users/abc", &serde_json::json!({}))
        .await;
    assert_eq!(refused.calls(), 3);

    let unavailable = SpyTransport::always(503, UNAVAILABLE_BODY);
    let client = client_with(unavailable.clone(), 2);
    let _ = client
        .post::<_, serde_json::Value>("/users/abc", &serde_json::json!({}))
        .await;
    assert_eq!(unavailable.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_retries_resend_identical_request() {
    let transport = SpyTransport::failing(TransportErrorKind::Io);
    let client = client_with(transport.clone(), 2);

    let descriptor = RequestDescriptor::patch("/users/abc")
        .with_query_param("source", "sdk")
        .with_json_body(&serde_json::json!({ "email": "user@example.com" }))
        .unwrap();
    let _ = client.execute(&descriptor).await;

    let requests = transport.requests();
    assert_eq!(requests.len(), 3);

    let first = &requests[0];
    assert_eq!(first.method, Method::PATCH);
    assert_eq!(
        first.url.as_str(),
        "https://api.authsignal.com/v1/users/abc?source=sdk"
    );
    assert_eq!(first.headers["authorization"], AUTHORIZATION);
    assert_eq!(first.headers["content-type"], "application/json");

    for request in &requests[1..] {
        assert_eq!(request.method, first.method);
        assert_eq!(request.url, first.url);
        assert_eq!(request.headers, first.headers);
        assert_eq!(request.body, first.body);
    }
}

#[tokio::test]
async fn test_invalid_base_url_fails_before_any_attempt() {
    let transport = SpyTransport::always(200, "{}");

    let result = Client::builder()
        .secret(SECRET)
        .base_url("not a url")
        .build_with_transport(transport.clone());

    match result {
        Err(e) => assert!(e.is_configuration_error()),
        Ok(_) => panic!("Expected configuration error"),
    }
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn test_invalid_request_url_fails_before_any_attempt() {
    let transport = SpyTransport::always(200, "{}");
    let client = Client::builder()
        .secret(SECRET)
        .base_url("http://localhost")
        .build_with_transport(transport.clone())
        .unwrap();

    let result = client.get::<serde_json::Value>(":99999/users").await;

    match result {
        Err(Error::InvalidUrl { url, .. }) => assert_eq!(url, "http://localhost:99999/users"),
        _ => panic!("Expected InvalidUrl, got {:?}", result),
    }
    assert_eq!(transport.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_calls_keep_separate_retry_budgets() {
    let transport = SpyTransport::always(503, UNAVAILABLE_BODY);
    let client = client_with(transport.clone(), 2);

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .get::<serde_json::Value>(format!("/users/user-{i}"))
                    .await
            })
        })
        .collect();

    for handle in handles {
        let result = handle.await.unwrap();
        assert!(matches!(result, Err(Error::Api(ref e)) if e.status.as_u16() == 503));
    }

    // Each call gets its own 1 + 2 attempts.
    assert_eq!(transport.calls(), 12);
}

#[tokio::test]
async fn test_caller_headers_cannot_replace_basic_auth() {
    let transport = SpyTransport::always(200, "{}");
    let client = Client::builder()
        .secret(SECRET)
        .default_header("authorization", "Bearer default")
        .unwrap()
        .build_with_transport(transport.clone())
        .unwrap();

    let descriptor = RequestDescriptor::get("/users/abc")
        .with_header("authorization", "Bearer other")
        .unwrap()
        .with_header("x-request-id", "req-1")
        .unwrap();
    client.execute(&descriptor).await.unwrap();

    let requests = transport.requests();
    assert_eq!(requests[0].headers["authorization"], AUTHORIZATION);
    assert_eq!(requests[0].headers["x-request-id"], "req-1");
}
