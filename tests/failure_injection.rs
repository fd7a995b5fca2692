//! Failure injection tests for the gate.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::Request,
    http::{Response, StatusCode},
    Router,
};
use tower::ServiceExt;

use wwwhisper_gate::backend::Endpoint;
use wwwhisper_gate::config::GateConfig;
use wwwhisper_gate::security::access_control::{AUTH_REQUEST_FAILED, PROXY_REQUEST_FAILED};
use wwwhisper_gate::{protect, Gate, GateOptions, GateServer};

mod common;

use common::{body_string, closed_addr, grant, start_mock_wwwhisper};

fn unreachable_gate() -> Arc<Gate> {
    let endpoint = Endpoint::parse(&format!("http://{}", closed_addr())).unwrap();
    Arc::new(Gate::new(endpoint, GateOptions::default()).unwrap())
}

fn counting_app(calls: Arc<AtomicUsize>) -> Router {
    Router::new().fallback(move || {
        let calls = calls.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            "app"
        }
    })
}

fn get(uri: &str) -> Request {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_auth_query_failure_is_internal_error() {
    let calls = Arc::new(AtomicUsize::new(0));
    let router = protect(counting_app(calls.clone()), Some(unreachable_gate()));

    let response = router.oneshot(get("/docs/")).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_string(response.into_body()).await, AUTH_REQUEST_FAILED);
    assert_eq!(calls.load(Ordering::SeqCst), 0, "app must not run without a decision");
}

#[tokio::test]
async fn test_login_proxy_failure_is_internal_error() {
    let calls = Arc::new(AtomicUsize::new(0));
    let router = protect(counting_app(calls.clone()), Some(unreachable_gate()));

    let response = router.oneshot(get("/wwwhisper/auth/login")).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_string(response.into_body()).await, PROXY_REQUEST_FAILED);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_slow_backend_times_out() {
    let mock = start_mock_wwwhisper(|_| async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        grant(Some("late@example.org"))
    })
    .await;
    let options = GateOptions {
        timeout: Duration::from_millis(200),
        ..GateOptions::default()
    };
    let calls = Arc::new(AtomicUsize::new(0));
    let router = protect(counting_app(calls.clone()), Some(mock.gate(options)));

    let response = router.oneshot(get("/")).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_string(response.into_body()).await, AUTH_REQUEST_FAILED);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_stalled_grant_body_times_out() {
    let mock = start_mock_wwwhisper(|_| async {
        let body = Body::from_stream(futures_util::stream::pending::<Result<Bytes, std::io::Error>>());
        Response::builder()
            .status(StatusCode::OK)
            .header("User", "alice@example.org")
            .body(body)
            .unwrap()
    })
    .await;
    let options = GateOptions {
        timeout: Duration::from_millis(200),
        ..GateOptions::default()
    };
    let calls = Arc::new(AtomicUsize::new(0));
    let router = protect(counting_app(calls.clone()), Some(mock.gate(options)));

    let response = tokio::time::timeout(Duration::from_secs(3), router.oneshot(get("/")))
        .await
        .expect("gate hung on a stalled grant body")
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_string(response.into_body()).await, AUTH_REQUEST_FAILED);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unreachable_application_is_bad_gateway() {
    let mock = start_mock_wwwhisper(|_| async { grant(Some("alice@example.org")) }).await;

    let mut config = GateConfig::default();
    config.app.upstream = closed_addr().to_string();
    let router = GateServer::new(&config, Some(mock.gate(GateOptions::default())))
        .unwrap()
        .into_router();

    let response = router.oneshot(get("/docs/")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(response.headers()["user"], "alice@example.org");
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(body_string(response.into_body()).await, "Upstream request failed");
}
