//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    body::{Body, Bytes},
    extract::Request,
    http::{HeaderMap, Method, Response, StatusCode, Uri},
    Router,
};
use http_body_util::BodyExt;
use tokio::net::TcpListener;

use wwwhisper_gate::backend::Endpoint;
use wwwhisper_gate::{Gate, GateOptions};

/// A request as received by a mock server.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Handle to a running mock wwwhisper service.
#[derive(Clone)]
pub struct MockWwwhisper {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl MockWwwhisper {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Everything received so far, in arrival order.
    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn gate(&self, options: GateOptions) -> Arc<Gate> {
        let endpoint = Endpoint::parse(&self.url()).unwrap();
        Arc::new(Gate::new(endpoint, options).unwrap())
    }
}

/// Start a programmable mock wwwhisper on an ephemeral port.
///
/// `respond` builds the reply for each request and may await.
pub async fn start_mock_wwwhisper<F, Fut>(respond: F) -> MockWwwhisper
where
    F: Fn(Recorded) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response<Body>> + Send + 'static,
{
    let requests = Arc::new(Mutex::new(Vec::new()));
    let respond = Arc::new(respond);

    let router = Router::new().fallback({
        let requests = requests.clone();
        move |request: Request| {
            let requests = requests.clone();
            let respond = respond.clone();
            async move {
                let (parts, body) = request.into_parts();
                let body = body.collect().await.unwrap().to_bytes();
                let recorded = Recorded {
                    method: parts.method,
                    uri: parts.uri,
                    headers: parts.headers,
                    body,
                };
                requests.lock().unwrap().push(recorded.clone());
                respond(recorded).await
            }
        }
    });

    let addr = serve(router).await;
    MockWwwhisper { addr, requests }
}

/// Serve `router` on an ephemeral port and return its address.
pub async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

/// An address nobody listens on.
pub fn closed_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// A wwwhisper `200` grant, optionally naming the user.
pub fn grant(user: Option<&str>) -> Response<Body> {
    let mut builder = Response::builder().status(StatusCode::OK);
    if let Some(user) = user {
        builder = builder.header("User", user);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn reply(status: u16, content_type: &str, body: &'static str) -> Response<Body> {
    Response::builder()
        .status(status)
        .header("Content-Type", content_type)
        .body(Body::from(body))
        .unwrap()
}

pub async fn body_string(body: Body) -> String {
    let bytes = body.collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}
