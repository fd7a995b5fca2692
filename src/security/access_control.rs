//! Access control middleware.
//! Enforces wwwhisper authorization in front of the protected application.
//!
//! ```text
//! NORMALIZE → CLASSIFY ─┬─ /wwwhisper/auth/… ─────────────→ PROXY_TO_BACKEND
//!                       └─ everything else → QUERY_AUTH ─┬─ 200 → GRANTED_CONTINUE
//!                                                        ├─ other → DENIED_RELAY
//!                                                        └─ error → 500
//! GRANTED_CONTINUE ─┬─ /wwwhisper/… → PROXY_TO_BACKEND
//!                   └─ otherwise    → application (+ iframe injection)
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use hyper::body::Incoming;

use crate::backend::{
    BackendClient, BackendError, Endpoint, ADMIN_PREFIX, AUTH_PREFIX, USER_HEADER,
};
use crate::config::WwwhisperConfig;
use crate::http::request::{normalized_uri, site_url};
use crate::http::response::{inject_iframe, should_inject};
use crate::observability::metrics::{self, Decision};
use crate::security::headers::{backend_headers, strip_hop_by_hop, Profile};

/// Body of the 500 response when the authorization query fails.
pub const AUTH_REQUEST_FAILED: &str = "auth request failed";

/// Body of the 500 response when a proxied request to wwwhisper fails.
pub const PROXY_REQUEST_FAILED: &str = "request to wwwhisper failed";

/// Upper bound on the body of a granted authorization response.
const GRANT_BODY_LIMIT: usize = 64 * 1024;

/// Identity of the visitor, attached to authorized requests.
///
/// Absent when wwwhisper allows the location without a login.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteUser(pub String);

impl RemoteUser {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Gate settings besides the endpoint.
#[derive(Debug, Clone)]
pub struct GateOptions {
    /// Insert the iframe script into HTML responses of the application.
    pub inject_iframe: bool,
    /// Timeout for each call to wwwhisper.
    pub timeout: Duration,
}

impl Default for GateOptions {
    fn default() -> Self {
        Self {
            inject_iframe: true,
            timeout: Duration::from_secs(10),
        }
    }
}

impl From<&WwwhisperConfig> for GateOptions {
    fn from(config: &WwwhisperConfig) -> Self {
        Self {
            inject_iframe: config.inject_iframe,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

enum AuthOutcome {
    Granted(Option<HeaderValue>),
    Denied(Response),
}

/// Shared state of the access control middleware.
pub struct Gate {
    client: BackendClient,
    inject_iframe: bool,
}

impl Gate {
    pub fn new(endpoint: Endpoint, options: GateOptions) -> Result<Self, BackendError> {
        Ok(Self {
            client: BackendClient::new(endpoint, options.timeout)?,
            inject_iframe: options.inject_iframe,
        })
    }

    async fn query(&self, path: &str, headers: HeaderMap) -> Result<AuthOutcome, BackendError> {
        let response = self.client.is_authorized(path, headers).await?;

        if response.status() != StatusCode::OK {
            return Ok(AuthOutcome::Denied(relay(response)));
        }

        let user = response.headers().get(USER_HEADER).cloned();
        // A grant counts only once its body is complete.
        self.client
            .read_body(response.into_body(), GRANT_BODY_LIMIT)
            .await?;
        Ok(AuthOutcome::Granted(user))
    }

    async fn proxy(&self, request: Request) -> Response {
        let site_url = site_url(&request);
        let (parts, body) = request.into_parts();
        let headers = backend_headers(&parts.headers, Profile::Proxy, site_url.as_deref());
        let target = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");

        match self.client.forward(parts.method, target, headers, body).await {
            Ok(response) => relay(response),
            Err(e) => {
                tracing::error!(error = %e, target = %target, "Request to wwwhisper failed");
                metrics::record_decision(Decision::Failed);
                (StatusCode::INTERNAL_SERVER_ERROR, PROXY_REQUEST_FAILED).into_response()
            }
        }
    }
}

impl fmt::Debug for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gate")
            .field("endpoint", self.client.endpoint())
            .field("inject_iframe", &self.inject_iframe)
            .finish()
    }
}

/// Put `router` behind the gate, or leave it unprotected when `gate` is `None`.
///
/// The gate wraps the whole router, so routing sees the normalized path
/// that wwwhisper authorized.
pub fn protect(router: Router, gate: Option<Arc<Gate>>) -> Router {
    match gate {
        Some(gate) => Router::new()
            .fallback_service(router)
            .layer(middleware::from_fn_with_state(gate, authorize)),
        None => router,
    }
}

/// Middleware function running the authorization pipeline for one request.
pub async fn authorize(
    State(gate): State<Arc<Gate>>,
    mut request: Request,
    next: Next,
) -> Response {
    match normalized_uri(request.uri()) {
        Ok(uri) => *request.uri_mut() = uri,
        Err(e) => {
            tracing::warn!(error = %e, uri = %request.uri(), "Cannot normalize request path");
            return (StatusCode::BAD_REQUEST, "invalid request path").into_response();
        }
    }
    let path = request.uri().path().to_owned();

    // Login page and its assets must be reachable before logging in.
    if path.starts_with(AUTH_PREFIX) {
        tracing::debug!(path = %path, "Proxying login request to wwwhisper");
        metrics::record_decision(Decision::Login);
        return gate.proxy(request).await;
    }

    let site_url = site_url(&request);
    let headers = backend_headers(request.headers(), Profile::AuthQuery, site_url.as_deref());
    let user = match gate.query(&path, headers).await {
        Ok(AuthOutcome::Granted(user)) => user,
        Ok(AuthOutcome::Denied(response)) => {
            tracing::debug!(path = %path, status = %response.status(), "Access denied by wwwhisper");
            metrics::record_decision(Decision::Denied);
            return response;
        }
        Err(e) => {
            tracing::error!(error = %e, path = %path, "Authorization request failed");
            metrics::record_decision(Decision::Failed);
            return (StatusCode::INTERNAL_SERVER_ERROR, AUTH_REQUEST_FAILED).into_response();
        }
    };

    tracing::debug!(path = %path, user = ?user, "Access granted");
    metrics::record_decision(Decision::Granted);

    // Only wwwhisper may name the user.
    request.headers_mut().remove(USER_HEADER);
    if let Some(user) = &user {
        request.headers_mut().insert(USER_HEADER, user.clone());
        if let Ok(name) = user.to_str() {
            request.extensions_mut().insert(RemoteUser(name.to_owned()));
        }
    }

    let mut response = if path.starts_with(ADMIN_PREFIX) {
        gate.proxy(request).await
    } else {
        let method = request.method().clone();
        let response = next.run(request).await;
        if gate.inject_iframe && should_inject(&method, response.status(), response.headers()) {
            inject_iframe(response).await
        } else {
            response
        }
    };

    if let Some(user) = user {
        response.headers_mut().insert(USER_HEADER, user);
    }
    response
}

/// Relay a wwwhisper response to the client, streaming its body.
fn relay(response: axum::http::Response<Incoming>) -> Response {
    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    Response::from_parts(parts, Body::new(body))
}
