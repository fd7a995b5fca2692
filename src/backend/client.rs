//! HTTP client for wwwhisper.
//!
//! # Responsibilities
//! - Issue the `is-authorized` query
//! - Forward login/admin requests with their body streamed through
//! - Attach endpoint credentials as `Authorization: Basic`
//! - Bound every call with a timeout

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::{Body, Bytes};
use axum::http::{header, uri::InvalidUri, HeaderMap, Method, Request, Response};
use hyper::body::Incoming;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::backend::endpoint::Scheme;
use crate::backend::{Endpoint, IS_AUTHORIZED_PATH};
use crate::observability::metrics;

/// Characters escaped in the `path` query parameter.
const PATH_PARAM: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'<')
    .add(b'=')
    .add(b'>')
    .add(b'`')
    .add(b'{')
    .add(b'}');

type HttpsClient = Client<HttpsConnector<HttpConnector>, Body>;

/// Failure to get a response from wwwhisper.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("invalid backend URI: {0}")]
    Uri(#[from] InvalidUri),

    #[error("backend request failed: {0}")]
    Transport(#[from] hyper_util::client::legacy::Error),

    #[error("backend did not respond within {0:?}")]
    Timeout(Duration),

    #[error("TLS setup failed: {0}")]
    Tls(#[from] rustls::Error),

    #[error("reading backend response body failed: {0}")]
    Body(#[from] axum::Error),
}

/// Client bound to a single wwwhisper endpoint.
#[derive(Clone)]
pub struct BackendClient {
    endpoint: Arc<Endpoint>,
    client: HttpsClient,
    timeout: Duration,
}

impl BackendClient {
    /// Create a client for `endpoint`.
    ///
    /// Both `http` and `https` endpoints are supported; certificates are
    /// checked against the Mozilla root store.
    pub fn new(endpoint: Endpoint, timeout: Duration) -> Result<Self, BackendError> {
        let mut roots = rustls::RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let tls = rustls::ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()?
            .with_root_certificates(roots)
            .with_no_client_auth();

        // An https endpoint never falls back to plain http.
        let builder = HttpsConnectorBuilder::new().with_tls_config(tls);
        let connector = match endpoint.scheme() {
            Scheme::Https => builder.https_only(),
            Scheme::Http => builder.https_or_http(),
        }
        .enable_http1()
        .build();

        // wwwhisper predates HTTP/2 and expects canonical header names.
        let client = Client::builder(TokioExecutor::new())
            .http1_title_case_headers(true)
            .build(connector);

        Ok(Self {
            endpoint: Arc::new(endpoint),
            client,
            timeout,
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Ask wwwhisper whether the visitor may access `path`.
    ///
    /// `path` must already be normalized and must not carry a query.
    pub async fn is_authorized(
        &self,
        path: &str,
        headers: HeaderMap,
    ) -> Result<Response<Incoming>, BackendError> {
        let target = format!(
            "{}?path={}",
            IS_AUTHORIZED_PATH,
            utf8_percent_encode(path, PATH_PARAM)
        );
        self.send(Method::GET, &target, headers, Body::empty(), "auth")
            .await
    }

    /// Forward a request to wwwhisper, streaming `body` through unchanged.
    pub async fn forward(
        &self,
        method: Method,
        path_and_query: &str,
        headers: HeaderMap,
        body: Body,
    ) -> Result<Response<Incoming>, BackendError> {
        self.send(method, path_and_query, headers, body, "proxy")
            .await
    }

    /// Read a response body to the end, bounded by the call timeout.
    ///
    /// Bodies longer than `limit` bytes are an error.
    pub async fn read_body(&self, body: Incoming, limit: usize) -> Result<Bytes, BackendError> {
        match tokio::time::timeout(self.timeout, axum::body::to_bytes(Body::new(body), limit)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(BackendError::Timeout(self.timeout)),
        }
    }

    async fn send(
        &self,
        method: Method,
        target: &str,
        headers: HeaderMap,
        body: Body,
        call: &'static str,
    ) -> Result<Response<Incoming>, BackendError> {
        let mut request = Request::new(body);
        *request.method_mut() = method;
        *request.uri_mut() = self.endpoint.uri(target)?;
        *request.headers_mut() = headers;
        if let Some(authorization) = self.endpoint.authorization() {
            request
                .headers_mut()
                .insert(header::AUTHORIZATION, authorization.clone());
        }

        tracing::trace!(call, target = %target, "Sending request to wwwhisper");

        let start = Instant::now();
        match tokio::time::timeout(self.timeout, self.client.request(request)).await {
            Ok(Ok(response)) => {
                metrics::record_backend_request(call, response.status().as_u16(), start);
                Ok(response)
            }
            Ok(Err(e)) => {
                metrics::record_backend_failure(call, start);
                Err(BackendError::Transport(e))
            }
            Err(_) => {
                metrics::record_backend_failure(call, start);
                Err(BackendError::Timeout(self.timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_param_encoding() {
        let encode = |p: &str| utf8_percent_encode(p, PATH_PARAM).to_string();
        assert_eq!(encode("/foo/bar/"), "/foo/bar/");
        assert_eq!(encode("/a&b=c"), "/a%26b%3Dc");
        assert_eq!(encode("/a%20b"), "/a%2520b");
        assert_eq!(encode("/c++"), "/c%2B%2B");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transport_error() {
        // Bind and drop to get a port nobody listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let endpoint = Endpoint::parse(&format!("http://{addr}")).unwrap();
        let client = BackendClient::new(endpoint, Duration::from_secs(5)).unwrap();
        let err = client
            .is_authorized("/", HeaderMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Transport(_)), "got {err:?}");
    }
}
