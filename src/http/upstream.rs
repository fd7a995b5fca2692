//! Forwarding to the protected application.
//!
//! Requests that pass the gate are sent to `app.upstream` over a pooled
//! HTTP/1.1 client. Both bodies stream; nothing is buffered here.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{
        uri::{Authority, InvalidUri, Scheme},
        StatusCode, Uri,
    },
    response::{IntoResponse, Response},
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::security::headers::strip_hop_by_hop;

/// The protected application behind the gate.
#[derive(Clone)]
pub struct Upstream {
    authority: Authority,
    client: Client<HttpConnector, Body>,
}

impl Upstream {
    /// `address` is a `host:port` pair, e.g. `127.0.0.1:3000`.
    pub fn new(address: &str) -> Result<Self, InvalidUri> {
        let authority = address.trim().parse::<Authority>()?;
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Ok(Self { authority, client })
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    fn target(&self, uri: &Uri) -> Result<Uri, axum::http::Error> {
        let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        Uri::builder()
            .scheme(Scheme::HTTP)
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()
    }
}

/// Handler relaying a request to the protected application.
pub async fn forward(State(upstream): State<Arc<Upstream>>, request: Request) -> Response {
    let (mut parts, body) = request.into_parts();

    parts.uri = match upstream.target(&parts.uri) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::warn!(error = %e, "Cannot build upstream URI");
            return (StatusCode::BAD_REQUEST, "Invalid request target").into_response();
        }
    };
    strip_hop_by_hop(&mut parts.headers);

    tracing::debug!(method = %parts.method, uri = %parts.uri, "Forwarding to application");

    match upstream.client.request(Request::from_parts(parts, body)).await {
        Ok(response) => {
            let (mut parts, body) = response.into_parts();
            strip_hop_by_hop(&mut parts.headers);
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            tracing::error!(error = %e, upstream = %upstream.authority(), "Upstream error");
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}
