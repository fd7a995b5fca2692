//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router forwarding everything to the application
//! - Put the router behind the gate when one is active
//! - Wire up middleware (tracing, request ID, timeout)
//! - Serve until the shutdown signal fires

use std::sync::Arc;
use std::time::Duration;

use axum::{http::uri::InvalidUri, Router};
use tokio::{net::TcpListener, sync::broadcast};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::GateConfig;
use crate::http::upstream::{self, Upstream};
use crate::security::{protect, Gate};

/// HTTP server for the gate.
pub struct GateServer {
    router: Router,
}

impl GateServer {
    /// Build the server. `gate` is `None` when protection is disabled.
    pub fn new(config: &GateConfig, gate: Option<Arc<Gate>>) -> Result<Self, InvalidUri> {
        let upstream = Arc::new(Upstream::new(&config.app.upstream)?);
        tracing::debug!(
            upstream = %upstream.authority(),
            protected = gate.is_some(),
            "Building router"
        );
        let router = Self::build_router(config, upstream, gate);
        Ok(Self { router })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GateConfig, upstream: Arc<Upstream>, gate: Option<Arc<Gate>>) -> Router {
        let app = Router::new()
            .fallback(upstream::forward)
            .with_state(upstream);

        protect(app, gate).layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs))),
        )
    }

    /// The fully layered router, for embedding or driving in tests.
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Run the server on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
