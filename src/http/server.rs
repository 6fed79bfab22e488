//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the upstream forwarder behind the gate
//! - Wire up middleware (request ID, tracing, overall timeout)
//! - Bind server to listener
//! - Drain on shutdown

use axum::{routing::any, Router};
use axum::http::uri::InvalidUri;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::gate::{BlockingGate, GateLayer};
use crate::health::{HttpStatusLookup, StatusLookup};
use crate::http::upstream::{forward_handler, UpstreamState};

/// HTTP server for the gating proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
}

impl HttpServer {
    /// Create a server that looks dependencies up over HTTP.
    pub fn new(config: ProxyConfig) -> Result<Self, InvalidUri> {
        let lookup = Arc::new(HttpStatusLookup::new(&config.status));
        Self::with_lookup(config, lookup)
    }

    /// Create a server with a caller-supplied status lookup.
    pub fn with_lookup(config: ProxyConfig, lookup: Arc<dyn StatusLookup>) -> Result<Self, InvalidUri> {
        let upstream = UpstreamState::new(&config.upstream)?;
        let gate = BlockingGate::new(config.gate.clone(), lookup);

        tracing::info!(
            gate = %gate.name(),
            dependencies = ?gate.config().dependencies,
            timeout_ms = config.gate.timeout_ms,
            poll_interval_ms = config.gate.poll_interval_ms,
            upstream = %config.upstream.address,
            "Gate configured"
        );

        let router = Self::build_router(&config, gate, upstream);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, gate: BlockingGate, upstream: UpstreamState) -> Router {
        Router::new()
            .route("/{*path}", any(forward_handler))
            .route("/", any(forward_handler))
            .with_state(upstream)
            .layer(
                GateLayer::new(gate, config.upstream.max_body_bytes)
                    .with_max_response_bytes(config.upstream.max_response_bytes),
            )
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The fully layered router, for serving in-process.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
