//! Tower integration for the blocking gate.
//!
//! ```text
//! Request<Body>
//!     → buffer body (bounded, reused by every forwarding attempt)
//!     → BlockingGate::handle(ServiceHandler(inner), ResponseWriter)
//!     → ResponseWriter::into_response
//! ```

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

use crate::gate::blocking::{BlockingGate, GateOutcome};
use crate::gate::handler::ServiceHandler;
use crate::http::response::ResponseWriter;

type GateFuture = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

/// Wraps a service so every request passes through a [`BlockingGate`].
///
/// `max_body_bytes` bounds the buffered request body. Inner responses are
/// collected without a limit unless [`GateLayer::with_max_response_bytes`] sets one.
#[derive(Clone)]
pub struct GateLayer {
    gate: BlockingGate,
    max_body_bytes: usize,
    max_response_bytes: usize,
}

impl GateLayer {
    pub fn new(gate: BlockingGate, max_body_bytes: usize) -> Self {
        Self {
            gate,
            max_body_bytes,
            max_response_bytes: usize::MAX,
        }
    }

    pub fn with_max_response_bytes(mut self, max_response_bytes: usize) -> Self {
        self.max_response_bytes = max_response_bytes;
        self
    }
}

impl<S> Layer<S> for GateLayer {
    type Service = GateService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        GateService {
            gate: self.gate.clone(),
            handler: Arc::new(ServiceHandler::new(inner, self.max_response_bytes)),
            max_body_bytes: self.max_body_bytes,
        }
    }
}

/// Service produced by [`GateLayer`].
#[derive(Clone)]
pub struct GateService<S> {
    gate: BlockingGate,
    handler: Arc<ServiceHandler<S>>,
    max_body_bytes: usize,
}

impl<S> Service<Request<Body>> for GateService<S>
where
    S: Service<Request<Body>, Response = Response, Error = Infallible> + Clone + Send + Sync + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = GateFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // The inner service is driven by `oneshot` per attempt.
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let gate = self.gate.clone();
        let handler = self.handler.clone();
        let limit = self.max_body_bytes;

        Box::pin(async move {
            let request_id = request
                .headers()
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown")
                .to_string();

            let (parts, body) = request.into_parts();
            let bytes = match axum::body::to_bytes(body, limit).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(request_id = %request_id, error = %e, limit, "Rejecting request body");
                    return Ok((StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response());
                }
            };
            let request = Request::from_parts(parts, bytes);

            let mut writer = ResponseWriter::new();
            let outcome = gate.handle(&request, handler.as_ref(), &mut writer).await;

            match &outcome {
                GateOutcome::Relayed { status, attempts, polls } => tracing::info!(
                    request_id = %request_id,
                    gate = %gate.name(),
                    status = %status,
                    attempts,
                    polls,
                    "Request relayed"
                ),
                GateOutcome::Failed(e) => tracing::warn!(
                    request_id = %request_id,
                    gate = %gate.name(),
                    status = %e.status_code(),
                    error = %e,
                    "Request rejected by gate"
                ),
            }

            Ok(writer.into_response())
        })
    }
}
