//! Inner handler abstraction.
//!
//! The gate may call its inner handler several times for one inbound request,
//! each time with a fresh sink, so handlers see a borrowed, fully buffered
//! request rather than a consumable stream.

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{header, HeaderValue, Request, StatusCode};
use axum::response::Response;
use std::convert::Infallible;
use tower::{Service, ServiceExt};

use crate::gate::capture::ResponseSink;

/// Produces a response by writing into a sink.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn serve(&self, sink: &mut dyn ResponseSink, request: &Request<Bytes>);
}

#[async_trait]
impl<F> Handler for F
where
    F: Fn(&mut dyn ResponseSink, &Request<Bytes>) + Send + Sync,
{
    async fn serve(&self, sink: &mut dyn ResponseSink, request: &Request<Bytes>) {
        self(sink, request)
    }
}

/// Drives a tower service as an inner handler.
///
/// The response body is collected in full, up to `max_response_bytes`.
#[derive(Clone)]
pub struct ServiceHandler<S> {
    inner: S,
    max_response_bytes: usize,
}

impl<S> ServiceHandler<S> {
    pub fn new(inner: S, max_response_bytes: usize) -> Self {
        Self { inner, max_response_bytes }
    }
}

/// Status recorded when an inner response body cannot be collected.
///
/// A 502 stays a 502 so the gate may retry it; anything else is final.
fn uncollectable_status(upstream: StatusCode) -> StatusCode {
    if upstream == StatusCode::BAD_GATEWAY {
        StatusCode::BAD_GATEWAY
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// Rebuild a consumable request from a buffered one.
pub(crate) fn rebuild_request(request: &Request<Bytes>) -> Request<Body> {
    let mut rebuilt = Request::new(Body::from(request.body().clone()));
    *rebuilt.method_mut() = request.method().clone();
    *rebuilt.uri_mut() = request.uri().clone();
    *rebuilt.version_mut() = request.version();
    *rebuilt.headers_mut() = request.headers().clone();
    rebuilt
}

#[async_trait]
impl<S> Handler for ServiceHandler<S>
where
    S: Service<Request<Body>, Response = Response, Error = Infallible> + Clone + Send + Sync + 'static,
    S::Future: Send + 'static,
{
    async fn serve(&self, sink: &mut dyn ResponseSink, request: &Request<Bytes>) {
        let response = match self.inner.clone().oneshot(rebuild_request(request)).await {
            Ok(response) => response,
            Err(never) => match never {},
        };

        let (parts, body) = response.into_parts();
        match axum::body::to_bytes(body, self.max_response_bytes).await {
            Ok(bytes) => {
                *sink.headers_mut() = parts.headers;
                sink.write_status(parts.status);
                // Capture sinks never reject a write.
                let _ = sink.write_body(bytes);
            }
            Err(e) => {
                let status = uncollectable_status(parts.status);
                tracing::warn!(
                    error = %e,
                    upstream_status = %parts.status,
                    upstream_headers = ?parts.headers,
                    limit = self.max_response_bytes,
                    status = %status,
                    "Failed to collect inner response body"
                );
                sink.headers_mut()
                    .insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
                sink.write_status(status);
                let _ = sink.write_body(Bytes::from_static(b"Upstream response body could not be read"));
            }
        }
    }
}
