//! The real, outward-facing response sink.
//!
//! # Design Decisions
//! - First status write wins; later ones are ignored
//! - Headers are frozen when the status is written
//! - Writing a body without a status commits `200 OK`
//! - Body writes append

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;

use crate::gate::capture::{ResponseSink, SinkError};

/// Accumulates a response and hands it to axum once the gate is done.
#[derive(Debug, Default)]
pub struct ResponseWriter {
    headers: HeaderMap,
    committed: Option<(StatusCode, HeaderMap)>,
    body: Vec<u8>,
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.committed.as_ref().map(|(status, _)| *status)
    }

    /// Build the axum response from what was written.
    pub fn into_response(self) -> Response {
        let (status, headers) = self
            .committed
            .unwrap_or((StatusCode::OK, self.headers));

        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}

impl ResponseSink for ResponseWriter {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_status(&mut self, status: StatusCode) {
        if let Some((current, _)) = &self.committed {
            tracing::debug!(current = %current, ignored = %status, "Superfluous status write");
            return;
        }
        self.committed = Some((status, self.headers.clone()));
    }

    fn write_body(&mut self, body: Bytes) -> Result<usize, SinkError> {
        if self.committed.is_none() {
            self.write_status(StatusCode::OK);
        }
        self.body.extend_from_slice(&body);
        Ok(body.len())
    }
}
