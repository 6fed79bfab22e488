//! Buffered response capture.
//!
//! # Responsibilities
//! - Stand in for the real response sink while an inner handler runs
//! - Record headers, status and body without transmitting anything
//! - Replay the recorded response onto the real sink exactly once
//!
//! # Design Decisions
//! - Single-shot body buffer: a later write replaces an earlier one
//! - Last status write wins
//! - Replay order is headers, status, body

use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};
use thiserror::Error;

/// Errors raised by a response sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The sink has already emitted its body.
    #[error("response already finalized")]
    Finalized,
}

/// Minimal write side of an HTTP response.
pub trait ResponseSink: Send {
    /// Mutable header map; callers may populate it before or after the status.
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Record the status code.
    fn write_status(&mut self, status: StatusCode);

    /// Write the body, returning the number of bytes accepted.
    fn write_body(&mut self, body: Bytes) -> Result<usize, SinkError>;
}

/// A response sink that records everything and sends nothing.
#[derive(Debug, Default)]
pub struct ResponseCapture {
    headers: HeaderMap,
    status: Option<StatusCode>,
    body: Bytes,
}

impl ResponseCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently recorded status, `None` if none was written.
    pub fn status_code(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Copy the captured response onto `sink`.
    ///
    /// Each captured header name replaces whatever the sink held for that name.
    /// A capture that never saw a status replays as `200 OK`.
    pub fn replay(self, sink: &mut dyn ResponseSink) -> Result<usize, SinkError> {
        let target = sink.headers_mut();
        for name in self.headers.keys() {
            target.remove(name);
            for value in self.headers.get_all(name) {
                target.append(name.clone(), value.clone());
            }
        }

        sink.write_status(self.status.unwrap_or(StatusCode::OK));
        sink.write_body(self.body)
    }
}

impl ResponseSink for ResponseCapture {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_status(&mut self, status: StatusCode) {
        self.status = Some(status);
    }

    fn write_body(&mut self, body: Bytes) -> Result<usize, SinkError> {
        let len = body.len();
        self.body = body;
        Ok(len)
    }
}
