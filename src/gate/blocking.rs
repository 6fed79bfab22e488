//! Blocking readiness gate.
//!
//! # States
//! - Polling: ask every dependency for its status until all are ready
//! - Forwarding: call the inner handler against a fresh capture, retrying on 502
//! - Relaying: replay the last capture onto the real sink
//! - Failed: write a JSON error straight to the real sink
//!
//! # State Transitions
//! ```text
//! Polling → Forwarding: a full pass finds zero not-ready dependencies
//! Polling → Failed(lookup): any lookup returns an error
//! Polling → Failed(timeout): deadline passes without a clean pass
//! Forwarding → Forwarding: status 502 and deadline not yet passed
//! Forwarding → Relaying: status not 502, or deadline passed
//! ```
//!
//! Both phases share one start instant. The deadline is only checked between
//! iterations and the interval sleep always runs before the check, so a request
//! can overshoot the deadline by one interval plus the duration of any call in
//! flight.

use axum::body::Bytes;
use axum::http::{Request, StatusCode};
use std::sync::Arc;
use std::time::Instant;

use crate::config::GateConfig;
use crate::gate::capture::{ResponseCapture, ResponseSink};
use crate::gate::error::{write_error, GateError};
use crate::gate::handler::Handler;
use crate::health::{StatusLookup, READY_STATUS};
use crate::observability::metrics;

/// Result of gating one request.
#[derive(Debug)]
pub enum GateOutcome {
    /// The inner handler's last response was replayed.
    Relayed {
        status: StatusCode,
        /// Inner handler invocations.
        attempts: u32,
        /// Readiness passes before forwarding.
        polls: u32,
    },
    /// The gate wrote its own error response.
    Failed(GateError),
}

impl GateOutcome {
    pub fn status(&self) -> StatusCode {
        match self {
            GateOutcome::Relayed { status, .. } => *status,
            GateOutcome::Failed(e) => e.status_code(),
        }
    }
}

/// Defers forwarding until dependencies are ready, then retries bad gateways.
///
/// Holds only immutable configuration; every call to [`BlockingGate::handle`]
/// owns its own start instant and captures, so one gate serves any number of
/// concurrent requests.
#[derive(Clone)]
pub struct BlockingGate {
    config: Arc<GateConfig>,
    lookup: Arc<dyn StatusLookup>,
}

impl BlockingGate {
    pub fn new(config: GateConfig, lookup: Arc<dyn StatusLookup>) -> Self {
        Self {
            config: Arc::new(config),
            lookup,
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Gate a single request, writing exactly one response to `sink`.
    pub async fn handle(
        &self,
        request: &Request<Bytes>,
        next: &dyn Handler,
        sink: &mut dyn ResponseSink,
    ) -> GateOutcome {
        let start = Instant::now();

        let polls = match self.await_ready(start).await {
            Ok(polls) => polls,
            Err(error) => {
                tracing::warn!(
                    gate = %self.config.name,
                    error = %error,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Gate failed before forwarding"
                );
                if let Err(e) = write_error(sink, &self.config.name, &error) {
                    tracing::error!(gate = %self.config.name, error = %e, "Failed to write gate error response");
                }
                metrics::record_gate_outcome(&self.config.name, error.kind(), start);
                return GateOutcome::Failed(error);
            }
        };

        let (capture, attempts) = self.forward(start, request, next).await;
        let status = capture.status_code().unwrap_or(StatusCode::OK);

        tracing::debug!(
            gate = %self.config.name,
            status = %status,
            attempts,
            polls,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Relaying captured response"
        );
        if let Err(e) = capture.replay(sink) {
            tracing::error!(gate = %self.config.name, error = %e, "Failed to relay captured response");
        }

        metrics::record_forward_attempts(&self.config.name, attempts);
        metrics::record_gate_outcome(&self.config.name, "relayed", start);
        GateOutcome::Relayed { status, attempts, polls }
    }

    /// Poll until one full pass sees every dependency ready.
    ///
    /// Returns the number of passes taken.
    async fn await_ready(&self, start: Instant) -> Result<u32, GateError> {
        let deadline = self.config.deadline();
        let mut polls = 0;

        while start.elapsed() < deadline {
            polls += 1;
            let not_ready = self.count_not_ready().await?;
            if not_ready == 0 {
                return Ok(polls);
            }

            tracing::debug!(
                gate = %self.config.name,
                not_ready,
                poll = polls,
                "Dependencies not ready, waiting"
            );
            tokio::time::sleep(self.config.poll_interval()).await;
        }

        Err(GateError::Timeout { deadline })
    }

    /// One poll pass. Stops at the first lookup error.
    async fn count_not_ready(&self) -> Result<usize, GateError> {
        let mut not_ready = 0;
        for dependency in &self.config.dependencies {
            let status = match self.lookup.status(dependency).await {
                Ok(status) => status,
                Err(e) => {
                    metrics::record_lookup_error(&self.config.name);
                    tracing::warn!(gate = %self.config.name, dependency = %dependency, error = %e, "Status lookup failed");
                    return Err(GateError::Lookup(e));
                }
            };

            tracing::trace!(gate = %self.config.name, dependency = %dependency, status = %status, "Dependency status");
            if status != READY_STATUS {
                not_ready += 1;
            }
        }
        Ok(not_ready)
    }

    /// Call `next`, retrying while it answers 502 and the deadline allows.
    async fn forward(
        &self,
        start: Instant,
        request: &Request<Bytes>,
        next: &dyn Handler,
    ) -> (ResponseCapture, u32) {
        let deadline = self.config.deadline();
        let mut attempts = 1;
        let mut capture = invoke(next, request).await;

        while capture.status_code() == Some(StatusCode::BAD_GATEWAY) && start.elapsed() < deadline {
            tracing::debug!(gate = %self.config.name, attempt = attempts, "Inner handler returned 502, retrying");
            tokio::time::sleep(self.config.poll_interval()).await;
            attempts += 1;
            capture = invoke(next, request).await;
        }

        (capture, attempts)
    }
}

async fn invoke(next: &dyn Handler, request: &Request<Bytes>) -> ResponseCapture {
    let mut capture = ResponseCapture::new();
    next.serve(&mut capture, request).await;
    capture
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::LookupError;
    use axum::http::HeaderValue;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    fn config(dependencies: &[&str], timeout_ms: u64, poll_interval_ms: u64) -> GateConfig {
        GateConfig {
            name: "test-gate".into(),
            dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
            timeout_ms,
            poll_interval_ms,
        }
    }

    fn request() -> Request<Bytes> {
        Request::builder().uri("/orders").body(Bytes::new()).unwrap()
    }

    fn ok_handler(sink: &mut dyn ResponseSink, _: &Request<Bytes>) {
        sink.write_status(StatusCode::OK);
        let _ = sink.write_body(Bytes::from_static(b"ok"));
    }

    /// Counts lookups per dependency and answers from a fixed table.
    struct TableLookup {
        table: HashMap<&'static str, &'static str>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl StatusLookup for TableLookup {
        async fn status(&self, dependency: &str) -> Result<String, LookupError> {
            self.calls.lock().unwrap().push(dependency.to_string());
            match self.table.get(dependency) {
                Some(&"boom") => Err(LookupError::Other(format!("{} lookup exploded", dependency))),
                Some(status) => Ok(status.to_string()),
                None => Ok(String::new()),
            }
        }
    }

    #[tokio::test]
    async fn test_empty_dependency_list_forwards_immediately() {
        let gate = BlockingGate::new(config(&[], 1_000, 500), Arc::new(|_: &str| -> Result<String, LookupError> {
            panic!("no dependency should be looked up")
        }));

        let started = Instant::now();
        let mut sink = ResponseCapture::new();
        let outcome = gate.handle(&request(), &ok_handler, &mut sink).await;

        assert!(started.elapsed() < Duration::from_millis(500));
        assert!(matches!(outcome, GateOutcome::Relayed { attempts: 1, polls: 1, .. }));
        assert_eq!(sink.status_code(), Some(StatusCode::OK));
        assert_eq!(sink.body().as_ref(), b"ok");
    }

    #[tokio::test]
    async fn test_all_started_forwards_on_first_pass() {
        let lookup = Arc::new(TableLookup {
            table: HashMap::from([("db", "started"), ("cache", "started")]),
            calls: Mutex::new(Vec::new()),
        });
        let gate = BlockingGate::new(config(&["db", "cache"], 1_000, 500), lookup.clone());

        let started = Instant::now();
        let mut sink = ResponseCapture::new();
        let outcome = gate.handle(&request(), &ok_handler, &mut sink).await;

        assert!(started.elapsed() < Duration::from_millis(500));
        assert!(matches!(outcome, GateOutcome::Relayed { polls: 1, .. }));
        assert_eq!(*lookup.calls.lock().unwrap(), vec!["db", "cache"]);
    }

    #[tokio::test]
    async fn test_lookup_error_fails_fast_with_500() {
        let lookup = Arc::new(TableLookup {
            table: HashMap::from([("db", "starting"), ("mq", "boom"), ("cache", "started")]),
            calls: Mutex::new(Vec::new()),
        });
        let gate = BlockingGate::new(config(&["db", "mq", "cache"], 5_000, 50), lookup.clone());

        let mut sink = ResponseCapture::new();
        let outcome = gate.handle(&request(), &ok_handler, &mut sink).await;

        assert!(matches!(outcome, GateOutcome::Failed(GateError::Lookup(_))));
        assert_eq!(sink.status_code(), Some(StatusCode::INTERNAL_SERVER_ERROR));
        let body: serde_json::Value = serde_json::from_slice(sink.body()).unwrap();
        assert_eq!(body["serviceName"], "test-gate");
        assert_eq!(body["error"], "mq lookup exploded");
        // The pass stops at the failing dependency.
        assert_eq!(*lookup.calls.lock().unwrap(), vec!["db", "mq"]);
    }

    #[tokio::test]
    async fn test_status_must_match_exactly() {
        for status in ["Started", "started ", "", "running"] {
            let lookup = move |_: &str| -> Result<String, LookupError> { Ok(status.to_string()) };
            let gate = BlockingGate::new(config(&["db"], 60, 20), Arc::new(lookup));

            let mut sink = ResponseCapture::new();
            let outcome = gate.handle(&request(), &ok_handler, &mut sink).await;
            assert!(matches!(outcome, GateOutcome::Failed(GateError::Timeout { .. })), "status {:?}", status);
        }
    }

    #[tokio::test]
    async fn test_never_ready_times_out_with_503() {
        let lookup = |_: &str| -> Result<String, LookupError> { Ok("starting".into()) };
        let gate = BlockingGate::new(config(&["db"], 200, 50), Arc::new(lookup));

        let started = Instant::now();
        let mut sink = ResponseCapture::new();
        let outcome = gate.handle(&request(), &ok_handler, &mut sink).await;

        assert!(started.elapsed() >= Duration::from_millis(200));
        assert!(matches!(outcome, GateOutcome::Failed(GateError::Timeout { .. })));
        assert_eq!(sink.status_code(), Some(StatusCode::SERVICE_UNAVAILABLE));
        let body: serde_json::Value = serde_json::from_slice(sink.body()).unwrap();
        assert_eq!(body["error"], "Service was unreachable within 200ms");
    }

    #[tokio::test]
    async fn test_becomes_ready_after_a_few_polls() {
        let polls = Arc::new(AtomicU32::new(0));
        let counter = polls.clone();
        let lookup = move |_: &str| -> Result<String, LookupError> {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Ok("starting".into())
            } else {
                Ok("started".into())
            }
        };
        let gate = BlockingGate::new(config(&["db"], 2_000, 20), Arc::new(lookup));

        let mut sink = ResponseCapture::new();
        let outcome = gate.handle(&request(), &ok_handler, &mut sink).await;

        assert!(matches!(outcome, GateOutcome::Relayed { polls: 3, attempts: 1, .. }));
        assert_eq!(sink.status_code(), Some(StatusCode::OK));
    }

    #[tokio::test]
    async fn test_bad_gateway_is_retried_until_success() {
        let calls = AtomicU32::new(0);
        let handler = |sink: &mut dyn ResponseSink, _: &Request<Bytes>| {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                sink.write_status(StatusCode::BAD_GATEWAY);
                let _ = sink.write_body(Bytes::from_static(b"upstream down"));
            } else {
                sink.headers_mut().insert("x-attempt", HeaderValue::from_static("second"));
                sink.write_status(StatusCode::OK);
                let _ = sink.write_body(Bytes::from_static(b"fresh"));
            }
        };
        let gate = BlockingGate::new(config(&[], 1_000, 20), Arc::new(|_: &str| -> Result<String, LookupError> {
            Ok("started".into())
        }));

        let mut sink = ResponseCapture::new();
        let outcome = gate.handle(&request(), &handler, &mut sink).await;

        assert!(matches!(outcome, GateOutcome::Relayed { status, attempts: 2, .. } if status == StatusCode::OK));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(sink.headers().get("x-attempt").unwrap(), "second");
        assert_eq!(sink.body().as_ref(), b"fresh");
    }

    #[tokio::test]
    async fn test_persistent_bad_gateway_is_relayed_not_escalated() {
        let calls = AtomicU32::new(0);
        let handler = |sink: &mut dyn ResponseSink, _: &Request<Bytes>| {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            sink.headers_mut().insert("x-attempt", HeaderValue::from(n));
            sink.write_status(StatusCode::BAD_GATEWAY);
            let _ = sink.write_body(Bytes::from(format!("attempt {}", n)));
        };
        let gate = BlockingGate::new(config(&[], 150, 30), Arc::new(|_: &str| -> Result<String, LookupError> {
            Ok("started".into())
        }));

        let mut sink = ResponseCapture::new();
        let outcome = gate.handle(&request(), &handler, &mut sink).await;

        let total = calls.load(Ordering::SeqCst);
        assert!(total > 1);
        assert_eq!(outcome.status(), StatusCode::BAD_GATEWAY);
        assert!(matches!(outcome, GateOutcome::Relayed { attempts, .. } if attempts == total));
        assert_eq!(sink.status_code(), Some(StatusCode::BAD_GATEWAY));
        assert_eq!(sink.headers().get("x-attempt").unwrap(), &HeaderValue::from(total));
        assert_eq!(sink.body().as_ref(), format!("attempt {}", total).as_bytes());
    }

    #[tokio::test]
    async fn test_non_502_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let handler = |sink: &mut dyn ResponseSink, _: &Request<Bytes>| {
            calls.fetch_add(1, Ordering::SeqCst);
            sink.write_status(StatusCode::SERVICE_UNAVAILABLE);
        };
        let gate = BlockingGate::new(config(&[], 1_000, 20), Arc::new(|_: &str| -> Result<String, LookupError> {
            Ok("started".into())
        }));

        let mut sink = ResponseCapture::new();
        gate.handle(&request(), &handler, &mut sink).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(sink.status_code(), Some(StatusCode::SERVICE_UNAVAILABLE));
    }

    /// A sink whose connection went away before the body could be sent.
    #[derive(Default)]
    struct ClosedSink {
        headers: axum::http::HeaderMap,
        status: Option<StatusCode>,
    }

    impl ResponseSink for ClosedSink {
        fn headers_mut(&mut self) -> &mut axum::http::HeaderMap {
            &mut self.headers
        }

        fn write_status(&mut self, status: StatusCode) {
            self.status = Some(status);
        }

        fn write_body(&mut self, _: Bytes) -> Result<usize, crate::gate::capture::SinkError> {
            Err(crate::gate::capture::SinkError::Finalized)
        }
    }

    #[tokio::test]
    async fn test_sink_write_failure_still_reports_outcome() {
        let gate = BlockingGate::new(config(&[], 1_000, 10), Arc::new(|_: &str| -> Result<String, LookupError> {
            Ok("started".into())
        }));

        let mut sink = ClosedSink::default();
        let outcome = gate.handle(&request(), &ok_handler, &mut sink).await;

        assert_eq!(outcome.status(), StatusCode::OK);
        assert_eq!(sink.status, Some(StatusCode::OK));
    }
}
