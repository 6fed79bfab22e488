//! Dependency status lookup.
//!
//! # Responsibilities
//! - Resolve a dependency identifier to its reported status string
//! - Distinguish "could not ask" (an error) from "asked, not ready" (a status)
//!
//! A lookup error is fatal for the request that triggered it; the gate never
//! retries one. Status strings are compared verbatim against [`READY_STATUS`].

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, uri::InvalidUri, Request, StatusCode, Uri};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tokio::time;

use crate::config::StatusLookupConfig;

/// The only status value that counts as ready.
pub const READY_STATUS: &str = "started";

/// Placeholder substituted with the dependency id in [`StatusLookupConfig::url_template`].
pub const SERVICE_PLACEHOLDER: &str = "{service}";

const MAX_STATUS_BODY: usize = 64 * 1024;

/// Errors raised when a status could not be obtained at all.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("invalid status url '{url}': {source}")]
    InvalidUrl { url: String, source: InvalidUri },

    #[error("failed to build status request for '{url}': {source}")]
    Request { url: String, source: axum::http::Error },

    #[error("status request to {url} failed: {source}")]
    Transport {
        url: String,
        source: hyper_util::client::legacy::Error,
    },

    #[error("status request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("status endpoint {url} returned {status}")]
    UnexpectedStatus { url: String, status: StatusCode },

    #[error("failed to read status body from {url}: {source}")]
    Body { url: String, source: axum::Error },

    #[error("invalid status payload from {url}: {source}")]
    Decode { url: String, source: serde_json::Error },

    /// Free-form failure from a custom lookup.
    #[error("{0}")]
    Other(String),
}

/// Looks up the current status of a single dependency.
#[async_trait]
pub trait StatusLookup: Send + Sync {
    async fn status(&self, dependency: &str) -> Result<String, LookupError>;
}

#[async_trait]
impl<F> StatusLookup for F
where
    F: Fn(&str) -> Result<String, LookupError> + Send + Sync,
{
    async fn status(&self, dependency: &str) -> Result<String, LookupError> {
        self(dependency)
    }
}

#[derive(Debug, Deserialize)]
struct StatusPayload {
    status: String,
}

/// Status lookup over HTTP.
///
/// `GET`s the configured URL template with the dependency id substituted and
/// expects a JSON body of the form `{"status": "started"}`.
#[derive(Clone)]
pub struct HttpStatusLookup {
    url_template: String,
    timeout: Duration,
    client: Client<HttpConnector, Body>,
}

impl HttpStatusLookup {
    pub fn new(config: &StatusLookupConfig) -> Self {
        let client = Client::builder(TokioExecutor::new())
            .build(HttpConnector::new());

        Self {
            url_template: config.url_template.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
            client,
        }
    }

    /// The status URL for a dependency.
    pub fn url_for(&self, dependency: &str) -> String {
        self.url_template.replace(SERVICE_PLACEHOLDER, dependency)
    }
}

#[async_trait]
impl StatusLookup for HttpStatusLookup {
    async fn status(&self, dependency: &str) -> Result<String, LookupError> {
        let url = self.url_for(dependency);
        let uri: Uri = url
            .parse()
            .map_err(|source| LookupError::InvalidUrl { url: url.clone(), source })?;

        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .header(header::ACCEPT, "application/json")
            .header(header::USER_AGENT, "readiness-gate-status-check")
            .body(Body::empty())
            .map_err(|source| LookupError::Request { url: url.clone(), source })?;

        let response = match time::timeout(self.timeout, self.client.request(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(source)) => return Err(LookupError::Transport { url, source }),
            Err(_) => return Err(LookupError::Timeout { url, timeout: self.timeout }),
        };

        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::UnexpectedStatus { url, status });
        }

        let bytes = axum::body::to_bytes(Body::new(response.into_body()), MAX_STATUS_BODY)
            .await
            .map_err(|source| LookupError::Body { url: url.clone(), source })?;
        let payload: StatusPayload = serde_json::from_slice(&bytes)
            .map_err(|source| LookupError::Decode { url: url.clone(), source })?;

        tracing::trace!(dependency = %dependency, status = %payload.status, "Status lookup completed");
        Ok(payload.status)
    }
}
