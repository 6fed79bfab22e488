//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gate.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the gating proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Readiness gate parameters.
    pub gate: GateConfig,

    /// How dependency status is looked up.
    pub status: StatusLookupConfig,

    /// The single downstream the gate forwards to.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Blocking gate configuration.
///
/// Immutable once loaded and shared read-only by every request the gate handles.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GateConfig {
    /// Gate name reported in structured error bodies.
    pub name: String,

    /// Dependency identifiers checked on every poll pass, in order.
    pub dependencies: Vec<String>,

    /// Overall per-request deadline in milliseconds. Bounds both the readiness
    /// phase and the bad-gateway retry phase.
    pub timeout_ms: u64,

    /// Sleep between poll passes and between forwarding retries, in milliseconds.
    pub poll_interval_ms: u64,
}

impl GateConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            name: "readiness-gate".to_string(),
            dependencies: Vec::new(),
            timeout_ms: 30_000,
            poll_interval_ms: 1_000,
        }
    }
}

/// Status lookup configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StatusLookupConfig {
    /// URL template for a dependency's status endpoint. `{service}` is replaced
    /// by the dependency identifier.
    pub url_template: String,

    /// Timeout for a single status request in milliseconds.
    pub timeout_ms: u64,
}

impl Default for StatusLookupConfig {
    fn default() -> Self {
        Self {
            url_template: "http://127.0.0.1:9000/services/{service}/status".to_string(),
            timeout_ms: 5_000,
        }
    }
}

/// Downstream (upstream from the client's point of view) target.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Upstream authority, an IP or host name with port (e.g., "backend:3000").
    pub address: String,

    /// Largest request body buffered for replay across retries.
    pub max_body_bytes: usize,

    /// Largest upstream response body buffered before relaying.
    pub max_response_bytes: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:3000".to_string(),
            max_body_bytes: 1024 * 1024,
            max_response_bytes: 64 * 1024 * 1024,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Hard cap on total request time in seconds. Must exceed the gate deadline.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 60 }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
