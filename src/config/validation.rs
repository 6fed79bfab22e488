//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and cross-field
//! constraints. Every violation is reported, not just the first.

use axum::http::uri::Authority;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::str::FromStr;
use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::health::lookup::SERVICE_PLACEHOLDER;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.gate.name.trim().is_empty() {
        errors.push(ValidationError::new("gate.name", "must not be empty"));
    }
    if config.gate.timeout_ms == 0 {
        errors.push(ValidationError::new("gate.timeout_ms", "must be greater than zero"));
    }
    if config.gate.poll_interval_ms == 0 {
        errors.push(ValidationError::new("gate.poll_interval_ms", "must be greater than zero"));
    }

    let mut seen = HashSet::new();
    for dependency in &config.gate.dependencies {
        if dependency.trim().is_empty() {
            errors.push(ValidationError::new("gate.dependencies", "identifiers must not be blank"));
        } else if !seen.insert(dependency.as_str()) {
            errors.push(ValidationError::new(
                "gate.dependencies",
                format!("duplicate identifier '{}'", dependency),
            ));
        }
    }

    if !config.gate.dependencies.is_empty() && !config.status.url_template.contains(SERVICE_PLACEHOLDER) {
        errors.push(ValidationError::new(
            "status.url_template",
            format!("must contain the {} placeholder", SERVICE_PLACEHOLDER),
        ));
    }
    if config.status.timeout_ms == 0 {
        errors.push(ValidationError::new("status.timeout_ms", "must be greater than zero"));
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    // Host names are fine here; the forwarder resolves them per request.
    if Authority::from_str(&config.upstream.address).is_err() {
        errors.push(ValidationError::new(
            "upstream.address",
            format!("'{}' is not a valid authority", config.upstream.address),
        ));
    }
    if config.upstream.max_response_bytes == 0 {
        errors.push(ValidationError::new("upstream.max_response_bytes", "must be greater than zero"));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    // The outer timeout would otherwise cut the gate off before its own deadline fires.
    if config.timeouts.request_secs.saturating_mul(1000) <= config.gate.timeout_ms {
        errors.push(ValidationError::new(
            "timeouts.request_secs",
            "must be longer than gate.timeout_ms",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
