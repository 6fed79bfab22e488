//! Gate-level failures and their wire encoding.

use axum::body::Bytes;
use axum::http::{header, HeaderValue, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::gate::capture::{ResponseSink, SinkError};
use crate::health::LookupError;

/// Failures synthesized by the gate itself.
///
/// Downstream 502s are not gate errors; they are relayed as-is.
#[derive(Debug, Error)]
pub enum GateError {
    /// A dependency status could not be looked up.
    #[error("{0}")]
    Lookup(#[from] LookupError),

    /// Dependencies did not all report ready before the deadline.
    #[error("Service was unreachable within {deadline:?}")]
    Timeout { deadline: Duration },
}

impl GateError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GateError::Lookup(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GateError::Timeout { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            GateError::Lookup(_) => "lookup_error",
            GateError::Timeout { .. } => "timeout",
        }
    }
}

/// JSON body written for a gate failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub service_name: String,
    pub error: String,
}

/// Write `error` straight to the real sink as a JSON failure response.
pub fn write_error(
    sink: &mut dyn ResponseSink,
    gate_name: &str,
    error: &GateError,
) -> Result<usize, SinkError> {
    let body = ErrorBody {
        service_name: gate_name.to_string(),
        error: error.to_string(),
    };
    // Two string fields cannot fail to serialize.
    let encoded = serde_json::to_vec(&body).unwrap_or_default();

    sink.headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    sink.write_status(error.status_code());
    sink.write_body(Bytes::from(encoded))
}
