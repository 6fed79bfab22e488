//! Readiness gate subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → layer.rs (buffer body, hand to the gate)
//!     → blocking.rs (poll dependencies via health::lookup)
//!         → all "started": handler.rs invokes the inner service
//!             against a fresh capture.rs, retrying while it answers 502
//!         → replay capture onto the real sink
//!     → lookup error / deadline: error.rs writes JSON 500 / 503
//! ```
//!
//! # Design Decisions
//! - One deadline window covers polling and 502 retries
//! - Fixed interval for both sleeps, no jitter
//! - A 502 still present at the deadline is relayed, not converted to 503
//! - The gate holds no per-request state; captures are owned by the request

pub mod blocking;
pub mod capture;
pub mod error;
pub mod handler;
pub mod layer;

pub use blocking::{BlockingGate, GateOutcome};
pub use capture::{ResponseCapture, ResponseSink, SinkError};
pub use error::{ErrorBody, GateError};
pub use handler::{Handler, ServiceHandler};
pub use layer::{GateLayer, GateService};
