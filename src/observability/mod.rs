//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! gate, lookups, server:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Prometheus scrape endpoint
//! ```
//!
//! # Design Decisions
//! - Request ID flows through tower-http's trace spans
//! - Metrics are optional; recording without a recorder costs nothing

pub mod logging;
pub mod metrics;
