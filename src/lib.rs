//! Readiness gate: an HTTP middleware that holds requests until their
//! dependencies report `started`, retries downstream 502s, and bounds both
//! phases by one deadline.

pub mod config;
pub mod gate;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::schema::ProxyConfig;
pub use gate::{BlockingGate, GateLayer, GateOutcome};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
