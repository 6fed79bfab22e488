//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, timeout)
//!     → gate (readiness polling, 502 retries)
//!     → upstream.rs (forward to the configured downstream)
//!     → response.rs (real sink the gate writes once)
//!     → Send to client
//! ```

pub mod response;
pub mod server;
pub mod upstream;

pub use response::ResponseWriter;
pub use server::HttpServer;
