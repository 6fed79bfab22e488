//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!
//! Shutdown (shutdown.rs):
//!     trigger() → server stops accepting → in-flight gated requests finish → exit
//! ```
//!
//! # Design Decisions
//! - Requests blocked in the gate are drained, not cancelled

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
