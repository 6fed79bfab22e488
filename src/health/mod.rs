//! Dependency health subsystem.
//!
//! # Data Flow
//! ```text
//! gate poll pass
//!     → lookup.rs (StatusLookup::status per dependency)
//!     → "started" | other status | LookupError
//! ```
//!
//! # Design Decisions
//! - Health is asked on demand per request, never cached between requests
//! - Lookup failures are errors, not statuses
//! - Any status other than "started" is not ready, including unknown ones

pub mod lookup;

pub use lookup::{HttpStatusLookup, LookupError, StatusLookup, READY_STATUS};
