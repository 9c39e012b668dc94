//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events with structured fields
//!     → request spans from TraceLayer (method, URI)
//!
//! Consumers:
//!     → logging.rs subscriber (stdout)
//! ```

pub mod logging;

pub use logging::init_logging;
