//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Run state (state.rs):
//!     Created ──run()──▶ Running ──stop() / accept loop exit──▶ Stopped
//!
//! Signals (signals.rs):
//!     SIGINT/SIGTERM → caller invokes Server::stop()
//! ```
//!
//! # Design Decisions
//! - One lock guards the whole run state; no separate running flag
//! - Stopped is terminal; stop() on a non-running server is a no-op
//! - Shutdown has a deadline: connections are force-closed after it

pub mod signals;
pub mod state;

pub use signals::shutdown_signal;
pub use state::ServerState;
