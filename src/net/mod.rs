//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Server::run()
//!     → timeout.rs (head and idle deadlines on every connection)
//!     → plain TCP, or tls.rs (ACME acceptor, certificates on demand)
//!     → HTTP layer
//! ```

pub mod timeout;
pub mod tls;

pub use timeout::{ConnTimeouts, TimeoutAcceptor};
pub use tls::AutoCert;
