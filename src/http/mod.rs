//! HTTP service subsystem.
//!
//! # Data Flow
//! ```text
//! Server::new(address, options)
//!     → option.rs (ordered mutations, one-shot route options)
//!     → route.rs (prefixed route groups + middleware chains)
//! Server::run()
//!     → server.rs (layered service, background accept loop)
//!     → middleware/ (trace, recovery, method override, deadlines)
//!     → handler
//!         → context.rs (method, URL, headers, client IP)
//!         → error.rs (category → status + JSON body)
//! ```

pub mod context;
pub mod debug;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod option;
pub mod route;
pub mod server;

pub use context::RequestContext;
pub use error::{ApiError, ErrorKind};
pub use option::{OptionKind, OptionRegistry, ServerOption};
pub use route::{Middleware, Route, RouteMethod};
pub use server::{
    AppState, Server, ServerError, IDLE_TIMEOUT, READ_TIMEOUT, SHUTDOWN_TIMEOUT, WRITE_TIMEOUT,
};
