//! HTTP service bootstrap.
//!
//! Wires a listener, a router, a pluggable backing store, panic recovery,
//! structured error responses and optional automatic TLS behind a small
//! functional-options surface.

pub mod cli;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod store;

pub use config::ServiceConfig;
pub use http::{ApiError, ErrorKind, Route, RouteMethod, Server, ServerError, ServerOption};
pub use lifecycle::ServerState;
pub use store::{Store, StoreError};
