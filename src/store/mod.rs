//! Backing store capability.
//!
//! # Data Flow
//! ```text
//! cli --database-type
//!     → open() (backend factory by name)
//!     → Arc<dyn Store> handed to the server as a shared reference
//!     → handlers reach it through State<AppState>
//! ```
//!
//! # Design Decisions
//! - The server only calls `ping`/`close`; persistence lives in the backend
//! - The caller owns the store lifecycle, the server never closes it

pub mod mock;

use std::sync::Arc;

pub use mock::MockStore;

/// Errors surfaced by a store backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Wanted data does not exist.
    #[error("not found")]
    NotFound,
    /// A write would create conflicting duplicate data.
    #[error("duplicate")]
    Duplicate,
    /// The backend connection is unavailable.
    #[error("connection failed")]
    ConnectionFailed,
    /// No backend is registered under the requested name.
    #[error("unknown database type {0}")]
    UnknownBackend(String),
}

/// Capability every backing store exposes to the server.
pub trait Store: Send + Sync + 'static {
    /// Touch the backend to verify it is reachable.
    fn ping(&self) -> Result<(), StoreError>;

    /// Release the backend connection.
    fn close(&self);
}

/// Open a store backend by its configured name.
pub fn open(database_type: &str) -> Result<Arc<dyn Store>, StoreError> {
    match database_type {
        "mock" => Ok(Arc::new(MockStore::new())),
        other => Err(StoreError::UnknownBackend(other.to_string())),
    }
}
