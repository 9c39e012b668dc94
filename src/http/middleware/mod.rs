//! Request middleware.
//!
//! # Data Flow
//! ```text
//! connection
//!     → TraceLayer (request span)
//!     → recovery.rs (panic → 500 InternalServerError)
//!     → method_override.rs (X-HTTP-Method-Override, before routing)
//!     → Router
//!         → body read deadline (READ_TIMEOUT)
//!         → deadline.rs (WRITE_TIMEOUT → 504 TimeoutError)
//!         → handler
//! ```

pub mod deadline;
pub mod method_override;
pub mod recovery;

pub use deadline::response_deadline;
pub use method_override::{MethodOverride, MethodOverrideLayer, X_HTTP_METHOD_OVERRIDE};
pub use recovery::{recovery_layer, PanicResponder};
