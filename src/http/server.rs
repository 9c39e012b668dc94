//! HTTP server setup and lifecycle.
//!
//! # Responsibilities
//! - Apply options in order to build the route table
//! - Wire up middleware (trace, panic recovery, method override, deadlines)
//! - Start the accept loop in the background, plain or TLS via auto-cert
//! - Drain in-flight requests on stop, bounded by a deadline

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::Request,
    middleware,
    Router, ServiceExt,
};
use axum_server::{accept::DefaultAcceptor, Handle};
use hyper_util::{rt::TokioExecutor, server::conn::auto::Builder};
use tower::Layer;
use tower_http::{
    catch_panic::CatchPanic,
    classify::{ServerErrorsAsFailures, SharedClassifier},
    timeout::RequestBodyTimeoutLayer,
    trace::{Trace, TraceLayer},
};

use crate::http::handlers::not_found;
use crate::http::middleware::{
    recovery_layer, response_deadline, MethodOverride, MethodOverrideLayer, PanicResponder,
};
use crate::http::option::{OptionRegistry, ServerOption};
use crate::http::route::{self, Middleware, Route};
use crate::lifecycle::state::{LifecycleCell, Running};
use crate::lifecycle::ServerState;
use crate::net::timeout::{ConnTimeouts, TimeoutAcceptor};
use crate::net::tls::AutoCert;
use crate::store::Store;

/// Time allowed to receive a request head, and separately its body.
pub const READ_TIMEOUT: Duration = Duration::from_secs(10);
/// Time allowed for a handler to produce its response.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(30);
/// Time a keep-alive connection may wait for its next request.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(120);
/// Graceful drain deadline used by [`Server::stop`].
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
/// Extra wait for the accept loop to exit once connections are force-closed.
const FORCE_CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Fully layered service handed to the transport.
pub type App = Trace<
    CatchPanic<MethodOverride<Router>, PanicResponder>,
    SharedClassifier<ServerErrorsAsFailures>,
>;

/// Errors from the server lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("listen address is empty")]
    EmptyAddress,
    #[error("server must be started inside a tokio runtime")]
    NoRuntime,
    #[error("invalid listen address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },
    #[error("server is already running")]
    AlreadyRunning,
    #[error("server has been stopped")]
    Stopped,
    #[error("serve error: {0}")]
    Serve(#[from] std::io::Error),
    #[error("server task failed: {0}")]
    Task(String),
    #[error("{open} connection(s) not drained within {deadline:?}, closed")]
    DrainTimeout { deadline: Duration, open: usize },
}

/// Application state injected into handlers.
#[derive(Clone, Default)]
pub struct AppState {
    pub(crate) store: Option<Arc<dyn Store>>,
}

impl AppState {
    /// The attached store, if any.
    pub fn store(&self) -> Option<&Arc<dyn Store>> {
        self.store.as_ref()
    }
}

/// HTTP service bootstrap.
///
/// Build with [`Server::new`] and a list of [`ServerOption`]s, register
/// routes, then [`run`](Server::run) and later [`stop`](Server::stop).
pub struct Server {
    pub(crate) address: String,
    pub(crate) router: Router<AppState>,
    pub(crate) state: AppState,
    pub(crate) auto_cert: Option<AutoCert>,
    pub(crate) method_override: bool,
    registry: Arc<OptionRegistry>,
    lifecycle: LifecycleCell,
}

impl Server {
    /// Build a server using the process-wide option registry.
    pub fn new(address: impl Into<String>, options: impl IntoIterator<Item = ServerOption>) -> Self {
        Self::with_registry(address, OptionRegistry::global(), options)
    }

    /// Build a server whose one-shot options are tracked by `registry`.
    pub fn with_registry(
        address: impl Into<String>,
        registry: Arc<OptionRegistry>,
        options: impl IntoIterator<Item = ServerOption>,
    ) -> Self {
        let mut server = Self {
            address: address.into(),
            router: Router::new(),
            state: AppState::default(),
            auto_cert: None,
            method_override: false,
            registry,
            lifecycle: LifecycleCell::new(),
        };
        for option in options {
            option.apply(&mut server);
        }
        server
    }

    /// Register `routes` under `prefix`, wrapped by `middlewares`.
    ///
    /// Register everything before [`run`](Self::run): the running service
    /// is built from the route table at that moment.
    pub fn add_routes(&mut self, prefix: &str, middlewares: Vec<Box<dyn Middleware>>, routes: Vec<Route>) {
        let router = std::mem::take(&mut self.router);
        self.router = route::mount(router, prefix, &middlewares, routes);
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn store(&self) -> Option<&Arc<dyn Store>> {
        self.state.store()
    }

    pub fn auto_cert(&self) -> Option<&AutoCert> {
        self.auto_cert.as_ref()
    }

    pub fn method_override_enabled(&self) -> bool {
        self.method_override
    }

    pub fn registry(&self) -> &Arc<OptionRegistry> {
        &self.registry
    }

    pub fn state(&self) -> ServerState {
        self.lifecycle.state()
    }

    pub fn is_running(&self) -> bool {
        self.state() == ServerState::Running
    }

    /// Address the accept loop is bound to, once it is listening.
    /// `None` if the server is not running or failed to resolve or bind.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        let handle = self.lifecycle.handle()?;
        tokio::select! {
            biased;
            addr = handle.listening() => addr,
            () = self.lifecycle.finished() => None,
        }
    }

    /// Build the service: routes, fallbacks and every middleware layer.
    pub fn app(&self) -> App {
        let router = self
            .router
            .clone()
            .method_not_allowed_fallback(not_found)
            .fallback(not_found)
            .with_state(self.state.clone())
            .layer(middleware::from_fn(response_deadline))
            .layer(RequestBodyTimeoutLayer::new(READ_TIMEOUT));

        let service = MethodOverrideLayer::new(self.method_override).layer(router);
        let service = recovery_layer().layer(service);
        TraceLayer::new_for_http().layer(service)
    }

    /// Start serving in the background and return immediately.
    ///
    /// Must be called inside a tokio runtime. Resolving, binding and
    /// accepting happen on the background task: failures there are logged
    /// and leave the server `Stopped`. With auto-cert enabled but no domain
    /// configured nothing is served and the server stays `Created`.
    pub fn run(&self) -> Result<(), ServerError> {
        split_host_port(&self.address)?;

        if let Some(auto_cert) = &self.auto_cert {
            if auto_cert.domains().is_empty() {
                tracing::warn!(address = %self.address, "Auto-cert enabled without any domain, not serving");
                return Ok(());
            }
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| ServerError::NoRuntime)?;
        let app = self.app();
        let address = self.address.clone();
        let auto_cert = self.auto_cert.clone();
        let lifecycle = self.lifecycle.clone();
        self.lifecycle.begin(|| {
            let handle = Handle::new();
            let task = runtime.spawn(serve(address, app, auto_cert, handle.clone(), lifecycle));
            Running { handle, task }
        })
    }

    /// Stop serving.
    ///
    /// New connections are refused at once and in-flight requests get
    /// [`SHUTDOWN_TIMEOUT`] to finish. Connections still open at the
    /// deadline are closed and reported as [`ServerError::DrainTimeout`].
    /// A no-op when the server is not running.
    pub async fn stop(&self) -> Result<(), ServerError> {
        let Some(Running { handle, mut task }) = self.lifecycle.take_running() else {
            tracing::debug!("Stop server: server is not running");
            return Ok(());
        };

        tracing::info!(address = %self.address, deadline = ?SHUTDOWN_TIMEOUT, "Stopping server");
        handle.graceful_shutdown(None);

        if let Ok(joined) = tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut task).await {
            return match joined {
                Ok(result) => result.map_err(ServerError::Serve),
                Err(e) => Err(ServerError::Task(e.to_string())),
            };
        }

        let open = handle.connection_count();
        tracing::warn!(open, deadline = ?SHUTDOWN_TIMEOUT, "Drain deadline elapsed, closing connections");
        handle.shutdown();
        if tokio::time::timeout(FORCE_CLOSE_GRACE, &mut task).await.is_err() {
            task.abort();
        }
        Err(ServerError::DrainTimeout {
            deadline: SHUTDOWN_TIMEOUT,
            open,
        })
    }
}

/// Split `host:port`. An empty host means every interface; brackets around
/// an IPv6 host are removed.
fn split_host_port(address: &str) -> Result<(&str, u16), ServerError> {
    if address.is_empty() {
        return Err(ServerError::EmptyAddress);
    }
    let invalid = |reason: String| ServerError::InvalidAddress {
        address: address.to_string(),
        reason,
    };

    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| invalid("expected host:port".into()))?;
    let port = port
        .parse::<u16>()
        .map_err(|e| invalid(format!("invalid port: {e}")))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    Ok((if host.is_empty() { "0.0.0.0" } else { host }, port))
}

async fn resolve(address: &str) -> io::Result<SocketAddr> {
    let (host, port) = split_host_port(address)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
    tokio::net::lookup_host((host, port)).await?.next().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("{address} resolved to no socket address"),
        )
    })
}

/// Accept loop. Runs until shut down through `handle` or a listener error.
async fn serve(
    address: String,
    app: App,
    auto_cert: Option<AutoCert>,
    handle: Handle,
    lifecycle: LifecycleCell,
) -> io::Result<()> {
    let result = match resolve(&address).await {
        Ok(addr) => listen(addr, app, auto_cert, handle).await,
        Err(e) => Err(e),
    };

    match &result {
        Ok(()) => tracing::info!(address = %address, "HTTP server stopped"),
        Err(e) => tracing::error!(address = %address, error = %e, "Listen error"),
    }
    lifecycle.finish();
    result
}

async fn listen(
    addr: SocketAddr,
    app: App,
    auto_cert: Option<AutoCert>,
    handle: Handle,
) -> io::Result<()> {
    let make_service =
        ServiceExt::<Request<Body>>::into_make_service_with_connect_info::<SocketAddr>(app);
    let timeouts = ConnTimeouts {
        head: READ_TIMEOUT,
        idle: IDLE_TIMEOUT,
    };

    match auto_cert {
        Some(auto_cert) => {
            let (acceptor, events) = auto_cert.acceptor();
            let mut server = axum_server::bind(addr)
                .acceptor(TimeoutAcceptor::new(acceptor, timeouts))
                .handle(handle);
            configure_http(server.http_builder());

            tracing::info!(address = %addr, domains = ?auto_cert.domains(), "Listening with auto-cert TLS");
            let result = server.serve(make_service).await;
            events.abort();
            result
        }
        None => {
            let mut server = axum_server::bind(addr)
                .acceptor(TimeoutAcceptor::new(DefaultAcceptor::new(), timeouts))
                .handle(handle);
            configure_http(server.http_builder());

            tracing::info!(address = %addr, "Listening");
            server.serve(make_service).await
        }
    }
}

fn configure_http(builder: &mut Builder<TokioExecutor>) {
    // hyper's header timer keeps running on idle keep-alive connections;
    // head and idle deadlines are enforced by the connection stream.
    builder.http1().header_read_timeout(None);
}
