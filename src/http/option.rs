//! Functional server options.
//!
//! Options are applied in order while the server is built; later options
//! overwrite fields written by earlier ones. Options with a side effect on
//! the shared route table (ping, debug routes, method override) claim a
//! one-shot flag in an [`OptionRegistry`] first, so they take effect at most
//! once per registry however many servers are built with them.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use crate::config::ServiceConfig;
use crate::http::debug;
use crate::http::handlers::ping;
use crate::http::route::Route;
use crate::http::server::Server;
use crate::net::tls::AutoCert;
use crate::store::Store;

/// Options whose side effect must happen at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionKind {
    MethodOverride,
    PingRoute,
    DebugRoutes,
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OptionKind::MethodOverride => "method-override",
            OptionKind::PingRoute => "ping-route",
            OptionKind::DebugRoutes => "debug-routes",
        };
        f.write_str(name)
    }
}

/// One-shot guards for [`OptionKind`]s.
///
/// Servers built with [`Server::new`] share the process-wide registry from
/// [`OptionRegistry::global`]; tests pass their own through
/// [`Server::with_registry`] or call [`OptionRegistry::reset`].
#[derive(Debug, Default)]
pub struct OptionRegistry {
    method_override: AtomicBool,
    ping_route: AtomicBool,
    debug_routes: AtomicBool,
}

impl OptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry shared by every server in this process.
    pub fn global() -> Arc<OptionRegistry> {
        static GLOBAL: OnceLock<Arc<OptionRegistry>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(OptionRegistry::new())).clone()
    }

    /// Claim `kind`. Returns `true` only for the first claim since creation
    /// or the last [`reset`](Self::reset).
    pub fn claim(&self, kind: OptionKind) -> bool {
        !self.flag(kind).swap(true, Ordering::AcqRel)
    }

    pub fn is_applied(&self, kind: OptionKind) -> bool {
        self.flag(kind).load(Ordering::Acquire)
    }

    /// Clear every guard.
    pub fn reset(&self) {
        for flag in [&self.method_override, &self.ping_route, &self.debug_routes] {
            flag.store(false, Ordering::Release);
        }
    }

    fn flag(&self, kind: OptionKind) -> &AtomicBool {
        match kind {
            OptionKind::MethodOverride => &self.method_override,
            OptionKind::PingRoute => &self.ping_route,
            OptionKind::DebugRoutes => &self.debug_routes,
        }
    }
}

/// A configuration step applied to a [`Server`] under construction.
pub struct ServerOption(Box<dyn FnOnce(&mut Server) + Send>);

impl ServerOption {
    fn new(f: impl FnOnce(&mut Server) + Send + 'static) -> Self {
        Self(Box::new(f))
    }

    pub(crate) fn apply(self, server: &mut Server) {
        (self.0)(server)
    }
}

impl fmt::Debug for ServerOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ServerOption")
    }
}

/// Overwrite the listen address.
pub fn address(address: impl Into<String>) -> ServerOption {
    let address = address.into();
    ServerOption::new(move |server| server.address = address)
}

/// Attach a store. The server shares it and never closes it.
pub fn store(store: Arc<dyn Store>) -> ServerOption {
    ServerOption::new(move |server| server.state.store = Some(store))
}

/// Serve TLS with certificates provisioned on demand for `domains`.
///
/// An empty `cache_dir` disables the certificate cache. With no domains the
/// server will refuse to start serving at run time.
pub fn auto_cert<P, I, D>(cache_dir: P, domains: I) -> ServerOption
where
    P: Into<PathBuf>,
    I: IntoIterator<Item = D>,
    D: Into<String>,
{
    let auto_cert = AutoCert::new(cache_dir, domains);
    ServerOption::new(move |server| server.auto_cert = Some(auto_cert))
}

/// Let `X-HTTP-Method-Override` replace the request method before routing.
pub fn allow_method_override() -> ServerOption {
    ServerOption::new(|server| {
        if claim(server, OptionKind::MethodOverride) {
            server.method_override = true;
        }
    })
}

/// Register `GET /ping`.
pub fn ping_route() -> ServerOption {
    ServerOption::new(|server| {
        if claim(server, OptionKind::PingRoute) {
            server.add_routes("", Vec::new(), vec![Route::get("/ping", ping)]);
        }
    })
}

/// Register the `/debug` introspection routes.
pub fn debug_routes() -> ServerOption {
    ServerOption::new(|server| {
        if claim(server, OptionKind::DebugRoutes) {
            server.add_routes("", Vec::new(), debug::routes());
        }
    })
}

/// Options described by a service configuration, in application order.
pub fn from_config(config: &ServiceConfig, store: Arc<dyn Store>) -> Vec<ServerOption> {
    let mut options = vec![address(config.address.clone()), self::store(store)];
    if let Some(auto) = &config.auto_cert {
        options.push(auto_cert(
            auto.cache_dir.clone().unwrap_or_default(),
            auto.domains.clone(),
        ));
    }
    if config.features.method_override {
        options.push(allow_method_override());
    }
    if config.features.ping_route {
        options.push(ping_route());
    }
    if config.features.debug_routes {
        options.push(debug_routes());
    }
    options
}

fn claim(server: &Server, kind: OptionKind) -> bool {
    let claimed = server.registry().claim(kind);
    if !claimed {
        tracing::debug!(option = %kind, "Option already applied, skipping");
    }
    claimed
}
