//! Route registration.
//!
//! A batch of routes shares a path prefix and a middleware chain. The
//! batch is built as its own router, wrapped by the middlewares, then
//! nested (or merged for an empty prefix) into the server's router.

use std::fmt;
use std::str::FromStr;

use axum::{
    handler::Handler,
    routing::{any, on, MethodFilter, MethodRouter},
    Router,
};

use crate::http::handlers::not_found;
use crate::http::server::AppState;

/// Methods a route can be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteMethod {
    Get,
    Post,
    Patch,
    Put,
    Delete,
    Options,
    /// Matches every method on the path.
    Any,
}

impl RouteMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            RouteMethod::Get => "GET",
            RouteMethod::Post => "POST",
            RouteMethod::Patch => "PATCH",
            RouteMethod::Put => "PUT",
            RouteMethod::Delete => "DELETE",
            RouteMethod::Options => "OPTIONS",
            RouteMethod::Any => "ANY",
        }
    }

    fn filter(self) -> Option<MethodFilter> {
        match self {
            RouteMethod::Get => Some(MethodFilter::GET),
            RouteMethod::Post => Some(MethodFilter::POST),
            RouteMethod::Patch => Some(MethodFilter::PATCH),
            RouteMethod::Put => Some(MethodFilter::PUT),
            RouteMethod::Delete => Some(MethodFilter::DELETE),
            RouteMethod::Options => Some(MethodFilter::OPTIONS),
            RouteMethod::Any => None,
        }
    }
}

impl fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error parsing a [`RouteMethod`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported route method {0}")]
pub struct UnknownMethod(pub String);

impl FromStr for RouteMethod {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(RouteMethod::Get),
            "POST" => Ok(RouteMethod::Post),
            "PATCH" => Ok(RouteMethod::Patch),
            "PUT" => Ok(RouteMethod::Put),
            "DELETE" => Ok(RouteMethod::Delete),
            "OPTIONS" => Ok(RouteMethod::Options),
            "ANY" => Ok(RouteMethod::Any),
            _ => Err(UnknownMethod(s.to_string())),
        }
    }
}

/// A (method, path, handler) triple.
pub struct Route {
    method: RouteMethod,
    path: String,
    handler: MethodRouter<AppState>,
}

impl Route {
    pub fn new<H, T>(method: RouteMethod, path: impl Into<String>, handler: H) -> Self
    where
        H: Handler<T, AppState>,
        T: 'static,
    {
        let handler = match method.filter() {
            Some(filter) => on(filter, handler),
            None => any(handler),
        };
        Self {
            method,
            path: path.into(),
            handler,
        }
    }

    pub fn get<H, T>(path: impl Into<String>, handler: H) -> Self
    where
        H: Handler<T, AppState>,
        T: 'static,
    {
        Self::new(RouteMethod::Get, path, handler)
    }

    pub fn post<H, T>(path: impl Into<String>, handler: H) -> Self
    where
        H: Handler<T, AppState>,
        T: 'static,
    {
        Self::new(RouteMethod::Post, path, handler)
    }

    pub fn patch<H, T>(path: impl Into<String>, handler: H) -> Self
    where
        H: Handler<T, AppState>,
        T: 'static,
    {
        Self::new(RouteMethod::Patch, path, handler)
    }

    pub fn put<H, T>(path: impl Into<String>, handler: H) -> Self
    where
        H: Handler<T, AppState>,
        T: 'static,
    {
        Self::new(RouteMethod::Put, path, handler)
    }

    pub fn delete<H, T>(path: impl Into<String>, handler: H) -> Self
    where
        H: Handler<T, AppState>,
        T: 'static,
    {
        Self::new(RouteMethod::Delete, path, handler)
    }

    pub fn options<H, T>(path: impl Into<String>, handler: H) -> Self
    where
        H: Handler<T, AppState>,
        T: 'static,
    {
        Self::new(RouteMethod::Options, path, handler)
    }

    pub fn any<H, T>(path: impl Into<String>, handler: H) -> Self
    where
        H: Handler<T, AppState>,
        T: 'static,
    {
        Self::new(RouteMethod::Any, path, handler)
    }

    pub fn method(&self) -> RouteMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Wraps a group of routes, e.g. with `Router::layer`.
pub trait Middleware: Send + Sync {
    fn apply(&self, router: Router<AppState>) -> Router<AppState>;
}

impl<F> Middleware for F
where
    F: Fn(Router<AppState>) -> Router<AppState> + Send + Sync,
{
    fn apply(&self, router: Router<AppState>) -> Router<AppState> {
        self(router)
    }
}

/// Mount `routes` under `prefix` on `router`.
pub(crate) fn mount(
    router: Router<AppState>,
    prefix: &str,
    middlewares: &[Box<dyn Middleware>],
    routes: Vec<Route>,
) -> Router<AppState> {
    let prefix = normalize_prefix(prefix);

    let mut group = Router::new();
    for route in routes {
        tracing::debug!(
            method = %route.method,
            path = %format!("{}{}", prefix, route.path),
            "Route registered"
        );
        group = group.route(&route.path, route.handler);
    }
    // Wrong-method answers must pass through the group's middlewares too.
    if !middlewares.is_empty() {
        group = group.method_not_allowed_fallback(not_found);
    }
    for middleware in middlewares {
        group = middleware.apply(group);
    }

    if prefix.is_empty() {
        router.merge(group)
    } else {
        router.nest(&prefix, group)
    }
}

/// `""`, `"/"` → `""`; `"api/v1/"` → `"/api/v1"`.
fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}
