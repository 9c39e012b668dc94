//! HTTP method override.
//!
//! Rewrites the request method from `X-HTTP-Method-Override` before the
//! router sees the request, so the override decides which route matches.
//! Must wrap the router service itself: layers added with `Router::layer`
//! run after routing.

use std::task::{Context, Poll};

use axum::http::{Method, Request};
use tower::{Layer, Service};

/// Header naming the effective method.
pub const X_HTTP_METHOD_OVERRIDE: &str = "x-http-method-override";

/// Layer producing [`MethodOverride`] services.
///
/// A disabled layer passes requests through untouched.
#[derive(Debug, Clone, Copy)]
pub struct MethodOverrideLayer {
    enabled: bool,
}

impl MethodOverrideLayer {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl<S> Layer<S> for MethodOverrideLayer {
    type Service = MethodOverride<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MethodOverride {
            inner,
            enabled: self.enabled,
        }
    }
}

/// Service rewriting the method before calling `inner`.
#[derive(Debug, Clone)]
pub struct MethodOverride<S> {
    inner: S,
    enabled: bool,
}

impl<S, B> Service<Request<B>> for MethodOverride<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<B>) -> Self::Future {
        if self.enabled {
            override_method(&mut request);
        }
        self.inner.call(request)
    }
}

fn override_method<B>(request: &mut Request<B>) {
    let Some(value) = request.headers().get(X_HTTP_METHOD_OVERRIDE) else {
        return;
    };
    if value.is_empty() {
        return;
    }
    match Method::from_bytes(value.as_bytes()) {
        Ok(method) => {
            tracing::trace!(from = %request.method(), to = %method, "Method overridden");
            *request.method_mut() = method;
        }
        Err(_) => {
            tracing::debug!(value = ?value, "Ignoring invalid method override");
        }
    }
}
