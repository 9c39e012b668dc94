//! Transport-neutral view of an inbound request.
//!
//! Handlers and the error responder only need the method, URL, headers and
//! client address. Keeping them behind `RequestContext` means business code
//! never names the router's own request types.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{request::Parts, HeaderMap, Method, Request, Uri},
};

/// Header carrying the proxy chain's view of the client address.
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
/// Header set by some proxies with the single client address.
pub const X_REAL_IP: &str = "x-real-ip";

/// Request metadata captured for handlers and error logging.
#[derive(Debug, Clone)]
pub struct RequestContext {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    peer: Option<SocketAddr>,
}

impl RequestContext {
    /// Capture the context from request parts.
    pub fn from_parts(parts: &Parts) -> Self {
        Self {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
            peer: parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr),
        }
    }

    /// Capture the context from a full request without consuming it.
    pub fn from_request<B>(request: &Request<B>) -> Self {
        Self {
            method: request.method().clone(),
            uri: request.uri().clone(),
            headers: request.headers().clone(),
            peer: request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr),
        }
    }

    /// Effective HTTP method (after any override).
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request URL as received.
    pub fn url(&self) -> &Uri {
        &self.uri
    }

    /// Value of a header, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Best-effort client IP.
    ///
    /// Prefers the first `X-Forwarded-For` hop, then `X-Real-IP`, then the
    /// socket peer. Returns an empty string when none is known.
    pub fn client_ip(&self) -> String {
        if let Some(forwarded) = self.header(X_FORWARDED_FOR) {
            if let Some(first) = forwarded.split(',').map(str::trim).find(|s| !s.is_empty()) {
                return first.to_string();
            }
        }
        if let Some(real) = self.header(X_REAL_IP).map(str::trim).filter(|s| !s.is_empty()) {
            return real.to_string();
        }
        self.peer.map(|addr| addr.ip().to_string()).unwrap_or_default()
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(parts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn client_ip_prefers_forwarded_for() {
        let req = Request::builder()
            .uri("/x")
            .header("X-Forwarded-For", " 10.0.0.7, 192.168.1.1")
            .header("X-Real-IP", "10.0.0.8")
            .body(Body::empty())
            .unwrap();
        assert_eq!(RequestContext::from_request(&req).client_ip(), "10.0.0.7");
    }

    #[test]
    fn client_ip_falls_back_to_peer() {
        let mut req = Request::builder().uri("/x").body(Body::empty()).unwrap();
        let peer: SocketAddr = "127.0.0.1:40000".parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(peer));

        let ctx = RequestContext::from_request(&req);
        assert_eq!(ctx.client_ip(), "127.0.0.1");
        assert_eq!(ctx.method(), &Method::GET);
        assert_eq!(ctx.url().path(), "/x");
    }

    #[test]
    fn client_ip_unknown() {
        let req = Request::builder().uri("/x").body(Body::empty()).unwrap();
        assert_eq!(RequestContext::from_request(&req).client_ip(), "");
    }
}
