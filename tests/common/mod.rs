//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use tower::ServiceExt;

use quickserve::http::{ErrorKind, OptionRegistry, Server, ServerOption};

/// Server on an ephemeral loopback port with its own option registry, so
/// one-shot options apply regardless of what other tests did.
pub fn server(options: Vec<ServerOption>) -> Server {
    Server::with_registry("127.0.0.1:0", Arc::new(OptionRegistry::new()), options)
}

pub fn request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Drive one request through the fully layered service without a socket.
pub async fn send(server: &Server, request: Request<Body>) -> (StatusCode, String) {
    let response = server.app().oneshot(request).await.unwrap();
    let status = response.status();
    let body = Body::new(response.into_body());
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

pub async fn get(server: &Server, uri: &str) -> (StatusCode, String) {
    send(server, request("GET", uri)).await
}

/// The JSON body written for an error of `kind` with its default message.
pub fn error_body(kind: ErrorKind) -> String {
    format!(
        r#"{{"error":{{"code":"{}","msg":"{}"}}}}"#,
        kind.code(),
        kind.default_message()
    )
}

/// Client that never reuses connections, so a stopped server is observed
/// on the next request.
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .pool_max_idle_per_host(0)
        .build()
        .unwrap()
}
