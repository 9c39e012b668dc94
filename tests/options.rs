//! Functional options: field overwrites, one-shot route options, method override.

use std::sync::Arc;

use axum::http::StatusCode;
use quickserve::http::{
    middleware::X_HTTP_METHOD_OVERRIDE, option, ErrorKind, OptionKind, OptionRegistry, Server,
};
use quickserve::store::MockStore;

mod common;

#[tokio::test]
async fn test_options_set_fields_in_order() {
    let server = common::server(vec![
        option::address("127.0.0.1:7000"),
        option::address("127.0.0.1:7001"),
        option::store(Arc::new(MockStore::new())),
        option::auto_cert("./ssl", ["example.com", "www.example.com"]),
    ]);

    assert_eq!(server.address(), "127.0.0.1:7001");
    assert!(server.store().is_some());
    let auto_cert = server.auto_cert().unwrap();
    assert_eq!(auto_cert.cache_dir(), Some(std::path::Path::new("./ssl")));
    assert_eq!(auto_cert.domains(), ["example.com", "www.example.com"]);
    assert!(!server.method_override_enabled());
}

#[tokio::test]
async fn test_ping_route() {
    let server = common::server(vec![option::ping_route()]);

    let (status, body) = common::get(&server, "/ping").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"ping":"pong"}"#);
}

#[tokio::test]
async fn test_route_options_apply_once_per_registry() {
    let registry = Arc::new(OptionRegistry::new());
    let first = Server::with_registry(
        "127.0.0.1:0",
        registry.clone(),
        vec![option::ping_route(), option::ping_route(), option::debug_routes()],
    );
    assert!(registry.is_applied(OptionKind::PingRoute));
    assert!(registry.is_applied(OptionKind::DebugRoutes));

    let second = Server::with_registry(
        "127.0.0.1:0",
        registry.clone(),
        vec![option::ping_route(), option::debug_routes()],
    );

    assert_eq!(common::get(&first, "/ping").await.0, StatusCode::OK);
    assert_eq!(common::get(&first, "/debug/pprof").await.0, StatusCode::OK);
    assert_eq!(common::get(&second, "/ping").await.0, StatusCode::NOT_FOUND);
    assert_eq!(common::get(&second, "/debug/pprof").await.0, StatusCode::NOT_FOUND);

    registry.reset();
    let third = Server::with_registry("127.0.0.1:0", registry, vec![option::ping_route()]);
    assert_eq!(common::get(&third, "/ping").await.0, StatusCode::OK);
}

#[tokio::test]
async fn test_debug_routes() {
    let server = common::server(vec![option::debug_routes()]);

    for uri in [
        "/debug/pprof",
        "/debug/pprof/cmdline",
        "/debug/pprof/trace",
        "/debug/block",
        "/debug/goroutine",
        "/debug/heap",
        "/debug/mutex",
        "/debug/threadcreate",
    ] {
        let (status, _) = common::get(&server, uri).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
    }

    let (status, body) = common::get(&server, "/debug/pprof/symbol").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "num_symbols: 0\n");
    let (status, _) = common::send(&server, common::request("POST", "/debug/pprof/symbol")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = common::get(&server, "/debug/goroutine").await;
    assert_eq!(status, StatusCode::OK);
    let snapshot: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert!(snapshot["workers"].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn test_profile_rejects_bad_durations() {
    let server = common::server(vec![option::debug_routes()]);

    for uri in ["/debug/pprof/profile?seconds=60", "/debug/pprof/profile?seconds=soon"] {
        let (status, body) = common::get(&server, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert!(body.contains(r#""code":"InvalidParameter""#), "{body}");
    }
}

#[tokio::test]
async fn test_method_override_rewrites_before_routing() {
    let server = common::server(vec![option::debug_routes(), option::allow_method_override()]);
    assert!(server.method_override_enabled());

    // PATCH is not registered for the symbol route
    let mut request = common::request("GET", "/debug/pprof/symbol");
    request
        .headers_mut()
        .insert(X_HTTP_METHOD_OVERRIDE, "PATCH".parse().unwrap());
    let (status, body) = common::send(&server, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, common::error_body(ErrorKind::NotFound));

    // POST tunnelled as GET reaches the GET-only index
    let mut request = common::request("POST", "/debug/pprof");
    request
        .headers_mut()
        .insert(X_HTTP_METHOD_OVERRIDE, "GET".parse().unwrap());
    assert_eq!(common::send(&server, request).await.0, StatusCode::OK);
}

#[tokio::test]
async fn test_override_header_ignored_when_disabled() {
    let server = common::server(vec![option::debug_routes()]);

    let mut request = common::request("GET", "/debug/pprof/symbol");
    request
        .headers_mut()
        .insert(X_HTTP_METHOD_OVERRIDE, "PATCH".parse().unwrap());
    let (status, body) = common::send(&server, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "num_symbols: 0\n");
}
