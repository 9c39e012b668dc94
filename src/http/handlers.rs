//! Built-in handlers.

use axum::Json;
use serde::Serialize;

use crate::http::context::RequestContext;
use crate::http::error::ApiError;

#[derive(Debug, Serialize)]
pub struct Pong {
    pub ping: &'static str,
}

/// `GET /ping` liveness check.
pub async fn ping() -> Json<Pong> {
    Json(Pong { ping: "pong" })
}

/// Fallback for unmatched paths and unsupported methods.
pub async fn not_found(ctx: RequestContext) -> ApiError {
    let cause = format!("request not found [{}] {}", ctx.method(), ctx.url());
    ApiError::not_found("").log(&ctx, cause)
}
