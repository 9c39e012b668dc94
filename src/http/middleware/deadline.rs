//! Response deadline.

use axum::{
    body::Body,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::context::RequestContext;
use crate::http::error::ApiError;
use crate::http::server::WRITE_TIMEOUT;

/// Answer `TimeoutError` when a handler has not produced a response within
/// [`WRITE_TIMEOUT`].
pub async fn response_deadline(request: Request<Body>, next: Next) -> Response {
    let ctx = RequestContext::from_request(&request);

    match tokio::time::timeout(WRITE_TIMEOUT, next.run(request)).await {
        Ok(response) => response,
        Err(_) => ApiError::timeout_error("")
            .log(&ctx, format_args!("no response within {:?}", WRITE_TIMEOUT))
            .into_response(),
    }
}
