//! Structured JSON error responses.
//!
//! Every failure a handler reports maps to one fixed category with a status,
//! a stable code and a default message:
//!
//! ```text
//! {"error": {"code": "<Code>", "msg": "<message>"}}
//! ```

use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::http::context::RequestContext;

/// Error categories understood by clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidParameter,
    AuthenticationError,
    AuthenticationExpired,
    Forbidden,
    NotFound,
    InternalServerError,
    TimeoutError,
}

impl ErrorKind {
    /// Every category, in declaration order.
    pub const ALL: [ErrorKind; 7] = [
        ErrorKind::InvalidParameter,
        ErrorKind::AuthenticationError,
        ErrorKind::AuthenticationExpired,
        ErrorKind::Forbidden,
        ErrorKind::NotFound,
        ErrorKind::InternalServerError,
        ErrorKind::TimeoutError,
    ];

    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::InvalidParameter => StatusCode::BAD_REQUEST,
            ErrorKind::AuthenticationError | ErrorKind::AuthenticationExpired => {
                StatusCode::UNAUTHORIZED
            }
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::TimeoutError => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Machine-readable code placed in the response body.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::InvalidParameter => "InvalidParameter",
            ErrorKind::AuthenticationError => "AuthenticationError",
            ErrorKind::AuthenticationExpired => "AuthenticationExpired",
            ErrorKind::Forbidden => "Forbidden",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::InternalServerError => "InternalServerError",
            ErrorKind::TimeoutError => "TimeoutError",
        }
    }

    /// Message used when the caller supplies none.
    pub fn default_message(self) -> &'static str {
        match self {
            ErrorKind::InvalidParameter => "Invalid Parameter",
            ErrorKind::AuthenticationError => "Authentication Error",
            ErrorKind::AuthenticationExpired => "Authentication Expired",
            ErrorKind::Forbidden => "Forbidden",
            ErrorKind::NotFound => "Not Found",
            ErrorKind::InternalServerError => "Internal Server Error",
            ErrorKind::TimeoutError => "Gateway Timeout",
        }
    }

    /// Whether the category is a server-side fault rather than a client mistake.
    pub fn is_internal(self) -> bool {
        matches!(self, ErrorKind::InternalServerError)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// An error response ready to be written to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    kind: ErrorKind,
    message: String,
}

impl ApiError {
    /// Build an error; an empty message falls back to the category default.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.is_empty() {
            kind.default_message().to_string()
        } else {
            message
        };
        Self { kind, message }
    }

    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidParameter, message)
    }

    pub fn authentication_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AuthenticationError, message)
    }

    pub fn authentication_expired(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AuthenticationExpired, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalServerError, message)
    }

    pub fn timeout_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TimeoutError, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Record the triggering cause with the request it belongs to.
    ///
    /// Internal faults log at error level, client-caused categories at debug.
    /// The wire response is unchanged.
    pub fn log(self, ctx: &RequestContext, cause: impl fmt::Display) -> Self {
        let client_ip = ctx.client_ip();
        if self.kind.is_internal() {
            tracing::error!(
                code = self.kind.code(),
                cause = %cause,
                client_ip = %client_ip,
                method = %ctx.method(),
                url = %ctx.url(),
                "Request failed"
            );
        } else {
            tracing::debug!(
                code = self.kind.code(),
                cause = %cause,
                client_ip = %client_ip,
                method = %ctx.method(),
                url = %ctx.url(),
                "Request rejected"
            );
        }
        self
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.code(), self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<ErrorKind> for ApiError {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind, "")
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    code: &'a str,
    msg: &'a str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.kind.code(),
                msg: &self.message,
            },
        };
        (self.kind.status(), Json(body)).into_response()
    }
}

/// Respond with a category and message (empty message uses the default).
pub fn respond(kind: ErrorKind, message: &str) -> Response {
    ApiError::new(kind, message).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn default_messages() {
        let expected = [
            (400, "InvalidParameter", "Invalid Parameter"),
            (401, "AuthenticationError", "Authentication Error"),
            (401, "AuthenticationExpired", "Authentication Expired"),
            (403, "Forbidden", "Forbidden"),
            (404, "NotFound", "Not Found"),
            (500, "InternalServerError", "Internal Server Error"),
            (504, "TimeoutError", "Gateway Timeout"),
        ];

        for (kind, (status, code, msg)) in ErrorKind::ALL.into_iter().zip(expected) {
            let response = respond(kind, "");
            assert_eq!(response.status().as_u16(), status, "{kind}");
            assert_eq!(
                body_string(response).await,
                format!(r#"{{"error":{{"code":"{code}","msg":"{msg}"}}}}"#)
            );
        }
    }

    #[tokio::test]
    async fn custom_message_passes_through() {
        for kind in ErrorKind::ALL {
            let response = respond(kind, "page 7 is gone");
            assert_eq!(response.status(), kind.status());
            assert_eq!(
                body_string(response).await,
                format!(
                    r#"{{"error":{{"code":"{}","msg":"page 7 is gone"}}}}"#,
                    kind.code()
                )
            );
        }
    }

    #[test]
    fn constructors_bind_categories() {
        assert_eq!(ApiError::invalid_parameter("").kind(), ErrorKind::InvalidParameter);
        assert_eq!(ApiError::forbidden("no").message(), "no");
        assert_eq!(ApiError::from(ErrorKind::TimeoutError).message(), "Gateway Timeout");
        assert_eq!(
            ApiError::not_found("").to_string(),
            "NotFound: Not Found"
        );
    }
}
