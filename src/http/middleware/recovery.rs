//! Panic recovery.
//!
//! The only place where a handler fault becomes a response. The panic
//! payload is logged, never sent to the client.
//!
//! A backtrace taken after unwinding only shows the catching frame, so a
//! panic hook records the site on the panicking thread and the responder
//! picks it up from there.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::panic;
use std::sync::Once;

use axum::{
    body::Body,
    http::Response,
    response::IntoResponse,
};
use tower_http::catch_panic::{CatchPanicLayer, ResponseForPanic};

use crate::http::error::ApiError;

/// Turns a caught panic into a generic `InternalServerError` body.
#[derive(Debug, Clone, Copy, Default)]
pub struct PanicResponder;

impl ResponseForPanic for PanicResponder {
    type ResponseBody = Body;

    fn response_for_panic(&mut self, err: Box<dyn Any + Send + 'static>) -> Response<Body> {
        let site = take_panic_site();
        let location = site.as_ref().and_then(|s| s.location.as_deref()).unwrap_or("unknown");
        tracing::error!(
            panic = %panic_message(err.as_ref()),
            location,
            "Recovered from panic while handling request"
        );
        if let Some(site) = site {
            tracing::debug!(backtrace = %site.backtrace, "Panic backtrace");
        }

        ApiError::internal_server_error("").into_response()
    }
}

/// Layer catching panics from every wrapped route.
pub fn recovery_layer() -> CatchPanicLayer<PanicResponder> {
    install_panic_hook();
    CatchPanicLayer::custom(PanicResponder)
}

/// Where a panic happened, captured before unwinding.
struct PanicSite {
    location: Option<String>,
    backtrace: Backtrace,
}

thread_local! {
    static LAST_PANIC: RefCell<Option<PanicSite>> = const { RefCell::new(None) };
}

/// Chain a hook recording the panic site in front of the existing one.
fn install_panic_hook() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let site = PanicSite {
                location: info.location().map(ToString::to_string),
                backtrace: Backtrace::force_capture(),
            };
            LAST_PANIC.with(|last| *last.borrow_mut() = Some(site));
            previous(info);
        }));
    });
}

fn take_panic_site() -> Option<PanicSite> {
    LAST_PANIC.with(|last| last.borrow_mut().take())
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    }
}
