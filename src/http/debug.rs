//! Runtime introspection routes under `/debug`.
//!
//! Answers come from what the process and the tokio runtime expose:
//! command line, runtime metrics, a backtrace of the handling thread and
//! memory/thread counters from `/proc/self/status` where it exists.

use std::backtrace::Backtrace;
use std::time::{Duration, Instant};

use axum::{
    extract::{rejection::QueryRejection, Query},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::runtime::Handle;

use crate::http::error::ApiError;
use crate::http::route::Route;
use crate::http::server::WRITE_TIMEOUT;

const PROC_STATUS: &str = "/proc/self/status";
const DEFAULT_PROFILE_SECONDS: u64 = 1;

/// The debug route table.
pub fn routes() -> Vec<Route> {
    vec![
        Route::get("/debug/pprof", index),
        Route::get("/debug/pprof/cmdline", cmdline),
        Route::get("/debug/pprof/profile", profile),
        Route::get("/debug/pprof/symbol", symbol),
        Route::post("/debug/pprof/symbol", symbol),
        Route::get("/debug/pprof/trace", trace),
        Route::get("/debug/block", block),
        Route::get("/debug/goroutine", goroutine),
        Route::get("/debug/heap", heap),
        Route::get("/debug/mutex", block),
        Route::get("/debug/threadcreate", threadcreate),
    ]
}

#[derive(Debug, Serialize)]
struct Entry {
    path: &'static str,
    description: &'static str,
}

async fn index() -> Json<Value> {
    let entries = [
        Entry { path: "/debug/pprof/cmdline", description: "process command line" },
        Entry { path: "/debug/pprof/profile", description: "runtime metrics sampled over ?seconds=N" },
        Entry { path: "/debug/pprof/symbol", description: "symbol lookup (none exported)" },
        Entry { path: "/debug/pprof/trace", description: "backtrace of the handling thread" },
        Entry { path: "/debug/block", description: "runtime scheduling queue" },
        Entry { path: "/debug/goroutine", description: "runtime workers and alive tasks" },
        Entry { path: "/debug/heap", description: "process memory" },
        Entry { path: "/debug/mutex", description: "runtime scheduling queue" },
        Entry { path: "/debug/threadcreate", description: "OS thread count" },
    ];
    Json(json!({ "profiles": entries }))
}

/// Arguments separated by NUL, matching `/proc/self/cmdline`.
async fn cmdline() -> String {
    std::env::args().collect::<Vec<_>>().join("\0")
}

#[derive(Debug, Deserialize)]
struct ProfileParams {
    seconds: Option<u64>,
}

#[derive(Debug, Clone, Copy, Serialize)]
struct RuntimeSnapshot {
    workers: usize,
    alive_tasks: usize,
    global_queue_depth: usize,
}

impl RuntimeSnapshot {
    fn capture() -> Self {
        let metrics = Handle::current().metrics();
        Self {
            workers: metrics.num_workers(),
            alive_tasks: metrics.num_alive_tasks(),
            global_queue_depth: metrics.global_queue_depth(),
        }
    }
}

async fn profile(params: Result<Query<ProfileParams>, QueryRejection>) -> Result<Json<Value>, ApiError> {
    let Query(params) = params.map_err(|rejection| ApiError::invalid_parameter(rejection.body_text()))?;

    let seconds = match params.seconds {
        None | Some(0) => DEFAULT_PROFILE_SECONDS,
        Some(s) => s,
    };
    if Duration::from_secs(seconds) >= WRITE_TIMEOUT {
        return Err(ApiError::invalid_parameter(format!(
            "profile duration must be shorter than {}s",
            WRITE_TIMEOUT.as_secs()
        )));
    }

    let started = Instant::now();
    let before = RuntimeSnapshot::capture();
    tokio::time::sleep(Duration::from_secs(seconds)).await;
    let after = RuntimeSnapshot::capture();

    Ok(Json(json!({
        "seconds": seconds,
        "elapsed_ms": started.elapsed().as_millis() as u64,
        "start": before,
        "end": after,
    })))
}

async fn symbol() -> &'static str {
    "num_symbols: 0\n"
}

async fn trace() -> String {
    Backtrace::force_capture().to_string()
}

async fn goroutine() -> Json<RuntimeSnapshot> {
    Json(RuntimeSnapshot::capture())
}

async fn block() -> Json<Value> {
    let snapshot = RuntimeSnapshot::capture();
    Json(json!({
        "workers": snapshot.workers,
        "global_queue_depth": snapshot.global_queue_depth,
    }))
}

async fn heap() -> Json<Value> {
    Json(proc_status(&["VmPeak", "VmSize", "VmHWM", "VmRSS", "RssAnon"]).await)
}

async fn threadcreate() -> Json<Value> {
    Json(proc_status(&["Threads"]).await)
}

async fn proc_status(keys: &[&str]) -> Value {
    match tokio::fs::read_to_string(PROC_STATUS).await {
        Ok(status) => {
            let mut fields = status_fields(&status, keys);
            fields.insert("available".into(), Value::Bool(true));
            Value::Object(fields)
        }
        Err(e) => {
            tracing::debug!(error = %e, path = PROC_STATUS, "Process status unavailable");
            json!({ "available": false })
        }
    }
}

/// Pick `keys` out of `/proc/self/status` text. `kB` values stay as strings.
fn status_fields(status: &str, keys: &[&str]) -> Map<String, Value> {
    status
        .lines()
        .filter_map(|line| line.split_once(':'))
        .filter(|(key, _)| keys.contains(&key.trim()))
        .map(|(key, value)| {
            let value = value.trim();
            let value = value
                .parse::<u64>()
                .map(Value::from)
                .unwrap_or_else(|_| Value::String(value.to_string()));
            (key.trim().to_string(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUS: &str = "Name:\tquickserve\nVmPeak:\t  20000 kB\nVmRSS:\t   8000 kB\nThreads:\t9\n";

    #[test]
    fn picks_requested_status_fields() {
        let fields = status_fields(STATUS, &["VmRSS", "Threads"]);
        assert_eq!(fields.len(), 2);
        assert_eq!(fields["VmRSS"], Value::String("8000 kB".into()));
        assert_eq!(fields["Threads"], Value::from(9_u64));
    }

    #[test]
    fn route_table_covers_debug_surface() {
        let paths: Vec<_> = routes().iter().map(|r| r.path().to_string()).collect();
        assert_eq!(paths.len(), 11);
        assert!(paths.contains(&"/debug/pprof".to_string()));
        assert!(paths.contains(&"/debug/threadcreate".to_string()));
    }
}
