//! Server run-state machine.

use std::io;
use std::sync::Arc;

use axum_server::Handle;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::http::server::ServerError;

/// Observable run state of a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Built, never started.
    Created,
    /// Accept loop active.
    Running,
    /// Accept loop ended. Terminal.
    Stopped,
}

/// Handles owned while the accept loop runs.
pub(crate) struct Running {
    pub(crate) handle: Handle,
    pub(crate) task: JoinHandle<io::Result<()>>,
}

enum Lifecycle {
    Created,
    Running(Running),
    Stopped,
}

impl Lifecycle {
    fn state(&self) -> ServerState {
        match self {
            Lifecycle::Created => ServerState::Created,
            Lifecycle::Running(_) => ServerState::Running,
            Lifecycle::Stopped => ServerState::Stopped,
        }
    }
}

/// Shared cell holding the run state. Every transition happens under its lock.
#[derive(Clone)]
pub(crate) struct LifecycleCell {
    inner: Arc<Mutex<Lifecycle>>,
    finished: Arc<watch::Sender<bool>>,
}

impl LifecycleCell {
    pub(crate) fn new() -> Self {
        let (finished, _) = watch::channel(false);
        Self {
            inner: Arc::new(Mutex::new(Lifecycle::Created)),
            finished: Arc::new(finished),
        }
    }

    pub(crate) fn state(&self) -> ServerState {
        self.inner.lock().state()
    }

    /// `Created → Running`. `start` runs under the lock, so a background
    /// task that exits immediately cannot mark the server stopped before it
    /// is marked running.
    pub(crate) fn begin(&self, start: impl FnOnce() -> Running) -> Result<(), ServerError> {
        let mut lifecycle = self.inner.lock();
        match *lifecycle {
            Lifecycle::Created => {
                *lifecycle = Lifecycle::Running(start());
                Ok(())
            }
            Lifecycle::Running(_) => Err(ServerError::AlreadyRunning),
            Lifecycle::Stopped => Err(ServerError::Stopped),
        }
    }

    /// `Running → Stopped`, handing the running handles to the caller.
    /// Returns `None` when the server is not running.
    pub(crate) fn take_running(&self) -> Option<Running> {
        let mut lifecycle = self.inner.lock();
        match std::mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
            Lifecycle::Running(running) => Some(running),
            previous => {
                *lifecycle = previous;
                None
            }
        }
    }

    /// Called by the accept loop when it exits, on its own or after stop.
    pub(crate) fn finish(&self) {
        {
            let mut lifecycle = self.inner.lock();
            if matches!(*lifecycle, Lifecycle::Running(_)) {
                *lifecycle = Lifecycle::Stopped;
            }
        }
        self.finished.send_replace(true);
    }

    /// Resolves once the accept loop has exited.
    pub(crate) async fn finished(&self) {
        let mut finished = self.finished.subscribe();
        // The sender lives in `self`, so waiting cannot fail.
        let _ = finished.wait_for(|done| *done).await;
    }

    pub(crate) fn handle(&self) -> Option<Handle> {
        match &*self.inner.lock() {
            Lifecycle::Running(running) => Some(running.handle.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle_running() -> Running {
        Running {
            handle: Handle::new(),
            task: tokio::spawn(async { Ok(()) }),
        }
    }

    #[tokio::test]
    async fn transitions() {
        let cell = LifecycleCell::new();
        assert_eq!(cell.state(), ServerState::Created);
        assert!(cell.take_running().is_none());
        assert_eq!(cell.state(), ServerState::Created);

        cell.begin(idle_running).unwrap();
        assert_eq!(cell.state(), ServerState::Running);
        assert!(cell.handle().is_some());
        assert!(matches!(cell.begin(idle_running), Err(ServerError::AlreadyRunning)));

        assert!(cell.take_running().is_some());
        assert_eq!(cell.state(), ServerState::Stopped);
        assert!(cell.take_running().is_none());
        assert!(cell.handle().is_none());
        assert!(matches!(cell.begin(idle_running), Err(ServerError::Stopped)));
    }

    #[tokio::test]
    async fn finish_only_leaves_running() {
        let cell = LifecycleCell::new();
        cell.finish();
        assert_eq!(cell.state(), ServerState::Created);

        cell.begin(idle_running).unwrap();
        cell.finish();
        assert_eq!(cell.state(), ServerState::Stopped);
    }

    #[tokio::test]
    async fn finished_resolves_after_finish() {
        let cell = LifecycleCell::new();
        let waiter = tokio::spawn({
            let cell = cell.clone();
            async move { cell.finished().await }
        });

        cell.finish();
        waiter.await.unwrap();
        // Already finished: resolves immediately
        cell.finished().await;
    }
}
