//! Per-connection read and idle deadlines.
//!
//! hyper's header timer also runs while a keep-alive connection waits for
//! its next request, so it cannot tell a slow request head from an idle
//! connection. The stream tracks where the connection is instead:
//!
//! ```text
//! accept, or bytes after Idle ──▶ Head  (head deadline from its start)
//! request dispatched          ──▶ Busy  (no stream deadline)
//! response bytes written      ──▶ Idle  (idle deadline from last write)
//! ```
//!
//! While Busy the request body and the handler run under their own
//! timeouts. A connection past its deadline fails the pending read or
//! write with `TimedOut`, and hyper closes it.

use std::future::Future;
use std::io::{self, IoSlice};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum_server::accept::Accept;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::time::{Instant, Sleep};
use tower::Service;

/// Deadlines applied to every accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnTimeouts {
    /// Time allowed from the first byte of a request (or the accept) until
    /// the request is dispatched.
    pub head: Duration,
    /// Time a connection may sit without a request after its last response.
    pub idle: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Head { since: Instant },
    Busy,
    Idle { since: Instant },
}

/// Phase shared by a connection's stream and its service.
#[derive(Debug, Clone)]
struct Activity {
    phase: Arc<Mutex<Phase>>,
    timeouts: ConnTimeouts,
}

impl Activity {
    fn new(timeouts: ConnTimeouts) -> Self {
        Self {
            phase: Arc::new(Mutex::new(Phase::Head {
                since: Instant::now(),
            })),
            timeouts,
        }
    }

    fn on_read(&self) {
        let mut phase = self.phase.lock();
        if let Phase::Idle { .. } = *phase {
            *phase = Phase::Head {
                since: Instant::now(),
            };
        }
    }

    fn on_write(&self) {
        let mut phase = self.phase.lock();
        // Handshake and settings frames are written before any request.
        if !matches!(*phase, Phase::Head { .. }) {
            *phase = Phase::Idle {
                since: Instant::now(),
            };
        }
    }

    fn on_dispatch(&self) {
        *self.phase.lock() = Phase::Busy;
    }

    fn deadline(&self) -> Option<Instant> {
        match *self.phase.lock() {
            Phase::Head { since } => Some(since + self.timeouts.head),
            Phase::Busy => None,
            Phase::Idle { since } => Some(since + self.timeouts.idle),
        }
    }

    /// `Ready` once the current deadline has passed; otherwise arms `timer`
    /// to wake the caller at it.
    fn poll_expired(&self, timer: &mut Pin<Box<Sleep>>, cx: &mut Context<'_>) -> Poll<io::Error> {
        let Some(deadline) = self.deadline() else {
            return Poll::Pending;
        };
        if timer.deadline() != deadline {
            timer.as_mut().reset(deadline);
        }
        match timer.as_mut().poll(cx) {
            Poll::Ready(()) => Poll::Ready(io::Error::new(
                io::ErrorKind::TimedOut,
                "connection deadline elapsed",
            )),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Stream enforcing [`ConnTimeouts`] on pending reads and writes.
pub struct TimeoutStream<S> {
    inner: S,
    activity: Activity,
    read_timer: Pin<Box<Sleep>>,
    write_timer: Pin<Box<Sleep>>,
}

impl<S> TimeoutStream<S> {
    fn new(inner: S, activity: Activity) -> Self {
        let now = Instant::now();
        Self {
            inner,
            activity,
            read_timer: Box::pin(tokio::time::sleep_until(now)),
            write_timer: Box::pin(tokio::time::sleep_until(now)),
        }
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for TimeoutStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        match Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                if buf.filled().len() > before {
                    this.activity.on_read();
                }
                Poll::Ready(Ok(()))
            }
            Poll::Pending => this.activity.poll_expired(&mut this.read_timer, cx).map(Err),
            ready => ready,
        }
    }
}

impl<S: AsyncWrite + Unpin> TimeoutStream<S> {
    fn written(&mut self, polled: Poll<io::Result<usize>>, cx: &mut Context<'_>) -> Poll<io::Result<usize>> {
        match polled {
            Poll::Ready(Ok(n)) => {
                if n > 0 {
                    self.activity.on_write();
                }
                Poll::Ready(Ok(n))
            }
            Poll::Pending => self.activity.poll_expired(&mut self.write_timer, cx).map(Err),
            ready => ready,
        }
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for TimeoutStream<S> {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_write(cx, buf);
        this.written(polled, cx)
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_write_vectored(cx, bufs);
        this.written(polled, cx)
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

/// Connection service marking the connection busy on each dispatched request.
#[derive(Debug, Clone)]
pub struct TrackedService<S> {
    inner: S,
    activity: Activity,
}

impl<S, R> Service<R> for TrackedService<S>
where
    S: Service<R>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: R) -> Self::Future {
        self.activity.on_dispatch();
        self.inner.call(request)
    }
}

/// Acceptor wrapping each raw connection before `inner` (plain or TLS)
/// sees it, so a TLS handshake counts against the head deadline.
#[derive(Clone)]
pub struct TimeoutAcceptor<A> {
    inner: A,
    timeouts: ConnTimeouts,
}

impl<A> TimeoutAcceptor<A> {
    pub fn new(inner: A, timeouts: ConnTimeouts) -> Self {
        Self { inner, timeouts }
    }
}

impl<A, I, S> Accept<I, S> for TimeoutAcceptor<A>
where
    A: Accept<TimeoutStream<I>, TrackedService<S>>,
{
    type Stream = A::Stream;
    type Service = A::Service;
    type Future = A::Future;

    fn accept(&self, stream: I, service: S) -> Self::Future {
        let activity = Activity::new(self.timeouts);
        let stream = TimeoutStream::new(stream, activity.clone());
        self.inner.accept(stream, TrackedService { inner: service, activity })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};

    const TIMEOUTS: ConnTimeouts = ConnTimeouts {
        head: Duration::from_secs(10),
        idle: Duration::from_secs(120),
    };

    fn connection() -> (TimeoutStream<DuplexStream>, Activity, DuplexStream) {
        let (server, client) = duplex(1024);
        let activity = Activity::new(TIMEOUTS);
        (TimeoutStream::new(server, activity.clone()), activity, client)
    }

    fn assert_elapsed(since: Instant, expected: Duration) {
        let elapsed = since.elapsed();
        assert!(
            elapsed >= expected && elapsed < expected + Duration::from_secs(1),
            "closed after {elapsed:?}, expected {expected:?}"
        );
    }

    /// Read one request, dispatch it and write a response.
    async fn exchange(stream: &mut TimeoutStream<DuplexStream>, activity: &Activity, client: &mut DuplexStream) {
        client.write_all(b"GET /ping HTTP/1.1\r\n\r\n").await.unwrap();
        let mut buf = [0u8; 64];
        assert!(stream.read(&mut buf).await.unwrap() > 0);
        activity.on_dispatch();
        stream.write_all(b"HTTP/1.1 200 OK\r\n\r\n").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn silent_connection_closes_at_head_deadline() {
        let (mut stream, _activity, _client) = connection();
        let started = Instant::now();

        let err = stream.read(&mut [0u8; 16]).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
        assert_elapsed(started, TIMEOUTS.head);
    }

    #[tokio::test(start_paused = true)]
    async fn keep_alive_connection_waits_for_idle_deadline() {
        let (mut stream, activity, mut client) = connection();
        exchange(&mut stream, &activity, &mut client).await;
        let idle_since = Instant::now();

        let err = stream.read(&mut [0u8; 16]).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
        assert_elapsed(idle_since, TIMEOUTS.idle);
    }

    #[tokio::test(start_paused = true)]
    async fn next_request_restarts_head_deadline() {
        let (mut stream, activity, mut client) = connection();
        exchange(&mut stream, &activity, &mut client).await;

        tokio::time::sleep(Duration::from_secs(100)).await;
        client.write_all(b"GET").await.unwrap();
        assert!(stream.read(&mut [0u8; 16]).await.unwrap() > 0);
        let head_since = Instant::now();

        let err = stream.read(&mut [0u8; 16]).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
        assert_elapsed(head_since, TIMEOUTS.head);
    }

    #[tokio::test(start_paused = true)]
    async fn busy_connection_has_no_deadline() {
        let (mut stream, activity, _client) = connection();
        activity.on_dispatch();

        let read = tokio::time::timeout(TIMEOUTS.idle * 2, stream.read(&mut [0u8; 16])).await;
        assert!(read.is_err(), "read should still be pending");
    }
}
