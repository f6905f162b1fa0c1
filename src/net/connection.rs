//! Per-connection driver and lifecycle tracking.
//!
//! # Responsibilities
//! - Serve HTTP/1.1 and HTTP/2 on one accepted stream
//! - Enforce the request head read deadline and header size limit
//! - Close connections idle longer than the idle timeout
//! - Finish in-flight requests when draining
//! - Count open connections for graceful shutdown

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use axum::Router;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tower::ServiceExt;

use crate::config::RelayConfig;

/// hyper refuses read buffers smaller than this.
const MIN_BUF_SIZE: usize = 8192;

/// First bytes of the HTTP/2 connection preface.
const H2_PREFACE_START: &[u8] = b"PRI * HTTP/2.0";

static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Deadlines and limits applied to each connection.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub read_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_header_bytes: usize,
}

impl ConnectionSettings {
    pub fn from_config(config: &RelayConfig) -> Self {
        Self {
            read_timeout: Duration::from_secs(config.timeouts.read_secs),
            idle_timeout: Duration::from_secs(config.timeouts.idle_secs),
            max_header_bytes: config.listener.max_header_bytes.max(MIN_BUF_SIZE),
        }
    }
}

/// Request activity on one connection.
///
/// Millisecond fields are offsets from `opened`; `head_started` stores the
/// offset plus one so zero means "no request head pending".
#[derive(Debug)]
struct Activity {
    opened: Instant,
    in_flight: AtomicUsize,
    last_millis: AtomicU64,
    head_started: AtomicU64,
    seen_bytes: AtomicBool,
    multiplexed: AtomicBool,
}

impl Activity {
    fn new() -> Self {
        Self {
            opened: Instant::now(),
            in_flight: AtomicUsize::new(0),
            last_millis: AtomicU64::new(0),
            head_started: AtomicU64::new(0),
            seen_bytes: AtomicBool::new(false),
            multiplexed: AtomicBool::new(false),
        }
    }

    fn now_millis(&self) -> u64 {
        self.opened.elapsed().as_millis() as u64
    }

    fn touch(&self) {
        self.last_millis.store(self.now_millis(), Ordering::Relaxed);
    }

    fn begin(self: &Arc<Self>) -> InFlight {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        self.head_started.store(0, Ordering::SeqCst);
        self.touch();
        InFlight(Arc::clone(self))
    }

    /// Bytes arrived from the peer.
    ///
    /// With no request in flight they belong to the next request head, which
    /// starts the read deadline. HTTP/2 connections carry control frames
    /// between requests, so only HTTP/1 heads are timed.
    fn on_read(&self, bytes: &[u8]) {
        if !self.seen_bytes.swap(true, Ordering::SeqCst) && bytes.starts_with(H2_PREFACE_START) {
            self.multiplexed.store(true, Ordering::SeqCst);
        }
        if self.multiplexed.load(Ordering::SeqCst) || self.in_flight.load(Ordering::SeqCst) > 0 {
            return;
        }
        let _ = self.head_started.compare_exchange(
            0,
            self.now_millis() + 1,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    /// How long a partially received request head has been pending.
    fn head_pending_for(&self) -> Option<Duration> {
        match self.head_started.load(Ordering::SeqCst) {
            0 => None,
            started => Some(Duration::from_millis(
                self.now_millis().saturating_sub(started - 1),
            )),
        }
    }

    /// Time since the last request finished; zero while one is running.
    fn idle_for(&self) -> Duration {
        if self.in_flight.load(Ordering::SeqCst) > 0 {
            return Duration::ZERO;
        }
        let last = Duration::from_millis(self.last_millis.load(Ordering::Relaxed));
        self.opened.elapsed().saturating_sub(last)
    }
}

struct InFlight(Arc<Activity>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.touch();
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Stream wrapper reporting inbound bytes to [`Activity`].
struct MeteredIo<T> {
    inner: T,
    activity: Arc<Activity>,
}

impl<T: AsyncRead + Unpin> AsyncRead for MeteredIo<T> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let before = buf.filled().len();
        let poll = Pin::new(&mut self.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = &poll {
            let read = &buf.filled()[before..];
            if !read.is_empty() {
                self.activity.on_read(read);
            }
        }
        poll
    }
}

impl<T: AsyncWrite + Unpin> AsyncWrite for MeteredIo<T> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_write_vectored(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

/// Serve `router` on one connection until the peer closes it, a request head
/// stalls past the read timeout, it idles out, or `drain` turns true.
pub async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    id: ConnectionId,
    router: Router,
    settings: ConnectionSettings,
    mut drain: watch::Receiver<bool>,
) {
    let activity = Arc::new(Activity::new());
    let tracked = Arc::clone(&activity);
    let service = service_fn(move |req: Request<Incoming>| {
        let router = router.clone();
        let in_flight = tracked.begin();
        async move {
            let response = router.oneshot(req).await;
            drop(in_flight);
            response
        }
    });

    // No hyper timer: its header timeout also runs between keep-alive
    // requests. Head and idle deadlines are enforced below.
    let mut builder = auto::Builder::new(TokioExecutor::new());
    builder.http1().max_buf_size(settings.max_header_bytes);

    let io = MeteredIo {
        inner: stream,
        activity: Arc::clone(&activity),
    };
    let conn = builder.serve_connection(TokioIo::new(io), service);
    tokio::pin!(conn);

    let tick = (settings.read_timeout.min(settings.idle_timeout) / 4)
        .clamp(Duration::from_millis(10), Duration::from_secs(1));
    let mut ticker = tokio::time::interval(tick);
    let mut closing = *drain.borrow();
    if closing {
        conn.as_mut().graceful_shutdown();
    }

    loop {
        tokio::select! {
            result = conn.as_mut() => {
                if let Err(e) = result {
                    tracing::debug!(connection_id = %id, peer_addr = %peer, error = %e, "Connection error");
                }
                break;
            }
            changed = drain.changed(), if !closing => {
                if changed.is_err() || *drain.borrow() {
                    tracing::debug!(connection_id = %id, "Draining connection");
                    closing = true;
                    conn.as_mut().graceful_shutdown();
                }
            }
            _ = ticker.tick(), if !closing => {
                match activity.head_pending_for() {
                    Some(waited) if waited >= settings.read_timeout => {
                        tracing::debug!(connection_id = %id, peer_addr = %peer, "Request head read timeout");
                        break;
                    }
                    Some(_) => {}
                    None if activity.idle_for() >= settings.idle_timeout => {
                        tracing::debug!(connection_id = %id, peer_addr = %peer, "Idle timeout");
                        closing = true;
                        conn.as_mut().graceful_shutdown();
                    }
                    None => {}
                }
            }
        }
    }
}

/// Counts open connections for graceful shutdown.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    active_count: Arc<AtomicU64>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new connection. The returned guard decrements on drop.
    pub fn track(&self) -> ConnectionGuard {
        self.active_count.fetch_add(1, Ordering::SeqCst);
        let id = ConnectionId::new();
        tracing::trace!(connection_id = %id, "Connection opened");
        ConnectionGuard {
            active_count: Arc::clone(&self.active_count),
            id,
        }
    }

    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }

    /// Wait until every tracked connection has closed.
    pub async fn wait_for_shutdown(&self) {
        while self.active_count() > 0 {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

/// Guard that tracks a connection's lifetime.
#[derive(Debug)]
pub struct ConnectionGuard {
    active_count: Arc<AtomicU64>,
    id: ConnectionId,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active_count.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}
