/**
 * Chat Connections
 *
 * A `Connection` is the registry's handle on one open duplex transport. It
 * owns the write half; the read half stays with the session that drives the
 * connection.
 *
 * Writes go through the `Transport` trait so the dispatcher does not care
 * whether the peer is a websocket or an in-process channel.
 *
 * # Lifecycle
 *
 * A connection is open from creation until it is unregistered. Once closed it
 * never accepts another write and cannot be registered again.
 */

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::SinkExt;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex, Notify};
use uuid::Uuid;

/// Upper bound on sending the close frame to a peer
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Opaque identity of one connection (the registry key)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Why a write to a peer did not happen
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("write failed: {0}")]
    WriteFailed(String),
    #[error("write timed out after {0:?}")]
    TimedOut(Duration),
    #[error("connection closed")]
    Closed,
}

/// Outbound half of a duplex connection
#[async_trait]
pub trait Transport: Send + Sync {
    /// Write one text frame
    async fn send_text(&self, frame: &str) -> Result<(), TransportError>;

    /// Release the transport. Must be safe to call more than once.
    async fn close(&self);
}

/// One open client connection
pub struct Connection {
    id: ConnectionId,
    user_id: i64,
    open: AtomicBool,
    closed: Notify,
    transport: Box<dyn Transport>,
}

impl Connection {
    pub fn new(user_id: i64, transport: impl Transport + 'static) -> Self {
        Self {
            id: ConnectionId::new(),
            user_id,
            open: AtomicBool::new(true),
            closed: Notify::new(),
            transport: Box::new(transport),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Authenticated owner of this connection
    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Flip to closed. Returns true for the caller that actually closed it.
    pub(crate) fn mark_closed(&self) -> bool {
        let was_open = self.open.swap(false, Ordering::AcqRel);
        if was_open {
            // notify_one keeps a permit if the session is not waiting yet
            self.closed.notify_one();
        }
        was_open
    }

    /// Resolves once the connection has been marked closed.
    pub async fn wait_closed(&self) {
        while self.is_open() {
            self.closed.notified().await;
        }
    }

    /// Write one frame to the peer, bounded by `timeout` when given.
    ///
    /// A closed connection is never written to.
    pub async fn deliver(&self, frame: &str, timeout: Option<Duration>) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::Closed);
        }
        match timeout {
            Some(limit) => tokio::time::timeout(limit, self.transport.send_text(frame))
                .await
                .map_err(|_| TransportError::TimedOut(limit))?,
            None => self.transport.send_text(frame).await,
        }
    }

    /// Release the underlying transport.
    ///
    /// A peer that stopped reading can stall the close handshake, so the
    /// close is abandoned after [`CLOSE_TIMEOUT`].
    pub async fn shutdown(&self) {
        self.mark_closed();
        if tokio::time::timeout(CLOSE_TIMEOUT, self.transport.close())
            .await
            .is_err()
        {
            tracing::debug!(conn_id = %self.id, "close handshake timed out, dropping transport");
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("open", &self.is_open())
            .finish()
    }
}

/// Write half of an axum websocket
pub struct WebSocketTransport {
    sink: Mutex<SplitSink<WebSocket, Message>>,
}

impl WebSocketTransport {
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self { sink: Mutex::new(sink) }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send_text(&self, frame: &str) -> Result<(), TransportError> {
        self.sink
            .lock()
            .await
            .send(Message::Text(frame.into()))
            .await
            .map_err(|e| TransportError::WriteFailed(e.to_string()))
    }

    async fn close(&self) {
        if let Err(e) = self.sink.lock().await.close().await {
            tracing::debug!(error = %e, "websocket already closed");
        }
    }
}

/// In-process transport that forwards frames into a channel.
///
/// Writes fail once the receiving side has been dropped, which makes it
/// useful for server-side bots and for exercising the dispatcher.
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<String>,
    closed: AtomicBool,
}

impl ChannelTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                closed: AtomicBool::new(false),
            },
            rx,
        )
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send_text(&self, frame: &str) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        self.tx
            .send(frame.to_string())
            .map_err(|_| TransportError::WriteFailed("receiver dropped".to_string()))
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    struct StalledTransport;

    #[async_trait]
    impl Transport for StalledTransport {
        async fn send_text(&self, _frame: &str) -> Result<(), TransportError> {
            std::future::pending::<()>().await;
            Ok(())
        }

        async fn close(&self) {}
    }

    #[tokio::test]
    async fn test_deliver_to_open_connection() {
        let (transport, mut rx) = ChannelTransport::new();
        let conn = Connection::new(1, transport);
        conn.deliver("hello", None).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_closed_connection_is_not_written() {
        let (transport, mut rx) = ChannelTransport::new();
        let conn = Connection::new(1, transport);
        assert!(conn.mark_closed());
        assert!(!conn.mark_closed());

        let err = conn.deliver("hello", None).await.unwrap_err();
        assert_matches!(err, TransportError::Closed);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dropped_receiver_fails_write() {
        let (transport, rx) = ChannelTransport::new();
        let conn = Connection::new(1, transport);
        drop(rx);
        let err = conn.deliver("hello", None).await.unwrap_err();
        assert_matches!(err, TransportError::WriteFailed(_));
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_timeout() {
        let conn = Connection::new(1, StalledTransport);
        let err = conn
            .deliver("hello", Some(Duration::from_millis(50)))
            .await
            .unwrap_err();
        assert_matches!(err, TransportError::TimedOut(_));
    }

    struct StalledClose;

    #[async_trait]
    impl Transport for StalledClose {
        async fn send_text(&self, _frame: &str) -> Result<(), TransportError> {
            Ok(())
        }

        async fn close(&self) {
            std::future::pending::<()>().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_gives_up_on_stalled_close() {
        let conn = Connection::new(1, StalledClose);
        tokio::time::timeout(CLOSE_TIMEOUT * 2, conn.shutdown())
            .await
            .unwrap();
        assert!(!conn.is_open());
    }

    #[tokio::test]
    async fn test_wait_closed_after_mark() {
        let (transport, _rx) = ChannelTransport::new();
        let conn = Connection::new(1, transport);
        conn.mark_closed();
        // permit stored by notify_one, or the open flag short-circuits
        tokio::time::timeout(Duration::from_secs(1), conn.wait_closed())
            .await
            .unwrap();
    }

    #[test]
    fn test_connection_ids_are_unique() {
        assert_ne!(ConnectionId::new(), ConnectionId::new());
    }
}
