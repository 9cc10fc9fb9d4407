/**
 * Chat Session
 *
 * Drives one upgraded connection for its whole life. The session owns the
 * read half of the transport and turns every inbound text frame into a chat
 * message: decode, stamp sender and time, persist, then queue for broadcast.
 *
 * # Termination
 *
 * The loop ends when the peer closes, the transport errors, the idle timeout
 * fires, or the dispatcher evicts the connection. In those cases the
 * connection is unregistered and its transport released before `run`
 * returns. A malformed frame is logged and skipped; it never ends the
 * session.
 *
 * On server shutdown the session stops reading and lets go of its broadcast
 * sender, but the connection stays registered so the dispatcher can still
 * deliver what is queued. Whoever drives the shutdown closes it afterwards.
 */

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use chrono::Utc;
use futures_util::{Stream, StreamExt};
use tokio::sync::watch;

use crate::backend::chat::connection::Connection;
use crate::backend::chat::registry::ConnectionRegistry;
use crate::backend::chat::store::MessageStore;
use crate::backend::realtime::{enqueue, BroadcastSender};
use crate::shared::{ChatMessage, ServerConfig};

/// Per-session knobs taken from the server configuration
#[derive(Debug, Clone, Copy)]
pub struct SessionPolicy {
    /// Broadcast messages the store failed to persist
    pub broadcast_unpersisted: bool,
    /// Close the session after this long without an inbound frame
    pub idle_timeout: Option<Duration>,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            broadcast_unpersisted: true,
            idle_timeout: None,
        }
    }
}

impl From<&ServerConfig> for SessionPolicy {
    fn from(config: &ServerConfig) -> Self {
        Self {
            broadcast_unpersisted: config.broadcast_unpersisted,
            idle_timeout: config.idle_timeout(),
        }
    }
}

/// Why a session stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    PeerClosed,
    TransportFault,
    IdleTimeout,
    /// The connection was closed from the outside (dispatcher eviction)
    Evicted,
    /// The server is shutting down; the connection is left registered
    ServerShutdown,
}

/// What happened to one inbound frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Queued for broadcast; `persisted` tells whether the store accepted it
    Broadcast { persisted: bool },
    /// Not valid chat JSON, skipped
    Malformed,
    /// Store failed and policy forbids broadcasting unpersisted messages
    PersistFailed,
    /// Dispatcher is gone, nothing was queued
    Dropped,
}

pub struct ChatSession {
    connection: Arc<Connection>,
    registry: Arc<ConnectionRegistry>,
    store: Arc<dyn MessageStore>,
    broadcast_tx: BroadcastSender,
    policy: SessionPolicy,
    shutdown: Option<watch::Receiver<bool>>,
}

impl ChatSession {
    pub fn new(
        connection: Arc<Connection>,
        registry: Arc<ConnectionRegistry>,
        store: Arc<dyn MessageStore>,
        broadcast_tx: BroadcastSender,
        policy: SessionPolicy,
    ) -> Self {
        Self {
            connection,
            registry,
            store,
            broadcast_tx,
            policy,
            shutdown: None,
        }
    }

    /// Stop reading once `shutdown` flips to true
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Receive loop. Consumes the session and cleans up before returning.
    pub async fn run<S>(mut self, mut inbound: S) -> SessionEnd
    where
        S: Stream<Item = Result<Message, axum::Error>> + Unpin,
    {
        let conn_id = self.connection.id();
        let user_id = self.connection.user_id();
        tracing::info!(%conn_id, user_id, "[Session] Started");

        let end = loop {
            let next = tokio::select! {
                next = next_frame(&mut inbound, self.policy.idle_timeout) => next,
                _ = self.connection.wait_closed() => break SessionEnd::Evicted,
                _ = shutdown_requested(&mut self.shutdown) => break SessionEnd::ServerShutdown,
            };

            let message = match next {
                Inbound::Frame(message) => message,
                Inbound::Idle => break SessionEnd::IdleTimeout,
                Inbound::Ended => break SessionEnd::PeerClosed,
                Inbound::Failed(e) => {
                    tracing::debug!(%conn_id, error = %e, "[Session] Read error");
                    break SessionEnd::TransportFault;
                }
            };

            match message {
                Message::Text(text) => {
                    self.handle_frame(text.as_str()).await;
                }
                Message::Binary(data) => match std::str::from_utf8(&data) {
                    Ok(text) => {
                        self.handle_frame(text).await;
                    }
                    Err(_) => {
                        tracing::warn!(%conn_id, "[Session] Dropping non-UTF-8 binary frame");
                    }
                },
                Message::Close(_) => break SessionEnd::PeerClosed,
                Message::Ping(_) | Message::Pong(_) => {}
            }
        };

        if end == SessionEnd::ServerShutdown {
            tracing::info!(%conn_id, user_id, "[Session] Stopped reading for shutdown");
            return end;
        }

        self.registry.unregister(conn_id);
        self.connection.shutdown().await;
        tracing::info!(%conn_id, user_id, reason = ?end, "[Session] Ended");
        end
    }

    /// Decode, stamp, persist and enqueue one frame
    pub async fn handle_frame(&self, frame: &str) -> FrameOutcome {
        let user_id = self.connection.user_id();

        let message = match ChatMessage::from_frame(frame) {
            Ok(message) => message.authored_by(user_id, Utc::now()),
            Err(e) => {
                tracing::warn!(
                    conn_id = %self.connection.id(),
                    user_id,
                    error = %e,
                    "[Session] Skipping malformed frame"
                );
                return FrameOutcome::Malformed;
            }
        };

        let (message, persisted) = match self.store.save(&message).await {
            Ok(id) => (message.with_id(id), true),
            Err(e) => {
                tracing::error!(user_id, error = %e, "[Session] Failed to persist message");
                if !self.policy.broadcast_unpersisted {
                    return FrameOutcome::PersistFailed;
                }
                (message, false)
            }
        };

        if enqueue(&self.broadcast_tx, message) {
            FrameOutcome::Broadcast { persisted }
        } else {
            FrameOutcome::Dropped
        }
    }
}

/// Resolves once shutdown is signalled; never if there is no signal
async fn shutdown_requested(shutdown: &mut Option<watch::Receiver<bool>>) {
    if let Some(rx) = shutdown {
        let stopped = rx.wait_for(|stop| *stop).await.is_ok();
        if stopped {
            return;
        }
    }
    std::future::pending::<()>().await
}

enum Inbound {
    Frame(Message),
    Failed(axum::Error),
    Ended,
    Idle,
}

async fn next_frame<S>(inbound: &mut S, idle_timeout: Option<Duration>) -> Inbound
where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let next = match idle_timeout {
        Some(limit) => match tokio::time::timeout(limit, inbound.next()).await {
            Ok(next) => next,
            Err(_) => return Inbound::Idle,
        },
        None => inbound.next().await,
    };
    match next {
        Some(Ok(message)) => Inbound::Frame(message),
        Some(Err(e)) => Inbound::Failed(e),
        None => Inbound::Ended,
    }
}
