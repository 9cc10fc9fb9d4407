//! Registry, session and dispatcher wired together without a network

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::Message;
use common::*;
use pretty_assertions::assert_eq;
use socialchat::backend::chat::connection::{ChannelTransport, Connection, Transport, TransportError};
use socialchat::backend::chat::dispatcher::{fan_out, BroadcastDispatcher, DeliveryReport};
use socialchat::backend::chat::registry::ConnectionRegistry;
use socialchat::backend::chat::session::{ChatSession, SessionEnd, SessionPolicy};
use socialchat::backend::realtime::broadcast_channel;
use socialchat::shared::ChatMessage;
use tokio::sync::mpsc::{self, UnboundedReceiver};

/// Transport that rejects every write
struct BrokenPipe;

#[async_trait]
impl Transport for BrokenPipe {
    async fn send_text(&self, _frame: &str) -> Result<(), TransportError> {
        Err(TransportError::WriteFailed("broken pipe".to_string()))
    }

    async fn close(&self) {}
}

fn channel_peer(registry: &ConnectionRegistry, user_id: i64) -> (Arc<Connection>, UnboundedReceiver<String>) {
    let (transport, rx) = ChannelTransport::new();
    let conn = Arc::new(Connection::new(user_id, transport));
    registry.register(conn.clone());
    (conn, rx)
}

#[tokio::test]
async fn test_hundred_peers_one_failing() {
    let registry = ConnectionRegistry::new();
    let mut receivers = Vec::new();
    let mut failing = None;

    for user_id in 1..=100 {
        if user_id == 50 {
            let conn = Arc::new(Connection::new(user_id, BrokenPipe));
            registry.register(conn.clone());
            failing = Some(conn);
        } else {
            receivers.push(channel_peer(&registry, user_id).1);
        }
    }
    assert_eq!(registry.len(), 100);

    let message = ChatMessage::direct(2, "to everyone").authored_by(1, chrono::Utc::now());
    let report = fan_out(&registry, &message, Some(Duration::from_secs(1))).await;

    assert_eq!(report, DeliveryReport { delivered: 99, evicted: 1, skipped: 0 });
    assert_eq!(registry.len(), 99);
    let failing = failing.unwrap();
    assert!(!registry.contains(failing.id()));
    assert!(!failing.is_open());

    for rx in receivers.iter_mut() {
        let frame = rx.try_recv().expect("peer missed the broadcast");
        assert_eq!(ChatMessage::from_frame(&frame).unwrap(), message);
    }
}

#[tokio::test]
async fn test_session_to_dispatcher_round_trip() {
    let store = memory_store().await;
    let registry = Arc::new(ConnectionRegistry::new());
    let (broadcast_tx, broadcast_rx) = broadcast_channel();
    let dispatcher = BroadcastDispatcher::new(registry.clone(), broadcast_rx, None).spawn();

    let (alice, mut alice_rx) = channel_peer(&registry, 1);
    let (_bob, mut bob_rx) = channel_peer(&registry, 2);

    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<Result<Message, axum::Error>>();
    let session = ChatSession::new(
        alice.clone(),
        registry.clone(),
        store,
        broadcast_tx,
        SessionPolicy::default(),
    );
    let inbound = Box::pin(futures_util::stream::unfold(inbound_rx, |mut rx| async move {
        rx.recv().await.map(|frame| (frame, rx))
    }));
    let session = tokio::spawn(session.run(inbound));

    inbound_tx
        .send(Ok(Message::Text(r#"{"recipient_id":2,"message":"ping"}"#.into())))
        .unwrap();

    for rx in [&mut alice_rx, &mut bob_rx] {
        let frame = tokio::time::timeout(TIMEOUT, rx.recv()).await.unwrap().unwrap();
        let received = ChatMessage::from_frame(&frame).unwrap();
        assert_eq!(received.sender_id, 1);
        assert_eq!(received.message, "ping");
    }

    // Peer hangs up: the session unregisters itself, and with the last sender
    // gone the dispatcher exits.
    drop(inbound_tx);
    tokio::time::timeout(TIMEOUT, session).await.unwrap().unwrap();
    assert!(!registry.contains(alice.id()));
    tokio::time::timeout(TIMEOUT, dispatcher).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_unregister_between_snapshot_and_write() {
    let registry = ConnectionRegistry::new();
    let (a, mut rx_a) = channel_peer(&registry, 1);
    let (_b, mut rx_b) = channel_peer(&registry, 2);

    let snapshot = registry.snapshot();
    registry.unregister(a.id());

    let frame = ChatMessage::direct(2, "late").to_frame().unwrap();
    let mut delivered = 0;
    for conn in snapshot {
        if conn.deliver(&frame, None).await.is_ok() {
            delivered += 1;
        }
    }

    assert_eq!(delivered, 1);
    assert!(rx_a.try_recv().is_err());
    assert!(rx_b.try_recv().is_ok());
}

#[tokio::test]
async fn test_shutdown_drains_queue_before_closing() {
    let store = memory_store().await;
    let registry = Arc::new(ConnectionRegistry::new());
    let (broadcast_tx, broadcast_rx) = broadcast_channel();
    let dispatcher = BroadcastDispatcher::new(registry.clone(), broadcast_rx, None).spawn();
    let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);

    let (alice, mut alice_rx) = channel_peer(&registry, 1);
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<Result<Message, axum::Error>>();
    let session = ChatSession::new(
        alice.clone(),
        registry.clone(),
        store,
        broadcast_tx,
        SessionPolicy::default(),
    )
    .with_shutdown(stop_rx);
    let inbound = Box::pin(futures_util::stream::unfold(inbound_rx, |mut rx| async move {
        rx.recv().await.map(|frame| (frame, rx))
    }));
    let session = tokio::spawn(session.run(inbound));

    inbound_tx
        .send(Ok(Message::Text(r#"{"recipient_id":2,"message":"last words"}"#.into())))
        .unwrap();
    let frame = tokio::time::timeout(TIMEOUT, alice_rx.recv()).await.unwrap().unwrap();
    assert_eq!(ChatMessage::from_frame(&frame).unwrap().message, "last words");

    stop_tx.send_replace(true);
    let end = tokio::time::timeout(TIMEOUT, session).await.unwrap().unwrap();
    assert_eq!(end, SessionEnd::ServerShutdown);

    // The session held the only sender, so the dispatcher finishes on its own
    tokio::time::timeout(TIMEOUT, dispatcher).await.unwrap().unwrap();
    assert!(registry.contains(alice.id()));

    for conn in registry.drain() {
        conn.shutdown().await;
    }
    assert!(!alice.is_open());
    assert!(registry.is_empty());
    drop(inbound_tx);
}
