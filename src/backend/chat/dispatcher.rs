/**
 * Broadcast Dispatcher
 *
 * The single long-lived consumer of the broadcast channel. For each queued
 * message it takes a registry snapshot and writes the message to every
 * connection in it, one after another.
 *
 * # Failure handling
 *
 * A failed or timed-out write is taken as proof the peer is gone: the
 * connection is unregistered and its transport closed, and the pass moves on
 * to the next peer. Nothing is retried. The loop itself only ends when every
 * sender of the channel has been dropped and the queue is drained.
 */

use std::sync::Arc;
use std::time::Duration;

use crate::backend::chat::connection::TransportError;
use crate::backend::chat::registry::ConnectionRegistry;
use crate::backend::realtime::BroadcastReceiver;
use crate::shared::ChatMessage;

/// Outcome of one fan-out pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Peers that received the frame
    pub delivered: usize,
    /// Peers evicted because the write failed
    pub evicted: usize,
    /// Peers skipped because they closed while the pass was running
    pub skipped: usize,
}

pub struct BroadcastDispatcher {
    registry: Arc<ConnectionRegistry>,
    receiver: BroadcastReceiver,
    write_timeout: Option<Duration>,
}

impl BroadcastDispatcher {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        receiver: BroadcastReceiver,
        write_timeout: Option<Duration>,
    ) -> Self {
        Self {
            registry,
            receiver,
            write_timeout,
        }
    }

    /// Run on the tokio runtime until the channel closes
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        tracing::info!("[Dispatcher] Started");
        let mut passes: u64 = 0;
        while let Some(message) = self.receiver.recv().await {
            fan_out(&self.registry, &message, self.write_timeout).await;
            passes += 1;
        }
        tracing::info!(passes, "[Dispatcher] Broadcast channel closed, exiting");
    }
}

/// Deliver `message` to every connection registered right now
pub async fn fan_out(
    registry: &ConnectionRegistry,
    message: &ChatMessage,
    write_timeout: Option<Duration>,
) -> DeliveryReport {
    let mut report = DeliveryReport::default();

    let frame = match message.to_frame() {
        Ok(frame) => frame,
        Err(e) => {
            tracing::error!(error = %e, "[Dispatcher] Failed to encode message, dropping it");
            return report;
        }
    };

    for connection in registry.snapshot() {
        match connection.deliver(&frame, write_timeout).await {
            Ok(()) => report.delivered += 1,
            Err(TransportError::Closed) => report.skipped += 1,
            Err(e) => {
                tracing::warn!(
                    conn_id = %connection.id(),
                    user_id = connection.user_id(),
                    error = %e,
                    "[Dispatcher] Delivery failed, evicting connection"
                );
                if let Some(evicted) = registry.unregister(connection.id()) {
                    // Closing a wedged peer can block; keep it off the pass
                    tokio::spawn(async move { evicted.shutdown().await });
                }
                report.evicted += 1;
            }
        }
    }

    tracing::debug!(
        sender_id = message.sender_id,
        delivered = report.delivered,
        evicted = report.evicted,
        skipped = report.skipped,
        "[Dispatcher] Broadcast pass complete"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::chat::connection::{ChannelTransport, Connection, Transport};
    use crate::backend::realtime::broadcast_channel;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn register(registry: &ConnectionRegistry, user_id: i64) -> (Arc<Connection>, UnboundedReceiver<String>) {
        let (transport, rx) = ChannelTransport::new();
        let conn = Arc::new(Connection::new(user_id, transport));
        registry.register(conn.clone());
        (conn, rx)
    }

    fn sample() -> ChatMessage {
        ChatMessage { sender_id: 1, ..ChatMessage::direct(2, "hi") }
    }

    #[tokio::test]
    async fn test_fan_out_reaches_everyone_including_sender() {
        let registry = ConnectionRegistry::new();
        let (_a, mut rx_a) = register(&registry, 1);
        let (_b, mut rx_b) = register(&registry, 2);

        let report = fan_out(&registry, &sample(), None).await;
        assert_eq!(report.delivered, 2);

        for rx in [&mut rx_a, &mut rx_b] {
            let received = ChatMessage::from_frame(&rx.recv().await.unwrap()).unwrap();
            assert_eq!(received, sample());
        }
    }

    #[tokio::test]
    async fn test_failed_peer_is_evicted_and_others_still_receive() {
        let registry = ConnectionRegistry::new();
        let (bad, rx_bad) = register(&registry, 1);
        let (_good, mut rx_good) = register(&registry, 2);
        drop(rx_bad);

        let report = fan_out(&registry, &sample(), None).await;
        assert_eq!(report, DeliveryReport { delivered: 1, evicted: 1, skipped: 0 });
        assert!(rx_good.recv().await.is_some());
        assert!(!registry.contains(bad.id()));
        assert!(!bad.is_open());

        // evicted once, never retried
        let report = fan_out(&registry, &sample(), None).await;
        assert_eq!(report, DeliveryReport { delivered: 1, evicted: 0, skipped: 0 });
    }

    /// Peer that accepts neither writes nor the close handshake
    struct Wedged;

    #[async_trait::async_trait]
    impl Transport for Wedged {
        async fn send_text(&self, _frame: &str) -> Result<(), TransportError> {
            std::future::pending::<()>().await;
            Ok(())
        }

        async fn close(&self) {
            std::future::pending::<()>().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wedged_peer_does_not_stall_the_pass() {
        let registry = ConnectionRegistry::new();
        let wedged = Arc::new(Connection::new(1, Wedged));
        registry.register(wedged.clone());
        let (_good, mut rx_good) = register(&registry, 2);

        let limit = Duration::from_millis(50);
        let report = tokio::time::timeout(limit * 4, fan_out(&registry, &sample(), Some(limit)))
            .await
            .unwrap();
        assert_eq!(report.evicted, 1);
        assert_eq!(report.delivered, 1);
        assert!(rx_good.try_recv().is_ok());
        assert!(!registry.contains(wedged.id()));

        let report = fan_out(&registry, &sample(), Some(limit)).await;
        assert_eq!(report, DeliveryReport { delivered: 1, evicted: 0, skipped: 0 });
    }

    #[tokio::test]
    async fn test_unregistered_connection_gets_nothing() {
        let registry = ConnectionRegistry::new();
        let (a, mut rx_a) = register(&registry, 1);
        registry.unregister(a.id());

        let report = fan_out(&registry, &sample(), None).await;
        assert_eq!(report.delivered, 0);
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_empty_registry() {
        let registry = ConnectionRegistry::new();
        assert_eq!(fan_out(&registry, &sample(), None).await, DeliveryReport::default());
    }

    #[tokio::test]
    async fn test_run_drains_queue_then_exits() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (_a, mut rx_a) = register(&registry, 1);
        let (tx, rx) = broadcast_channel();

        for i in 0..3 {
            tx.send(ChatMessage::direct(2, format!("m{i}"))).unwrap();
        }
        drop(tx);

        BroadcastDispatcher::new(registry, rx, None).run().await;

        for i in 0..3 {
            let frame = rx_a.recv().await.unwrap();
            assert_eq!(ChatMessage::from_frame(&frame).unwrap().message, format!("m{i}"));
        }
    }
}
