/**
 * Broadcast Channel
 *
 * The hand-off queue between chat sessions (many producers) and the
 * broadcast dispatcher (one consumer).
 *
 * The channel is an unbounded `tokio::sync::mpsc` channel: enqueueing never
 * blocks a session, messages from one producer stay in order, and the
 * consumer sees every message exactly once. There is no backpressure; a
 * dispatcher that falls behind grows the queue.
 */

use crate::shared::ChatMessage;
use tokio::sync::mpsc;

/// Producer side, cloned into every session
pub type BroadcastSender = mpsc::UnboundedSender<ChatMessage>;

/// Consumer side, owned by the dispatcher
pub type BroadcastReceiver = mpsc::UnboundedReceiver<ChatMessage>;

pub fn broadcast_channel() -> (BroadcastSender, BroadcastReceiver) {
    mpsc::unbounded_channel()
}

/// Queue a message for fan-out
///
/// Returns `false` only when the dispatcher has gone away (shutdown).
pub fn enqueue(broadcast_tx: &BroadcastSender, message: ChatMessage) -> bool {
    match broadcast_tx.send(message) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(sender_id = e.0.sender_id, "[Realtime] Dispatcher gone, message not broadcast");
            false
        }
    }
}
