/**
 * Connection Registry
 *
 * The authoritative set of open chat connections eligible for broadcast.
 *
 * All access goes through `register`, `unregister` and `snapshot`. The set
 * lives behind a single mutex that is only held for map operations; no I/O
 * ever happens while it is locked. Closing a transport after eviction is the
 * caller's job, outside the lock.
 *
 * A connection registered after a snapshot was taken does not see messages
 * already being dispatched from that snapshot.
 */

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::backend::chat::connection::{Connection, ConnectionId};

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<ConnectionId, Arc<Connection>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ConnectionId, Arc<Connection>>> {
        // The map is never left half-updated, so a poisoned lock is still usable.
        self.connections.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add a connection. Idempotent; closed connections are never re-added.
    pub fn register(&self, connection: Arc<Connection>) {
        if !connection.is_open() {
            tracing::debug!(conn_id = %connection.id(), "ignoring register of closed connection");
            return;
        }
        let id = connection.id();
        let total = {
            let mut connections = self.lock();
            connections.entry(id).or_insert(connection);
            connections.len()
        };
        tracing::debug!(conn_id = %id, total, "connection registered");
    }

    /// Remove a connection if present.
    ///
    /// The removed connection is marked closed before this returns, so no
    /// later delivery attempt will write to it even from a snapshot that
    /// still holds it.
    pub fn unregister(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        let removed = self.lock().remove(&id);
        if let Some(connection) = &removed {
            connection.mark_closed();
            tracing::debug!(conn_id = %id, "connection unregistered");
        }
        removed
    }

    /// Remove every connection at once, marking each closed.
    ///
    /// Used at shutdown; the caller releases the transports.
    pub fn drain(&self) -> Vec<Arc<Connection>> {
        let drained: Vec<_> = self.lock().drain().map(|(_, conn)| conn).collect();
        for connection in &drained {
            connection.mark_closed();
        }
        drained
    }

    /// Current members for one broadcast pass
    pub fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.lock().values().cloned().collect()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
