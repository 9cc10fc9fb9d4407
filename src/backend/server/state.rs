/**
 * Application State Management
 *
 * This module defines the application state structure and implements
 * the necessary `FromRef` traits for Axum state extraction.
 *
 * # Architecture
 *
 * The `AppState` struct is the central state container, holding:
 * - The connection registry shared by sessions and the dispatcher
 * - The producer side of the broadcast channel
 * - The message store
 * - The server configuration
 *
 * Every field is cheap to clone (`Arc` or channel handle), so handlers can
 * take the whole state or just the part they need.
 */

use axum::extract::FromRef;
use std::sync::Arc;
use tokio::sync::watch;

use crate::backend::chat::dispatcher::BroadcastDispatcher;
use crate::backend::chat::registry::ConnectionRegistry;
use crate::backend::chat::store::MessageStore;
use crate::backend::realtime::{broadcast_channel, BroadcastSender};
use crate::shared::ServerConfig;

/// Application state shared by every handler
#[derive(Clone)]
pub struct AppState {
    /// Open chat connections eligible for broadcast
    pub registry: Arc<ConnectionRegistry>,

    /// Producer side of the broadcast channel
    ///
    /// Dropping every clone of this (router state and sessions) is what lets
    /// the dispatcher finish.
    pub broadcast_tx: BroadcastSender,

    /// Durable message storage
    pub store: Arc<dyn MessageStore>,

    pub config: Arc<ServerConfig>,

    /// Flipped to true when the server starts shutting down
    shutdown: Arc<watch::Sender<bool>>,
}

impl AppState {
    /// Build the state together with the dispatcher that consumes its
    /// broadcast channel. The caller decides where the dispatcher runs.
    pub fn new(config: ServerConfig, store: Arc<dyn MessageStore>) -> (Self, BroadcastDispatcher) {
        let registry = Arc::new(ConnectionRegistry::new());
        let (broadcast_tx, broadcast_rx) = broadcast_channel();
        let dispatcher = BroadcastDispatcher::new(registry.clone(), broadcast_rx, config.write_timeout());

        let state = Self {
            registry,
            broadcast_tx,
            store,
            config: Arc::new(config),
            shutdown: Arc::new(watch::channel(false).0),
        };
        (state, dispatcher)
    }

    /// Tell every open session to stop reading
    pub fn begin_shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Receiver a session watches for [`AppState::begin_shutdown`]
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }
}

impl FromRef<AppState> for Arc<ConnectionRegistry> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.registry.clone()
    }
}

impl FromRef<AppState> for BroadcastSender {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.broadcast_tx.clone()
    }
}

impl FromRef<AppState> for Arc<dyn MessageStore> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.store.clone()
    }
}

impl FromRef<AppState> for Arc<ServerConfig> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.config.clone()
    }
}
