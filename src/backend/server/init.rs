/**
 * Server Initialization
 *
 * This module handles the initialization and setup of the Axum HTTP server,
 * including state creation, database loading, and route configuration.
 *
 * # Initialization Process
 *
 * 1. Open the message store (runs migrations)
 * 2. Create the registry and broadcast channel
 * 3. Start the broadcast dispatcher
 * 4. Create and configure the router
 *
 * # Shutdown
 *
 * The dispatcher runs until every broadcast sender is gone. Callers stop
 * serving, call `state.begin_shutdown()` so sessions release their senders,
 * drop `state`, then await `dispatcher` to let queued messages drain. Open
 * connections are closed afterwards with `registry.drain()`.
 */

use axum::Router;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::backend::chat::store::MessageStore;
use crate::backend::error::BackendError;
use crate::backend::routes::router::create_router;
use crate::backend::server::config::load_database;
use crate::backend::server::state::AppState;
use crate::shared::ServerConfig;

/// A configured application ready to be served
pub struct App {
    pub router: Router<()>,
    /// Handle on the shared state, for health checks and tests
    pub state: AppState,
    /// The running broadcast dispatcher
    pub dispatcher: JoinHandle<()>,
}

/// Create and configure the Axum application
///
/// Fails if the configuration is invalid or the database cannot be opened.
pub async fn create_app(config: ServerConfig) -> Result<App, BackendError> {
    tracing::info!("Initializing socialchat backend server");
    config.validate()?;

    let store = load_database(&config).await?;
    Ok(create_app_with_store(config, Arc::new(store)))
}

/// Assemble the application around an existing store
pub fn create_app_with_store(config: ServerConfig, store: Arc<dyn MessageStore>) -> App {
    let (state, dispatcher) = AppState::new(config, store);
    let dispatcher = dispatcher.spawn();
    tracing::info!("Broadcast dispatcher started");

    let router = create_router(state.clone());
    tracing::info!("Router configured");

    App {
        router,
        state,
        dispatcher,
    }
}
