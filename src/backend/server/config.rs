/**
 * Server Configuration
 *
 * This module turns the loaded `ServerConfig` into live services, which for
 * now means the message store and its connection pool.
 *
 * Unlike optional integrations, the store is required: a chat server that
 * cannot persist fails at startup instead of running degraded.
 */

use crate::backend::chat::store::SqliteMessageStore;
use crate::backend::error::BackendError;
use crate::shared::ServerConfig;

/// Connect the message store and run migrations
pub async fn load_database(config: &ServerConfig) -> Result<SqliteMessageStore, BackendError> {
    tracing::info!("Connecting to database...");

    let store = SqliteMessageStore::connect(&config.database_url).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to open message store");
        e
    })?;

    tracing::info!("Database connection pool created successfully");
    Ok(store)
}
