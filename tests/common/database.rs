//! Message store fixtures

use std::sync::Arc;

use async_trait::async_trait;
use socialchat::backend::chat::store::{MessageStore, SqliteMessageStore};
use socialchat::shared::{ChatMessage, HistoryQuery};

/// Fresh private in-memory SQLite store
pub async fn memory_store() -> Arc<SqliteMessageStore> {
    Arc::new(
        SqliteMessageStore::in_memory()
            .await
            .expect("Failed to open in-memory store"),
    )
}

/// Store whose every operation fails, as if the database were down
pub struct FailingStore;

#[async_trait]
impl MessageStore for FailingStore {
    async fn save(&self, _message: &ChatMessage) -> Result<i64, sqlx::Error> {
        Err(sqlx::Error::PoolTimedOut)
    }

    async fn query(&self, _query: &HistoryQuery) -> Result<Vec<ChatMessage>, sqlx::Error> {
        Err(sqlx::Error::PoolTimedOut)
    }
}
