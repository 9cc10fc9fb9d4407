/**
 * Message Store
 *
 * Durable, append-only persistence for chat messages. The realtime core only
 * depends on the `MessageStore` trait; `SqliteMessageStore` is the
 * production implementation backed by `sqlx`.
 *
 * Implementations must be safe for concurrent writers: every open session
 * saves through the same store.
 */

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::backend::chat::db;
use crate::backend::error::BackendError;
use crate::shared::{ChatMessage, HistoryQuery};

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a message, returning the id assigned to it
    async fn save(&self, message: &ChatMessage) -> Result<i64, sqlx::Error>;

    /// Conversation history matching `query`, oldest first
    async fn query(&self, query: &HistoryQuery) -> Result<Vec<ChatMessage>, sqlx::Error>;
}

#[derive(Clone, Debug)]
pub struct SqliteMessageStore {
    pool: SqlitePool,
}

impl SqliteMessageStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to `database_url` and run migrations
    pub async fn connect(database_url: &str) -> Result<Self, BackendError> {
        Ok(Self::new(db::connect(database_url).await?))
    }

    /// Fresh private database, mostly for tests
    pub async fn in_memory() -> Result<Self, BackendError> {
        Self::connect("sqlite::memory:").await
    }
}

#[async_trait]
impl MessageStore for SqliteMessageStore {
    async fn save(&self, message: &ChatMessage) -> Result<i64, sqlx::Error> {
        db::save_message(&self.pool, message).await
    }

    async fn query(&self, query: &HistoryQuery) -> Result<Vec<ChatMessage>, sqlx::Error> {
        db::load_messages(&self.pool, query).await
    }
}
