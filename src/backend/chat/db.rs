/**
 * Database Operations for Chat Messages
 *
 * This module provides the SQL behind the message store: appending chat
 * messages and reading back a conversation history.
 */

use crate::shared::{ChatMessage, HistoryQuery};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

/// Open a pool and bring the schema up to date
///
/// In-memory databases are pinned to a single connection that never idles
/// out, otherwise every pooled connection would see its own empty database.
pub async fn connect(database_url: &str) -> Result<SqlitePool, crate::backend::error::BackendError> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

    let pool = if database_url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?
    };

    tracing::info!("Running database migrations...");
    sqlx::migrate!().run(&pool).await?;
    tracing::info!("Database migrations completed successfully");

    Ok(pool)
}

/// Append a message and return its row id
pub async fn save_message(pool: &SqlitePool, message: &ChatMessage) -> Result<i64, sqlx::Error> {
    let created_at = message.created_at.unwrap_or_else(Utc::now);

    let result = sqlx::query(
        r#"
        INSERT INTO chats (sender_id, recipient_id, group_id, message, is_group, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(message.sender_id)
    .bind(message.recipient_id)
    .bind(message.group_id)
    .bind(&message.message)
    .bind(message.is_group)
    .bind(created_at)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Load a conversation, oldest first
///
/// Matches the direct conversation between the two users in either
/// direction, plus every group message of `group_id` when it is non-zero.
pub async fn load_messages(pool: &SqlitePool, query: &HistoryQuery) -> Result<Vec<ChatMessage>, sqlx::Error> {
    #[derive(sqlx::FromRow)]
    struct ChatRow {
        id: i64,
        sender_id: i64,
        recipient_id: i64,
        group_id: i64,
        message: String,
        is_group: bool,
        created_at: DateTime<Utc>,
    }

    let rows = sqlx::query_as::<_, ChatRow>(
        r#"
        SELECT id, sender_id, recipient_id, group_id, message, is_group, created_at
        FROM chats
        WHERE (sender_id = ? AND recipient_id = ?)
           OR (sender_id = ? AND recipient_id = ?)
           OR (? != 0 AND group_id = ? AND is_group = TRUE)
        ORDER BY created_at ASC, id ASC
        "#,
    )
    .bind(query.user_id)
    .bind(query.recipient_id)
    .bind(query.recipient_id)
    .bind(query.user_id)
    .bind(query.group_id)
    .bind(query.group_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| ChatMessage {
            id: Some(row.id),
            sender_id: row.sender_id,
            recipient_id: row.recipient_id,
            group_id: row.group_id,
            message: row.message,
            is_group: row.is_group,
            created_at: Some(row.created_at),
        })
        .collect())
}
