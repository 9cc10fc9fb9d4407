/**
 * REST Chat Handlers
 *
 * Plain request/response endpoints next to the realtime socket:
 * - `POST /api/chats` - persist a message
 * - `GET /api/chats/{recipient_id}` - conversation history
 * - `GET /health` - liveness and open connection count
 *
 * Messages sent over REST are stored but not pushed to open sockets unless
 * `rest_fanout` is enabled.
 */

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use std::sync::Arc;

use crate::backend::chat::registry::ConnectionRegistry;
use crate::backend::chat::store::MessageStore;
use crate::backend::error::BackendError;
use crate::backend::middleware::auth::AuthUser;
use crate::backend::realtime::{enqueue, BroadcastSender};
use crate::shared::{ChatMessage, HistoryQuery, ServerConfig};

#[derive(Debug, Serialize, Deserialize)]
pub struct SendMessageResponse {
    pub message: String,
    pub id: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    #[serde(default)]
    pub group_id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub connections: usize,
}

/// Handle `POST /api/chats`
///
/// The sender is always the authenticated user, whatever the body says.
///
/// # Errors
///
/// * `400 Bad Request` - body is not a chat message, or has no valid target
/// * `500 Internal Server Error` - the store failed
pub async fn send_message(
    State(store): State<Arc<dyn MessageStore>>,
    State(broadcast_tx): State<BroadcastSender>,
    State(config): State<Arc<ServerConfig>>,
    AuthUser(user): AuthUser,
    body: Bytes,
) -> Result<(StatusCode, Json<SendMessageResponse>), BackendError> {
    let message: ChatMessage = serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!(user_id = user.user_id, error = %e, "[Chat] Rejected malformed message body");
        BackendError::handler(StatusCode::BAD_REQUEST, format!("invalid message: {e}"))
    })?;
    message.validate()?;

    let message = message.authored_by(user.user_id, Utc::now());
    let id = store.save(&message).await.map_err(|e| {
        tracing::error!(user_id = user.user_id, error = %e, "[Chat] Failed to persist message");
        e
    })?;
    tracing::info!(user_id = user.user_id, id, target = ?message.target(), "[Chat] Message stored via REST");

    if config.rest_fanout {
        enqueue(&broadcast_tx, message.with_id(id));
    }

    Ok((
        StatusCode::CREATED,
        Json(SendMessageResponse {
            message: "Message sent successfully".to_string(),
            id,
        }),
    ))
}

/// Handle `GET /api/chats/{recipient_id}?group_id=N`
///
/// Returns 204 No Content when the conversation is empty.
pub async fn get_messages(
    State(store): State<Arc<dyn MessageStore>>,
    AuthUser(user): AuthUser,
    Path(recipient_id): Path<i64>,
    Query(params): Query<HistoryParams>,
) -> Result<Response, BackendError> {
    let query = HistoryQuery {
        user_id: user.user_id,
        recipient_id,
        group_id: params.group_id,
    };

    let messages = store.query(&query).await?;
    tracing::debug!(user_id = user.user_id, recipient_id, count = messages.len(), "[Chat] History loaded");

    if messages.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    Ok(Json(messages).into_response())
}

/// Handle `GET /health`
pub async fn health(State(registry): State<Arc<ConnectionRegistry>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        connections: registry.len(),
    })
}
