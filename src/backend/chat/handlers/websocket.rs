/**
 * Chat Upgrade Handler
 *
 * `GET /chats/ws` turns an authenticated HTTP request into a chat session.
 *
 * # Checks
 *
 * The route only accepts GET, so other methods are answered 405 by the
 * router. The `Origin` header must match the configured allow-list exactly;
 * a missing or unknown origin gets 403. Both checks happen before the
 * upgrade, so a refused request never touches the registry.
 *
 * # Session Start
 *
 * After the handshake the socket is split: the write half becomes the
 * connection's transport and is registered for broadcast, the read half
 * feeds the session loop.
 */

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{header::ORIGIN, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures_util::StreamExt;
use std::sync::Arc;

use crate::backend::chat::connection::{Connection, WebSocketTransport};
use crate::backend::chat::session::{ChatSession, SessionPolicy};
use crate::backend::middleware::auth::AuthUser;
use crate::backend::server::state::AppState;

/// Handle a chat socket upgrade request
///
/// # Errors
///
/// * `401 Unauthorized` - no valid session (from the auth middleware)
/// * `403 Forbidden` - `Origin` missing or not allowed
/// * `405 Method Not Allowed` - not a GET (from the router)
/// * `400`/`426` - not a valid websocket handshake
pub async fn handle_chat_upgrade(
    State(app_state): State<AppState>,
    AuthUser(user): AuthUser,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let origin = headers.get(ORIGIN).and_then(|h| h.to_str().ok());
    if !app_state.config.origin_allowed(origin) {
        tracing::warn!(user_id = user.user_id, origin = ?origin, "[Chat] Rejected upgrade from disallowed origin");
        return StatusCode::FORBIDDEN.into_response();
    }

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            tracing::debug!(user_id = user.user_id, error = %rejection, "[Chat] Not a websocket handshake");
            return rejection.into_response();
        }
    };

    let user_id = user.user_id;
    ws.on_failed_upgrade(move |e| {
        tracing::warn!(user_id, error = %e, "[Chat] Websocket upgrade failed");
    })
    .on_upgrade(move |socket| serve_socket(socket, user_id, app_state))
}

/// Run one upgraded socket until its session ends
async fn serve_socket(socket: WebSocket, user_id: i64, app_state: AppState) {
    let (sink, stream) = socket.split();

    let connection = Arc::new(Connection::new(user_id, WebSocketTransport::new(sink)));
    app_state.registry.register(connection.clone());
    tracing::info!(
        conn_id = %connection.id(),
        user_id,
        open = app_state.registry.len(),
        "[Chat] Client connected"
    );

    let session = ChatSession::new(
        connection,
        app_state.registry.clone(),
        app_state.store.clone(),
        app_state.broadcast_tx.clone(),
        SessionPolicy::from(app_state.config.as_ref()),
    )
    .with_shutdown(app_state.shutdown_signal());
    session.run(stream).await;
}
