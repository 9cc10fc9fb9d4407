/**
 * Router Configuration
 *
 * This module provides the main router creation function that combines
 * all route configurations into a single Axum router.
 *
 * # Layers
 *
 * - Chat routes sit behind `auth_middleware`; `/health` does not.
 * - Every route gets request tracing and a CORS policy built from the same
 *   origin allow-list the upgrade handler enforces.
 */

use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::backend::chat::handlers::{get_messages, handle_chat_upgrade, health, send_message};
use crate::backend::middleware::auth::auth_middleware;
use crate::backend::server::state::AppState;
use crate::shared::ServerConfig;

/// Create the Axum router with all routes configured
///
/// ## Chat Routes (authenticated)
///
/// - `GET /chats/ws` - Websocket upgrade
/// - `POST /api/chats` - Send a message over REST
/// - `GET /api/chats/{recipient_id}` - Conversation history
///
/// ## Public
///
/// - `GET /health` - Liveness and connection count
pub fn create_router(app_state: AppState) -> Router<()> {
    let chat_routes = Router::new()
        .route("/chats/ws", get(handle_chat_upgrade))
        .route("/api/chats", post(send_message))
        .route("/api/chats/{recipient_id}", get(get_messages))
        .route_layer(from_fn_with_state(app_state.clone(), auth_middleware));

    let cors = cors_layer(&app_state.config);

    Router::new()
        .merge(chat_routes)
        .route("/health", get(health))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(app_state)
}

/// CORS policy matching the socket origin allow-list
fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring unparsable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}
