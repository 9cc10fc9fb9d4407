//! Live test server and websocket client helpers

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use socialchat::backend::chat::store::MessageStore;
use socialchat::backend::server::{create_app_with_store, AppState};
use socialchat::shared::{ChatMessage, ServerConfig, ServerConfigBuilder};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;

use super::auth_helpers::{token_for, TEST_SECRET};

pub const TIMEOUT: Duration = Duration::from_secs(5);
pub const ALLOWED_ORIGIN: &str = "http://localhost:3000";

pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Config every test starts from
pub fn test_config() -> ServerConfigBuilder {
    ServerConfig::builder()
        .bind("127.0.0.1", 0)
        .database_url("sqlite::memory:")
        .jwt_secret(TEST_SECRET)
}

/// A server listening on an ephemeral port
pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
}

impl TestServer {
    pub async fn start(store: Arc<dyn MessageStore>) -> Self {
        Self::start_with(test_config(), store).await
    }

    pub async fn start_with(config: ServerConfigBuilder, store: Arc<dyn MessageStore>) -> Self {
        let config = config.build().expect("invalid test config");
        let app = create_app_with_store(config, store);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("listener has no address");
        tokio::spawn(async move {
            axum::serve(listener, app.router).await.ok();
        });

        Self { addr, state: app.state }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/chats/ws", self.addr)
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Open a socket as `user_id` from the allowed origin, token in the query
    pub async fn connect(&self, user_id: i64) -> WsStream {
        let url = format!("{}?token={}", self.ws_url(), token_for(user_id));
        let (ws, _) = self
            .connect_with(&url, Some(ALLOWED_ORIGIN))
            .await
            .expect("websocket handshake failed");
        ws
    }

    pub async fn connect_with(
        &self,
        url: &str,
        origin: Option<&str>,
    ) -> Result<(WsStream, u16), tokio_tungstenite::tungstenite::Error> {
        let mut request = url.into_client_request()?;
        if let Some(origin) = origin {
            request
                .headers_mut()
                .insert("Origin", HeaderValue::from_str(origin).expect("bad origin header"));
        }
        let (ws, response) = tokio_tungstenite::connect_async(request).await?;
        Ok((ws, response.status().as_u16()))
    }

    /// Wait until exactly `count` connections are registered
    pub async fn wait_for_connections(&self, count: usize) {
        timeout(TIMEOUT, async {
            while self.state.registry.len() != count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| {
            panic!(
                "expected {count} connections, registry has {}",
                self.state.registry.len()
            )
        });
    }
}

/// Send a JSON frame
pub async fn send_json(ws: &mut WsStream, value: serde_json::Value) {
    ws.send(Message::text(value.to_string()))
        .await
        .expect("failed to send frame");
}

/// Read the next chat message, skipping control frames
pub async fn read_message(ws: &mut WsStream) -> ChatMessage {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("timeout waiting for message")
            .expect("stream closed")
            .expect("ws error");
        if let Message::Text(text) = msg {
            return ChatMessage::from_frame(text.as_str()).expect("server sent invalid chat frame");
        }
    }
}

/// Assert nothing arrives for a short while
pub async fn assert_silent(ws: &mut WsStream) {
    match timeout(Duration::from_millis(200), ws.next()).await {
        Err(_) => {}
        Ok(Some(Ok(Message::Text(text)))) => panic!("unexpected frame: {}", text.as_str()),
        Ok(other) => panic!("unexpected stream event: {other:?}"),
    }
}
