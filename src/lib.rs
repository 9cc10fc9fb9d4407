//! socialchat - Realtime Chat Core
//!
//! The realtime messaging core of a social-network backend. Authenticated
//! clients open a websocket, every message they send is persisted and then
//! pushed to every open socket.
//!
//! # Module Structure
//!
//! - **`shared`** - Wire types, configuration and shared errors
//!   - `ChatMessage`, `MessageTarget`, `HistoryQuery`
//!   - `ServerConfig` and its builder
//!
//! - **`backend`** - Server-side code (only compiled with `ssr` feature)
//!   - Axum server, upgrade endpoint and REST handlers
//!   - Connection registry, sessions and broadcast dispatcher
//!   - SQLite message store
//!
//! # Feature Flags
//!
//! - **`ssr`** (default) - Server code and its dependencies. Without it only
//!   the shared types are built, which is enough for clients.
//!
//! # Usage
//!
//! ```rust,no_run
//! use socialchat::backend::server::create_app;
//! use socialchat::shared::ServerConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let app = create_app(ServerConfig::from_env()?).await?;
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app.router).await?;
//! # Ok(())
//! # }
//! ```

/// Shared types and data structures
pub mod shared;

/// Backend server-side code
#[cfg(feature = "ssr")]
pub mod backend;
