//! Backend Module
//!
//! This module contains all server-side code for the socialchat service: an
//! Axum HTTP server whose main job is the realtime chat socket.
//!
//! This module is only compiled when the `ssr` feature is enabled.
//!
//! # Architecture
//!
//! - **`server`** - Server initialization, application state, service loading
//! - **`routes`** - HTTP route configuration and router assembly
//! - **`chat`** - Connections, registry, sessions, dispatcher, store, handlers
//! - **`realtime`** - Broadcast channel between sessions and the dispatcher
//! - **`auth`** - JWT session tokens
//! - **`middleware`** - Request authentication
//! - **`error`** - Backend-specific error types
//!
//! # Module Structure
//!
//! ```text
//! backend/
//! ├── mod.rs          - Module exports and documentation
//! ├── main.rs         - Server binary
//! ├── server/         - Server initialization and state
//! ├── routes/         - Route configuration
//! ├── chat/           - Realtime chat core and handlers
//! ├── realtime/       - Broadcast channel
//! ├── auth/           - Session tokens
//! ├── middleware/     - Request middleware
//! └── error/          - Error types
//! ```
//!
//! # Thread Safety
//!
//! - The registry is a mutex-guarded map touched only for map operations
//! - The broadcast channel is an unbounded `tokio::sync::mpsc` queue with one
//!   consumer
//! - The SQLite pool is shared by every session and handler

/// Server setup and configuration
pub mod server;

/// Route configuration
pub mod routes;

/// Realtime chat functionality
pub mod chat;

/// Broadcast channel plumbing
pub mod realtime;

/// Backend error types
pub mod error;

/// Session tokens
pub mod auth;

/// Middleware for request processing
pub mod middleware;

/// Re-export commonly used types
pub use error::BackendError;
pub use server::{create_app, AppState};
