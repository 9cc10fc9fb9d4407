//! Chat Handlers Module
//!
//! Axum handlers for the chat endpoints.
//!
//! # Module Structure
//!
//! ```text
//! handlers/
//! ├── mod.rs          - Module exports and documentation
//! ├── websocket.rs    - GET /chats/ws upgrade and session start
//! └── rest.rs         - REST send, history and health
//! ```
//!
//! # Route Handlers
//!
//! ## GET /chats/ws
//!
//! Upgrades to a websocket after the origin check. Every text frame the
//! client sends is stored and broadcast to all open sockets, the sender's
//! own included.
//!
//! ## POST /api/chats
//!
//! Stores a message and answers 201 with its id.
//!
//! ## GET /api/chats/{recipient_id}
//!
//! Conversation history with `recipient_id`, plus group messages when
//! `group_id` is given.

/// Websocket upgrade handler
pub mod websocket;

/// REST handlers
pub mod rest;

pub use rest::{get_messages, health, send_message};
pub use websocket::handle_chat_upgrade;
