//! Chat Backend Module
//!
//! The realtime chat core: every message a connected client sends is stored
//! and then pushed to every open connection.
//!
//! # Architecture
//!
//! - **`connection`** - One open duplex connection and its `Transport`
//! - **`registry`** - The set of connections eligible for broadcast
//! - **`session`** - Per-connection receive loop (decode, persist, enqueue)
//! - **`dispatcher`** - Single consumer that fans messages out
//! - **`store`** - `MessageStore` trait and its SQLite implementation
//! - **`db`** - SQL behind the store
//! - **`handlers`** - Axum handlers (websocket upgrade, REST)
//!
//! # Data Flow
//!
//! ```text
//! client ──frame──▶ session ──save──▶ store
//!                      │
//!                      └──enqueue──▶ broadcast channel ──▶ dispatcher
//!                                                            │
//!                         every registered connection ◀──────┘
//! ```

pub mod connection;

pub mod registry;

pub mod session;

pub mod dispatcher;

/// Message persistence
pub mod store;

/// Database operations for chat messages
pub mod db;

/// Axum handlers
pub mod handlers;

pub use connection::{ChannelTransport, Connection, ConnectionId, Transport, TransportError};
pub use dispatcher::{BroadcastDispatcher, DeliveryReport};
pub use registry::ConnectionRegistry;
pub use session::{ChatSession, SessionEnd, SessionPolicy};
pub use store::{MessageStore, SqliteMessageStore};
