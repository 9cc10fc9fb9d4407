//! Shared Module
//!
//! This module contains the wire types shared by the realtime socket, the
//! REST endpoints and the message store. Everything here is plain data plus
//! serde; no I/O happens in this module.

/// Chat message data structure
pub mod message;

/// Shared error types
pub mod error;

/// Server configuration
pub mod config;

/// Re-export commonly used types for convenience
pub use message::{ChatMessage, HistoryQuery, MessageTarget};
pub use error::SharedError;
pub use config::{ConfigError, ServerConfig, ServerConfigBuilder};
