//! Server Module
//!
//! This module contains the server-side code for initializing and configuring
//! the Axum HTTP server.
//!
//! # Module Structure
//!
//! ```text
//! server/
//! ├── mod.rs          - Module exports and documentation
//! ├── state.rs        - AppState and FromRef implementations
//! ├── config.rs       - Service loading (message store)
//! └── init.rs         - Server initialization and app creation
//! ```
//!
//! # Initialization Flow
//!
//! 1. **Configuration**: `ServerConfig` is loaded by the caller
//! 2. **Services**: The message store is opened and migrated
//! 3. **State**: Registry, broadcast channel and dispatcher are created
//! 4. **Router**: Routes and middleware are configured

/// Application state management
pub mod state;

/// Service loading
pub mod config;

/// Server initialization
pub mod init;

// Re-export commonly used types
pub use init::{create_app, create_app_with_store, App};
pub use state::AppState;
