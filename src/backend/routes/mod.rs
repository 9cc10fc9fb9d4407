//! Route Configuration Module
//!
//! This module configures all HTTP routes for the backend server.
//!
//! # Module Structure
//!
//! ```text
//! routes/
//! ├── mod.rs          - Module exports and documentation
//! └── router.rs       - Router assembly, auth and CORS layers
//! ```
//!
//! # Routes
//!
//! - `GET /chats/ws` - Chat websocket (authenticated, origin-checked)
//! - `POST /api/chats` - Send a message (authenticated)
//! - `GET /api/chats/{recipient_id}` - Conversation history (authenticated)
//! - `GET /health` - Liveness

/// Main router creation
pub mod router;

pub use router::create_router;
