//! Real-time Module
//!
//! Plumbing shared by the realtime chat path.
//!
//! # Module Structure
//!
//! ```text
//! realtime/
//! ├── mod.rs       - Module exports and documentation
//! └── broadcast.rs - Broadcast channel between sessions and the dispatcher
//! ```

/// Broadcast channel types and helpers
pub mod broadcast;

// Re-export commonly used types and functions
pub use broadcast::{broadcast_channel, enqueue, BroadcastReceiver, BroadcastSender};
