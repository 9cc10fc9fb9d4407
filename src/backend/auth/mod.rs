//! Authentication Module
//!
//! Session token issue and verification. Users and login live outside this
//! service; the chat server only trusts signed tokens.
//!
//! # Module Structure
//!
//! ```text
//! auth/
//! ├── mod.rs          - Module exports and documentation
//! └── sessions.rs     - JWT token management
//! ```

/// JWT token generation and validation
pub mod sessions;

pub use sessions::{create_token, verify_token, Claims};
