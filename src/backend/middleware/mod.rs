//! Middleware Module
//!
//! HTTP middleware for the backend server.
//!
//! - **`auth`** - Session token check for the chat routes

pub mod auth;

pub use auth::{auth_middleware, AuthUser, AuthenticatedUser};
