//! Common test utilities and helpers
//!
//! This module provides shared utilities for all tests including:
//! - In-memory and failing message stores
//! - Token helpers
//! - A live server with websocket clients

#![allow(dead_code)]

pub mod auth_helpers;
pub mod database;
pub mod mock_server;

// Re-export commonly used utilities
pub use auth_helpers::*;
pub use database::*;
pub use mock_server::*;
