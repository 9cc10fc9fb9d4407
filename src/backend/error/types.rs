/**
 * Backend Error Types
 *
 * This module defines error types specific to the backend server.
 * These errors are used in HTTP handlers and during startup, and can be
 * converted to HTTP responses.
 *
 * # Error Categories
 *
 * ## Handler Errors
 *
 * Handler errors occur when processing HTTP requests:
 * - Missing or invalid session token
 * - Disallowed `Origin` on the chat upgrade
 * - Invalid request parameters
 *
 * ## Database Errors
 *
 * Failures reported by the message store or while running migrations.
 *
 * ## Configuration Errors
 *
 * Invalid settings detected while loading `ServerConfig`.
 */

use thiserror::Error;
use axum::http::StatusCode;
use crate::shared::{ConfigError, SharedError};

/// Backend-specific error types
///
/// # Usage
///
/// ```rust
/// use socialchat::backend::error::BackendError;
/// use axum::http::StatusCode;
///
/// let err = BackendError::handler(StatusCode::FORBIDDEN, "origin not allowed");
/// assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
/// ```
#[derive(Debug, Error)]
pub enum BackendError {
    /// Handler error (e.g., missing token, rejected origin)
    #[error("Handler error: {message}")]
    HandlerError {
        /// HTTP status code for this error
        status: StatusCode,
        /// Human-readable error message
        message: String,
    },

    /// Message store failure
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    /// Schema migration failure at startup
    #[error("Migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    /// Invalid configuration
    #[error(transparent)]
    ConfigError(#[from] ConfigError),

    /// Shared error (from shared module)
    #[error(transparent)]
    SharedError(#[from] SharedError),
}

impl BackendError {
    /// Create a new handler error with a status code
    pub fn handler(status: StatusCode, message: impl Into<String>) -> Self {
        Self::HandlerError {
            status,
            message: message.into(),
        }
    }

    /// Shorthand for a 401 handler error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::handler(StatusCode::UNAUTHORIZED, message)
    }

    /// Get the HTTP status code for this error
    ///
    /// # Status Code Mapping
    ///
    /// - `HandlerError` - Uses the status code from the error
    /// - `SharedError::ValidationError` - 400 Bad Request
    /// - Everything else - 500 Internal Server Error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::HandlerError { status, .. } => *status,
            Self::SharedError(err) => match err {
                SharedError::ValidationError { .. } => StatusCode::BAD_REQUEST,
                SharedError::SerializationError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::DatabaseError(_) | Self::MigrationError(_) | Self::ConfigError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get the error message
    ///
    /// Database details are not echoed to clients.
    pub fn message(&self) -> String {
        match self {
            Self::HandlerError { message, .. } => message.clone(),
            Self::DatabaseError(_) | Self::MigrationError(_) => "database error".to_string(),
            Self::ConfigError(err) => err.to_string(),
            Self::SharedError(err) => err.to_string(),
        }
    }
}
