/**
 * Session Tokens
 *
 * This module handles JWT token generation and validation for chat sessions.
 * Tokens are HS256-signed and carry the numeric user id in `sub`.
 */

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Issued at time (Unix timestamp)
    pub iat: u64,
}

impl Claims {
    /// Numeric user id carried in `sub`, if it is one
    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }
}

/// Create a JWT token for a user
///
/// # Arguments
/// * `user_id` - User ID
/// * `secret` - HS256 signing secret
/// * `ttl` - How long the token stays valid
pub fn create_token(user_id: i64, secret: &str, ttl: Duration) -> Result<String, jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now().timestamp().max(0) as u64;

    let claims = Claims {
        sub: user_id.to_string(),
        exp: now + ttl.as_secs(),
        iat: now,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
}

/// Verify and decode a JWT token
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let token_data = decode::<Claims>(token, &key, &Validation::default())?;
    Ok(token_data.claims)
}
