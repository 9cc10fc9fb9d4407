//! Authentication test helpers

use std::time::Duration;

use socialchat::backend::auth::sessions::create_token;

/// Secret every test server is configured with
pub const TEST_SECRET: &str = "integration-test-secret";

/// Generate a valid token for `user_id`
pub fn token_for(user_id: i64) -> String {
    create_token(user_id, TEST_SECRET, Duration::from_secs(3600)).expect("Failed to generate test token")
}

/// Create authorization header value
pub fn auth_header(token: &str) -> String {
    format!("Bearer {}", token)
}
