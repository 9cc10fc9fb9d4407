/**
 * Authentication Middleware
 *
 * This module provides middleware for protecting routes that require
 * user authentication. It finds a session token on the request, verifies
 * it, and hands the user id to handlers.
 *
 * # Token Sources
 *
 * Checked in order:
 * 1. `Authorization: Bearer <token>`
 * 2. the `session_id` cookie
 * 3. the `token` query parameter
 *
 * Browsers cannot set headers on a websocket upgrade, hence the last two.
 */

use axum::{
    extract::{FromRequestParts, Query, Request, State},
    http::{
        header::{AUTHORIZATION, COOKIE},
        request::Parts,
        HeaderMap, StatusCode, Uri,
    },
    middleware::Next,
    response::Response,
};
use serde::Deserialize;

use crate::backend::auth::sessions::verify_token;
use crate::backend::server::state::AppState;

const SESSION_COOKIE: &str = "session_id";

/// Authenticated user data extracted from the session token
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: i64,
}

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Authentication middleware
///
/// Attaches `AuthenticatedUser` to the request extensions, or answers
/// 401 Unauthorized if no valid token is present.
pub async fn auth_middleware(
    State(app_state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = find_token(request.headers(), request.uri()).ok_or_else(|| {
        tracing::warn!(path = %request.uri().path(), "Missing session token");
        StatusCode::UNAUTHORIZED
    })?;

    let claims = verify_token(&token, &app_state.config.jwt_secret).map_err(|e| {
        tracing::warn!(error = %e, "Invalid session token");
        StatusCode::UNAUTHORIZED
    })?;

    let user_id = claims.user_id().ok_or_else(|| {
        tracing::warn!(sub = %claims.sub, "Session token subject is not a user id");
        StatusCode::UNAUTHORIZED
    })?;

    request.extensions_mut().insert(AuthenticatedUser { user_id });

    Ok(next.run(request).await)
}

/// Locate a session token on the request
fn find_token(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    bearer_token(headers)
        .or_else(|| cookie_token(headers))
        .or_else(|| {
            Query::<TokenQuery>::try_from_uri(uri)
                .ok()
                .and_then(|Query(query)| query.token)
        })
        .filter(|token| !token.is_empty())
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
}

fn cookie_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
}

/// Axum extractor for the authenticated user
///
/// Only valid on routes behind `auth_middleware`.
#[derive(Clone, Debug)]
pub struct AuthUser(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| {
                tracing::warn!("AuthenticatedUser not found in request extensions");
                StatusCode::UNAUTHORIZED
            })?;

        Ok(AuthUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn uri(s: &str) -> Uri {
        s.parse().unwrap()
    }

    #[test]
    fn test_bearer_token_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(COOKIE, HeaderValue::from_static("session_id=cookie"));
        assert_eq!(find_token(&headers, &uri("/chats/ws?token=query")), Some("abc".to_string()));
    }

    #[test]
    fn test_cookie_token() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; session_id=xyz; lang=en"));
        assert_eq!(find_token(&headers, &uri("/chats/ws")), Some("xyz".to_string()));
    }

    #[test]
    fn test_query_token() {
        assert_eq!(find_token(&HeaderMap::new(), &uri("/chats/ws?token=q1")), Some("q1".to_string()));
    }

    #[test]
    fn test_no_token() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcg=="));
        assert_eq!(find_token(&headers, &uri("/chats/ws?token=")), None);
        assert_eq!(find_token(&HeaderMap::new(), &uri("/chats/ws")), None);
    }
}
