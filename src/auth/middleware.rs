// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication middleware for Axum.
//!
//! Apply to a router subtree with
//!
//! ```rust,ignore
//! router.layer(axum::middleware::from_fn_with_state(state.clone(), require_auth))
//! ```
//!
//! ## Per-request steps
//!
//! 1. Token from `Authorization: Bearer …`, else from the JWT cookie
//! 2. Verification cache lookup
//! 3. On a miss: verify the token, evaluate the required claim, cache the user
//! 4. Insert the [`User`] into the request extensions and call the handler
//!
//! Failures are negotiated: `Accept: application/json` clients get a problem
//! document, browsers a redirect.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use tracing::debug;

use super::authorize::authorize;
use super::error::AuthError;
use super::user::User;
use crate::error::negotiate_failure;
use crate::state::AppState;

/// Authentication middleware function.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticate(&state, request.headers()) {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(err) => {
            debug!(
                error = %err,
                error_code = err.error_code(),
                path = %request.uri().path(),
                "request rejected"
            );
            negotiate_failure(err.into(), request.headers(), &state.config)
        }
    }
}

/// Resolve the user behind the request, consulting the cache first.
pub fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<User, AuthError> {
    let token = extract_token(headers, state.cookies.jwt_name()).ok_or(AuthError::MissingToken)?;

    if let Some(cache) = &state.cache {
        let now = state.clock.now().timestamp();
        // An expired token stays a miss even while its cache entry lives.
        if let Some(user) = cache.get(&token).filter(|u| u.expires_at > now) {
            return Ok(user);
        }
    }

    let payload = state.codec.verify(&token)?;
    let authorization = authorize(&state.config.required_claim, &payload.user.claims)?;
    let user = User::from_token(payload, authorization, &token);

    if let Some(cache) = &state.cache {
        cache.set(&token, user.clone());
    }
    Ok(user)
}

/// Bearer token if present, otherwise the JWT cookie.
pub fn extract_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    CookieJar::from_headers(headers)
        .get(cookie_name)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::{TokenError, UserClaims};
    use crate::clock::{Clock, ManualClock};
    use crate::config::tests::sample_config;
    use crate::state::tests::test_state;
    use axum::http::{header::COOKIE, HeaderValue};
    use chrono::Duration;

    fn claims(raw: &[&str]) -> UserClaims {
        UserClaims {
            email: "userA@example.com".to_string(),
            user_name: "userA@example.com".to_string(),
            claims: raw.iter().map(|c| c.to_string()).collect(),
            ..Default::default()
        }
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn bearer_wins_over_cookie() {
        let mut headers = bearer("from-header");
        headers.insert(COOKIE, HeaderValue::from_static("jwt=from-cookie"));
        assert_eq!(extract_token(&headers, "jwt").as_deref(), Some("from-header"));
    }

    #[test]
    fn cookie_is_used_without_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("other=x; jwt=from-cookie"));
        assert_eq!(extract_token(&headers, "jwt").as_deref(), Some("from-cookie"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_token(&headers, "jwt").as_deref(), Some("from-cookie"));
    }

    #[test]
    fn no_token_is_missing() {
        let clock = ManualClock::default();
        let (state, _dir) = test_state(sample_config(), &clock);
        assert!(matches!(
            authenticate(&state, &HeaderMap::new()),
            Err(AuthError::MissingToken)
        ));
    }

    #[test]
    fn matching_claim_authenticates_with_token_roles() {
        let clock = ManualClock::default();
        let (state, _dir) = test_state(sample_config(), &clock);
        let token = state
            .codec
            .issue(&claims(&["claim|http://localhost:3000|role;viewer"]))
            .unwrap();

        let user = authenticate(&state, &bearer(&token)).unwrap();
        assert!(user.authenticated);
        assert_eq!(user.roles, vec!["role", "viewer"]);
        assert_eq!(user.raw_token, token);
    }

    #[test]
    fn insufficient_claim_is_authorization_error() {
        let clock = ManualClock::default();
        let mut config = sample_config();
        config.required_claim.roles = vec!["admin".to_string()];
        let (state, _dir) = test_state(config, &clock);
        let token = state
            .codec
            .issue(&claims(&["claim|http://localhost:3000|role"]))
            .unwrap();

        assert!(matches!(
            authenticate(&state, &bearer(&token)),
            Err(AuthError::Authorization(_))
        ));
        assert!(state.cache.as_ref().unwrap().get(&token).is_none());
    }

    #[test]
    fn tampered_token_is_rejected() {
        let clock = ManualClock::default();
        let (state, _dir) = test_state(sample_config(), &clock);
        let token = state
            .codec
            .issue(&claims(&["claim|http://localhost:3000|role"]))
            .unwrap();
        let forged = format!("{}x", token);

        assert!(matches!(
            authenticate(&state, &bearer(&forged)),
            Err(AuthError::Token(TokenError::BadSignature))
        ));
    }

    #[test]
    fn successful_verification_is_cached() {
        let clock = ManualClock::default();
        let (state, _dir) = test_state(sample_config(), &clock);
        let token = state
            .codec
            .issue(&claims(&["claim|http://localhost:3000|role"]))
            .unwrap();

        authenticate(&state, &bearer(&token)).unwrap();
        let cached = state.cache.as_ref().unwrap().get(&token).unwrap();
        assert_eq!(cached.roles, vec!["role"]);
    }

    #[test]
    fn cache_hit_skips_verification() {
        let clock = ManualClock::default();
        let (state, _dir) = test_state(sample_config(), &clock);
        let mut user = crate::auth::user::tests::sample_user(&["cached"]);
        user.expires_at = clock.now().timestamp() + 60;
        state.cache.as_ref().unwrap().set("opaque", user);

        let resolved = authenticate(&state, &bearer("opaque")).unwrap();
        assert_eq!(resolved.roles, vec!["cached"]);
    }

    #[test]
    fn expired_token_is_rejected_even_when_cached() {
        let clock = ManualClock::default();
        let mut config = sample_config();
        config.token.expiry_days = 1;
        config.cache_duration = Some("48h".to_string());
        let (state, _dir) = test_state(config, &clock);
        let token = state
            .codec
            .issue(&claims(&["claim|http://localhost:3000|role"]))
            .unwrap();
        authenticate(&state, &bearer(&token)).unwrap();

        clock.advance(Duration::days(1) + Duration::seconds(1));
        assert!(matches!(
            authenticate(&state, &bearer(&token)),
            Err(AuthError::Token(TokenError::Expired))
        ));
    }

    #[test]
    fn disabled_cache_verifies_every_time() {
        let clock = ManualClock::default();
        let mut config = sample_config();
        config.cache_duration = None;
        let (state, _dir) = test_state(config, &clock);
        let token = state
            .codec
            .issue(&claims(&["claim|http://localhost:3000|role"]))
            .unwrap();
        assert!(authenticate(&state, &bearer(&token)).is_ok());
        assert!(state.cache.is_none());
    }
}
