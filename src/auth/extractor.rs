// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for the authenticated user.
//!
//! Routes behind [`require_auth`](super::middleware::require_auth) read the
//! user placed into the request extensions:
//!
//! ```rust,ignore
//! async fn my_handler(CurrentUser(user): CurrentUser) -> impl IntoResponse {
//!     // user is User
//! }
//! ```

use axum::{extract::FromRequestParts, http::request::Parts, response::Response};
use tracing::debug;

use super::{AuthError, User};
use crate::error::negotiate_failure;
use crate::state::AppState;

/// The user authenticated by the middleware.
pub struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        user_from_parts(parts)
            .map(CurrentUser)
            .map_err(|err| reject(err, parts, state))
    }
}

/// Extractor that requires the configured admin role.
pub struct AdminOnly(pub User);

impl FromRequestParts<AppState> for AdminOnly {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = user_from_parts(parts).map_err(|err| reject(err, parts, state))?;

        if !user.has_role(&state.config.admin_role) {
            return Err(reject(AuthError::AdminRequired, parts, state));
        }

        Ok(AdminOnly(user))
    }
}

fn user_from_parts(parts: &Parts) -> Result<User, AuthError> {
    parts
        .extensions
        .get::<User>()
        .cloned()
        .ok_or(AuthError::MissingContext)
}

fn reject(err: AuthError, parts: &Parts, state: &AppState) -> Response {
    debug!(error = %err, error_code = err.error_code(), "extractor rejected request");
    negotiate_failure(err.into(), &parts.headers, &state.config)
}
