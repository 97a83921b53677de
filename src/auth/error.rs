// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::http::StatusCode;

use super::authorize::AuthorizationError;
use super::token::TokenError;
use crate::error::ApiError;

/// Failure of the request authentication pipeline.
///
/// The precise cause is logged; clients only see a generic detail.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Neither a bearer token nor the JWT cookie was present
    #[error("no token presented")]
    MissingToken,

    #[error("token rejected: {0}")]
    Token(#[from] TokenError),

    #[error("authorization failed: {0}")]
    Authorization(#[from] AuthorizationError),

    /// Authenticated, but the route requires the admin role
    #[error("admin role required")]
    AdminRequired,

    /// Authenticated route reached without the interceptor
    #[error("no authenticated user in request context")]
    MissingContext,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "missing_token",
            AuthError::Token(TokenError::MalformedToken) => "malformed_token",
            AuthError::Token(TokenError::BadSignature) => "invalid_signature",
            AuthError::Token(TokenError::Expired) => "token_expired",
            AuthError::Token(TokenError::WrongIssuer) => "invalid_issuer",
            AuthError::Token(TokenError::UnsupportedAlgorithm(_)) => "unsupported_algorithm",
            AuthError::Token(_) => "token_error",
            AuthError::Authorization(_) => "insufficient_claims",
            AuthError::AdminRequired => "admin_required",
            AuthError::MissingContext => "missing_context",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingToken | AuthError::Token(_) | AuthError::MissingContext => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::Authorization(_) | AuthError::AdminRequired => StatusCode::FORBIDDEN,
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        if err.status_code() == StatusCode::FORBIDDEN {
            ApiError::forbidden("insufficient permissions")
        } else {
            ApiError::unauthorized("token evaluation failed")
        }
    }
}
