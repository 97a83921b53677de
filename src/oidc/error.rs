// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Login errors.

use crate::error::ApiError;

/// Failure talking to the identity provider.
#[derive(Debug, thiserror::Error)]
pub enum OidcError {
    #[error("provider discovery failed: {0}")]
    Discovery(String),

    #[error("failed to fetch JWKS: {0}")]
    JwksFetch(String),

    #[error("no matching key found in JWKS")]
    NoMatchingKey,

    #[error("code exchange failed: {0}")]
    Exchange(String),

    #[error("id token rejected: {0}")]
    InvalidIdToken(String),
}

/// Outcome classes of the login handshake.
#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    /// Missing, empty or contradictory parameters
    #[error("invalid login request: {0}")]
    Validation(String),

    /// Unknown user, site not granted or redirect mismatch
    #[error("login refused: {0}")]
    Security(String),

    /// Identity provider, repository or signing failure
    #[error("login failed: {0}")]
    Server(String),
}

impl From<OidcError> for LoginError {
    fn from(err: OidcError) -> Self {
        LoginError::Server(err.to_string())
    }
}

impl From<crate::storage::RepositoryError> for LoginError {
    fn from(err: crate::storage::RepositoryError) -> Self {
        LoginError::Server(err.to_string())
    }
}

impl From<crate::auth::token::TokenError> for LoginError {
    fn from(err: crate::auth::token::TokenError) -> Self {
        LoginError::Server(err.to_string())
    }
}

impl From<LoginError> for ApiError {
    fn from(err: LoginError) -> Self {
        match err {
            LoginError::Validation(msg) => ApiError::validation(msg),
            LoginError::Security(msg) => ApiError::forbidden(msg),
            LoginError::Server(msg) => {
                tracing::error!(error = %msg, "login failed");
                ApiError::server("login failed")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn login_errors_map_to_api_kinds() {
        let api: ApiError = LoginError::Validation("state mismatch".into()).into();
        assert_eq!(api.kind, ErrorKind::Validation);

        let api: ApiError = LoginError::Security("user not allowed".into()).into();
        assert_eq!(api.kind, ErrorKind::Forbidden);
        assert_eq!(api.message, "user not allowed");

        let api: ApiError = LoginError::Server("idp down".into()).into();
        assert_eq!(api.kind, ErrorKind::Server);
        assert_eq!(api.message, "login failed");
    }

    #[test]
    fn provider_failures_are_server_errors() {
        let err: LoginError = OidcError::NoMatchingKey.into();
        assert!(matches!(err, LoginError::Server(_)));
    }
}
