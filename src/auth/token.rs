// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Internal JWT codec.
//!
//! Tokens are compact JWS strings `<header>.<payload>.<mac>` signed with
//! HMAC-SHA-256 through `jsonwebtoken`. They are the only credential
//! accepted between services.
//!
//! ## Payload
//!
//! Registered claims `iss`, `sub`, `iat`, `exp`, `jti` plus the custom
//! fields `Type`, `DisplayName`, `Email`, `UserId`, `UserName`, `GivenName`,
//! `Surname`, `ProfileURL` and `Claims` (site claim triples).
//!
//! ## Verification
//!
//! Signature, algorithm and issuer are checked by `jsonwebtoken::decode`.
//! Expiry is checked against the injected clock with no leeway; a token
//! whose `exp` equals the current second is already expired.

use jsonwebtoken::{
    decode, decode_header, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey,
    Header, Validation,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::SharedClock;

/// The only supported signing algorithm.
pub const HS256: &str = "HS256";

/// `Type` of tokens minted at login.
pub const LOGIN_TOKEN_TYPE: &str = "login.User";

/// Expiry used when none (or zero) is configured.
pub const DEFAULT_EXPIRY_DAYS: i64 = 7;

/// Longest accepted token lifetime.
pub const MAX_EXPIRY_DAYS: i64 = 3650;

const SECONDS_PER_DAY: i64 = 86_400;

/// Token verification and issuance errors.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token is malformed")]
    MalformedToken,

    #[error("token signature is invalid")]
    BadSignature,

    #[error("token has expired")]
    Expired,

    #[error("token issuer is invalid")]
    WrongIssuer,

    #[error("unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("signing key is empty")]
    EmptyKey,

    #[error("failed to sign token: {0}")]
    Signing(jsonwebtoken::errors::Error),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature => TokenError::BadSignature,
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidIssuer => TokenError::WrongIssuer,
            _ => TokenError::MalformedToken,
        }
    }
}

/// Custom (non-registered) claims carried by the token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserClaims {
    #[serde(rename = "Type", default)]
    pub token_type: String,
    #[serde(rename = "DisplayName", default)]
    pub display_name: String,
    #[serde(rename = "Email", default)]
    pub email: String,
    #[serde(rename = "UserId", default)]
    pub user_id: String,
    #[serde(rename = "UserName", default)]
    pub user_name: String,
    #[serde(rename = "GivenName", default)]
    pub given_name: String,
    #[serde(rename = "Surname", default)]
    pub surname: String,
    #[serde(rename = "ProfileURL", default)]
    pub profile_url: String,
    #[serde(rename = "Claims", default)]
    pub claims: Vec<String>,
}

/// Full decoded payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPayload {
    pub iss: String,
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
    #[serde(flatten)]
    pub user: UserClaims,
}

/// Issues and verifies internal tokens.
///
/// Key material is immutable after construction.
#[derive(Clone)]
pub struct TokenCodec {
    issuer: String,
    key: Vec<u8>,
    expiry_days: i64,
    algorithm: String,
    clock: SharedClock,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("issuer", &self.issuer)
            .field("expiry_days", &self.expiry_days)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Create a codec. `expiry_days <= 0` falls back to seven days and
    /// values above [`MAX_EXPIRY_DAYS`] are capped.
    pub fn new(
        issuer: impl Into<String>,
        key: impl AsRef<[u8]>,
        expiry_days: i64,
        clock: SharedClock,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            key: key.as_ref().to_vec(),
            expiry_days: if expiry_days > 0 {
                expiry_days.min(MAX_EXPIRY_DAYS)
            } else {
                DEFAULT_EXPIRY_DAYS
            },
            algorithm: HS256.to_string(),
            clock,
        }
    }

    /// Select the signing algorithm by name. Only `HS256` can sign.
    pub fn with_algorithm(mut self, algorithm: impl Into<String>) -> Self {
        self.algorithm = algorithm.into();
        self
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn expiry_days(&self) -> i64 {
        self.expiry_days
    }

    /// Token lifetime in seconds.
    pub fn lifetime_secs(&self) -> i64 {
        self.expiry_days * SECONDS_PER_DAY
    }

    /// Mint a token for `user`.
    pub fn issue(&self, user: &UserClaims) -> Result<String, TokenError> {
        if self.algorithm != HS256 {
            return Err(TokenError::UnsupportedAlgorithm(self.algorithm.clone()));
        }
        if self.key.is_empty() {
            return Err(TokenError::EmptyKey);
        }

        let iat = self.clock.now().timestamp();
        let payload = TokenPayload {
            iss: self.issuer.clone(),
            sub: user.email.clone(),
            iat,
            exp: iat + self.lifetime_secs(),
            jti: Uuid::new_v4().to_string(),
            user: user.clone(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &payload,
            &EncodingKey::from_secret(&self.key),
        )
        .map_err(TokenError::Signing)
    }

    /// Verify `token` and return its payload.
    pub fn verify(&self, token: &str) -> Result<TokenPayload, TokenError> {
        if self.key.is_empty() {
            return Err(TokenError::EmptyKey);
        }
        if token.split('.').count() != 3 {
            return Err(TokenError::MalformedToken);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "iss"]);
        validation.set_issuer(&[&self.issuer]);

        let data = decode::<TokenPayload>(token, &DecodingKey::from_secret(&self.key), &validation)
            .map_err(|err| match err.kind() {
                ErrorKind::InvalidAlgorithm => TokenError::UnsupportedAlgorithm(
                    decode_header(token)
                        .map(|header| format!("{:?}", header.alg))
                        .unwrap_or_default(),
                ),
                _ => TokenError::from(err),
            })?;

        if data.claims.exp <= self.clock.now().timestamp() {
            return Err(TokenError::Expired);
        }

        Ok(data.claims)
    }
}
