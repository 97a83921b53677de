// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authenticated principal placed into the request context.

use serde::Serialize;
use utoipa::ToSchema;

use super::authorize::Authorization;
use super::claims::ClaimTriple;
use super::token::TokenPayload;

/// User synthesized from a verified and authorized token.
///
/// Only ever constructed after both verification and authorization
/// succeeded, so `authenticated` is always `true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct User {
    pub username: String,
    pub display_name: String,
    pub email: String,
    pub user_id: String,
    /// Roles of the triples that matched the required claim
    pub roles: Vec<String>,
    pub profile_url: String,
    pub authenticated: bool,
    /// Every triple carried by the token
    pub claims: Vec<ClaimTriple>,
    /// Token expiry (Unix seconds)
    pub expires_at: i64,
    #[serde(skip)]
    pub raw_token: String,
}

impl User {
    pub fn from_token(payload: TokenPayload, authorization: Authorization, raw_token: &str) -> Self {
        Self {
            username: payload.user.user_name,
            display_name: payload.user.display_name,
            email: payload.user.email,
            user_id: payload.user.user_id,
            roles: authorization.roles,
            profile_url: payload.user.profile_url,
            authenticated: true,
            claims: authorization.claims,
            expires_at: payload.exp,
            raw_token: raw_token.to_string(),
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}
