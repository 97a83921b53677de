// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Internal JWT verification and site-claim authorization.
//!
//! ## Request Flow
//!
//! 1. Client sends `Authorization: Bearer <jwt>` or the JWT cookie
//! 2. The interceptor:
//!    - Looks the raw token up in the verification cache
//!    - On a miss verifies signature, issuer and expiry (HS256)
//!    - Evaluates the token's claim triples against the required claim
//!    - Places the resulting [`User`] into the request extensions
//! 3. Handlers read it through [`CurrentUser`] or [`AdminOnly`]
//!
//! ## Security
//!
//! - Failures are logged with their precise cause; clients see a generic detail
//! - Missing or invalid tokens are 401, insufficient claims 403
//! - A user's roles are those of the matching triples, never the required ones

pub mod authorize;
pub mod cache;
pub mod claims;
pub mod error;
pub mod extractor;
pub mod middleware;
pub mod token;
pub mod user;

pub use authorize::{authorize, Authorization, AuthorizationError};
pub use cache::VerificationCache;
pub use claims::{ClaimTriple, RequiredClaim};
pub use error::AuthError;
pub use extractor::{AdminOnly, CurrentUser};
pub use token::{TokenCodec, TokenError, TokenPayload, UserClaims};
pub use user::User;
