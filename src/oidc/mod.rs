// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # OIDC Login Module
//!
//! Bridges an external OpenID Connect provider to the internal token format.
//!
//! ## Login Flow
//!
//! 1. `/oidc/start` stores a random `state` cookie and hops to `/oidc/redirect`
//! 2. `/oidc/redirect` sends the browser to the provider's authorize endpoint
//! 3. The provider calls back `/oidc/signin?state=…&code=…`
//! 4. The code is exchanged, the id token verified against the provider JWKS
//! 5. The user's site grants become claim triples of a freshly minted JWT
//! 6. The login is audited and the JWT cookie set
//!
//! `/oidc/auth/flow` additionally binds the login to one site and a redirect
//! inside it (site-flow).

pub mod error;
pub mod jwks;
pub mod login;
pub mod provider;

pub use error::{LoginError, OidcError};
pub use jwks::JwksManager;
pub use login::{LoginOutcome, LoginService};
pub use provider::{IdentityClaims, IdentityProvider, OidcProvider};
