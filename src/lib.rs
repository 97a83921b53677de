// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Site Auth Core - federated authentication for a family of site services
//!
//! Users log in through an external OpenID Connect provider; the service
//! mints its own HS256 JWT carrying one `name|url|roles` claim per granted
//! site, and protected routes check that token against a required claim.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Token codec, claim authorization, verification cache, middleware
//! - `crypter` - Passphrase encryption with ASCII armor
//! - `oidc` - Identity provider client and login orchestration
//! - `storage` - Site grants and login history (redb)

pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod crypter;
pub mod error;
pub mod logging;
pub mod oidc;
pub mod state;
pub mod storage;
