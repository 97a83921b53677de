// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Cookies set by the service.
//!
//! The JWT cookie uses the configured name as-is. Every other cookie
//! (`state`, `auth_flow`, `FlashKeyError`) carries the configured prefix so
//! several instances can share one domain.

use axum_extra::extract::cookie::{Cookie, SameSite};
use base64ct::{Base64UrlUnpadded, Encoding};
use time::Duration;

use crate::config::Config;

pub const STATE_COOKIE: &str = "state";
pub const AUTH_FLOW_COOKIE: &str = "auth_flow";
pub const FLASH_ERROR_COOKIE: &str = "FlashKeyError";

/// Lifetime of the handshake cookies.
pub const HANDSHAKE_COOKIE_SECS: i64 = 60;

/// Builds cookies with the configured domain, path and security attributes.
#[derive(Debug, Clone)]
pub struct CookieFactory {
    jwt_name: String,
    domain: Option<String>,
    path: String,
    secure: bool,
    prefix: String,
    jwt_max_age: Duration,
}

impl CookieFactory {
    pub fn new(config: &Config) -> Self {
        Self {
            jwt_name: config.cookie.name.clone(),
            domain: config.cookie.domain.clone(),
            path: config.cookie.path.clone(),
            secure: config.cookie.secure,
            prefix: config.cookie.prefix.clone(),
            jwt_max_age: Duration::days(config.token.expiry_days),
        }
    }

    pub fn jwt_name(&self) -> &str {
        &self.jwt_name
    }

    /// Apply the prefix to a non-JWT cookie name.
    pub fn prefixed(&self, name: &str) -> String {
        format!("{}{name}", self.prefix)
    }

    pub fn jwt(&self, token: &str) -> Cookie<'static> {
        self.build(self.jwt_name.clone(), token.to_string(), self.jwt_max_age)
    }

    pub fn clear_jwt(&self) -> Cookie<'static> {
        self.build(self.jwt_name.clone(), String::new(), Duration::ZERO)
    }

    pub fn state(&self, state: &str) -> Cookie<'static> {
        self.build(
            self.prefixed(STATE_COOKIE),
            state.to_string(),
            Duration::seconds(HANDSHAKE_COOKIE_SECS),
        )
    }

    /// `auth_flow` cookie holding `site|url`, base64url encoded.
    pub fn auth_flow(&self, site: &str, url: &str) -> Cookie<'static> {
        self.build(
            self.prefixed(AUTH_FLOW_COOKIE),
            Base64UrlUnpadded::encode_string(format!("{site}|{url}").as_bytes()),
            Duration::seconds(HANDSHAKE_COOKIE_SECS),
        )
    }

    /// One-time message for the error page, base64url encoded.
    pub fn flash_error(&self, message: &str) -> Cookie<'static> {
        self.build(
            self.prefixed(FLASH_ERROR_COOKIE),
            Base64UrlUnpadded::encode_string(message.as_bytes()),
            Duration::seconds(HANDSHAKE_COOKIE_SECS),
        )
    }

    /// Expired cookie removing the prefixed cookie `name`.
    pub fn clear(&self, name: &str) -> Cookie<'static> {
        self.build(self.prefixed(name), String::new(), Duration::ZERO)
    }

    fn build(&self, name: String, value: String, max_age: Duration) -> Cookie<'static> {
        let mut cookie = Cookie::build((name, value))
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .path(self.path.clone())
            .max_age(max_age)
            .build();
        if let Some(domain) = &self.domain {
            cookie.set_domain(domain.clone());
        }
        cookie
    }
}

/// Decode an `auth_flow` cookie value into `(site, url)`.
pub fn parse_auth_flow(value: &str) -> Option<(String, String)> {
    let decoded = Base64UrlUnpadded::decode_vec(value).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (site, url) = decoded.split_once('|')?;
    if site.is_empty() || url.is_empty() {
        return None;
    }
    Some((site.to_string(), url.to_string()))
}
