// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read once from the environment at startup. Missing
//! required values are fatal.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `JWT_SECRET` | HMAC key for internal tokens | Required |
//! | `JWT_ISSUER` | `iss` of minted tokens, checked on verify | Required |
//! | `JWT_EXPIRY_DAYS` | Token lifetime in days (1 to 3650) | `7` |
//! | `JWT_ALGORITHM` | Signing algorithm | `HS256` |
//! | `COOKIE_NAME` | Name of the JWT cookie | `jwt` |
//! | `COOKIE_DOMAIN` | Cookie `Domain` attribute | unset |
//! | `COOKIE_PATH` | Cookie `Path` attribute | `/` |
//! | `COOKIE_SECURE` | Cookie `Secure` attribute | `true` |
//! | `COOKIE_PREFIX` | Prefix for every cookie except the JWT | empty |
//! | `REQUIRED_CLAIM_NAME` | Site name requests must hold a grant on | Required |
//! | `REQUIRED_CLAIM_URL` | URL of that site | Required |
//! | `REQUIRED_CLAIM_ROLES` | `;`-delimited accepted roles | Required |
//! | `CACHE_DURATION` | Verification cache TTL, `off` disables | `10m` |
//! | `LOGIN_REDIRECT` | Post-login URL | `/` |
//! | `LOGIN_URL` | Browser target for 401 | `/oidc/start` |
//! | `ERROR_URL` | Browser target for other failures | `/error` |
//! | `ADMIN_ROLE` | Role granting admin endpoints | `admin` |
//! | `OAUTH_CLIENT_ID` | IdP client id | Required |
//! | `OAUTH_CLIENT_SECRET` | IdP client secret | Required |
//! | `OAUTH_PROVIDER` | IdP issuer / discovery base URL | Required |
//! | `OAUTH_REDIRECT_URL` | Callback registered at the IdP | Required |
//! | `OAUTH_ENDPOINT_URL` | Override of the IdP authorize endpoint | unset |
//! | `OAUTH_INTERNAL_REDIRECT_URL` | Internal hop before the IdP | `/oidc/redirect` |
//! | `DATA_DIR` | Directory of the site database | `/data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `REQUEST_TIMEOUT_SECS` | Request-wide deadline | `30` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM files enabling TLS | unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::path::PathBuf;
use std::time::Duration;

use crate::auth::claims::{split_roles, RequiredClaim};
use crate::auth::token::{DEFAULT_EXPIRY_DAYS, HS256, MAX_EXPIRY_DAYS};

pub const JWT_SECRET_ENV: &str = "JWT_SECRET";
pub const JWT_ISSUER_ENV: &str = "JWT_ISSUER";
pub const JWT_EXPIRY_DAYS_ENV: &str = "JWT_EXPIRY_DAYS";
pub const JWT_ALGORITHM_ENV: &str = "JWT_ALGORITHM";
pub const COOKIE_NAME_ENV: &str = "COOKIE_NAME";
pub const COOKIE_DOMAIN_ENV: &str = "COOKIE_DOMAIN";
pub const COOKIE_PATH_ENV: &str = "COOKIE_PATH";
pub const COOKIE_SECURE_ENV: &str = "COOKIE_SECURE";
pub const COOKIE_PREFIX_ENV: &str = "COOKIE_PREFIX";
pub const REQUIRED_CLAIM_NAME_ENV: &str = "REQUIRED_CLAIM_NAME";
pub const REQUIRED_CLAIM_URL_ENV: &str = "REQUIRED_CLAIM_URL";
pub const REQUIRED_CLAIM_ROLES_ENV: &str = "REQUIRED_CLAIM_ROLES";
pub const CACHE_DURATION_ENV: &str = "CACHE_DURATION";
pub const LOGIN_REDIRECT_ENV: &str = "LOGIN_REDIRECT";
pub const LOGIN_URL_ENV: &str = "LOGIN_URL";
pub const ERROR_URL_ENV: &str = "ERROR_URL";
pub const ADMIN_ROLE_ENV: &str = "ADMIN_ROLE";
pub const OAUTH_CLIENT_ID_ENV: &str = "OAUTH_CLIENT_ID";
pub const OAUTH_CLIENT_SECRET_ENV: &str = "OAUTH_CLIENT_SECRET";
pub const OAUTH_PROVIDER_ENV: &str = "OAUTH_PROVIDER";
pub const OAUTH_REDIRECT_URL_ENV: &str = "OAUTH_REDIRECT_URL";
pub const OAUTH_ENDPOINT_URL_ENV: &str = "OAUTH_ENDPOINT_URL";
pub const OAUTH_INTERNAL_REDIRECT_URL_ENV: &str = "OAUTH_INTERNAL_REDIRECT_URL";

/// Environment variable name for the data directory path.
///
/// # Default
/// `/data`
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const REQUEST_TIMEOUT_SECS_ENV: &str = "REQUEST_TIMEOUT_SECS";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Value of `CACHE_DURATION` that disables the verification cache.
pub const CACHE_DISABLED: &str = "off";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Internal token settings.
#[derive(Debug, Clone)]
pub struct TokenSettings {
    pub secret: String,
    pub issuer: String,
    pub expiry_days: i64,
    pub algorithm: String,
}

/// Cookie attributes shared by every cookie the service sets.
#[derive(Debug, Clone)]
pub struct CookieSettings {
    /// Name of the JWT cookie (never prefixed)
    pub name: String,
    pub domain: Option<String>,
    pub path: String,
    pub secure: bool,
    /// Prefix for state, auth-flow and flash cookies
    pub prefix: String,
}

/// Identity provider settings.
#[derive(Debug, Clone)]
pub struct OAuthSettings {
    pub client_id: String,
    pub client_secret: String,
    /// Issuer URL; discovery lives under `/.well-known/openid-configuration`
    pub provider: String,
    pub redirect_url: String,
    /// Overrides the discovered authorize endpoint
    pub endpoint_url: Option<String>,
    pub internal_redirect_url: String,
}

#[derive(Debug, Clone)]
pub struct TlsSettings {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub token: TokenSettings,
    pub cookie: CookieSettings,
    pub required_claim: RequiredClaim,
    /// `None` disables the verification cache
    pub cache_duration: Option<String>,
    pub login_redirect: String,
    pub login_url: String,
    pub error_url: String,
    pub admin_role: String,
    pub oauth: OAuthSettings,
    pub data_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub request_timeout: Duration,
    pub tls: Option<TlsSettings>,
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through `lookup`. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));
        let or = |name: &str, default: &str| get(name).unwrap_or_else(|| default.to_string());

        let token = TokenSettings {
            secret: required(JWT_SECRET_ENV)?,
            issuer: required(JWT_ISSUER_ENV)?,
            expiry_days: parse_or(get(JWT_EXPIRY_DAYS_ENV), JWT_EXPIRY_DAYS_ENV, DEFAULT_EXPIRY_DAYS)?,
            algorithm: or(JWT_ALGORITHM_ENV, HS256),
        };
        if token.algorithm != HS256 {
            return Err(ConfigError::Invalid {
                var: JWT_ALGORITHM_ENV,
                value: token.algorithm,
                reason: format!("only {HS256} is supported"),
            });
        }
        if !(1..=MAX_EXPIRY_DAYS).contains(&token.expiry_days) {
            return Err(ConfigError::Invalid {
                var: JWT_EXPIRY_DAYS_ENV,
                value: token.expiry_days.to_string(),
                reason: format!("must be between 1 and {MAX_EXPIRY_DAYS}"),
            });
        }

        let cookie = CookieSettings {
            name: or(COOKIE_NAME_ENV, "jwt"),
            domain: get(COOKIE_DOMAIN_ENV),
            path: or(COOKIE_PATH_ENV, "/"),
            secure: parse_bool(get(COOKIE_SECURE_ENV), COOKIE_SECURE_ENV, true)?,
            prefix: get(COOKIE_PREFIX_ENV).unwrap_or_default(),
        };

        let roles = split_roles(&required(REQUIRED_CLAIM_ROLES_ENV)?);
        if roles.is_empty() {
            return Err(ConfigError::Invalid {
                var: REQUIRED_CLAIM_ROLES_ENV,
                value: String::new(),
                reason: "at least one role is required".to_string(),
            });
        }
        let required_claim = RequiredClaim {
            name: required(REQUIRED_CLAIM_NAME_ENV)?,
            url: required(REQUIRED_CLAIM_URL_ENV)?,
            roles,
        };

        let cache_duration = match get(CACHE_DURATION_ENV) {
            Some(v) if v.eq_ignore_ascii_case(CACHE_DISABLED) => None,
            Some(v) => Some(v),
            None => Some(crate::auth::cache::DEFAULT_CACHE_DURATION.to_string()),
        };

        let oauth = OAuthSettings {
            client_id: required(OAUTH_CLIENT_ID_ENV)?,
            client_secret: required(OAUTH_CLIENT_SECRET_ENV)?,
            provider: required(OAUTH_PROVIDER_ENV)?,
            redirect_url: required(OAUTH_REDIRECT_URL_ENV)?,
            endpoint_url: get(OAUTH_ENDPOINT_URL_ENV),
            internal_redirect_url: or(OAUTH_INTERNAL_REDIRECT_URL_ENV, "/oidc/redirect"),
        };

        let tls = match (get(TLS_CERT_PATH_ENV), get(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsSettings {
                cert_path: cert.into(),
                key_path: key.into(),
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing(TLS_KEY_PATH_ENV)),
            (None, Some(_)) => return Err(ConfigError::Missing(TLS_CERT_PATH_ENV)),
        };

        Ok(Self {
            token,
            cookie,
            required_claim,
            cache_duration,
            login_redirect: or(LOGIN_REDIRECT_ENV, "/"),
            login_url: or(LOGIN_URL_ENV, "/oidc/start"),
            error_url: or(ERROR_URL_ENV, "/error"),
            admin_role: or(ADMIN_ROLE_ENV, "admin"),
            oauth,
            data_dir: or(DATA_DIR_ENV, "/data").into(),
            host: or(HOST_ENV, "0.0.0.0"),
            port: parse_or(get(PORT_ENV), PORT_ENV, 8080)?,
            request_timeout: Duration::from_secs(parse_or(
                get(REQUEST_TIMEOUT_SECS_ENV),
                REQUEST_TIMEOUT_SECS_ENV,
                30,
            )?),
            tls,
        })
    }

    /// `host:port` bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T>(value: Option<String>, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(v) => v.parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            value: v,
            reason: e.to_string(),
        }),
    }
}

fn parse_bool(value: Option<String>, var: &'static str, default: bool) -> Result<bool, ConfigError> {
    match value.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(default),
        Some("true" | "1" | "yes" | "on") => Ok(true),
        Some("false" | "0" | "no" | "off") => Ok(false),
        Some(other) => Err(ConfigError::Invalid {
            var,
            value: other.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}
