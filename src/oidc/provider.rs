// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity provider access.
//!
//! [`IdentityProvider`] is the narrow seam the login handshake depends on:
//! build the authorize URL and turn an authorization code into verified
//! identity claims. [`OidcProvider`] is the production implementation using
//! OIDC discovery, the token endpoint and the provider's JWKS.

use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::OnceCell;
use url::Url;

use super::error::OidcError;
use super::jwks::JwksManager;
use crate::config::OAuthSettings;

/// Clock skew tolerance for id tokens (60 seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Scopes requested at the provider.
pub const SCOPES: &str = "openid email profile";

const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

/// Identity claims extracted from a verified id token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub sub: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub picture: String,
    #[serde(default)]
    pub given_name: String,
    #[serde(default)]
    pub family_name: String,
    #[serde(default)]
    pub locale: String,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Authorize endpoint URL carrying `state`.
    async fn authorize_url(&self, state: &str) -> Result<String, OidcError>;

    /// Exchange `code` and verify the returned id token.
    async fn exchange(&self, code: &str) -> Result<IdentityClaims, OidcError>;
}

/// Subset of the discovery document in use.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub jwks_uri: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    id_token: String,
}

struct Discovered {
    metadata: ProviderMetadata,
    jwks: JwksManager,
}

/// OIDC provider resolved through discovery on first use.
pub struct OidcProvider {
    settings: OAuthSettings,
    client: reqwest::Client,
    discovered: OnceCell<Discovered>,
}

impl OidcProvider {
    pub fn new(settings: OAuthSettings) -> Result<Self, OidcError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| OidcError::Discovery(e.to_string()))?;
        Ok(Self {
            settings,
            client,
            discovered: OnceCell::new(),
        })
    }

    pub fn discovery_url(&self) -> String {
        format!("{}{DISCOVERY_PATH}", self.settings.provider.trim_end_matches('/'))
    }

    async fn discovered(&self) -> Result<&Discovered, OidcError> {
        self.discovered
            .get_or_try_init(|| async {
                let metadata = self.fetch_metadata().await?;
                tracing::info!(issuer = %metadata.issuer, "discovered identity provider");
                let jwks = JwksManager::new(metadata.jwks_uri.clone(), self.client.clone());
                Ok::<_, OidcError>(Discovered { metadata, jwks })
            })
            .await
    }

    async fn fetch_metadata(&self) -> Result<ProviderMetadata, OidcError> {
        let response = self
            .client
            .get(self.discovery_url())
            .send()
            .await
            .map_err(|e| OidcError::Discovery(e.to_string()))?;

        if !response.status().is_success() {
            return Err(OidcError::Discovery(format!(
                "HTTP {} from discovery endpoint",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| OidcError::Discovery(e.to_string()))
    }

    async fn verify_id_token(
        &self,
        discovered: &Discovered,
        id_token: &str,
    ) -> Result<IdentityClaims, OidcError> {
        let header =
            decode_header(id_token).map_err(|e| OidcError::InvalidIdToken(e.to_string()))?;
        let (key, algorithm) = discovered.jwks.decoding_key(header.kid.as_deref()).await?;

        let mut validation = Validation::new(algorithm);
        validation.leeway = CLOCK_SKEW_LEEWAY;
        validation.set_issuer(&[&discovered.metadata.issuer]);
        validation.set_audience(&[&self.settings.client_id]);

        let data = decode::<IdentityClaims>(id_token, &key, &validation)
            .map_err(|e| OidcError::InvalidIdToken(e.to_string()))?;
        Ok(data.claims)
    }
}

#[async_trait]
impl IdentityProvider for OidcProvider {
    async fn authorize_url(&self, state: &str) -> Result<String, OidcError> {
        let endpoint = match &self.settings.endpoint_url {
            Some(endpoint) => endpoint.clone(),
            None => self.discovered().await?.metadata.authorization_endpoint.clone(),
        };
        build_authorize_url(&endpoint, &self.settings, state)
    }

    async fn exchange(&self, code: &str) -> Result<IdentityClaims, OidcError> {
        let discovered = self.discovered().await?;

        let response = self
            .client
            .post(&discovered.metadata.token_endpoint)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.settings.redirect_url.as_str()),
                ("client_id", self.settings.client_id.as_str()),
                ("client_secret", self.settings.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| OidcError::Exchange(e.to_string()))?;

        if !response.status().is_success() {
            return Err(OidcError::Exchange(format!(
                "HTTP {} from token endpoint",
                response.status()
            )));
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|e| OidcError::Exchange(e.to_string()))?;

        self.verify_id_token(discovered, &tokens.id_token).await
    }
}

/// Append the authorization-code request parameters to `endpoint`.
pub fn build_authorize_url(
    endpoint: &str,
    settings: &OAuthSettings,
    state: &str,
) -> Result<String, OidcError> {
    let mut url = Url::parse(endpoint)
        .map_err(|e| OidcError::Discovery(format!("invalid authorize endpoint: {e}")))?;
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", &settings.client_id)
        .append_pair("redirect_uri", &settings.redirect_url)
        .append_pair("scope", SCOPES)
        .append_pair("state", state);
    Ok(url.into())
}
