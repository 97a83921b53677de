// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::api::cookies::CookieFactory;
use crate::auth::cache::{CacheError, VerificationCache};
use crate::auth::token::TokenCodec;
use crate::clock::SharedClock;
use crate::config::Config;
use crate::oidc::{IdentityProvider, LoginService};
use crate::storage::SharedSiteRepository;

/// Shared application state passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub codec: Arc<TokenCodec>,
    /// `None` when `CACHE_DURATION=off`
    pub cache: Option<Arc<VerificationCache>>,
    pub sites: SharedSiteRepository,
    pub login: Arc<LoginService>,
    pub cookies: CookieFactory,
    pub clock: SharedClock,
}

impl AppState {
    pub fn new(
        config: Config,
        sites: SharedSiteRepository,
        provider: Arc<dyn IdentityProvider>,
        clock: SharedClock,
    ) -> Result<Self, CacheError> {
        let codec = Arc::new(
            TokenCodec::new(
                config.token.issuer.clone(),
                config.token.secret.as_bytes(),
                config.token.expiry_days,
                clock.clone(),
            )
            .with_algorithm(config.token.algorithm.clone()),
        );

        let cache = config
            .cache_duration
            .as_deref()
            .map(|literal| VerificationCache::from_literal(Some(literal), clock.clone()))
            .transpose()?
            .map(Arc::new);

        let login = Arc::new(LoginService::new(
            provider,
            sites.clone(),
            codec.clone(),
            config.oauth.internal_redirect_url.clone(),
            config.login_redirect.clone(),
        ));

        Ok(Self {
            cookies: CookieFactory::new(&config),
            config: Arc::new(config),
            codec,
            cache,
            sites,
            login,
            clock,
        })
    }
}
