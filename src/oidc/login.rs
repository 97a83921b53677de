// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Login handshake.
//!
//! ```text
//! Idle ──prepare──▶ Prepared(state) ──external_redirect──▶ AwaitingCallback(state)
//!                                                         └──complete──▶ Done(token, url)
//!                                                                      └─fail─▶ Rejected
//! ```
//!
//! Nothing is stored server-side between `prepare` and `complete`; the
//! `state` cookie is the only correlation handle.

use std::sync::Arc;

use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

use super::error::LoginError;
use super::provider::{IdentityClaims, IdentityProvider};
use crate::auth::token::{TokenCodec, UserClaims, LOGIN_TOKEN_TYPE};
use crate::storage::{LoginRow, LoginType, SharedSiteRepository, SiteRow};

/// Result of a completed handshake.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    /// Internal JWT to hand to the client
    pub token: String,
    /// Where the browser goes next
    pub redirect: String,
    pub email: String,
    pub login_type: LoginType,
}

/// Drives the OIDC handshake and mints internal tokens.
pub struct LoginService {
    provider: Arc<dyn IdentityProvider>,
    sites: SharedSiteRepository,
    codec: Arc<TokenCodec>,
    internal_redirect_url: String,
    login_redirect: String,
}

impl LoginService {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        sites: SharedSiteRepository,
        codec: Arc<TokenCodec>,
        internal_redirect_url: impl Into<String>,
        login_redirect: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            sites,
            codec,
            internal_redirect_url: internal_redirect_url.into(),
            login_redirect: login_redirect.into(),
        }
    }

    /// Fresh `state` plus the internal hop URL.
    ///
    /// The hop lets the state cookie land on this service's domain before
    /// the browser leaves for the provider.
    pub fn prepare_internal_redirect(&self) -> (String, String) {
        (self.internal_redirect_url.clone(), Uuid::new_v4().to_string())
    }

    /// Provider authorize URL for `state`.
    pub async fn external_redirect(&self, state: &str) -> Result<String, LoginError> {
        if state.is_empty() {
            return Err(LoginError::Validation("missing state".to_string()));
        }
        Ok(self.provider.authorize_url(state).await?)
    }

    /// Finish the handshake.
    ///
    /// `site` and `redirect` select site-flow mode and must be given together.
    pub async fn complete_login(
        &self,
        saved_state: &str,
        idp_state: &str,
        code: &str,
        site: Option<&str>,
        redirect: Option<&str>,
    ) -> Result<LoginOutcome, LoginError> {
        if saved_state.is_empty() || idp_state.is_empty() || code.is_empty() {
            return Err(LoginError::Validation(
                "state and code are required".to_string(),
            ));
        }
        if saved_state != idp_state {
            return Err(LoginError::Validation("state mismatch".to_string()));
        }
        let site = site.filter(|s| !s.is_empty());
        let redirect = redirect.filter(|r| !r.is_empty());
        let flow = match (site, redirect) {
            (Some(site), Some(redirect)) => Some((site, redirect)),
            (None, None) => None,
            _ => {
                return Err(LoginError::Validation(
                    "site and redirect must be given together".to_string(),
                ))
            }
        };

        let identity = self.provider.exchange(code).await?;
        if identity.email.is_empty() {
            return Err(LoginError::Server("identity has no email".to_string()));
        }
        if !identity.email_verified {
            warn!(user = %identity.email, "provider reports unverified email");
        }

        let rows = self.sites.sites_for_user(&identity.email)?;
        if rows.is_empty() {
            warn!(user = %identity.email, "login refused: no sites");
            return Err(LoginError::Security("user not allowed".to_string()));
        }

        if let Some((site, redirect)) = flow {
            let row = rows.iter().find(|r| r.name == site).ok_or_else(|| {
                warn!(user = %identity.email, site, "login refused: site not granted");
                LoginError::Security("site not granted".to_string())
            })?;
            if !redirect_within_site(redirect, &row.url) {
                warn!(user = %identity.email, site, redirect, "login refused: redirect outside site");
                return Err(LoginError::Security("redirect does not match site".to_string()));
            }
        }

        let token = self.codec.issue(&user_claims(&identity, &rows))?;

        let login_type = if flow.is_some() {
            LoginType::Flow
        } else {
            LoginType::Direct
        };
        self.sites
            .append_login(&LoginRow::new(identity.email.clone(), login_type))?;

        info!(user = %identity.email, ?login_type, "login completed");

        Ok(LoginOutcome {
            token,
            redirect: flow
                .map(|(_, redirect)| redirect.to_string())
                .unwrap_or_else(|| self.login_redirect.clone()),
            email: identity.email,
            login_type,
        })
    }
}

fn user_claims(identity: &IdentityClaims, rows: &[SiteRow]) -> UserClaims {
    UserClaims {
        token_type: LOGIN_TOKEN_TYPE.to_string(),
        display_name: identity.name.clone(),
        email: identity.email.clone(),
        user_id: identity.sub.clone(),
        user_name: identity.email.clone(),
        given_name: identity.given_name.clone(),
        surname: identity.family_name.clone(),
        profile_url: strip_size_suffix(&identity.picture).to_string(),
        claims: rows.iter().map(SiteRow::claim).collect(),
    }
}

/// Drop a `=s96`-style size suffix from a profile picture URL.
fn strip_size_suffix(picture: &str) -> &str {
    picture.split('=').next().unwrap_or_default()
}

/// True when `redirect` points at or below `site_url`.
///
/// Both URLs are normalized first (dot segments, percent-encoding, host
/// case, default ports); origins must match and the path prefix is
/// compared segment-wise.
pub fn redirect_within_site(redirect: &str, site_url: &str) -> bool {
    let (Ok(redirect), Ok(site)) = (Url::parse(redirect), Url::parse(site_url)) else {
        return false;
    };
    if redirect.scheme() != site.scheme()
        || redirect.host_str() != site.host_str()
        || redirect.port_or_known_default() != site.port_or_known_default()
    {
        return false;
    }

    let base = site.path().trim_end_matches('/');
    let path = redirect.path();
    base.is_empty() || path == base || path.starts_with(&format!("{base}/"))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::oidc::error::OidcError;
    use crate::storage::{
        RepositoryError, RepositoryResult, SiteDatabase, SiteRepository, UnitOfWork,
    };
    use async_trait::async_trait;
    use tempfile::TempDir;

    const ISSUER: &str = "https://auth.example.com";
    const USER_A: &str = "userA@example.com";

    pub(crate) struct StubProvider {
        pub identity: Option<IdentityClaims>,
    }

    #[async_trait]
    impl IdentityProvider for StubProvider {
        async fn authorize_url(&self, state: &str) -> Result<String, OidcError> {
            Ok(format!("https://idp.test/authorize?state={state}"))
        }

        async fn exchange(&self, _code: &str) -> Result<IdentityClaims, OidcError> {
            self.identity
                .clone()
                .ok_or_else(|| OidcError::Exchange("invalid_grant".to_string()))
        }
    }

    /// Repository whose login appends always fail.
    struct RefusingLogins(Arc<SiteDatabase>);

    impl SiteRepository for RefusingLogins {
        fn sites_for_user(&self, email: &str) -> RepositoryResult<Vec<SiteRow>> {
            self.0.sites_for_user(email)
        }
        fn users_for_site(&self, name: &str) -> RepositoryResult<Vec<String>> {
            self.0.users_for_site(name)
        }
        fn replace_sites_for_user(&self, rows: &[SiteRow]) -> RepositoryResult<()> {
            self.0.replace_sites_for_user(rows)
        }
        fn append_login(&self, _login: &LoginRow) -> RepositoryResult<u64> {
            Err(RepositoryError::InvalidRows("append refused".to_string()))
        }
        fn logins_for_user(&self, email: &str) -> RepositoryResult<Vec<LoginRow>> {
            self.0.logins_for_user(email)
        }
        fn in_unit_of_work(&self, work: &mut UnitOfWork<'_>) -> RepositoryResult<()> {
            self.0.in_unit_of_work(work)
        }
    }

    pub(crate) fn identity(email: &str) -> IdentityClaims {
        IdentityClaims {
            sub: "12".to_string(),
            email: email.to_string(),
            email_verified: true,
            name: "User A".to_string(),
            picture: "http://p=s96".to_string(),
            given_name: "user".to_string(),
            family_name: "A".to_string(),
            locale: "en".to_string(),
        }
    }

    struct Harness {
        service: LoginService,
        db: Arc<SiteDatabase>,
        codec: Arc<TokenCodec>,
        _dir: TempDir,
    }

    fn harness_with(email: &str, refuse_logins: bool) -> Harness {
        let dir = TempDir::new().unwrap();
        let db = Arc::new(SiteDatabase::open(&dir.path().join("sites.redb")).unwrap());
        db.replace_sites_for_user(&[SiteRow::new("A", USER_A, "http://A", &["A".to_string()])])
            .unwrap();

        let codec = Arc::new(TokenCodec::new(
            ISSUER,
            "secret",
            7,
            Arc::new(ManualClock::default()),
        ));
        let sites: SharedSiteRepository = if refuse_logins {
            Arc::new(RefusingLogins(db.clone()))
        } else {
            db.clone()
        };
        let provider = Arc::new(StubProvider {
            identity: Some(identity(email)),
        });

        Harness {
            service: LoginService::new(provider, sites, codec.clone(), "/oidc/redirect", "/home"),
            db,
            codec,
            _dir: dir,
        }
    }

    fn harness(email: &str) -> Harness {
        harness_with(email, false)
    }

    #[test]
    fn prepare_returns_hop_and_fresh_state() {
        let h = harness(USER_A);
        let (url, first) = h.service.prepare_internal_redirect();
        let (_, second) = h.service.prepare_internal_redirect();
        assert_eq!(url, "/oidc/redirect");
        assert!(Uuid::parse_str(&first).is_ok());
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn external_redirect_requires_state() {
        let h = harness(USER_A);
        assert!(matches!(
            h.service.external_redirect("").await,
            Err(LoginError::Validation(_))
        ));
        let url = h.service.external_redirect("abc").await.unwrap();
        assert!(url.ends_with("state=abc"));
    }

    #[tokio::test]
    async fn direct_login_mints_token_and_audits() {
        let h = harness(USER_A);
        let outcome = h
            .service
            .complete_login("st", "st", "code", None, None)
            .await
            .unwrap();

        assert_eq!(outcome.redirect, "/home");
        let payload = h.codec.verify(&outcome.token).unwrap();
        assert_eq!(payload.user.claims, vec!["A|http://A|A"]);
        assert_eq!(payload.user.profile_url, "http://p");
        assert_eq!(payload.user.token_type, "login.User");
        assert_eq!(payload.user.user_id, "12");
        assert_eq!(payload.user.surname, "A");
        assert_eq!(payload.sub, USER_A);
        assert_eq!(payload.exp - payload.iat, 7 * 86_400);

        let logins = h.db.logins_for_user(USER_A).unwrap();
        assert_eq!(logins.len(), 1);
        assert_eq!(logins[0].login_type, LoginType::Direct);
    }

    #[tokio::test]
    async fn unknown_user_is_refused_without_audit() {
        let h = harness("ghost@example.com");
        let result = h.service.complete_login("st", "st", "code", None, None).await;
        assert!(matches!(result, Err(LoginError::Security(msg)) if msg == "user not allowed"));
        assert!(h.db.logins_for_user("ghost@example.com").unwrap().is_empty());
    }

    #[tokio::test]
    async fn site_flow_redirects_to_site() {
        let h = harness(USER_A);
        let outcome = h
            .service
            .complete_login("st", "st", "code", Some("A"), Some("http://A/inbox"))
            .await
            .unwrap();

        assert_eq!(outcome.redirect, "http://A/inbox");
        assert_eq!(outcome.login_type, LoginType::Flow);
        let logins = h.db.logins_for_user(USER_A).unwrap();
        assert_eq!(logins[0].login_type, LoginType::Flow);
    }

    #[tokio::test]
    async fn site_flow_rejects_foreign_redirect() {
        let h = harness(USER_A);
        let result = h
            .service
            .complete_login("st", "st", "code", Some("A"), Some("http://B/inbox"))
            .await;
        assert!(matches!(result, Err(LoginError::Security(_))));
        assert!(h.db.logins_for_user(USER_A).unwrap().is_empty());
    }

    #[tokio::test]
    async fn site_flow_rejects_ungranted_site() {
        let h = harness(USER_A);
        let result = h
            .service
            .complete_login("st", "st", "code", Some("B"), Some("http://A/inbox"))
            .await;
        assert!(matches!(result, Err(LoginError::Security(_))));
    }

    #[tokio::test]
    async fn state_mismatch_is_validation_regardless_of_other_input() {
        let h = harness(USER_A);
        for (site, redirect) in [
            (None, None),
            (Some("A"), Some("http://A/inbox")),
            (Some("A"), None),
        ] {
            let result = h
                .service
                .complete_login("saved", "other", "code", site, redirect)
                .await;
            assert!(matches!(result, Err(LoginError::Validation(_))));
        }
        assert!(h.db.logins_for_user(USER_A).unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_parameters_are_validation() {
        let h = harness(USER_A);
        for (saved, idp, code) in [("", "", "c"), ("s", "s", ""), ("s", "", "c")] {
            let result = h.service.complete_login(saved, idp, code, None, None).await;
            assert!(matches!(result, Err(LoginError::Validation(_))));
        }
        let result = h
            .service
            .complete_login("s", "s", "c", None, Some("http://A/x"))
            .await;
        assert!(matches!(result, Err(LoginError::Validation(_))));
    }

    #[tokio::test]
    async fn provider_failure_is_server_error() {
        let mut h = harness(USER_A);
        h.service.provider = Arc::new(StubProvider { identity: None });
        let result = h.service.complete_login("s", "s", "c", None, None).await;
        assert!(matches!(result, Err(LoginError::Server(_))));
    }

    #[tokio::test]
    async fn audit_failure_is_fatal() {
        let h = harness_with(USER_A, true);
        let result = h.service.complete_login("s", "s", "c", None, None).await;
        assert!(matches!(result, Err(LoginError::Server(_))));
    }

    #[test]
    fn redirect_prefix_is_normalized() {
        assert!(redirect_within_site("http://A/inbox", "http://A"));
        assert!(redirect_within_site("https://a.example.com/app/x", "https://A.example.com/app/"));
        assert!(redirect_within_site("https://host:443/app", "https://host/app"));
        assert!(!redirect_within_site("https://host/application", "https://host/app"));
        assert!(!redirect_within_site("https://host/app/../admin", "https://host/app"));
        assert!(!redirect_within_site("https://host/app/%2e%2e/admin", "https://host/app"));
        assert!(!redirect_within_site("https://host.evil.com/app", "https://host/app"));
        assert!(!redirect_within_site("https://host@evil.com/app", "https://host/app"));
        assert!(!redirect_within_site("http://host/app", "https://host/app"));
        assert!(!redirect_within_site("/relative", "https://host/app"));
    }

    #[test]
    fn picture_size_suffix_is_stripped() {
        assert_eq!(strip_size_suffix("http://p=s96"), "http://p");
        assert_eq!(strip_size_suffix("http://p"), "http://p");
        assert_eq!(strip_size_suffix(""), "");
    }
}
