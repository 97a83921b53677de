// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Browser-facing OIDC handshake endpoints.
//!
//! ```text
//! /oidc/start ──307──▶ /oidc/redirect ──307──▶ IdP ──▶ /oidc/signin ──307──▶ app
//!      │ sets state cookie       │ reads state          │ sets JWT cookie
//! ```

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use tracing::{debug, info, warn};
use utoipa::IntoParams;

use crate::api::cookies::{parse_auth_flow, AUTH_FLOW_COOKIE, STATE_COOKIE};
use crate::auth::middleware::extract_token;
use crate::error::{negotiate_failure, ApiError};
use crate::oidc::LoginError;
use crate::state::AppState;

/// Callback parameters sent by the identity provider.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct SigninQuery {
    /// Echo of the state handed to the provider.
    pub state: Option<String>,
    /// Authorization code.
    pub code: Option<String>,
    /// Provider error code, when the user or provider aborted.
    pub error: Option<String>,
}

/// Site-flow parameters.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct FlowQuery {
    /// Site the login is performed for.
    #[serde(rename = "~site")]
    pub site: Option<String>,
    /// Where to send the browser afterwards; must lie within the site URL.
    #[serde(rename = "~url")]
    pub url: Option<String>,
}

fn cookie_value(jar: &CookieJar, name: &str) -> Option<String> {
    jar.get(name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

/// Issue a fresh state and send the browser to the internal hop.
fn begin(state: &AppState, jar: CookieJar) -> (CookieJar, Redirect) {
    let (hop, login_state) = state.login.prepare_internal_redirect();
    (jar.add(state.cookies.state(&login_state)), Redirect::temporary(&hop))
}

fn fail(err: LoginError, headers: &HeaderMap, state: &AppState) -> Response {
    warn!(error = %err, "login failed");
    negotiate_failure(ApiError::from(err), headers, &state.config)
}

/// Start a direct login.
#[utoipa::path(
    get,
    path = "/oidc/start",
    tag = "OIDC",
    responses((status = 307, description = "Redirect to the internal hop"))
)]
pub async fn start(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    // A leftover flow cookie would turn this into a site-flow login.
    let jar = jar.add(state.cookies.clear(AUTH_FLOW_COOKIE));
    begin(&state, jar)
}

/// Start a login on behalf of a site.
#[utoipa::path(
    get,
    path = "/oidc/auth/flow",
    tag = "OIDC",
    params(FlowQuery),
    responses(
        (status = 307, description = "Redirect to the internal hop"),
        (status = 400, description = "Missing site or url")
    )
)]
pub async fn auth_flow(
    State(state): State<AppState>,
    Query(query): Query<FlowQuery>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Response {
    let site = query.site.filter(|s| !s.is_empty());
    let url = query.url.filter(|u| !u.is_empty());
    let (Some(site), Some(url)) = (site, url) else {
        return fail(
            LoginError::Validation("~site and ~url are required".to_string()),
            &headers,
            &state,
        );
    };

    debug!(site = %site, url = %url, "site-flow login requested");
    let jar = jar.add(state.cookies.auth_flow(&site, &url));
    begin(&state, jar).into_response()
}

/// Internal hop: the state cookie is now set on this domain.
#[utoipa::path(
    get,
    path = "/oidc/redirect",
    tag = "OIDC",
    responses(
        (status = 307, description = "Redirect to the identity provider"),
        (status = 400, description = "No state cookie")
    )
)]
pub async fn redirect(State(state): State<AppState>, headers: HeaderMap, jar: CookieJar) -> Response {
    let saved = cookie_value(&jar, &state.cookies.prefixed(STATE_COOKIE)).unwrap_or_default();

    match state.login.external_redirect(&saved).await {
        Ok(url) => Redirect::temporary(&url).into_response(),
        Err(err) => fail(err, &headers, &state),
    }
}

/// Provider callback.
#[utoipa::path(
    get,
    path = "/oidc/signin",
    tag = "OIDC",
    params(SigninQuery),
    responses(
        (status = 307, description = "Login complete, JWT cookie set"),
        (status = 400, description = "State mismatch or missing parameters"),
        (status = 403, description = "User or redirect not allowed"),
        (status = 500, description = "Provider or storage failure")
    )
)]
pub async fn signin(
    State(state): State<AppState>,
    Query(query): Query<SigninQuery>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Response {
    // The handshake ends here whatever the outcome.
    let cleared = jar
        .clone()
        .add(state.cookies.clear(STATE_COOKIE))
        .add(state.cookies.clear(AUTH_FLOW_COOKIE));

    if let Some(error) = query.error.filter(|e| !e.is_empty()) {
        let failure = fail(
            LoginError::Validation(format!("provider returned {error}")),
            &headers,
            &state,
        );
        return (cleared, failure).into_response();
    }

    let saved = cookie_value(&jar, &state.cookies.prefixed(STATE_COOKIE)).unwrap_or_default();
    let flow = cookie_value(&jar, &state.cookies.prefixed(AUTH_FLOW_COOKIE))
        .and_then(|v| parse_auth_flow(&v));
    let (site, url) = match &flow {
        Some((site, url)) => (Some(site.as_str()), Some(url.as_str())),
        None => (None, None),
    };

    let outcome = state
        .login
        .complete_login(
            &saved,
            query.state.as_deref().unwrap_or_default(),
            query.code.as_deref().unwrap_or_default(),
            site,
            url,
        )
        .await;

    match outcome {
        Ok(outcome) => {
            let jar = cleared.add(state.cookies.jwt(&outcome.token));
            (jar, Redirect::temporary(&outcome.redirect)).into_response()
        }
        Err(err) => (cleared, fail(err, &headers, &state)).into_response(),
    }
}

/// Drop the JWT cookie and its cache entry.
#[utoipa::path(
    get,
    path = "/oidc/logout",
    tag = "OIDC",
    responses((status = 303, description = "Redirect to the login URL"))
)]
pub async fn logout(State(state): State<AppState>, headers: HeaderMap, jar: CookieJar) -> impl IntoResponse {
    if let Some(token) = extract_token(&headers, state.cookies.jwt_name()) {
        if let Some(cache) = &state.cache {
            cache.remove(&token);
        }
        info!("user logged out");
    }
    (
        jar.add(state.cookies.clear_jwt()),
        Redirect::to(&state.config.login_url),
    )
}
