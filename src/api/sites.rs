// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Site grants: the caller's own view and the admin management endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;
use utoipa::ToSchema;

use crate::{
    auth::{AdminOnly, CurrentUser, User},
    error::ApiError,
    state::AppState,
    storage::{LoginRow, Site, SiteRow},
};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Replacement of every site granted to one user.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SaveSitesRequest {
    /// User email the grants belong to.
    pub user: String,
    /// Complete new grant list.
    pub sites: Vec<Site>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SiteUsersResponse {
    pub site: String,
    pub users: Vec<String>,
}

impl SaveSitesRequest {
    /// Validate and convert into repository rows.
    fn into_rows(self) -> Result<Vec<SiteRow>, ApiError> {
        let user = self.user.trim();
        if user.is_empty() {
            return Err(ApiError::validation("user is required"));
        }
        if self.sites.is_empty() {
            return Err(ApiError::validation("at least one site is required"));
        }

        let mut rows: Vec<SiteRow> = Vec::with_capacity(self.sites.len());
        for site in self.sites {
            let name = site.name.trim();
            if name.is_empty() {
                return Err(ApiError::validation("site name is required"));
            }
            if Url::parse(&site.url).is_err() {
                return Err(ApiError::validation(format!(
                    "site {name} has an invalid url"
                )));
            }
            if site.perm.iter().all(|p| p.trim().is_empty()) {
                return Err(ApiError::validation(format!(
                    "site {name} needs at least one permission"
                )));
            }
            if rows.iter().any(|r| r.name.eq_ignore_ascii_case(name)) {
                return Err(ApiError::validation(format!("site {name} is listed twice")));
            }

            let perms: Vec<String> = site
                .perm
                .iter()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect();
            rows.push(SiteRow::new(name, user, site.url.trim(), &perms));
        }
        Ok(rows)
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// The authenticated user.
#[utoipa::path(
    get,
    path = "/v1/me",
    tag = "Sites",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Required claim not held")
    )
)]
pub async fn me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}

/// Login history of the authenticated user, oldest first.
#[utoipa::path(
    get,
    path = "/v1/me/logins",
    tag = "Sites",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Login rows", body = [LoginRow]),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn my_logins(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<LoginRow>>, ApiError> {
    Ok(Json(state.sites.logins_for_user(&user.email)?))
}

/// Sites granted to the authenticated user.
#[utoipa::path(
    get,
    path = "/v1/sites",
    tag = "Sites",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Granted sites", body = [Site]),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_sites(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Site>>, ApiError> {
    let rows = state.sites.sites_for_user(&user.email)?;
    Ok(Json(rows.iter().map(SiteRow::to_site).collect()))
}

/// Replace every grant of a user.
///
/// Tokens already issued keep their claims until they expire.
#[utoipa::path(
    put,
    path = "/v1/admin/sites",
    tag = "Admin",
    request_body = SaveSitesRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Grants replaced"),
        (status = 400, description = "Invalid site list"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn save_sites(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Json(request): Json<SaveSitesRequest>,
) -> Result<StatusCode, ApiError> {
    let rows = request.into_rows()?;

    state
        .sites
        .in_unit_of_work(&mut |repo| repo.replace_sites_for_user(&rows))?;

    info!(
        admin = %admin.email,
        user = %rows[0].user,
        sites = rows.len(),
        "site grants replaced"
    );
    Ok(StatusCode::NO_CONTENT)
}

/// Users holding a grant on a site.
#[utoipa::path(
    get,
    path = "/v1/admin/sites/{name}/users",
    tag = "Admin",
    params(("name" = String, Path, description = "Site name")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Users of the site", body = SiteUsersResponse),
        (status = 404, description = "No user holds the site"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn site_users(
    AdminOnly(_admin): AdminOnly,
    Path(name): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<SiteUsersResponse>, ApiError> {
    let users = state.sites.users_for_site(&name)?;
    if users.is_empty() {
        return Err(ApiError::not_found(format!("site {name} has no users")));
    }
    Ok(Json(SiteUsersResponse { site: name, users }))
}
