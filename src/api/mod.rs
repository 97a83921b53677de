// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::any::Any;

use axum::{
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{middleware::require_auth, ClaimTriple, User},
    error::{ApiError, ProblemDetails},
    state::AppState,
    storage::{LoginRow, Site},
};

pub mod cookies;
pub mod crypter;
pub mod health;
pub mod oidc;
pub mod sites;

pub fn router(state: AppState) -> Router {
    let timeout = state.config.request_timeout;

    let v1_routes = Router::new()
        .route("/me", get(sites::me))
        .route("/me/logins", get(sites::my_logins))
        .route("/sites", get(sites::list_sites))
        .route("/admin/sites", put(sites::save_sites))
        .route("/admin/sites/{name}/users", get(sites::site_users))
        .route("/crypter/encrypt", post(crypter::encrypt))
        .route("/crypter/decrypt", post(crypter::decrypt))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let oidc_routes = Router::new()
        .route("/start", get(oidc::start))
        .route("/auth/flow", get(oidc::auth_flow))
        .route("/redirect", get(oidc::redirect))
        .route("/signin", get(oidc::signin))
        .route("/logout", get(oidc::logout));

    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .nest("/oidc", oidc_routes)
        .nest("/v1", v1_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(CatchPanicLayer::custom(panic_response as fn(_) -> _))
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    timeout,
                ))
                .layer(CorsLayer::permissive()),
        )
}

fn panic_response(_err: Box<dyn Any + Send + 'static>) -> Response {
    tracing::error!("handler panicked");
    ApiError::server("internal error").into_response()
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        oidc::start,
        oidc::auth_flow,
        oidc::redirect,
        oidc::signin,
        oidc::logout,
        sites::me,
        sites::my_logins,
        sites::list_sites,
        sites::save_sites,
        sites::site_users,
        crypter::encrypt,
        crypter::decrypt
    ),
    components(
        schemas(
            User,
            ClaimTriple,
            Site,
            LoginRow,
            ProblemDetails,
            sites::SaveSitesRequest,
            sites::SiteUsersResponse,
            crypter::EncryptRequest,
            crypter::EncryptResponse,
            crypter::DecryptRequest,
            crypter::DecryptResponse,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "OIDC", description = "Login handshake with the identity provider"),
        (name = "Sites", description = "Current user and granted sites"),
        (name = "Admin", description = "Site grant management"),
        (name = "Crypter", description = "Passphrase encryption with ASCII armor")
    )
)]
struct ApiDoc;
