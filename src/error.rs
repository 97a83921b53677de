// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP error taxonomy.
//!
//! Every failure leaving the service is an [`ApiError`] rendered as an
//! RFC 7807 problem document. [`negotiate_failure`] turns the same error
//! into a browser redirect when the client did not ask for JSON.

use axum::{
    http::{
        header::{ACCEPT, CONTENT_TYPE, LOCATION},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::cookies::CookieFactory;
use crate::config::Config;

pub const PROBLEM_CONTENT_TYPE: &str = "application/problem+json";

/// Failure classes shared by every component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Unauthorized,
    Forbidden,
    NotFound,
    Server,
}

impl ErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Server => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            ErrorKind::Validation => "Invalid request",
            ErrorKind::Unauthorized => "Unauthorized",
            ErrorKind::Forbidden => "Forbidden",
            ErrorKind::NotFound => "Not found",
            ErrorKind::Server => "Internal server error",
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
}

/// RFC 7807 problem details body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub problem_type: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Server, message)
    }

    pub fn status(&self) -> StatusCode {
        self.kind.status()
    }

    pub fn problem(&self) -> ProblemDetails {
        ProblemDetails {
            problem_type: "about:blank".to_string(),
            title: self.kind.title().to_string(),
            status: self.status().as_u16(),
            detail: self.message.clone(),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.title(), self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status(), Json(self.problem())).into_response();
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(PROBLEM_CONTENT_TYPE));
        response
    }
}

impl From<crate::storage::RepositoryError> for ApiError {
    fn from(err: crate::storage::RepositoryError) -> Self {
        tracing::error!(error = %err, "repository failure");
        ApiError::server("storage failure")
    }
}

/// True when the client asked for exactly `application/json`.
pub fn wants_json(headers: &HeaderMap) -> bool {
    headers
        .get(ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim() == "application/json")
}

/// Render `err` for the client that sent `headers`.
///
/// API clients get the problem document. Browsers are redirected with a
/// one-time flash cookie: to the login page on 401, to the error page
/// otherwise.
pub fn negotiate_failure(err: ApiError, headers: &HeaderMap, config: &Config) -> Response {
    if wants_json(headers) {
        return err.into_response();
    }

    let target = match err.kind {
        ErrorKind::Unauthorized => config.login_url.clone(),
        _ => config.error_url.clone(),
    };
    let message = format!("{}: {}", err.kind.title(), err.message);
    let jar = CookieJar::new().add(CookieFactory::new(config).flash_error(&message));

    (StatusCode::FOUND, jar, [(LOCATION, target)]).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::sample_config;
    use axum::body::to_bytes;
    use axum::http::header::SET_COOKIE;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

    #[test]
    fn kinds_map_to_statuses() {
        assert_eq!(ApiError::validation("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::unauthorized("x").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::forbidden("x").status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::server("x").status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn into_response_returns_problem_json() {
        let response = ApiError::validation("bad data").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()[CONTENT_TYPE], PROBLEM_CONTENT_TYPE);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["type"], "about:blank");
        assert_eq!(body["title"], "Invalid request");
        assert_eq!(body["status"], 400);
        assert_eq!(body["detail"], "bad data");
    }

    #[test]
    fn only_exact_json_accept_is_api_client() {
        let mut headers = HeaderMap::new();
        assert!(!wants_json(&headers));

        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        assert!(wants_json(&headers));

        headers.insert(ACCEPT, HeaderValue::from_static("text/html,application/json"));
        assert!(!wants_json(&headers));
    }

    #[tokio::test]
    async fn json_client_gets_problem() {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let response =
            negotiate_failure(ApiError::unauthorized("no token"), &headers, &sample_config());
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn browser_unauthorized_goes_to_login_with_flash() {
        let config = sample_config();
        let response = negotiate_failure(ApiError::unauthorized("no token"), &HeaderMap::new(), &config);
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[LOCATION], config.login_url.as_str());

        let cookie = response.headers()[SET_COOKIE].to_str().unwrap().to_string();
        let value = cookie
            .strip_prefix("FlashKeyError=")
            .and_then(|rest| rest.split(';').next())
            .unwrap();
        let message = String::from_utf8(URL_SAFE_NO_PAD.decode(value).unwrap()).unwrap();
        assert_eq!(message, "Unauthorized: no token");
    }

    #[test]
    fn browser_forbidden_goes_to_error_page() {
        let config = sample_config();
        let response = negotiate_failure(ApiError::forbidden("nope"), &HeaderMap::new(), &config);
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[LOCATION], config.error_url.as_str());
    }
}
