// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use crate::{auth::CurrentUser, crypter, error::ApiError};

#[derive(Debug, Deserialize, ToSchema)]
pub struct EncryptRequest {
    pub payload: String,
    pub passphrase: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EncryptResponse {
    /// Armored ciphertext.
    pub content: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DecryptRequest {
    /// Armored ciphertext.
    pub content: String,
    pub passphrase: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DecryptResponse {
    pub payload: String,
}

/// Encrypt a payload and return it armored.
#[utoipa::path(
    post,
    path = "/v1/crypter/encrypt",
    tag = "Crypter",
    request_body = EncryptRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Armored ciphertext", body = EncryptResponse),
        (status = 400, description = "Empty payload or passphrase"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn encrypt(
    CurrentUser(_user): CurrentUser,
    Json(request): Json<EncryptRequest>,
) -> Result<Json<EncryptResponse>, ApiError> {
    let content = crypter::encrypt_armored(&request.payload, &request.passphrase)?;
    Ok(Json(EncryptResponse { content }))
}

/// Decrypt armored content.
#[utoipa::path(
    post,
    path = "/v1/crypter/decrypt",
    tag = "Crypter",
    request_body = DecryptRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Plaintext", body = DecryptResponse),
        (status = 400, description = "Malformed content or wrong passphrase"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn decrypt(
    CurrentUser(user): CurrentUser,
    Json(request): Json<DecryptRequest>,
) -> Result<Json<DecryptResponse>, ApiError> {
    let payload = crypter::decrypt_armored(&request.content, &request.passphrase).map_err(|err| {
        debug!(user = %user.email, error = %err, "decrypt failed");
        err
    })?;
    Ok(Json(DecryptResponse { payload }))
}
