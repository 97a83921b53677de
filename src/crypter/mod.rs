// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Payload Crypter
//!
//! Passphrase-based string encryption: HMAC-SHA-256 over the plaintext,
//! AES-256-CBC over `base64(plaintext).base64(mac)`, and an ASCII armor
//! envelope for transport in text fields.
//!
//! ## Limitations
//!
//! The inner text is zero-padded to the block size and trimmed at the first
//! zero byte on decryption. This is lossless only because the inner text is
//! base64 and never contains NUL. PKCS#7 would remove the restriction.

pub mod armor;
pub mod cipher;

pub use armor::{armor, dearmor};
pub use cipher::{decrypt, encrypt};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CrypterError {
    #[error("passphrase is empty")]
    EmptyPassphrase,

    #[error("payload is empty")]
    EmptyPayload,

    #[error("ciphertext is too short")]
    ShortCiphertext,

    #[error("ciphertext is not a whole number of blocks")]
    BadPadding,

    #[error("decrypted content has no MAC separator")]
    NoHmacSeparator,

    #[error("MAC verification failed")]
    MacMismatch,

    #[error("content is not armored")]
    BadArmor,

    #[error("content is not valid base64")]
    BadEncoding,
}

impl From<CrypterError> for crate::error::ApiError {
    fn from(err: CrypterError) -> Self {
        crate::error::ApiError::validation(err.to_string())
    }
}

/// Encrypt `payload` and wrap it in the armor envelope.
pub fn encrypt_armored(payload: &str, passphrase: &str) -> Result<String, CrypterError> {
    Ok(armor(&encrypt(payload, passphrase)?))
}

/// Remove the armor envelope and decrypt.
pub fn decrypt_armored(content: &str, passphrase: &str) -> Result<String, CrypterError> {
    if content.trim().is_empty() {
        return Err(CrypterError::EmptyPayload);
    }
    decrypt(&dearmor(content)?, passphrase)
}
