// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! AES-256-CBC with an inner HMAC-SHA-256.
//!
//! ```text
//! key   = passphrase, zero-padded or truncated to 32 bytes
//! inner = b64url(plaintext) "." b64url(HMAC(key, plaintext)), zero-padded to 16
//! out   = b64url(IV || AES-256-CBC(key, IV, inner))
//! ```

use cbc::cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64ct::{Base64Url, Encoding};
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;

use super::CrypterError;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type HmacSha256 = Hmac<Sha256>;

pub const KEY_LEN: usize = 32;
pub const BLOCK_LEN: usize = 16;
const MAC_SEPARATOR: u8 = b'.';

/// Derive the AES key from a passphrase.
pub fn passphrase_key(passphrase: &str) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    let bytes = passphrase.as_bytes();
    let len = bytes.len().min(KEY_LEN);
    key[..len].copy_from_slice(&bytes[..len]);
    key
}

/// Encrypt `payload` under `passphrase`. Output is unarmored base64url.
pub fn encrypt(payload: &str, passphrase: &str) -> Result<String, CrypterError> {
    if passphrase.is_empty() {
        return Err(CrypterError::EmptyPassphrase);
    }
    if payload.is_empty() {
        return Err(CrypterError::EmptyPayload);
    }
    let key = passphrase_key(passphrase);

    let mut inner = Base64Url::encode_string(payload.as_bytes()).into_bytes();
    inner.push(MAC_SEPARATOR);
    inner.extend_from_slice(Base64Url::encode_string(&mac(&key, payload.as_bytes())?).as_bytes());

    Ok(Base64Url::encode_string(&seal(&key, inner)))
}

/// Decrypt base64url `ciphertext` produced by [`encrypt`].
pub fn decrypt(ciphertext: &str, passphrase: &str) -> Result<String, CrypterError> {
    if passphrase.is_empty() {
        return Err(CrypterError::EmptyPassphrase);
    }
    let ciphertext = ciphertext.trim();
    if ciphertext.is_empty() {
        return Err(CrypterError::EmptyPayload);
    }
    let key = passphrase_key(passphrase);

    let raw = Base64Url::decode_vec(ciphertext).map_err(|_| CrypterError::BadEncoding)?;
    let inner = open(&key, &raw)?;

    // Anything but base64 text followed by zero padding was not sealed with
    // this key.
    let text_len = inner.iter().position(|b| *b == 0).unwrap_or(inner.len());
    let (text, padding) = inner.split_at(text_len);
    if text.is_empty() || padding.iter().any(|b| *b != 0) || !text.iter().all(is_inner_byte) {
        return Err(CrypterError::MacMismatch);
    }

    let separator = text
        .iter()
        .rposition(|b| *b == MAC_SEPARATOR)
        .ok_or(CrypterError::NoHmacSeparator)?;
    let (encoded_payload, encoded_mac) = (&text[..separator], &text[separator + 1..]);

    let plaintext = decode_inner(encoded_payload)?;
    let expected = decode_inner(encoded_mac)?;

    let mut verifier = new_mac(&key)?;
    verifier.update(&plaintext);
    verifier
        .verify_slice(&expected)
        .map_err(|_| CrypterError::MacMismatch)?;

    String::from_utf8(plaintext).map_err(|_| CrypterError::MacMismatch)
}

fn new_mac(key: &[u8; KEY_LEN]) -> Result<HmacSha256, CrypterError> {
    HmacSha256::new_from_slice(key).map_err(|_| CrypterError::EmptyPassphrase)
}

fn mac(key: &[u8; KEY_LEN], data: &[u8]) -> Result<Vec<u8>, CrypterError> {
    let mut mac = new_mac(key)?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Zero-pad `inner`, encrypt under a fresh IV and prepend the IV.
fn seal(key: &[u8; KEY_LEN], mut inner: Vec<u8>) -> Vec<u8> {
    let padded_len = inner.len().div_ceil(BLOCK_LEN) * BLOCK_LEN;
    inner.resize(padded_len, 0);

    let mut iv = [0u8; BLOCK_LEN];
    OsRng.fill_bytes(&mut iv);

    let ciphertext =
        Aes256CbcEnc::new(key.into(), &iv.into()).encrypt_padded_vec_mut::<NoPadding>(&inner);

    let mut out = Vec::with_capacity(BLOCK_LEN + ciphertext.len());
    out.extend_from_slice(&iv);
    out.extend_from_slice(&ciphertext);
    out
}

/// Split the IV off `raw` and decrypt the remaining blocks.
fn open(key: &[u8; KEY_LEN], raw: &[u8]) -> Result<Vec<u8>, CrypterError> {
    if raw.len() <= BLOCK_LEN {
        return Err(CrypterError::ShortCiphertext);
    }
    let (iv, body) = raw.split_at(BLOCK_LEN);
    if body.len() % BLOCK_LEN != 0 {
        return Err(CrypterError::BadPadding);
    }
    let iv: [u8; BLOCK_LEN] = iv.try_into().map_err(|_| CrypterError::ShortCiphertext)?;

    Aes256CbcDec::new(key.into(), &iv.into())
        .decrypt_padded_vec_mut::<NoPadding>(body)
        .map_err(|_| CrypterError::BadPadding)
}

fn is_inner_byte(b: &u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'=' | b'.')
}

fn decode_inner(encoded: &[u8]) -> Result<Vec<u8>, CrypterError> {
    let encoded = std::str::from_utf8(encoded).map_err(|_| CrypterError::MacMismatch)?;
    Base64Url::decode_vec(encoded).map_err(|_| CrypterError::MacMismatch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passphrase_is_padded_or_truncated() {
        let short = passphrase_key("test");
        assert_eq!(&short[..4], b"test");
        assert!(short[4..].iter().all(|b| *b == 0));

        let long = passphrase_key(&"k".repeat(40));
        assert_eq!(long, [b'k'; 32]);
    }

    #[test]
    fn round_trip() {
        let ciphertext = encrypt("hello, world", "test").unwrap();
        assert_eq!(decrypt(&ciphertext, "test").unwrap(), "hello, world");
    }

    #[test]
    fn fresh_iv_per_encryption() {
        assert_ne!(
            encrypt("hello, world", "test").unwrap(),
            encrypt("hello, world", "test").unwrap()
        );
    }

    #[test]
    fn ciphertext_is_iv_plus_whole_blocks() {
        let raw = Base64Url::decode_vec(&encrypt("hello, world", "test").unwrap()).unwrap();
        assert!(raw.len() > BLOCK_LEN);
        assert_eq!(raw.len() % BLOCK_LEN, 0);
    }

    #[test]
    fn wrong_passphrase_fails_mac() {
        let ciphertext = encrypt("hello, world", "test").unwrap();
        assert_eq!(decrypt(&ciphertext, "wrong"), Err(CrypterError::MacMismatch));
    }

    #[test]
    fn empty_inputs_are_rejected() {
        assert_eq!(encrypt("x", ""), Err(CrypterError::EmptyPassphrase));
        assert_eq!(encrypt("", "p"), Err(CrypterError::EmptyPayload));
        assert_eq!(decrypt("abc", ""), Err(CrypterError::EmptyPassphrase));
        assert_eq!(decrypt("", "p"), Err(CrypterError::EmptyPayload));
    }

    #[test]
    fn short_ciphertext_is_rejected() {
        let raw = Base64Url::encode_string(&[7u8; BLOCK_LEN]);
        assert_eq!(decrypt(&raw, "p"), Err(CrypterError::ShortCiphertext));
    }

    #[test]
    fn partial_block_is_bad_padding() {
        let raw = Base64Url::encode_string(&[7u8; BLOCK_LEN + 5]);
        assert_eq!(decrypt(&raw, "p"), Err(CrypterError::BadPadding));
    }

    #[test]
    fn invalid_base64_is_rejected() {
        assert_eq!(decrypt("***", "p"), Err(CrypterError::BadEncoding));
    }

    #[test]
    fn missing_separator_is_reported() {
        let key = passphrase_key("p");
        let sealed = seal(&key, b"aGVsbG8".to_vec());
        let ciphertext = Base64Url::encode_string(&sealed);
        assert_eq!(decrypt(&ciphertext, "p"), Err(CrypterError::NoHmacSeparator));
    }

    #[test]
    fn substituted_mac_is_rejected() {
        let key = passphrase_key("p");
        let forged_mac = Base64Url::encode_string(&mac(&key, b"other").unwrap());
        let inner = format!("{}.{forged_mac}", Base64Url::encode_string(b"hello"));
        let ciphertext = Base64Url::encode_string(&seal(&key, inner.into_bytes()));
        assert_eq!(decrypt(&ciphertext, "p"), Err(CrypterError::MacMismatch));
    }
}
