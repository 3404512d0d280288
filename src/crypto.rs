//! Credential encryption using AES-256-GCM
//!
//! Access tokens, refresh tokens, API keys and API secrets are encrypted
//! before they reach the database. Each ciphertext is bound to the row it
//! belongs to through additional authenticated data (AAD) of the form
//! `user_id|platform_key|origin`, so a ciphertext copied onto another row
//! fails to decrypt.

#![allow(deprecated)]

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

const VERSION_ENCRYPTED: u8 = 0x01;
const VERSION_FIELD_LEN: usize = 1;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const MIN_ENCRYPTED_LEN: usize = VERSION_FIELD_LEN + NONCE_LEN + TAG_LEN;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid key length: expected 32 bytes, got {0}")]
    InvalidKeyLength(usize),
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),
    #[error("invalid ciphertext format")]
    InvalidFormat,
    #[error("empty ciphertext")]
    EmptyCiphertext,
}

/// Secure wrapper for encryption keys with zeroization
#[derive(Debug, Clone, Zeroize, ZeroizeOnDrop)]
pub struct ZeroizingKey(Vec<u8>);

pub type CryptoKey = ZeroizingKey;

impl CryptoKey {
    pub fn new(bytes: Vec<u8>) -> Result<Self, CryptoError> {
        if bytes.len() != 32 {
            return Err(CryptoError::InvalidKeyLength(bytes.len()));
        }
        Ok(ZeroizingKey(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Binds ciphertexts to one connection row.
#[derive(Debug, Clone, Copy)]
pub struct CredentialContext<'a> {
    pub user_id: Uuid,
    pub platform_key: &'a str,
    pub origin: &'a str,
}

impl CredentialContext<'_> {
    fn aad(&self) -> String {
        format!("{}|{}|{}", self.user_id, self.platform_key, self.origin)
    }

    /// Encrypts a UTF-8 secret for this row.
    pub fn seal(&self, key: &CryptoKey, secret: &str) -> Result<Vec<u8>, CryptoError> {
        encrypt_bytes(key, self.aad().as_bytes(), secret.as_bytes())
    }

    /// Decrypts a secret previously sealed for this row.
    pub fn open(&self, key: &CryptoKey, ciphertext: &[u8]) -> Result<String, CryptoError> {
        let bytes = decrypt_bytes(key, self.aad().as_bytes(), ciphertext)?;
        String::from_utf8(bytes)
            .map_err(|e| CryptoError::DecryptionFailed(format!("Invalid UTF-8: {}", e)))
    }
}

/// Encrypt bytes using AES-256-GCM. Output is `version || nonce || ciphertext+tag`.
pub fn encrypt_bytes(
    key: &CryptoKey,
    aad: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher_key = Key::<Aes256Gcm>::from_slice(key.as_bytes());
    let cipher = Aes256Gcm::new(cipher_key);

    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let mut ciphertext = cipher
        .encrypt(
            &nonce,
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    let mut result = Vec::with_capacity(VERSION_FIELD_LEN + NONCE_LEN + ciphertext.len());
    result.push(VERSION_ENCRYPTED);
    result.extend_from_slice(&nonce);
    result.append(&mut ciphertext);

    Ok(result)
}

/// Decrypt bytes produced by [`encrypt_bytes`].
pub fn decrypt_bytes(
    key: &CryptoKey,
    aad: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if ciphertext.is_empty() {
        return Err(CryptoError::EmptyCiphertext);
    }

    if ciphertext[0] != VERSION_ENCRYPTED || ciphertext.len() < MIN_ENCRYPTED_LEN {
        return Err(CryptoError::InvalidFormat);
    }

    let nonce = Nonce::from_slice(&ciphertext[VERSION_FIELD_LEN..VERSION_FIELD_LEN + NONCE_LEN]);
    let tag_and_ct = &ciphertext[VERSION_FIELD_LEN + NONCE_LEN..];

    let cipher_key = Key::<Aes256Gcm>::from_slice(key.as_bytes());
    let cipher = Aes256Gcm::new(cipher_key);

    cipher
        .decrypt(
            nonce,
            Payload {
                msg: tag_and_ct,
                aad,
            },
        )
        .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
}

/// Hex SHA-256 over an access token and its optional refresh token. Stored
/// next to the ciphertexts so unchanged credentials can be recognized without
/// decrypting. Each part is length-prefixed.
pub fn token_fingerprint(access_token: &str, refresh_token: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    for part in [Some(access_token), refresh_token] {
        match part {
            Some(token) => {
                hasher.update([1u8]);
                hasher.update((token.len() as u64).to_be_bytes());
                hasher.update(token.as_bytes());
            }
            None => hasher.update([0u8]),
        }
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> CryptoKey {
        CryptoKey::new(vec![0u8; 32]).expect("valid test key")
    }

    fn context(origin: &str) -> CredentialContext<'_> {
        CredentialContext {
            user_id: Uuid::nil(),
            platform_key: "youtube",
            origin,
        }
    }

    #[test]
    fn seal_and_open_for_same_row() {
        let key = test_key();
        let sealed = context("oauth").seal(&key, "ya29.token").unwrap();
        assert_eq!(context("oauth").open(&key, &sealed).unwrap(), "ya29.token");
    }

    #[test]
    fn ciphertext_from_other_origin_is_rejected() {
        let key = test_key();
        let sealed = context("oauth").seal(&key, "secret").unwrap();
        assert!(context("api_key").open(&key, &sealed).is_err());
    }

    #[test]
    fn modified_ciphertext_fails() {
        let key = test_key();
        let mut encrypted = encrypt_bytes(&key, b"aad", b"secret message").unwrap();
        encrypted[13] ^= 0x01;
        assert!(decrypt_bytes(&key, b"aad", &encrypted).is_err());
    }

    #[test]
    fn nonces_differ_between_encryptions() {
        let key = test_key();
        let first = encrypt_bytes(&key, b"aad", b"same").unwrap();
        let second = encrypt_bytes(&key, b"aad", b"same").unwrap();
        assert_ne!(&first[1..13], &second[1..13]);
    }

    #[test]
    fn unversioned_or_short_payloads_are_invalid() {
        let key = test_key();
        assert!(matches!(
            decrypt_bytes(&key, b"aad", b"plaintext"),
            Err(CryptoError::InvalidFormat)
        ));
        assert!(matches!(
            decrypt_bytes(&key, b"aad", &[VERSION_ENCRYPTED, 0x02]),
            Err(CryptoError::InvalidFormat)
        ));
        assert!(matches!(
            decrypt_bytes(&key, b"aad", &[]),
            Err(CryptoError::EmptyCiphertext)
        ));
    }

    #[test]
    fn invalid_key_length_rejected() {
        assert!(matches!(
            CryptoKey::new(vec![0u8; 16]),
            Err(CryptoError::InvalidKeyLength(16))
        ));
    }

    #[test]
    fn fingerprint_is_stable_hex() {
        let a = token_fingerprint("abc", Some("r1"));
        assert_eq!(a, token_fingerprint("abc", Some("r1")));
        assert_ne!(a, token_fingerprint("abd", Some("r1")));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn fingerprint_covers_refresh_token() {
        let base = token_fingerprint("abc", Some("r1"));
        assert_ne!(base, token_fingerprint("abc", Some("r2")));
        assert_ne!(base, token_fingerprint("abc", None));
        assert_ne!(
            token_fingerprint("ab", Some("cr1")),
            token_fingerprint("abc", Some("r1"))
        );
    }
}
