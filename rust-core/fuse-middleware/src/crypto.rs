// SPDX-License-Identifier: PMPL-1.0-or-later
//! Transparent AES-256-GCM encryption of stored values.
//!
//! `before_set` serializes the value to JSON, seals it under a fresh 96-bit
//! nonce and stores `{"iv", "tag", "value"}` with every field base64-encoded.
//! `after_get` opens values of that shape and passes anything else through
//! untouched, so a store may mix encrypted and plain entries.
//!
//! A value that looks encrypted but cannot be opened (wrong key, tampered
//! ciphertext) is logged at `warn` and read back as absent.

use std::str::FromStr;

use aes_gcm::{
    aead::{generic_array::GenericArray, Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use fuse_core::{HookError, Middleware, Replace};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

/// Size of the AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;
/// Size of the GCM nonce in bytes.
pub const IV_SIZE: usize = 12;
/// Size of the GCM authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// Encryption key for AES-256-GCM.
///
/// The key is zeroized when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey {
    bytes: [u8; KEY_SIZE],
}

impl EncryptionKey {
    /// Generates a new random encryption key.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Creates a key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if `bytes` is not exactly 32 bytes long.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKeySize {
                actual: bytes.len(),
                expected: KEY_SIZE,
            });
        }
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(bytes);
        Ok(Self { bytes: key })
    }

    /// Returns the key as a byte slice. Don't log it.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

/// Uses the UTF-8 bytes of the string, which must number exactly 32.
impl FromStr for EncryptionKey {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_bytes(s.as_bytes())
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// The stored form of an encrypted value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPayload {
    /// Nonce, base64.
    pub iv: String,
    /// GCM authentication tag, base64.
    pub tag: String,
    /// Ciphertext of the JSON-encoded value, base64.
    pub value: String,
}

impl EncryptedPayload {
    /// Recognize a stored value as a payload: an object whose `iv`, `tag` and
    /// `value` fields are non-empty strings.
    pub fn from_stored(stored: &Value) -> Option<Self> {
        let field = |name: &str| -> Option<String> {
            stored
                .get(name)?
                .as_str()
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        Some(Self {
            iv: field("iv")?,
            tag: field("tag")?,
            value: field("value")?,
        })
    }
}

/// Middleware that encrypts values on write and decrypts them on read.
///
/// # Example
///
/// ```rust
/// use fuse_core::{Engine, InMemoryDriver};
/// use fuse_middleware::{CryptoMiddleware, EncryptionKey};
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let key: EncryptionKey = "0123456789abcdef0123456789abcdef".parse().unwrap();
/// let driver = InMemoryDriver::new();
/// let engine = Engine::builder()
///     .with_driver(driver.clone())
///     .with_middleware(CryptoMiddleware::new(key))
///     .build()
///     .unwrap();
///
/// engine.set("pin", json!(1234)).await.unwrap();
/// assert_eq!(engine.get("pin").await.unwrap(), Some(json!(1234)));
/// assert_ne!(driver.raw_entries().await["pin"], json!(1234));
/// # });
/// ```
pub struct CryptoMiddleware {
    cipher: Aes256Gcm,
}

impl CryptoMiddleware {
    /// Creates the middleware with the given key.
    #[must_use]
    pub fn new(key: EncryptionKey) -> Self {
        let cipher = Aes256Gcm::new(GenericArray::from_slice(key.as_bytes()));
        Self { cipher }
    }

    /// Seals `value` under a fresh random nonce.
    pub fn encrypt(&self, value: &Value) -> Result<EncryptedPayload, CryptoError> {
        let plaintext = serde_json::to_vec(value)?;

        let mut iv = [0u8; IV_SIZE];
        rand::thread_rng().fill_bytes(&mut iv);

        // aes-gcm appends the tag to the ciphertext; it is stored separately.
        let mut sealed = self
            .cipher
            .encrypt(Nonce::from_slice(&iv), plaintext.as_slice())
            .map_err(|_| CryptoError::Encryption("cipher error".to_string()))?;
        let tag = sealed.split_off(sealed.len() - TAG_SIZE);

        Ok(EncryptedPayload {
            iv: STANDARD.encode(iv),
            tag: STANDARD.encode(tag),
            value: STANDARD.encode(sealed),
        })
    }

    /// Opens a payload produced by [`CryptoMiddleware::encrypt`].
    ///
    /// # Errors
    ///
    /// Fails on malformed base64, wrong field lengths, a wrong key or any
    /// tampering with the ciphertext.
    pub fn decrypt(&self, payload: &EncryptedPayload) -> Result<Value, CryptoError> {
        let iv = STANDARD.decode(&payload.iv)?;
        if iv.len() != IV_SIZE {
            return Err(CryptoError::Decryption(format!(
                "iv must be {IV_SIZE} bytes, got {}",
                iv.len()
            )));
        }
        let tag = STANDARD.decode(&payload.tag)?;
        if tag.len() != TAG_SIZE {
            return Err(CryptoError::Decryption(format!(
                "tag must be {TAG_SIZE} bytes, got {}",
                tag.len()
            )));
        }

        let mut sealed = STANDARD.decode(&payload.value)?;
        sealed.extend_from_slice(&tag);

        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(&iv), sealed.as_slice())
            .map_err(|_| CryptoError::Decryption("authentication failed".to_string()))?;

        Ok(serde_json::from_slice(&plaintext)?)
    }
}

impl std::fmt::Debug for CryptoMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoMiddleware").finish_non_exhaustive()
    }
}

#[async_trait]
impl Middleware for CryptoMiddleware {
    fn name(&self) -> &str {
        "crypto"
    }

    async fn before_set(&self, _key: &str, value: &Value) -> Result<Option<Value>, HookError> {
        let payload = self.encrypt(value)?;
        let stored = serde_json::to_value(payload).map_err(CryptoError::from)?;
        Ok(Some(stored))
    }

    async fn after_get(
        &self,
        key: &str,
        value: Option<&Value>,
    ) -> Result<Replace<Option<Value>>, HookError> {
        let Some(payload) = value.and_then(EncryptedPayload::from_stored) else {
            return Ok(Replace::Keep);
        };
        match self.decrypt(&payload) {
            Ok(plain) => Ok(Replace::With(Some(plain))),
            Err(err) => {
                warn!(key, error = %err, "decryption failed; treating value as absent");
                Ok(Replace::With(None))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn middleware() -> CryptoMiddleware {
        CryptoMiddleware::new(EncryptionKey::generate())
    }

    #[test]
    fn test_key_must_be_32_bytes() {
        assert!(EncryptionKey::from_bytes(&[0u8; 32]).is_ok());
        assert_eq!(
            EncryptionKey::from_bytes(&[0u8; 31]).unwrap_err(),
            CryptoError::InvalidKeySize {
                actual: 31,
                expected: 32
            }
        );
        assert!("too short".parse::<EncryptionKey>().is_err());
        assert!("0123456789abcdef0123456789abcdef"
            .parse::<EncryptionKey>()
            .is_ok());
    }

    #[test]
    fn test_key_debug_is_redacted() {
        let key = EncryptionKey::from_bytes(&[7u8; 32]).unwrap();
        let text = format!("{key:?}");
        assert!(text.contains("REDACTED"));
        assert!(!text.contains('7'));
    }

    #[test]
    fn test_encrypt_decrypt_round_trip() {
        let crypto = middleware();
        let value = json!({"name": "alice", "tags": [1, 2, 3], "ok": true});

        let payload = crypto.encrypt(&value).unwrap();
        assert_eq!(STANDARD.decode(&payload.iv).unwrap().len(), IV_SIZE);
        assert_eq!(STANDARD.decode(&payload.tag).unwrap().len(), TAG_SIZE);
        assert_eq!(crypto.decrypt(&payload).unwrap(), value);
    }

    #[test]
    fn test_fresh_nonce_per_encryption() {
        let crypto = middleware();
        let a = crypto.encrypt(&json!("same")).unwrap();
        let b = crypto.encrypt(&json!("same")).unwrap();
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.value, b.value);
    }

    #[test]
    fn test_tampering_is_detected() {
        let crypto = middleware();
        let mut payload = crypto.encrypt(&json!("secret")).unwrap();
        let mut raw = STANDARD.decode(&payload.value).unwrap();
        raw[0] ^= 0x01;
        payload.value = STANDARD.encode(raw);
        assert!(matches!(
            crypto.decrypt(&payload),
            Err(CryptoError::Decryption(_))
        ));
    }

    #[test]
    fn test_wrong_key_fails() {
        let payload = middleware().encrypt(&json!(42)).unwrap();
        assert!(middleware().decrypt(&payload).is_err());
    }

    #[test]
    fn test_bad_framing_is_rejected() {
        let crypto = middleware();
        let mut payload = crypto.encrypt(&json!(1)).unwrap();
        payload.iv = STANDARD.encode([0u8; 8]);
        assert!(matches!(
            crypto.decrypt(&payload),
            Err(CryptoError::Decryption(msg)) if msg.contains("iv")
        ));

        payload.iv = "%%%".to_string();
        assert!(matches!(crypto.decrypt(&payload), Err(CryptoError::Encoding(_))));
    }

    #[test]
    fn test_payload_shape_detection() {
        assert!(EncryptedPayload::from_stored(&json!({"iv": "a", "tag": "b", "value": "c"})).is_some());
        assert!(EncryptedPayload::from_stored(&json!({"iv": "a", "tag": "b"})).is_none());
        assert!(EncryptedPayload::from_stored(&json!({"iv": "", "tag": "b", "value": "c"})).is_none());
        assert!(EncryptedPayload::from_stored(&json!({"iv": 1, "tag": "b", "value": "c"})).is_none());
        assert!(EncryptedPayload::from_stored(&json!("plain")).is_none());
    }

    #[tokio::test]
    async fn test_hooks_seal_and_open() {
        let crypto = middleware();
        let stored = crypto
            .before_set("k", &json!([1, 2]))
            .await
            .unwrap()
            .unwrap();
        assert!(EncryptedPayload::from_stored(&stored).is_some());

        let read = crypto.after_get("k", Some(&stored)).await.unwrap();
        assert_eq!(read, Replace::With(Some(json!([1, 2]))));

        let plain = crypto.after_get("k", Some(&json!("plain"))).await.unwrap();
        assert_eq!(plain, Replace::Keep);
        assert_eq!(crypto.after_get("k", None).await.unwrap(), Replace::Keep);
    }

    #[tokio::test]
    async fn test_undecryptable_value_reads_as_absent() {
        let stored = serde_json::to_value(middleware().encrypt(&json!("x")).unwrap()).unwrap();
        let read = middleware().after_get("k", Some(&stored)).await.unwrap();
        assert_eq!(read, Replace::With(None));
    }
}
