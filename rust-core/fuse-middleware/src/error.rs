// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Error types for the bundled FuseDB middleware.

use fuse_core::HookError;
use thiserror::Error;

/// Errors raised by [`crate::CryptoMiddleware`] and its key type.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// The key material is not exactly 32 bytes.
    #[error("encryption key must be {expected} bytes for AES-256, got {actual}")]
    InvalidKeySize {
        /// Length supplied by the caller.
        actual: usize,
        /// Required length.
        expected: usize,
    },

    /// The cipher refused to seal the plaintext.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// The payload could not be opened (wrong key, tampering, bad framing).
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// A payload field is not valid base64.
    #[error("invalid base64 in payload: {0}")]
    Encoding(#[from] base64::DecodeError),

    /// The value could not be converted to or from JSON.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for CryptoError {
    fn from(err: serde_json::Error) -> Self {
        CryptoError::Serialization(err.to_string())
    }
}

impl From<CryptoError> for HookError {
    fn from(err: CryptoError) -> Self {
        HookError::new(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_size_message() {
        let err = CryptoError::InvalidKeySize {
            actual: 5,
            expected: 32,
        };
        assert_eq!(
            err.to_string(),
            "encryption key must be 32 bytes for AES-256, got 5"
        );
    }

    #[test]
    fn test_converts_into_hook_error() {
        let hook: HookError = CryptoError::Encryption("boom".into()).into();
        assert_eq!(hook.message(), "encryption failed: boom");
    }
}
