//! `X-Hub-Signature-256` verification.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

/// Why a webhook signature was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    /// No signature header although a secret is configured.
    #[error("missing X-Hub-Signature-256 header")]
    Missing,

    /// Header is not `sha256=<hex>`.
    #[error("signature must use sha256=<hex> format")]
    Format,

    /// Hex digest could not be decoded.
    #[error("invalid signature digest: {0}")]
    Digest(String),

    /// Digest does not match the body.
    #[error("webhook signature verification failed")]
    Mismatch,
}

/// Check `signature` (the raw header value) against the HMAC-SHA256 of
/// `payload` keyed with `secret`.
pub fn verify_signature(payload: &[u8], signature: Option<&str>, secret: &str) -> Result<(), SignatureError> {
    let signature = signature.ok_or(SignatureError::Missing)?;
    let digest_hex = signature.trim().strip_prefix("sha256=").ok_or(SignatureError::Format)?;
    let expected = decode_hex(digest_hex)?;

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| SignatureError::Digest(format!("cannot key HMAC: {e}")))?;
    mac.update(payload);
    mac.verify_slice(&expected).map_err(|_| SignatureError::Mismatch)
}

fn decode_hex(value: &str) -> Result<Vec<u8>, SignatureError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SignatureError::Digest("digest cannot be empty".to_string()));
    }
    if trimmed.len() % 2 != 0 {
        return Err(SignatureError::Digest("odd number of hex characters".to_string()));
    }

    trimmed
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
                .ok_or_else(|| SignatureError::Digest(format!("invalid hex byte '{}'", String::from_utf8_lossy(pair))))
        })
        .collect()
}
