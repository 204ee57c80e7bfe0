//! Payload signing for webhook deliveries.
//!
//! HMAC-SHA256 over the exact serialized payload bytes, emitted as lowercase
//! hex. Receivers recompute the digest under the shared secret to verify
//! authenticity and detect tampering.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("Signing secret is empty")]
    EmptySecret,

    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

/// Sign a serialized payload under the shared secret.
///
/// An empty secret is an error: a delivery must be aborted rather than sent
/// unsigned.
pub fn sign_payload(payload: &str, secret: &str) -> Result<String, SignatureError> {
    if secret.is_empty() {
        return Err(SignatureError::EmptySecret);
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| SignatureError::InvalidKey(e.to_string()))?;
    mac.update(payload.as_bytes());
    let result = mac.finalize();

    Ok(hex::encode(result.into_bytes()))
}

/// Verify a payload signature using constant-time comparison.
pub fn verify_payload(
    payload: &str,
    secret: &str,
    signature: &str,
) -> Result<bool, SignatureError> {
    let expected = sign_payload(payload, secret)?;

    let expected_bytes = expected.as_bytes();
    let signature_bytes = signature.as_bytes();

    if expected_bytes.len() != signature_bytes.len() {
        return Ok(false);
    }

    Ok(expected_bytes.ct_eq(signature_bytes).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_is_deterministic() {
        let payload = r#"{"event":"order.created","order_id":"abc"}"#;
        let a = sign_payload(payload, "shared_secret").unwrap();
        let b = sign_payload(payload, "shared_secret").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_one_byte_change_alters_signature() {
        let a = sign_payload(r#"{"total":"100.00"}"#, "shared_secret").unwrap();
        let b = sign_payload(r#"{"total":"100.01"}"#, "shared_secret").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_empty_secret_is_rejected() {
        let err = sign_payload("{}", "").unwrap_err();
        assert!(matches!(err, SignatureError::EmptySecret));
    }

    #[test]
    fn test_verify_roundtrip_and_tampering() {
        let payload = r#"{"event":"order.updated"}"#;
        let signature = sign_payload(payload, "k1").unwrap();

        assert!(verify_payload(payload, "k1", &signature).unwrap());
        assert!(!verify_payload(payload, "k2", &signature).unwrap());

        let flip = if signature.starts_with('a') { "b" } else { "a" };
        let tampered = format!("{}{}", flip, &signature[1..]);
        assert!(!verify_payload(payload, "k1", &tampered).unwrap());
    }
}
