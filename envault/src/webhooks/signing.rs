//! HMAC-SHA256 verification of inbound webhook signatures.
//!
//! DocuSign Connect signs the exact raw request body with a shared secret
//! and sends the base64-encoded digest in the `X-DocuSign-Signature-1`
//! header. Verification recomputes the digest over the same bytes and
//! compares in constant time.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64_STANDARD};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Compute the base64-encoded HMAC-SHA256 of `raw_body` under `secret`.
///
/// Returns `None` when the key setup fails.
pub fn compute_signature(raw_body: &str, secret: &str) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(raw_body.as_bytes());
    let digest = mac.finalize().into_bytes();
    Some(BASE64_STANDARD.encode(digest))
}

/// Verify a presented signature against the raw request body.
///
/// An empty secret means verification is disabled and always passes; the
/// caller is responsible for logging that policy loudly. Any failure during
/// computation counts as verification failure, never a panic.
pub fn verify(raw_body: &str, presented: &str, secret: &str) -> bool {
    if secret.is_empty() {
        return true;
    }

    match compute_signature(raw_body, secret) {
        Some(expected) => constant_time_eq(expected.as_bytes(), presented.as_bytes()),
        None => false,
    }
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_secret_accepts_anything() {
        assert!(verify("body", "whatever", ""));
        assert!(verify("body", "", ""));
        assert!(verify("", "sig", ""));
    }

    #[test]
    fn valid_signature_verifies() {
        let body = r#"{"event":"envelope-completed","data":{"envelopeId":"env123"}}"#;
        let secret = "connect-secret";

        let signature = compute_signature(body, secret).expect("should sign");
        assert!(verify(body, &signature, secret));
    }

    #[test]
    fn wrong_signature_fails() {
        let body = "payload";
        let secret = "connect-secret";
        let signature = compute_signature(body, secret).unwrap();

        assert!(!verify(body, "not-the-signature", secret));
        assert!(!verify("different payload", &signature, secret));
        assert!(!verify(body, &signature, "different-secret"));
    }

    #[test]
    fn signature_is_deterministic() {
        let a = compute_signature("abc", "key").unwrap();
        let b = compute_signature("abc", "key").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn constant_time_eq_basic() {
        assert!(constant_time_eq(b"same", b"same"));
        assert!(!constant_time_eq(b"same", b"diff"));
        assert!(!constant_time_eq(b"short", b"longer"));
    }
}
