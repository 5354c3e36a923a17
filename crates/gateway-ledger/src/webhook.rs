//! Webhook HMAC verification.
//!
//! Per spec §4.J / §6: `POST /webhooks/<provider>` carries
//! `x-signature: sha256=<hex>` computed over the *raw* request body with a
//! shared secret; verification happens before any ledger call, and a
//! mismatch is a hard 401 with no ledger mutation.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebhookSignatureError {
    #[error("missing x-signature header")]
    MissingHeader,
    #[error("x-signature header is not in 'sha256=<hex>' form")]
    MalformedHeader,
    #[error("signature does not match")]
    Mismatch,
}

/// Verifies `header_value` (the raw `x-signature` header) against `body`
/// using HMAC-SHA256 keyed by `secret`. Constant-time comparison prevents a
/// timing side channel on the hex digest.
pub fn verify_signature(
    secret: &[u8],
    body: &[u8],
    header_value: Option<&str>,
) -> Result<(), WebhookSignatureError> {
    let header_value = header_value.ok_or(WebhookSignatureError::MissingHeader)?;
    let hex_digest = header_value
        .strip_prefix("sha256=")
        .ok_or(WebhookSignatureError::MalformedHeader)?;
    let claimed = hex_decode(hex_digest).ok_or(WebhookSignatureError::MalformedHeader)?;

    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(body);
    let expected = mac.finalize().into_bytes();

    if expected.as_slice().ct_eq(&claimed).into() {
        Ok(())
    } else {
        Err(WebhookSignatureError::Mismatch)
    }
}

fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &[u8], body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret).unwrap();
        mac.update(body);
        let digest = mac.finalize().into_bytes();
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        format!("sha256={hex}")
    }

    #[test]
    fn valid_signature_verifies() {
        let secret = b"shh";
        let body = br#"{"payment_id":"P1"}"#;
        let header = sign(secret, body);
        assert!(verify_signature(secret, body, Some(&header)).is_ok());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let body = br#"{"payment_id":"P1"}"#;
        let header = sign(b"shh", body);
        let result = verify_signature(b"different", body, Some(&header));
        assert_eq!(result, Err(WebhookSignatureError::Mismatch));
    }

    #[test]
    fn tampered_body_is_rejected() {
        let secret = b"shh";
        let header = sign(secret, br#"{"payment_id":"P1","tokens":5000}"#);
        let result = verify_signature(secret, br#"{"payment_id":"P1","tokens":50000}"#, Some(&header));
        assert_eq!(result, Err(WebhookSignatureError::Mismatch));
    }

    #[test]
    fn missing_header_is_rejected() {
        assert_eq!(
            verify_signature(b"shh", b"{}", None),
            Err(WebhookSignatureError::MissingHeader)
        );
    }

    #[test]
    fn malformed_header_is_rejected() {
        assert_eq!(
            verify_signature(b"shh", b"{}", Some("not-a-signature")),
            Err(WebhookSignatureError::MalformedHeader)
        );
    }
}
