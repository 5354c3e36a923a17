//! PKCE (RFC 7636) verifier/challenge checking for the authorization-code
//! exchange.

use crate::types::PkceMethod;
use base64::Engine;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

fn b64url(bytes: &[u8]) -> String {
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Verifies `code_verifier` against the `code_challenge` persisted at
/// `/authorize`, per the declared challenge method. Comparison is
/// constant-time to avoid leaking challenge contents through timing.
pub fn verify(method: PkceMethod, code_verifier: &str, code_challenge: &str) -> bool {
    match method {
        PkceMethod::Plain => {
            code_verifier.as_bytes().ct_eq(code_challenge.as_bytes()).into()
        }
        PkceMethod::S256 => {
            let digest = Sha256::digest(code_verifier.as_bytes());
            let computed = b64url(&digest);
            computed.as_bytes().ct_eq(code_challenge.as_bytes()).into()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_method_is_a_direct_match() {
        assert!(verify(PkceMethod::Plain, "verifier", "verifier"));
        assert!(!verify(PkceMethod::Plain, "verifier", "other"));
    }

    #[test]
    fn s256_method_matches_the_known_rfc_example() {
        // RFC 7636 appendix B.
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        let challenge = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";
        assert!(verify(PkceMethod::S256, verifier, challenge));
    }

    #[test]
    fn mismatched_verifier_fails() {
        assert!(!verify(PkceMethod::S256, "wrong", "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"));
    }
}
