//! AEAD envelope used to seal user-supplied provider API keys at rest.

use ring::aead::{Aad, BoundKey, Nonce, NonceSequence, OpeningKey, SealingKey, UnboundKey, CHACHA20_POLY1305};
use ring::error::Unspecified;
use ring::rand::{SecureRandom, SystemRandom};
use thiserror::Error;

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("master key must be exactly {KEY_LEN} bytes, got {0}")]
    BadKeyLength(usize),
    #[error("encryption failed")]
    SealFailed,
    #[error("decryption failed: ciphertext invalid or key mismatch")]
    OpenFailed,
}

/// A single nonce used once, then exhausted. `ring`'s `BoundKey` API wants a
/// `NonceSequence`; since every seal/open uses a freshly generated key
/// binding, a sequence of exactly one nonce is the correct shape.
struct OnceNonce(Option<[u8; NONCE_LEN]>);

impl NonceSequence for OnceNonce {
    fn advance(&mut self) -> Result<Nonce, Unspecified> {
        let bytes = self.0.take().ok_or(Unspecified)?;
        Ok(Nonce::assume_unique_for_key(bytes))
    }
}

/// The sealed form stored in a row: a fresh nonce plus the ciphertext (which
/// includes the AEAD tag).
#[derive(Debug, Clone)]
pub struct Sealed {
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
}

#[derive(Clone)]
pub struct MasterKey([u8; KEY_LEN]);

impl MasterKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| CryptoError::BadKeyLength(bytes.len()))?;
        Ok(Self(arr))
    }

    pub fn seal(&self, plaintext: &str) -> Result<Sealed, CryptoError> {
        let rng = SystemRandom::new();
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rng.fill(&mut nonce_bytes).map_err(|_| CryptoError::SealFailed)?;

        let unbound = UnboundKey::new(&CHACHA20_POLY1305, &self.0).map_err(|_| CryptoError::SealFailed)?;
        let mut key = SealingKey::new(unbound, OnceNonce(Some(nonce_bytes)));

        let mut in_out = plaintext.as_bytes().to_vec();
        key.seal_in_place_append_tag(Aad::empty(), &mut in_out)
            .map_err(|_| CryptoError::SealFailed)?;

        Ok(Sealed {
            nonce: nonce_bytes,
            ciphertext: in_out,
        })
    }

    pub fn open(&self, sealed: &Sealed) -> Result<String, CryptoError> {
        let unbound = UnboundKey::new(&CHACHA20_POLY1305, &self.0).map_err(|_| CryptoError::OpenFailed)?;
        let mut key = OpeningKey::new(unbound, OnceNonce(Some(sealed.nonce)));

        let mut in_out = sealed.ciphertext.clone();
        let plaintext = key
            .open_in_place(Aad::empty(), &mut in_out)
            .map_err(|_| CryptoError::OpenFailed)?;
        String::from_utf8(plaintext.to_vec()).map_err(|_| CryptoError::OpenFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_then_open_round_trips() {
        let key = MasterKey::from_bytes(&[7u8; KEY_LEN]).unwrap();
        let sealed = key.seal("sk-ant-super-secret").unwrap();
        assert_eq!(key.open(&sealed).unwrap(), "sk-ant-super-secret");
    }

    #[test]
    fn tampered_ciphertext_fails_to_open() {
        let key = MasterKey::from_bytes(&[7u8; KEY_LEN]).unwrap();
        let mut sealed = key.seal("sk-ant-super-secret").unwrap();
        let last = sealed.ciphertext.len() - 1;
        sealed.ciphertext[last] ^= 0xFF;
        assert!(key.open(&sealed).is_err());
    }

    #[test]
    fn wrong_key_length_is_rejected() {
        assert!(MasterKey::from_bytes(&[1u8; 16]).is_err());
    }
}
