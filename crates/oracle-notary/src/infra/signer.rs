//! Concrete backing for [`crate::domain::oracle::Signer`].
//!
//! The real enclave session signs with Schnorr-over-curve using a key that
//! never leaves enclave memory, a black-box primitive this crate does not
//! reimplement. `Ed25519` stands in behind the same `Signer` trait: the key
//! is generated once at process start and owned for the process lifetime,
//! never persisted or re-derived.

use ed25519_dalek::{Signer as _, SigningKey};
use rand::rngs::OsRng;

use crate::domain::oracle::Signer;

pub struct Ed25519Signer {
    signing_key: SigningKey,
}

impl Ed25519Signer {
    /// Generate a fresh enclave-resident keypair. Called exactly once, at
    /// startup, and the resulting signer is shared (behind an `Arc`) for the
    /// lifetime of the process.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }
}

impl Signer for Ed25519Signer {
    fn sign(&self, message: &[u8; 32]) -> Vec<u8> {
        self.signing_key.sign(message).to_bytes().to_vec()
    }

    fn public_key(&self) -> String {
        const_hex::encode_prefixed(self.signing_key.verifying_key().to_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_deterministic_for_a_fixed_key() {
        let signer = Ed25519Signer::generate();
        let message = [7u8; 32];
        assert_eq!(signer.sign(&message), signer.sign(&message));
    }

    #[test]
    fn public_key_is_hex_encoded() {
        let signer = Ed25519Signer::generate();
        assert!(signer.public_key().starts_with("0x"));
    }
}
