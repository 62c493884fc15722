//! Concrete backing for [`crate::domain::oracle::Hasher`].
//!
//! The real service hashes with Poseidon8 over the target chain's native
//! field, a permutation this crate treats as an opaque capability it does
//! not reimplement. `Blake2s256` stands in behind the same trait boundary
//! so the rest of the pipeline (chunk formatting, request hashing,
//! timestamped hashing) can be built and tested against a real (if not
//! chain-native) digest.

use blake2::{Blake2s256, Digest};

use crate::domain::oracle::Hasher;

pub struct Blake2Hasher;

impl Hasher for Blake2Hasher {
    fn hash_bytes(&self, input: &[u8]) -> [u8; 32] {
        let digest = Blake2s256::digest(input);
        let mut out = [0u8; 32];
        out.copy_from_slice(digest.as_slice());
        out
    }

    fn hash_to_field_string(&self, input: &[u8]) -> String {
        let digest = self.hash_bytes(input);
        let mut half = [0u8; 16];
        half.copy_from_slice(&digest[..16]);
        format!("{}field", u128::from_le_bytes(half))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let hasher = Blake2Hasher;
        assert_eq!(hasher.hash_bytes(b"abc"), hasher.hash_bytes(b"abc"));
        assert_ne!(hasher.hash_bytes(b"abc"), hasher.hash_bytes(b"abd"));
    }

    #[test]
    fn field_string_ends_in_field() {
        let hasher = Blake2Hasher;
        assert!(hasher.hash_to_field_string(b"abc").ends_with("field"));
    }
}
