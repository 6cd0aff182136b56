// Hashing utilities

use sha2::{Digest as _, Sha256};
use crate::core::Digest;

/// Single SHA256 hash
pub fn sha256(data: &[u8]) -> Digest {
    let hash = Sha256::digest(data);
    let mut result = [0u8; 32];
    result.copy_from_slice(&hash);
    Digest::new(result)
}

/// SHA256 over the concatenation of two digests (Merkle parent)
pub fn sha256_pair(left: &Digest, right: &Digest) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    let mut result = [0u8; 32];
    result.copy_from_slice(&hasher.finalize());
    Digest::new(result)
}

/// Types with a canonical, order-sensitive, whitespace-free text form.
/// The digest is taken over this text, never over the binary record, so
/// changes to the record framing do not move any hash.
pub trait Canonical {
    fn canonical_text(&self) -> String;

    fn digest(&self) -> Digest {
        sha256(self.canonical_text().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            sha256(b"abc").to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_sha256_pair_matches_concatenation() {
        let a = sha256(b"a");
        let b = sha256(b"b");
        let mut joined = Vec::new();
        joined.extend_from_slice(a.as_bytes());
        joined.extend_from_slice(b.as_bytes());
        assert_eq!(sha256_pair(&a, &b), sha256(&joined));
    }
}
