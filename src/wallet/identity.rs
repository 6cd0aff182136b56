// Signing identities

use crate::core::{sha256, Digest};
use crate::error::{Error, Result};
use secp256k1::{ecdsa::Signature, All, Message, PublicKey, Secp256k1, SecretKey};

/// Anything that can sign and verify digests on behalf of a wallet
pub trait SigningIdentity {
    /// Serialized public key
    fn public_key(&self) -> Vec<u8>;

    /// Sign a 32-byte digest
    fn sign(&self, digest: &Digest) -> Vec<u8>;

    /// Check a signature produced by `sign`
    fn verify(&self, digest: &Digest, signature: &[u8]) -> bool;

    /// 32-byte wallet identifier, SHA256 of the public key
    fn wallet_id(&self) -> Digest {
        sha256(&self.public_key())
    }
}

/// secp256k1 key pair
#[derive(Clone)]
pub struct KeyPair {
    secp: Secp256k1<All>,
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl KeyPair {
    /// Derive a key pair from a seed phrase. The secret key is the SHA256
    /// of the phrase, so the same phrase always yields the same wallet.
    pub fn from_seed_phrase(phrase: &str) -> Result<Self> {
        let phrase = phrase.trim();
        if phrase.is_empty() {
            return Err(Error::InvalidKey("empty seed phrase".to_string()));
        }
        Self::from_secret_bytes(sha256(phrase.as_bytes()).as_bytes())
    }

    /// Create from secret key bytes
    pub fn from_secret_bytes(bytes: &[u8; 32]) -> Result<Self> {
        let secp = Secp256k1::new();
        let secret_key = SecretKey::from_slice(bytes)
            .map_err(|e| Error::InvalidKey(format!("invalid secret key: {}", e)))?;
        let public_key = secret_key.public_key(&secp);

        Ok(Self {
            secp,
            secret_key,
            public_key,
        })
    }

    pub fn secret_bytes(&self) -> [u8; 32] {
        self.secret_key.secret_bytes()
    }
}

impl SigningIdentity for KeyPair {
    fn public_key(&self) -> Vec<u8> {
        self.public_key.serialize().to_vec()
    }

    /// 64-byte compact ECDSA signature
    fn sign(&self, digest: &Digest) -> Vec<u8> {
        let message = Message::from_digest(*digest.as_bytes());
        self.secp
            .sign_ecdsa(&message, &self.secret_key)
            .serialize_compact()
            .to_vec()
    }

    fn verify(&self, digest: &Digest, signature: &[u8]) -> bool {
        let Ok(signature) = Signature::from_compact(signature) else {
            return false;
        };
        let message = Message::from_digest(*digest.as_bytes());
        self.secp.verify_ecdsa(&message, &signature, &self.public_key).is_ok()
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &hex::encode(self.public_key.serialize()))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Transaction;

    const PHRASE: &str =
        "abandon ability able about above absent absorb abstract absurd abuse access accident";

    #[test]
    fn test_derivation_is_deterministic() {
        let a = KeyPair::from_seed_phrase(PHRASE).unwrap();
        let b = KeyPair::from_seed_phrase(PHRASE).unwrap();
        assert_eq!(a.public_key(), b.public_key());
        assert_eq!(a.wallet_id(), b.wallet_id());
        assert_eq!(a.public_key().len(), 33);

        let other = KeyPair::from_seed_phrase("another phrase").unwrap();
        assert_ne!(a.public_key(), other.public_key());
    }

    #[test]
    fn test_empty_phrase_rejected() {
        assert!(matches!(KeyPair::from_seed_phrase("   "), Err(Error::InvalidKey(_))));
    }

    #[test]
    fn test_sign_and_verify() {
        let keys = KeyPair::from_seed_phrase(PHRASE).unwrap();
        let digest = sha256(b"payload");

        let signature = keys.sign(&digest);
        assert_eq!(signature.len(), 64);
        assert!(keys.verify(&digest, &signature));
        assert!(!keys.verify(&sha256(b"other"), &signature));
        assert!(!keys.verify(&digest, &signature[..32]));
    }

    #[test]
    fn test_sign_transaction() {
        let keys = KeyPair::from_seed_phrase(PHRASE).unwrap();
        let mut tx = Transaction::new(0, keys.wallet_id().as_bytes(), b"bob", "10", 0);

        let full = tx.sign(&keys);
        assert_eq!(&tx.signature[..], &full[..32]);
        assert!(keys.verify(&tx.signing_digest(), &full));
    }
}
