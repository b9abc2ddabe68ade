//! Keypair module
//!
//! Ed25519 signing keys for data publishers.
//!
//! Secret keys are zeroized on drop.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::Rng;
use std::fmt;
use zeroize::Zeroize;

use super::pub_key_hash::PubKeyHash;

/// Length of a raw Ed25519 public key
pub const PUBLIC_KEY_LENGTH: usize = 32;

/// Length of a raw Ed25519 signature
pub const SIGNATURE_LENGTH: usize = 64;

/// Ed25519 keypair owned by a publisher
#[derive(Clone)]
pub struct Keypair {
    /// Public key bytes (32 bytes)
    public: [u8; PUBLIC_KEY_LENGTH],
    /// Secret seed (32 bytes), zeroized on drop
    secret: [u8; 32],
}

impl Keypair {
    /// Generate a fresh random keypair
    pub fn generate() -> Self {
        let seed: [u8; 32] = rand::rng().random();
        Self::from_seed(seed)
    }

    /// Rebuild a keypair from its 32-byte secret seed
    pub fn from_seed(seed: [u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(&seed);
        Keypair {
            public: signing_key.verifying_key().to_bytes(),
            secret: seed,
        }
    }

    /// Sign a message, returning the 64-byte signature
    pub fn sign(&self, msg: &[u8]) -> Vec<u8> {
        let signing_key = SigningKey::from_bytes(&self.secret);
        signing_key.sign(msg).to_bytes().to_vec()
    }

    /// Verify a signature against a raw public key
    ///
    /// Malformed keys or signatures simply fail verification.
    pub fn verify(pubkey: &[u8], msg: &[u8], sig: &[u8]) -> bool {
        let Ok(pubkey) = <[u8; PUBLIC_KEY_LENGTH]>::try_from(pubkey) else {
            return false;
        };
        let Ok(verifying_key) = VerifyingKey::from_bytes(&pubkey) else {
            return false;
        };
        let Ok(signature) = Signature::from_slice(sig) else {
            return false;
        };
        verifying_key.verify(msg, &signature).is_ok()
    }

    /// Raw public key bytes
    pub fn public_key(&self) -> &[u8] {
        &self.public
    }

    /// Hash of the public key, the identity stores key ownership on
    pub fn pub_key_hash(&self) -> PubKeyHash {
        PubKeyHash::from_public_key(&self.public)
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("public", &hex::encode(self.public))
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl Drop for Keypair {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}
