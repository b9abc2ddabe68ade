//! Public key hash
//!
//! 20-byte SHA-256 prefix of an Ed25519 public key. Authenticated and mailbox
//! entries are bound to this hash instead of the full key.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Length of a public key hash in bytes
pub const PUB_KEY_HASH_LENGTH: usize = 20;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PubKeyHash([u8; PUB_KEY_HASH_LENGTH]);

impl PubKeyHash {
    /// Hash a raw public key
    pub fn from_public_key(public_key: &[u8]) -> Self {
        let digest = Sha256::digest(public_key);
        let mut bytes = [0u8; PUB_KEY_HASH_LENGTH];
        bytes.copy_from_slice(&digest[..PUB_KEY_HASH_LENGTH]);
        PubKeyHash(bytes)
    }

    pub fn from_bytes(bytes: [u8; PUB_KEY_HASH_LENGTH]) -> Self {
        PubKeyHash(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; PUB_KEY_HASH_LENGTH] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for PubKeyHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PubKeyHash({})", &self.to_hex()[..8])
    }
}

impl fmt::Display for PubKeyHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
