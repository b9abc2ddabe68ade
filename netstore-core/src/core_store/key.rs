/*
    key.rs - Storage keys

    Every store maps a 256-bit BLAKE3 key to one entry.
    - append-only data is content addressed: the key hashes the payload bytes
    - authenticated and mailbox data are owner addressed: the key hashes the
      publisher's public key hash together with the payload's stable id, so a
      newer version of the same item lands on the same slot
    - mailbox keys also hash the receiver, the party entitled to remove
    A removal names the parts its key is built from, so a store can check the
    signer's own hash derives the slot it wants to tombstone.
*/

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core_identity::PubKeyHash;

const AUTHENTICATED_DOMAIN: &[u8] = b"netstore/key/authenticated";
const MAILBOX_DOMAIN: &[u8] = b"netstore/key/mailbox";

/// 256-bit key of one store slot
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StorageKey([u8; 32]);

impl StorageKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        StorageKey(bytes)
    }

    /// Content hash of arbitrary bytes
    pub fn hash(data: &[u8]) -> Self {
        StorageKey(*blake3::hash(data).as_bytes())
    }

    /// Slot of an authenticated item owned by `owner`
    pub fn authenticated(owner: &PubKeyHash, stable_id: &str) -> Self {
        Self::owner_scoped(AUTHENTICATED_DOMAIN, owner, stable_id)
    }

    /// Slot of a mailbox message from `sender` to `receiver`
    pub fn mailbox(sender: &PubKeyHash, receiver: &PubKeyHash, stable_id: &str) -> Self {
        Self::scoped(MAILBOX_DOMAIN, &[sender, receiver], stable_id)
    }

    fn owner_scoped(domain: &[u8], owner: &PubKeyHash, stable_id: &str) -> Self {
        Self::scoped(domain, &[owner], stable_id)
    }

    fn scoped(domain: &[u8], parties: &[&PubKeyHash], stable_id: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(domain);
        for party in parties {
            hasher.update(party.as_bytes());
        }
        hasher.update(&(stable_id.len() as u64).to_be_bytes());
        hasher.update(stable_id.as_bytes());
        StorageKey(*hasher.finalize().as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StorageKey({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_deterministic() {
        assert_eq!(StorageKey::hash(b"burn"), StorageKey::hash(b"burn"));
        assert_ne!(StorageKey::hash(b"burn"), StorageKey::hash(b"burn2"));
    }

    #[test]
    fn test_owner_scoped_keys() {
        let alice = PubKeyHash::from_public_key(b"alice");
        let bob = PubKeyHash::from_public_key(b"bob");

        assert_eq!(
            StorageKey::authenticated(&alice, "offer-1"),
            StorageKey::authenticated(&alice, "offer-1")
        );
        assert_ne!(
            StorageKey::authenticated(&alice, "offer-1"),
            StorageKey::authenticated(&alice, "offer-2")
        );
        assert_ne!(
            StorageKey::authenticated(&alice, "offer-1"),
            StorageKey::authenticated(&bob, "offer-1")
        );
    }

    #[test]
    fn test_families_do_not_collide() {
        let owner = PubKeyHash::from_public_key(b"alice");
        assert_ne!(
            StorageKey::authenticated(&owner, "id"),
            StorageKey::mailbox(&owner, &owner, "id")
        );
    }

    #[test]
    fn test_mailbox_key_names_both_parties() {
        let alice = PubKeyHash::from_public_key(b"alice");
        let bob = PubKeyHash::from_public_key(b"bob");
        assert_ne!(
            StorageKey::mailbox(&alice, &bob, "m1"),
            StorageKey::mailbox(&alice, &alice, "m1")
        );
        assert_ne!(
            StorageKey::mailbox(&alice, &bob, "m1"),
            StorageKey::mailbox(&bob, &alice, "m1")
        );
    }

    #[test]
    fn test_display_is_hex() {
        let key = StorageKey::from_bytes([0x0f; 32]);
        assert_eq!(key.to_string(), "0f".repeat(32));
    }
}
