//! Authenticated requests
//!
//! Add, remove and refresh requests for owner signed data, plus the record
//! an authenticated store keeps per slot.

use serde::{Deserialize, Serialize};

use super::{signing_message, AddDataRequest, DataRequest, RemoveDataRequest};
use crate::core_identity::{Keypair, PubKeyHash};
use crate::core_store::key::StorageKey;
use crate::core_store::metadata::now_millis;
use crate::core_store::payload::{AuthenticatedPayload, DistributedData, PayloadType};
use crate::core_store::store::{StoreEntry, StoreResult};

const ADD_DOMAIN: &[u8] = b"netstore/sign/add-authenticated";
const REMOVE_DOMAIN: &[u8] = b"netstore/sign/remove-authenticated";
const REFRESH_DOMAIN: &[u8] = b"netstore/sign/refresh-authenticated";

/// Payload together with the fields its owner signs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedSequentialData {
    pub payload: AuthenticatedPayload,
    pub sequence_number: u32,
    pub pub_key_hash: PubKeyHash,
    /// Creation date in milliseconds since the unix epoch
    pub created: u64,
}

impl AuthenticatedSequentialData {
    pub fn key(&self) -> StorageKey {
        StorageKey::authenticated(&self.pub_key_hash, &self.payload.stable_id())
    }

    fn signing_message(&self) -> StoreResult<Vec<u8>> {
        let payload_hash = self.payload.payload_hash()?;
        Ok(signing_message(
            ADD_DOMAIN,
            &[
                &self.sequence_number.to_be_bytes(),
                &payload_hash,
                &self.created.to_be_bytes(),
            ],
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddAuthenticatedDataRequest {
    pub data: AuthenticatedSequentialData,
    pub signature: Vec<u8>,
    pub owner_public_key: Vec<u8>,
}

impl AddAuthenticatedDataRequest {
    /// Sign `payload` at `sequence_number`, created now
    pub fn new(
        keypair: &Keypair,
        payload: AuthenticatedPayload,
        sequence_number: u32,
    ) -> StoreResult<Self> {
        Self::new_with_created(keypair, payload, sequence_number, now_millis())
    }

    pub fn new_with_created(
        keypair: &Keypair,
        payload: AuthenticatedPayload,
        sequence_number: u32,
        created: u64,
    ) -> StoreResult<Self> {
        let data = AuthenticatedSequentialData {
            payload,
            sequence_number,
            pub_key_hash: keypair.pub_key_hash(),
            created,
        };
        let signature = keypair.sign(&data.signing_message()?);
        Ok(AddAuthenticatedDataRequest {
            data,
            signature,
            owner_public_key: keypair.public_key().to_vec(),
        })
    }

    pub fn key(&self) -> StorageKey {
        self.data.key()
    }

    pub fn sequence_number(&self) -> u32 {
        self.data.sequence_number
    }

    /// Declared public key hashes to the declared owner hash
    pub fn is_public_key_hash_valid(&self) -> bool {
        PubKeyHash::from_public_key(&self.owner_public_key) == self.data.pub_key_hash
    }

    pub fn is_signature_valid(&self) -> bool {
        match self.data.signing_message() {
            Ok(message) => Keypair::verify(&self.owner_public_key, &message, &self.signature),
            Err(_) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveAuthenticatedDataRequest {
    pub payload_type: PayloadType,
    pub key: StorageKey,
    /// Stable id of the removed item, with the owner hash it derives `key`
    pub stable_id: String,
    pub sequence_number: u32,
    pub owner_public_key: Vec<u8>,
    pub signature: Vec<u8>,
    pub created: u64,
}

impl RemoveAuthenticatedDataRequest {
    pub fn new(
        keypair: &Keypair,
        payload_type: PayloadType,
        stable_id: &str,
        sequence_number: u32,
    ) -> Self {
        Self::new_with_created(keypair, payload_type, stable_id, sequence_number, now_millis())
    }

    pub fn new_with_created(
        keypair: &Keypair,
        payload_type: PayloadType,
        stable_id: &str,
        sequence_number: u32,
        created: u64,
    ) -> Self {
        let key = StorageKey::authenticated(&keypair.pub_key_hash(), stable_id);
        Self::build(keypair, payload_type, key, stable_id, sequence_number, created)
    }

    /// Remove the item an add request published
    ///
    /// Targets the add's slot whoever signs, a store rejects it unless the
    /// signer owns that slot.
    pub fn for_add(keypair: &Keypair, add: &AddAuthenticatedDataRequest, sequence_number: u32) -> Self {
        Self::build(
            keypair,
            add.data.payload.payload_type(),
            add.key(),
            &add.data.payload.stable_id(),
            sequence_number,
            now_millis(),
        )
    }

    fn build(
        keypair: &Keypair,
        payload_type: PayloadType,
        key: StorageKey,
        stable_id: &str,
        sequence_number: u32,
        created: u64,
    ) -> Self {
        let message = Self::signing_message(&key, sequence_number, created);
        RemoveAuthenticatedDataRequest {
            payload_type,
            key,
            stable_id: stable_id.to_string(),
            sequence_number,
            owner_public_key: keypair.public_key().to_vec(),
            signature: keypair.sign(&message),
            created,
        }
    }

    /// Whether the signer's hash and the stable id derive the targeted slot
    pub fn is_key_bound(&self) -> bool {
        StorageKey::authenticated(&self.owner_pub_key_hash(), &self.stable_id) == self.key
    }

    fn signing_message(key: &StorageKey, sequence_number: u32, created: u64) -> Vec<u8> {
        signing_message(
            REMOVE_DOMAIN,
            &[key.as_bytes(), &sequence_number.to_be_bytes(), &created.to_be_bytes()],
        )
    }

    pub fn owner_pub_key_hash(&self) -> PubKeyHash {
        PubKeyHash::from_public_key(&self.owner_public_key)
    }

    pub fn is_signature_valid(&self) -> bool {
        let message = Self::signing_message(&self.key, self.sequence_number, self.created);
        Keypair::verify(&self.owner_public_key, &message, &self.signature)
    }
}

/// Bumps the sequence number of a stored entry and renews its lifetime
///
/// `created` is signed, it becomes the entry's new creation time on every
/// node the refresh reaches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshAuthenticatedDataRequest {
    pub payload_type: PayloadType,
    pub key: StorageKey,
    pub sequence_number: u32,
    pub owner_public_key: Vec<u8>,
    pub signature: Vec<u8>,
    pub created: u64,
}

impl RefreshAuthenticatedDataRequest {
    pub fn new(
        keypair: &Keypair,
        payload_type: PayloadType,
        key: StorageKey,
        sequence_number: u32,
    ) -> Self {
        Self::new_with_created(keypair, payload_type, key, sequence_number, now_millis())
    }

    pub fn new_with_created(
        keypair: &Keypair,
        payload_type: PayloadType,
        key: StorageKey,
        sequence_number: u32,
        created: u64,
    ) -> Self {
        let message = Self::signing_message(&key, sequence_number, created);
        RefreshAuthenticatedDataRequest {
            payload_type,
            key,
            sequence_number,
            owner_public_key: keypair.public_key().to_vec(),
            signature: keypair.sign(&message),
            created,
        }
    }

    /// Refresh the item an add request published
    pub fn for_add(keypair: &Keypair, add: &AddAuthenticatedDataRequest, sequence_number: u32) -> Self {
        Self::new(keypair, add.data.payload.payload_type(), add.key(), sequence_number)
    }

    fn signing_message(key: &StorageKey, sequence_number: u32, created: u64) -> Vec<u8> {
        signing_message(
            REFRESH_DOMAIN,
            &[key.as_bytes(), &sequence_number.to_be_bytes(), &created.to_be_bytes()],
        )
    }

    pub fn owner_pub_key_hash(&self) -> PubKeyHash {
        PubKeyHash::from_public_key(&self.owner_public_key)
    }

    pub fn is_signature_valid(&self) -> bool {
        let message = Self::signing_message(&self.key, self.sequence_number, self.created);
        Keypair::verify(&self.owner_public_key, &message, &self.signature)
    }
}

/// Record an authenticated store keeps per slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthenticatedEntry {
    Added(AddAuthenticatedDataRequest),
    /// Live entry whose sequence number and lifetime were renewed by its owner
    Refreshed {
        request: AddAuthenticatedDataRequest,
        refresh: RefreshAuthenticatedDataRequest,
    },
    /// Tombstone
    Removed(RemoveAuthenticatedDataRequest),
}

impl AuthenticatedEntry {
    /// The add request behind a live entry
    pub fn add_request(&self) -> Option<&AddAuthenticatedDataRequest> {
        match self {
            AuthenticatedEntry::Added(request) => Some(request),
            AuthenticatedEntry::Refreshed { request, .. } => Some(request),
            AuthenticatedEntry::Removed(_) => None,
        }
    }

    pub fn payload(&self) -> Option<&AuthenticatedPayload> {
        self.add_request().map(|r| &r.data.payload)
    }
}

impl StoreEntry for AuthenticatedEntry {
    fn created(&self) -> u64 {
        match self {
            AuthenticatedEntry::Added(request) => request.data.created,
            AuthenticatedEntry::Refreshed { refresh, .. } => refresh.created,
            AuthenticatedEntry::Removed(request) => request.created,
        }
    }

    fn sequence_number(&self) -> u32 {
        match self {
            AuthenticatedEntry::Added(request) => request.data.sequence_number,
            AuthenticatedEntry::Refreshed { refresh, .. } => refresh.sequence_number,
            AuthenticatedEntry::Removed(request) => request.sequence_number,
        }
    }

    fn is_tombstone(&self) -> bool {
        matches!(self, AuthenticatedEntry::Removed(_))
    }

    fn to_data_request(&self) -> DataRequest {
        match self {
            AuthenticatedEntry::Added(request) => {
                DataRequest::Add(AddDataRequest::Authenticated(request.clone()))
            }
            // Peers need both halves: the add carries the payload, the refresh the version
            AuthenticatedEntry::Refreshed { request, refresh } => DataRequest::Refresh {
                add: request.clone(),
                refresh: refresh.clone(),
            },
            AuthenticatedEntry::Removed(request) => {
                DataRequest::Remove(RemoveDataRequest::Authenticated(request.clone()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_store::payload::UserProfile;

    fn profile(keypair: &Keypair, nick: &str) -> AuthenticatedPayload {
        AuthenticatedPayload::UserProfile(UserProfile::new(nick, keypair.pub_key_hash()))
    }

    #[test]
    fn test_add_request_signature() {
        let kp = Keypair::generate();
        let request = AddAuthenticatedDataRequest::new(&kp, profile(&kp, "alice"), 1).unwrap();
        assert!(request.is_signature_valid());
        assert!(request.is_public_key_hash_valid());
    }

    #[test]
    fn test_tampered_fields_break_signature() {
        let kp = Keypair::generate();
        let request = AddAuthenticatedDataRequest::new(&kp, profile(&kp, "alice"), 1).unwrap();

        let mut bumped = request.clone();
        bumped.data.sequence_number = 2;
        assert!(!bumped.is_signature_valid());

        let mut extended = request.clone();
        extended.data.created += 1_000;
        assert!(!extended.is_signature_valid());

        let mut swapped = request;
        swapped.data.payload = profile(&kp, "mallory");
        assert!(!swapped.is_signature_valid());
    }

    #[test]
    fn test_foreign_key_breaks_hash_binding() {
        let kp = Keypair::generate();
        let other = Keypair::generate();
        let mut request = AddAuthenticatedDataRequest::new(&kp, profile(&kp, "alice"), 1).unwrap();
        request.owner_public_key = other.public_key().to_vec();
        assert!(!request.is_public_key_hash_valid());
    }

    #[test]
    fn test_updates_share_a_slot() {
        let kp = Keypair::generate();
        let v1 = AddAuthenticatedDataRequest::new(&kp, profile(&kp, "alice"), 1).unwrap();
        let v2 = AddAuthenticatedDataRequest::new(&kp, profile(&kp, "alice2"), 2).unwrap();
        assert_eq!(v1.key(), v2.key());
    }

    #[test]
    fn test_remove_and_refresh_signatures() {
        let kp = Keypair::generate();
        let add = AddAuthenticatedDataRequest::new(&kp, profile(&kp, "alice"), 1).unwrap();

        let remove = RemoveAuthenticatedDataRequest::for_add(&kp, &add, 2);
        assert!(remove.is_signature_valid());
        assert_eq!(remove.owner_pub_key_hash(), kp.pub_key_hash());

        let mut replayed = remove.clone();
        replayed.sequence_number = 3;
        assert!(!replayed.is_signature_valid());

        assert!(remove.is_key_bound());
        let hostile = RemoveAuthenticatedDataRequest::for_add(&Keypair::generate(), &add, 2);
        assert!(hostile.is_signature_valid());
        assert!(!hostile.is_key_bound());

        let refresh = RefreshAuthenticatedDataRequest::for_add(&kp, &add, 2);
        assert!(refresh.is_signature_valid());

        // The renewed creation time is covered by the signature
        let mut extended = refresh.clone();
        extended.created += 1;
        assert!(!extended.is_signature_valid());
    }

    #[test]
    fn test_entry_views() {
        let kp = Keypair::generate();
        let add = AddAuthenticatedDataRequest::new_with_created(&kp, profile(&kp, "alice"), 1, 1_000).unwrap();
        let live = AuthenticatedEntry::Added(add.clone());
        assert_eq!(live.sequence_number(), 1);
        assert_eq!(live.created(), 1_000);
        assert!(!live.is_tombstone());
        assert!(live.payload().is_some());

        let refresh =
            RefreshAuthenticatedDataRequest::new_with_created(&kp, PayloadType::UserProfile, add.key(), 4, 9_000);
        let refreshed = AuthenticatedEntry::Refreshed {
            request: add.clone(),
            refresh: refresh.clone(),
        };
        assert_eq!(refreshed.sequence_number(), 4);
        assert_eq!(refreshed.created(), 9_000);
        assert_eq!(
            refreshed.to_data_request(),
            DataRequest::Refresh { add: add.clone(), refresh }
        );

        let remove = RemoveAuthenticatedDataRequest::new_with_created(
            &kp,
            PayloadType::UserProfile,
            &add.data.payload.stable_id(),
            5,
            2_000,
        );
        assert_eq!(remove.key, add.key());
        let tombstone = AuthenticatedEntry::Removed(remove);
        assert!(tombstone.is_tombstone());
        assert!(tombstone.payload().is_none());
        assert!(tombstone.to_data_request().is_removal());
    }
}
